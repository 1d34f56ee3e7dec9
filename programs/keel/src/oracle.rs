// =============================================================================
// Price Feed
// =============================================================================
// The engine queries the price exactly once per operation through
// `PriceFeed`. On chain the feed is the price posted to the Protocol account
// by the oracle authority; tests use a fixed price.
// =============================================================================

use anchor_lang::prelude::*;

use crate::error::KeelError;
use crate::state::PriceSnapshot;

pub trait PriceFeed {
    /// Debt tokens per whole collateral token, 1e18 scaled
    fn current_price(&self, now: i64) -> Result<u128>;
}

/// The last price posted on chain, usable for `max_age` seconds
#[derive(Clone, Copy, Debug)]
pub struct PostedPrice {
    pub snapshot: PriceSnapshot,
    pub max_age: i64,
}

impl PriceFeed for PostedPrice {
    fn current_price(&self, now: i64) -> Result<u128> {
        require!(self.snapshot.price > 0, KeelError::StalePrice);
        let age = now.saturating_sub(self.snapshot.updated_at);
        require!(age <= self.max_age, KeelError::StalePrice);
        Ok(self.snapshot.price)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedPrice(pub u128);

impl PriceFeed for FixedPrice {
    fn current_price(&self, _now: i64) -> Result<u128> {
        require!(self.0 > 0, KeelError::StalePrice);
        Ok(self.0)
    }
}
