// =============================================================================
// Trove Record
// =============================================================================
// One collateralized debt position. Troves live in the TroveBook arena and are
// addressed by their arena index (TroveId); a slot is never reused, so a
// closed trove keeps its final status for as long as the book exists.
// =============================================================================

use anchor_lang::prelude::*;

use crate::math::compute_nominal_cr;

/// Arena index of a trove inside its TroveBook
pub type TroveId = u32;

/// Lifecycle of a trove
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug, InitSpace)]
pub enum TroveStatus {
    /// Slot allocated but never opened
    NonExistent,
    /// Open, ranked in the sorted list and present in the active index
    Active,
    /// Owner repaid the debt and withdrew the collateral
    ClosedByOwner,
    /// Removed by the liquidation engine
    ClosedByLiquidation,
    /// Fully redeemed; leftover collateral waits in the surplus ledger
    Unredeemable,
}

impl Default for TroveStatus {
    fn default() -> Self {
        TroveStatus::NonExistent
    }
}

/// Values of the redistribution accumulators at the trove's last touch
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, PartialEq, Eq, Debug, InitSpace)]
pub struct RewardSnapshot {
    pub collateral_per_stake: u128,
    pub debt_per_stake: u128,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, PartialEq, Eq, Debug, InitSpace)]
pub struct Trove {
    /// Wallet that opened the trove and may adjust or close it
    pub owner: Pubkey,

    /// Debt in debt token base units, including the gas compensation reserve
    pub debt: u64,

    /// Collateral in base units
    pub collateral: u64,

    /// Share of redistributed rewards, derived from collateral
    pub stake: u64,

    pub status: TroveStatus,

    /// Annual interest rate in basis points
    pub interest_rate_bps: u16,

    /// Unix timestamp up to which interest has been folded into `debt`
    pub last_interest_update: i64,

    /// Back-pointer into the TroveBook's dense active index
    pub array_index: u32,

    pub snapshot: RewardSnapshot,
}

impl Trove {
    pub fn is_active(&self) -> bool {
        self.status == TroveStatus::Active
    }

    /// Rank key of the trove in the sorted list
    pub fn nominal_cr(&self) -> Result<u128> {
        compute_nominal_cr(self.collateral, self.debt)
    }
}
