// =============================================================================
// Protocol State Account
// =============================================================================
// Central configuration and bookkeeping for one collateral type: the
// addresses of every account the protocol owns, the tunable risk parameters,
// the last posted price and the redemption base rate.
//
// PDA derived from ["protocol", collateral_mint_pubkey]. It is the authority
// of the debt mint and of every vault.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::*;
use crate::error::KeelError;
use crate::math::{dec_pow, mul_div};

/// Risk parameters adjustable by the admin
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub struct ProtocolConfig {
    /// Minimum collateral ratio (1e18 = 100%)
    pub mcr: u128,

    /// Critical system collateral ratio; below it the system is in recovery mode
    pub ccr: u128,

    /// Debt reserved in the gas pool for every trove
    pub debt_gas_compensation: u64,

    /// Collateral gas compensation lower bound, valued in debt tokens
    pub coll_gas_compensation_floor_value: u64,

    /// Absolute cap on collateral gas compensation, in collateral base units
    pub coll_gas_compensation_cap: u64,

    /// Minimum debt of a trove excluding the gas compensation reserve
    pub min_net_debt: u64,

    /// Seconds a posted price stays usable
    pub price_max_age: i64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            mcr: DEFAULT_MCR,
            ccr: DEFAULT_CCR,
            debt_gas_compensation: DEFAULT_DEBT_GAS_COMPENSATION,
            coll_gas_compensation_floor_value: DEFAULT_COLL_GAS_COMPENSATION_FLOOR_VALUE,
            coll_gas_compensation_cap: DEFAULT_COLL_GAS_COMPENSATION_CAP,
            min_net_debt: DEFAULT_MIN_NET_DEBT,
            price_max_age: DEFAULT_PRICE_MAX_AGE,
        }
    }
}

impl ProtocolConfig {
    /// 100% < MCR < CCR, and every compensation and limit is non-zero
    pub fn validate(&self) -> Result<()> {
        require!(self.mcr > ONE_HUNDRED_PERCENT, KeelError::InvalidConfig);
        require!(self.ccr > self.mcr, KeelError::InvalidConfig);
        require!(self.debt_gas_compensation > 0, KeelError::InvalidConfig);
        require!(self.coll_gas_compensation_cap > 0, KeelError::InvalidConfig);
        require!(self.min_net_debt > 0, KeelError::InvalidConfig);
        require!(self.price_max_age > 0, KeelError::InvalidConfig);
        Ok(())
    }
}

/// Last price posted by the oracle authority
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, Debug, PartialEq, Eq, InitSpace)]
pub struct PriceSnapshot {
    /// Debt tokens per whole collateral token, 1e18 scaled
    pub price: u128,
    pub updated_at: i64,
}

/// Redemption base rate and its decay clock
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, Debug, PartialEq, Eq, InitSpace)]
pub struct FeeState {
    /// 1e18 = 100%
    pub base_rate: u128,
    pub last_fee_operation_time: i64,
}

impl FeeState {
    fn minutes_passed(&self, now: i64) -> u64 {
        (now.saturating_sub(self.last_fee_operation_time) / SECONDS_IN_ONE_MINUTE).max(0) as u64
    }

    /// Base rate after decaying for every whole minute since the last fee operation
    pub fn decayed_base_rate(&self, now: i64) -> Result<u128> {
        let decay_factor = dec_pow(MINUTE_DECAY_FACTOR, self.minutes_passed(now))?;
        mul_div(self.base_rate, decay_factor, DECIMAL_PRECISION)
    }

    /// Decay the base rate, then raise it by half the fraction of the total
    /// debt that was redeemed
    pub fn update_base_rate_from_redemption(
        &mut self,
        collateral_drawn: u64,
        price: u128,
        total_debt: u64,
        now: i64,
    ) -> Result<u128> {
        let decayed = self.decayed_base_rate(now)?;
        let redeemed_fraction = mul_div(collateral_drawn as u128, price, total_debt as u128)?;
        let new_base_rate = decayed
            .checked_add(redeemed_fraction / BETA)
            .ok_or(error!(KeelError::MathOverflow))?
            .min(DECIMAL_PRECISION);
        require!(new_base_rate > 0, KeelError::UnableToRedeem);

        self.base_rate = new_base_rate;
        self.update_last_fee_op_time(now);
        Ok(new_base_rate)
    }

    /// The clock only advances in whole minutes so frequent operations
    /// cannot stall the decay
    pub fn update_last_fee_op_time(&mut self, now: i64) {
        if now.saturating_sub(self.last_fee_operation_time) >= SECONDS_IN_ONE_MINUTE {
            self.last_fee_operation_time = now;
        }
    }

    pub fn redemption_rate(&self) -> u128 {
        Self::rate_for(self.base_rate)
    }

    pub fn redemption_rate_with_decay(&self, now: i64) -> Result<u128> {
        Ok(Self::rate_for(self.decayed_base_rate(now)?))
    }

    fn rate_for(base_rate: u128) -> u128 {
        REDEMPTION_FEE_FLOOR
            .saturating_add(base_rate)
            .min(MAX_REDEMPTION_FEE)
    }

    /// Fee on `collateral_drawn` at the current rate; must leave the redeemer something
    pub fn redemption_fee(&self, collateral_drawn: u64) -> Result<u64> {
        let fee = mul_div(
            self.redemption_rate(),
            collateral_drawn as u128,
            DECIMAL_PRECISION,
        )? as u64;
        require!(fee < collateral_drawn, KeelError::FeeExceedsCollateral);
        Ok(fee)
    }
}

/// The main Protocol account.
#[account]
#[derive(InitSpace, Default)]
pub struct Protocol {
    // =========================================================================
    // Authorities
    // =========================================================================

    /// Can pause, update the configuration and transfer admin rights
    pub admin: Pubkey,

    /// The only signer allowed to post prices
    pub oracle_authority: Pubkey,

    // =========================================================================
    // Mints & Accounts
    // =========================================================================

    pub collateral_mint: Pubkey,

    /// Debt token mint (PDA, authority = this account)
    pub debt_mint: Pubkey,

    /// Holds all collateral: troves, redistributions, pool gains, surpluses
    pub collateral_vault: Pubkey,

    /// Holds stability pool deposits
    pub stability_pool_vault: Pubkey,

    /// Holds the debt gas compensation reserve of every open trove
    pub gas_pool: Pubkey,

    /// External collateral account receiving redemption fees
    pub treasury_collateral: Pubkey,

    /// External debt token account receiving accrued interest
    pub treasury_debt: Pubkey,

    pub trove_book: Pubkey,
    pub stability_pool: Pubkey,

    // =========================================================================
    // Parameters & Market State
    // =========================================================================

    pub config: ProtocolConfig,
    pub oracle: PriceSnapshot,
    pub fees: FeeState,

    // =========================================================================
    // Statistics
    // =========================================================================

    pub total_liquidations: u64,
    pub total_redemptions: u64,

    // =========================================================================
    // Status
    // =========================================================================

    /// When true, only liquidations, redemptions and claims run
    pub is_paused: bool,

    // =========================================================================
    // PDA Bumps
    // =========================================================================

    pub bump: u8,
    pub debt_mint_bump: u8,
    pub collateral_vault_bump: u8,
    pub stability_pool_vault_bump: u8,
    pub gas_pool_bump: u8,
}

impl Protocol {
    /// The posted price, as a feed the engine can query
    pub fn price_feed(&self) -> crate::oracle::PostedPrice {
        crate::oracle::PostedPrice {
            snapshot: self.oracle,
            max_age: self.config.price_max_age,
        }
    }
}
