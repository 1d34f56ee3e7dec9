// =============================================================================
// Stability Pool Account
// =============================================================================
// Depositors lock debt tokens that absorb liquidated debt in exchange for the
// liquidated collateral. Every deposit is tracked in O(1) through two running
// quantities:
//
// - P, the product of (1 - loss per unit) over all offsets. A deposit made
//   when the product was P_snap is worth initial * P / P_snap today.
// - S, the sum of (gain per unit * P) over all offsets. The collateral gain
//   of a deposit is initial * (S - S_snap) / P_snap.
//
// P is kept above SCALE_FACTOR: when an offset would push it lower, it is
// multiplied by SCALE_FACTOR and the scale increments. Only an offset that
// cancels every deposit starts a new epoch, which wipes every older deposit.
// S is tracked per (epoch, scale) segment as a 256-bit value, in segment
// accounts outside of this one (see `epoch_scale`).
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::*;
use crate::error::KeelError;
use crate::math::U256;
use crate::state::SumTable;

/// Pool state captured when a deposit was last changed
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, Debug, PartialEq, Eq, InitSpace)]
pub struct DepositSnapshot {
    pub p: u128,
    pub s: [u64; 4],
    pub scale: u64,
    pub epoch: u64,
}

/// Pool changes made by one offset, reported for logging
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct OffsetReport {
    pub debt_offset: u64,
    pub collateral_added: u64,
    pub scale_changed: bool,
    pub epoch_changed: bool,
}

#[account]
#[derive(Default, InitSpace)]
pub struct StabilityPool {
    /// The protocol this pool belongs to
    pub protocol: Pubkey,

    /// Debt tokens currently deposited
    pub total_deposits: u64,

    /// Collateral gains not yet withdrawn by depositors
    pub total_collateral: u64,

    /// Running product, starts at DECIMAL_PRECISION
    pub p: u128,

    pub current_scale: u64,
    pub current_epoch: u64,

    /// Division remainders carried between offsets
    pub last_collateral_error_offset: u128,
    pub last_debt_loss_error_offset: u128,

    /// Number of depositors with a non-zero deposit
    pub depositor_count: u64,
}

impl StabilityPool {
    pub fn init(&mut self, protocol: Pubkey) {
        self.protocol = protocol;
        self.p = DECIMAL_PRECISION;
        self.current_scale = 0;
        self.current_epoch = 0;
        self.total_deposits = 0;
        self.total_collateral = 0;
        self.last_collateral_error_offset = 0;
        self.last_debt_loss_error_offset = 0;
    }

    pub fn current_snapshot(&self, sums: &SumTable) -> DepositSnapshot {
        DepositSnapshot {
            p: self.p,
            s: sums.get(self.current_epoch, self.current_scale).0,
            scale: self.current_scale,
            epoch: self.current_epoch,
        }
    }

    // =========================================================================
    // Offset
    // =========================================================================

    /// Cancel `debt_to_offset` against deposits and hand them `collateral_to_add`.
    /// The gain is added to the current segment of `sums`. A call with nothing
    /// to offset, or against an empty pool, does nothing.
    pub fn offset(
        &mut self,
        sums: &mut SumTable,
        debt_to_offset: u64,
        collateral_to_add: u64,
    ) -> Result<OffsetReport> {
        if self.total_deposits == 0 || debt_to_offset == 0 {
            return Ok(OffsetReport::default());
        }
        require!(
            debt_to_offset <= self.total_deposits,
            KeelError::OffsetExceedsDeposits
        );

        let (collateral_gain_per_unit, debt_loss_per_unit) =
            self.compute_rewards_per_unit_staked(collateral_to_add, debt_to_offset)?;
        let (scale_changed, epoch_changed) =
            self.update_reward_sum_and_product(sums, collateral_gain_per_unit, debt_loss_per_unit)?;

        self.total_deposits -= debt_to_offset;
        self.total_collateral = self
            .total_collateral
            .checked_add(collateral_to_add)
            .ok_or(error!(KeelError::MathOverflow))?;

        Ok(OffsetReport {
            debt_offset: debt_to_offset,
            collateral_added: collateral_to_add,
            scale_changed,
            epoch_changed,
        })
    }

    /// Per-unit collateral gain (rounded down) and debt loss (rounded up),
    /// with both remainders fed back into the next offset
    fn compute_rewards_per_unit_staked(
        &mut self,
        collateral_to_add: u64,
        debt_to_offset: u64,
    ) -> Result<(u128, u128)> {
        let total_deposits = self.total_deposits as u128;

        let collateral_numerator = (collateral_to_add as u128)
            .checked_mul(DECIMAL_PRECISION)
            .ok_or(error!(KeelError::MathOverflow))?
            .checked_add(self.last_collateral_error_offset)
            .ok_or(error!(KeelError::MathOverflow))?;

        let debt_loss_per_unit = if debt_to_offset as u128 == total_deposits {
            self.last_debt_loss_error_offset = 0;
            DECIMAL_PRECISION
        } else {
            let debt_loss_numerator = (debt_to_offset as u128)
                .checked_mul(DECIMAL_PRECISION)
                .ok_or(error!(KeelError::MathOverflow))?
                .checked_sub(self.last_debt_loss_error_offset)
                .ok_or(error!(KeelError::MathUnderflow))?;
            // +1 so any error lands on the depositors, never on the pool.
            // Some deposits remain, so the loss stays below a whole unit even
            // when rounding says otherwise.
            let per_unit = (debt_loss_numerator / total_deposits + 1).min(DECIMAL_PRECISION - 1);
            self.last_debt_loss_error_offset =
                (per_unit * total_deposits).saturating_sub(debt_loss_numerator);
            per_unit
        };

        let collateral_gain_per_unit = collateral_numerator / total_deposits;
        self.last_collateral_error_offset =
            collateral_numerator - collateral_gain_per_unit * total_deposits;

        Ok((collateral_gain_per_unit, debt_loss_per_unit))
    }

    /// Returns (scale changed, epoch changed)
    fn update_reward_sum_and_product(
        &mut self,
        sums: &mut SumTable,
        collateral_gain_per_unit: u128,
        debt_loss_per_unit: u128,
    ) -> Result<(bool, bool)> {
        let product_factor = DECIMAL_PRECISION
            .checked_sub(debt_loss_per_unit)
            .ok_or(error!(KeelError::MathUnderflow))?;

        // S first: the gain belongs to deposits as they were before this loss
        let marginal_gain = U256::from(collateral_gain_per_unit)
            .checked_mul(U256::from(self.p))
            .ok_or(error!(KeelError::MathOverflow))?;
        sums.add(self.current_epoch, self.current_scale, marginal_gain)?;

        if product_factor == 0 {
            self.current_epoch = self
                .current_epoch
                .checked_add(1)
                .ok_or(error!(KeelError::MathOverflow))?;
            self.current_scale = 0;
            self.p = DECIMAL_PRECISION;
            msg!("Stability pool emptied, epoch now {}", self.current_epoch);
            return Ok((false, true));
        }

        let unit = U256::from(DECIMAL_PRECISION);
        let scale_factor = U256::from(SCALE_FACTOR);
        let mut numerator = U256::from(self.p)
            .checked_mul(U256::from(product_factor))
            .ok_or(error!(KeelError::MathOverflow))?;
        let mut scale_changed = false;
        while numerator / unit < scale_factor {
            numerator = numerator
                .checked_mul(scale_factor)
                .ok_or(error!(KeelError::MathOverflow))?;
            self.current_scale = self
                .current_scale
                .checked_add(1)
                .ok_or(error!(KeelError::MathOverflow))?;
            scale_changed = true;
        }

        let new_p = (numerator / unit).try_to_u128()?;
        require!(new_p > 0, KeelError::MathUnderflow);
        self.p = new_p;

        if scale_changed {
            msg!("Stability pool scale now {}", self.current_scale);
        }
        Ok((scale_changed, false))
    }

    // =========================================================================
    // Deposit Valuation
    // =========================================================================

    /// Current value of a deposit of `initial_value` taken at `snapshot`
    pub fn compounded_deposit(&self, initial_value: u64, snapshot: &DepositSnapshot) -> Result<u64> {
        if initial_value == 0 || snapshot.epoch < self.current_epoch || snapshot.p == 0 {
            return Ok(0);
        }

        let scale_diff = self
            .current_scale
            .checked_sub(snapshot.scale)
            .ok_or(error!(KeelError::MathUnderflow))?;

        let mut compounded = U256::from(initial_value)
            .checked_mul(U256::from(self.p))
            .ok_or(error!(KeelError::MathOverflow))?
            / U256::from(snapshot.p);
        for _ in 0..scale_diff.min(3) {
            compounded = compounded / U256::from(SCALE_FACTOR);
        }
        let compounded = compounded.try_to_u64()?;

        // Dust floor
        if compounded < initial_value / DEPOSIT_DUST_DIVISOR {
            return Ok(0);
        }
        Ok(compounded)
    }

    /// Collateral earned by a deposit of `initial_value` since `snapshot`.
    ///
    /// The gain spans at most two segments: the snapshot's own scale, and the
    /// next scale (whose sums are worth 1/SCALE_FACTOR as much per unit of
    /// the original P). Anything later than that is below precision.
    pub fn collateral_gain(
        &self,
        sums: &SumTable,
        initial_value: u64,
        snapshot: &DepositSnapshot,
    ) -> Result<u64> {
        if initial_value == 0 || snapshot.p == 0 {
            return Ok(0);
        }

        let first_portion = sums
            .get(snapshot.epoch, snapshot.scale)
            .checked_sub(U256(snapshot.s))
            .ok_or(error!(KeelError::MathUnderflow))?;
        let second_portion = sums.get(snapshot.epoch, snapshot.scale + 1) / U256::from(SCALE_FACTOR);

        let gain = U256::from(initial_value)
            .checked_mul(
                first_portion
                    .checked_add(second_portion)
                    .ok_or(error!(KeelError::MathOverflow))?,
            )
            .ok_or(error!(KeelError::MathOverflow))?
            / U256::from(snapshot.p)
            / U256::from(DECIMAL_PRECISION);

        gain.try_to_u64()
    }

    // =========================================================================
    // Balances
    // =========================================================================

    pub fn increase_deposits(&mut self, amount: u64) -> Result<()> {
        self.total_deposits = self
            .total_deposits
            .checked_add(amount)
            .ok_or(error!(KeelError::MathOverflow))?;
        Ok(())
    }

    pub fn decrease_deposits(&mut self, amount: u64) -> Result<()> {
        self.total_deposits = self
            .total_deposits
            .checked_sub(amount)
            .ok_or(error!(KeelError::MathUnderflow))?;
        Ok(())
    }

    /// Pay out collateral gains; the pool total never goes below zero even if
    /// rounding over-reports a gain by a few units
    pub fn release_collateral(&mut self, amount: u64) -> u64 {
        let released = amount.min(self.total_collateral);
        self.total_collateral -= released;
        released
    }
}
