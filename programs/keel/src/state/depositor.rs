// =============================================================================
// Depositor State Account
// =============================================================================
// One stability pool position. The deposit's current value and its collateral
// gain are never stored; they are derived from `initial_value` and `snapshot`
// against the pool's running P and S (see StabilityPool::compounded_deposit
// and StabilityPool::collateral_gain). Every deposit or withdrawal pays out
// the pending gain, compounds the deposit and takes a fresh snapshot.
// =============================================================================

use anchor_lang::prelude::*;

use crate::error::KeelError;
use crate::state::DepositSnapshot;

/// Tracks an individual user's position in the stability pool.
///
/// This account is a PDA derived from ["depositor", stability_pool_pubkey, owner_pubkey].
#[account]
#[derive(InitSpace, Default)]
pub struct Depositor {
    // =========================================================================
    // Account References
    // =========================================================================

    /// The stability pool this depositor belongs to
    pub pool: Pubkey,

    /// The wallet that owns the deposit and receives its gains
    pub owner: Pubkey,

    // =========================================================================
    // Position
    // =========================================================================

    /// Compounded value of the deposit at the time of the last snapshot
    pub initial_value: u64,

    pub snapshot: DepositSnapshot,

    // =========================================================================
    // History (analytics only)
    // =========================================================================

    /// Total debt tokens this user has deposited (cumulative)
    pub total_deposited: u64,

    /// Total debt tokens this user has withdrawn (cumulative)
    pub total_withdrawn: u64,

    /// Total collateral gains paid out (cumulative)
    pub total_collateral_claimed: u64,

    pub deposit_count: u32,

    pub last_deposit_timestamp: i64,
    pub last_withdrawal_timestamp: i64,

    /// Bump seed for this Depositor PDA
    pub bump: u8,
}

impl Depositor {
    pub fn has_deposit(&self) -> bool {
        self.initial_value > 0
    }

    /// Replace the position with its compounded value plus `deposit_amount`
    pub fn record_deposit(
        &mut self,
        compounded: u64,
        deposit_amount: u64,
        snapshot: DepositSnapshot,
        timestamp: i64,
    ) -> Result<()> {
        self.initial_value = compounded
            .checked_add(deposit_amount)
            .ok_or(error!(KeelError::MathOverflow))?;
        self.snapshot = snapshot;

        self.total_deposited = self
            .total_deposited
            .checked_add(deposit_amount)
            .ok_or(error!(KeelError::MathOverflow))?;

        self.deposit_count = self
            .deposit_count
            .checked_add(1)
            .ok_or(error!(KeelError::MathOverflow))?;

        self.last_deposit_timestamp = timestamp;

        Ok(())
    }

    /// Replace the position with its compounded value minus `withdrawal_amount`
    pub fn record_withdrawal(
        &mut self,
        compounded: u64,
        withdrawal_amount: u64,
        snapshot: DepositSnapshot,
        timestamp: i64,
    ) -> Result<()> {
        self.initial_value = compounded
            .checked_sub(withdrawal_amount)
            .ok_or(error!(KeelError::InsufficientBalance))?;
        self.snapshot = if self.initial_value == 0 {
            DepositSnapshot::default()
        } else {
            snapshot
        };

        self.total_withdrawn = self
            .total_withdrawn
            .checked_add(withdrawal_amount)
            .ok_or(error!(KeelError::MathOverflow))?;

        self.last_withdrawal_timestamp = timestamp;

        Ok(())
    }

    pub fn record_collateral_claim(&mut self, amount: u64) -> Result<()> {
        self.total_collateral_claimed = self
            .total_collateral_claimed
            .checked_add(amount)
            .ok_or(error!(KeelError::MathOverflow))?;
        Ok(())
    }
}
