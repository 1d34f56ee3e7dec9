// =============================================================================
// Recovery Mode
// =============================================================================
// The system is in recovery mode while its total collateral ratio is below
// CCR. The flag is derived from the live price on every check and never
// stored.
// =============================================================================

use anchor_lang::prelude::*;

use crate::error::KeelError;
use crate::math::compute_cr;

use super::Engine;

/// Would a system holding `collateral` against `debt` be in recovery mode
pub fn check_potential_recovery_mode(
    collateral: u64,
    debt: u64,
    price: u128,
    ccr: u128,
) -> Result<bool> {
    Ok(compute_cr(collateral, debt, price)? < ccr)
}

/// TCR after a change to the system totals
pub fn new_tcr_from_change(
    system_collateral: u64,
    system_debt: u64,
    collateral_change: i128,
    debt_change: i128,
    price: u128,
) -> Result<u128> {
    let collateral = apply_change(system_collateral, collateral_change)?;
    let debt = apply_change(system_debt, debt_change)?;
    compute_cr(collateral, debt, price)
}

fn apply_change(value: u64, change: i128) -> Result<u64> {
    let changed = (value as i128)
        .checked_add(change)
        .ok_or(error!(KeelError::MathOverflow))?;
    require!(changed >= 0, KeelError::MathUnderflow);
    u64::try_from(changed).map_err(|_| error!(KeelError::MathOverflow))
}

impl Engine<'_> {
    pub fn is_recovery_mode(&self) -> Result<bool> {
        check_potential_recovery_mode(
            self.entire_system_collateral()?,
            self.entire_system_debt()?,
            self.price(),
            self.config().ccr,
        )
    }

    /// System TCR after the given change, at the engine's price
    pub fn new_tcr(&self, collateral_change: i128, debt_change: i128) -> Result<u128> {
        new_tcr_from_change(
            self.entire_system_collateral()?,
            self.entire_system_debt()?,
            collateral_change,
            debt_change,
            self.price(),
        )
    }
}
