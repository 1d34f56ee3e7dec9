// =============================================================================
// Stability Pool Operations
// =============================================================================
// Deposits and withdrawals of debt tokens. Either operation first pays out the
// depositor's collateral gain, then rewrites the position at its compounded
// value and takes a fresh snapshot of P, S, scale and epoch.
//
// Collateral surplus claims live here too: they are the other way collateral
// leaves the vault outside of a trove.
// =============================================================================

use anchor_lang::prelude::*;

use crate::error::KeelError;
use crate::state::{Depositor, SortedTroves};

use super::{Engine, Holder};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepositChange {
    /// Value of the deposit after the operation
    pub deposit: u64,
    /// Collateral gain paid out by the operation
    pub collateral_gain: u64,
    /// Debt tokens the deposit lost to offsets since its last snapshot
    pub debt_loss: u64,
}

impl Engine<'_> {
    pub fn compounded_deposit(&self, depositor: &Depositor) -> Result<u64> {
        self.pool
            .compounded_deposit(depositor.initial_value, &depositor.snapshot)
    }

    pub fn depositor_collateral_gain(&self, depositor: &Depositor) -> Result<u64> {
        self.pool
            .collateral_gain(self.sums, depositor.initial_value, &depositor.snapshot)
    }

    pub fn provide_to_stability_pool(
        &mut self,
        depositor: &mut Depositor,
        amount: u64,
    ) -> Result<DepositChange> {
        require!(amount > 0, KeelError::InvalidAmount);

        let had_deposit = depositor.has_deposit();
        let gain = self.depositor_collateral_gain(depositor)?;
        let compounded = self.compounded_deposit(depositor)?;
        let debt_loss = depositor.initial_value.saturating_sub(compounded);

        self.pool.increase_deposits(amount)?;
        let snapshot = self.pool.current_snapshot(self.sums);
        depositor.record_deposit(compounded, amount, snapshot, self.now())?;
        let paid = self.pay_gain(depositor, gain)?;
        if !had_deposit {
            self.pool.depositor_count = self.pool.depositor_count.saturating_add(1);
        }

        self.commands_mut()
            .transfer_debt(Holder::Caller, Holder::StabilityPoolVault, amount)?;

        msg!(
            "Deposited {} into the stability pool, position now {}",
            amount,
            depositor.initial_value
        );
        Ok(DepositChange {
            deposit: depositor.initial_value,
            collateral_gain: paid,
            debt_loss,
        })
    }

    /// Withdraw up to `amount` of the compounded deposit. Zero only claims
    /// the collateral gain.
    pub fn withdraw_from_stability_pool(
        &mut self,
        depositor: &mut Depositor,
        amount: u64,
    ) -> Result<DepositChange> {
        require!(depositor.has_deposit(), KeelError::NoDeposit);
        if amount > 0 {
            self.require_no_undercollateralized_troves()?;
        }

        let gain = self.depositor_collateral_gain(depositor)?;
        let compounded = self.compounded_deposit(depositor)?;
        let withdrawn = amount.min(compounded);
        let debt_loss = depositor.initial_value.saturating_sub(compounded);

        self.pool.decrease_deposits(withdrawn)?;
        let snapshot = self.pool.current_snapshot(self.sums);
        depositor.record_withdrawal(compounded, withdrawn, snapshot, self.now())?;
        let paid = self.pay_gain(depositor, gain)?;
        if !depositor.has_deposit() {
            self.pool.depositor_count = self.pool.depositor_count.saturating_sub(1);
        }

        self.commands_mut()
            .transfer_debt(Holder::StabilityPoolVault, Holder::Caller, withdrawn)?;

        msg!(
            "Withdrew {} from the stability pool, position now {}",
            withdrawn,
            depositor.initial_value
        );
        Ok(DepositChange {
            deposit: depositor.initial_value,
            collateral_gain: paid,
            debt_loss,
        })
    }

    /// Pay the owner's whole collateral surplus
    pub fn claim_collateral_surplus(&mut self, owner: &Pubkey) -> Result<u64> {
        let amount = self.troves.surplus.claim(owner)?;
        self.commands_mut().send_collateral(Holder::Caller, amount)?;
        msg!("Claimed collateral surplus {}", amount);
        Ok(amount)
    }

    fn pay_gain(&mut self, depositor: &mut Depositor, gain: u64) -> Result<u64> {
        let paid = self.pool.release_collateral(gain);
        depositor.record_collateral_claim(paid)?;
        self.commands_mut().send_collateral(Holder::Caller, paid)?;
        Ok(paid)
    }

    /// Withdrawals would let depositors dodge a pending liquidation
    fn require_no_undercollateralized_troves(&self) -> Result<()> {
        if let Some(lowest) = self.troves.sorted.last() {
            let icr = self.current_icr(lowest)?;
            require_gte!(icr, self.config().mcr, KeelError::UndercollateralizedTroves);
        }
        Ok(())
    }
}
