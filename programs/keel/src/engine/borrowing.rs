// =============================================================================
// Borrowing
// =============================================================================
// Opening, adjusting and closing troves. Every trove carries the debt gas
// compensation on top of what its owner borrowed; the reserve is minted to
// the gas pool at open and burned from it at close.
//
// Collateral checks:
//   normal mode    ICR >= MCR and the resulting TCR >= CCR
//   recovery mode  a new trove needs ICR >= CCR; an adjustment may not
//                  withdraw collateral, and a debt increase must leave the
//                  trove at ICR >= CCR without lowering its ICR; closing
//                  is not allowed
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::MAX_INTEREST_RATE_BPS;
use crate::error::KeelError;
use crate::math::compute_cr;
use crate::state::{TroveId, TroveStatus};

use super::gas::{composite_debt, net_debt};
use super::{Engine, Holder};

/// Requested change to a trove, at most one side of each pair non-zero
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TroveAdjustment {
    pub collateral_deposit: u64,
    pub collateral_withdrawal: u64,
    pub debt_increase: u64,
    pub debt_repayment: u64,
}

impl TroveAdjustment {
    fn collateral_change(&self) -> i128 {
        self.collateral_deposit as i128 - self.collateral_withdrawal as i128
    }

    fn debt_change(&self) -> i128 {
        self.debt_increase as i128 - self.debt_repayment as i128
    }

    fn validate(&self) -> Result<()> {
        require!(
            self.collateral_deposit == 0 || self.collateral_withdrawal == 0,
            KeelError::ConflictingCollateralChange
        );
        require!(
            self.debt_increase == 0 || self.debt_repayment == 0,
            KeelError::ConflictingCollateralChange
        );
        require!(
            self.collateral_deposit > 0
                || self.collateral_withdrawal > 0
                || self.debt_increase > 0
                || self.debt_repayment > 0,
            KeelError::EmptyAdjustment
        );
        Ok(())
    }
}

/// Balances of a trove after an owner operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TroveChange {
    pub id: TroveId,
    pub debt: u64,
    pub collateral: u64,
    pub stake: u64,
}

impl Engine<'_> {
    /// Open a trove for `owner` with `collateral` and `borrowed` debt tokens
    pub fn open_trove(
        &mut self,
        owner: Pubkey,
        collateral: u64,
        borrowed: u64,
        interest_rate_bps: u16,
    ) -> Result<TroveChange> {
        require!(collateral > 0, KeelError::InvalidAmount);
        require!(
            interest_rate_bps <= MAX_INTEREST_RATE_BPS,
            KeelError::InterestRateTooHigh
        );
        require_gte!(borrowed, self.config().min_net_debt, KeelError::NetDebtBelowMinimum);

        let debt = composite_debt(borrowed, self.config())?;
        let icr = compute_cr(collateral, debt, self.price())?;

        if self.is_recovery_mode()? {
            require_gte!(icr, self.config().ccr, KeelError::IcrBelowCcr);
        } else {
            require_gte!(icr, self.config().mcr, KeelError::IcrBelowMcr);
            let new_tcr = self.new_tcr(collateral as i128, debt as i128)?;
            require_gte!(new_tcr, self.config().ccr, KeelError::TcrBelowCcr);
        }

        let now = self.now();
        let id = self
            .troves
            .open_trove(owner, collateral, debt, interest_rate_bps, now)?;
        let gas_compensation = self.config().debt_gas_compensation;

        let commands = self.commands_mut();
        commands.receive_collateral(Holder::Caller, collateral)?;
        commands.mint_debt(Holder::Caller, borrowed)?;
        commands.mint_debt(Holder::GasPool, gas_compensation)?;

        let trove = self.troves.trove(id)?;
        msg!("Opened trove {} with collateral {} and debt {}", id, collateral, debt);
        Ok(TroveChange {
            id,
            debt: trove.debt,
            collateral: trove.collateral,
            stake: trove.stake,
        })
    }

    /// Deposit or withdraw collateral and borrow or repay debt
    pub fn adjust_trove(
        &mut self,
        id: TroveId,
        caller: &Pubkey,
        adjustment: TroveAdjustment,
    ) -> Result<TroveChange> {
        adjustment.validate()?;
        self.require_owner(id, caller)?;

        let recovery_mode = self.is_recovery_mode()?;
        let position = self.touch(id)?;

        require!(
            adjustment.collateral_withdrawal <= position.collateral,
            KeelError::InsufficientBalance
        );

        let old_icr = compute_cr(position.collateral, position.debt, self.price())?;
        let new_collateral = position
            .collateral
            .checked_add(adjustment.collateral_deposit)
            .ok_or(error!(KeelError::MathOverflow))?
            .checked_sub(adjustment.collateral_withdrawal)
            .ok_or(error!(KeelError::MathUnderflow))?;
        let new_debt = position
            .debt
            .checked_add(adjustment.debt_increase)
            .ok_or(error!(KeelError::MathOverflow))?
            .checked_sub(adjustment.debt_repayment)
            .ok_or(error!(KeelError::RepaymentTooLarge))?;
        let new_icr = compute_cr(new_collateral, new_debt, self.price())?;

        if recovery_mode {
            require!(
                adjustment.collateral_withdrawal == 0,
                KeelError::CollateralWithdrawalInRecoveryMode
            );
            if adjustment.debt_increase > 0 {
                require_gte!(new_icr, self.config().ccr, KeelError::IcrBelowCcr);
                require_gte!(new_icr, old_icr, KeelError::IcrDecreasedInRecoveryMode);
            }
        } else {
            require_gte!(new_icr, self.config().mcr, KeelError::IcrBelowMcr);
            let new_tcr = self.new_tcr(adjustment.collateral_change(), adjustment.debt_change())?;
            require_gte!(new_tcr, self.config().ccr, KeelError::TcrBelowCcr);
        }

        if adjustment.debt_repayment > 0 {
            let repayable = net_debt(position.debt, self.config());
            require!(
                adjustment.debt_repayment <= repayable,
                KeelError::RepaymentTooLarge
            );
            require_gte!(
                repayable - adjustment.debt_repayment,
                self.config().min_net_debt,
                KeelError::NetDebtBelowMinimum
            );
        }

        if adjustment.collateral_deposit > 0 {
            self.troves.increase_collateral(id, adjustment.collateral_deposit)?;
        }
        if adjustment.collateral_withdrawal > 0 {
            self.troves.decrease_collateral(id, adjustment.collateral_withdrawal)?;
        }
        if adjustment.debt_increase > 0 {
            self.troves.increase_debt(id, adjustment.debt_increase)?;
        }
        if adjustment.debt_repayment > 0 {
            self.troves.decrease_debt(id, adjustment.debt_repayment)?;
        }
        let stake = self.troves.update_stake(id)?;
        self.troves.re_rank(id)?;

        let commands = self.commands_mut();
        commands.receive_collateral(Holder::Caller, adjustment.collateral_deposit)?;
        commands.send_collateral(Holder::Caller, adjustment.collateral_withdrawal)?;
        commands.mint_debt(Holder::Caller, adjustment.debt_increase)?;
        commands.burn_debt(Holder::Caller, adjustment.debt_repayment)?;

        msg!("Adjusted trove {}: collateral {}, debt {}", id, new_collateral, new_debt);
        Ok(TroveChange {
            id,
            debt: new_debt,
            collateral: new_collateral,
            stake,
        })
    }

    /// Repay everything and take back the collateral
    pub fn close_trove(&mut self, id: TroveId, caller: &Pubkey) -> Result<TroveChange> {
        self.require_owner(id, caller)?;
        require!(!self.is_recovery_mode()?, KeelError::NotPermittedInRecoveryMode);
        require!(self.troves.active_count() > 1, KeelError::OnlyOneTroveInSystem);

        let position = self.touch(id)?;
        let new_tcr = self.new_tcr(
            -(position.collateral as i128),
            -(position.debt as i128),
        )?;
        require_gte!(new_tcr, self.config().ccr, KeelError::TcrBelowCcr);

        self.troves.close_trove(id, TroveStatus::ClosedByOwner)?;
        self.troves.active_pool.sub_collateral(position.collateral)?;
        self.troves.active_pool.sub_debt(position.debt)?;

        let gas_compensation = self.config().debt_gas_compensation.min(position.debt);
        let commands = self.commands_mut();
        commands.burn_debt(Holder::Caller, position.debt - gas_compensation)?;
        commands.burn_debt(Holder::GasPool, gas_compensation)?;
        commands.send_collateral(Holder::Caller, position.collateral)?;

        msg!("Closed trove {}, returned collateral {}", id, position.collateral);
        Ok(TroveChange {
            id,
            debt: 0,
            collateral: 0,
            stake: 0,
        })
    }
}
