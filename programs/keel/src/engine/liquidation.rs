// =============================================================================
// Liquidation
// =============================================================================
// Closes undercollateralized troves. A liquidation call evaluates its
// candidates one by one, accumulating what each liquidated trove sends where,
// then applies the totals once:
//
//   1. debt_to_offset / coll_to_send_to_pool   -> stability pool offset
//   2. debt/coll_to_redistribute               -> redistribution over stakes
//   3. coll_surplus                            -> owner's claimable surplus
//   4. gas compensation                        -> caller
//
// Normal mode: a trove is liquidatable iff ICR < MCR. As much of its debt as
// the pool still holds is offset, the rest is redistributed.
//
// Recovery mode (TCR < CCR):
//   ICR <= 100%          everything is redistributed
//   100% < ICR < MCR     same as normal mode
//   MCR <= ICR < TCR     only if the pool covers the whole debt: the debt is
//                        offset against collateral worth debt * MCR, the
//                        rest is credited to the owner as surplus
//   ICR >= TCR           immune
// After every recovery mode liquidation the running totals are re-checked
// and the rest of the call follows normal mode rules once TCR >= CCR.
//
// The last active trove is never liquidated.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::{MAX_LIQUIDATION_BATCH_SIZE, ONE_HUNDRED_PERCENT};
use crate::error::KeelError;
use crate::math::{compute_cr, mul_div, to_u64};
use crate::state::{EntirePosition, OffsetReport, SortedTroves, TroveId, TroveStatus};

use super::gas::{collateral_gas_compensation, debt_gas_compensation};
use super::recovery::check_potential_recovery_mode;
use super::{Engine, Holder};

/// What happened to one candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiquidationOutcome {
    NotLiquidatable,
    FullyOffset,
    PartiallyOffsetAndRedistributed,
    PureRedistribution,
    CappedWithSurplus,
}

/// Where the balances of one liquidated trove go
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiquidationValues {
    pub entire_debt: u64,
    pub entire_collateral: u64,
    pub coll_gas_compensation: u64,
    pub debt_gas_compensation: u64,
    pub debt_to_offset: u64,
    pub coll_to_send_to_pool: u64,
    pub debt_to_redistribute: u64,
    pub coll_to_redistribute: u64,
    pub coll_surplus: u64,
}

impl LiquidationValues {
    pub fn outcome(&self) -> LiquidationOutcome {
        if self.entire_debt == 0 {
            LiquidationOutcome::NotLiquidatable
        } else if self.coll_surplus > 0 {
            LiquidationOutcome::CappedWithSurplus
        } else if self.debt_to_offset == 0 {
            LiquidationOutcome::PureRedistribution
        } else if self.debt_to_redistribute == 0 {
            LiquidationOutcome::FullyOffset
        } else {
            LiquidationOutcome::PartiallyOffsetAndRedistributed
        }
    }
}

/// Sums of `LiquidationValues` over one call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiquidationTotals {
    pub total_coll_in_sequence: u64,
    pub total_debt_in_sequence: u64,
    pub total_coll_gas_compensation: u64,
    pub total_debt_gas_compensation: u64,
    pub total_debt_to_offset: u64,
    pub total_coll_to_send_to_pool: u64,
    pub total_debt_to_redistribute: u64,
    pub total_coll_to_redistribute: u64,
    pub total_coll_surplus: u64,
}

fn accumulate(total: &mut u64, amount: u64) -> Result<()> {
    *total = total
        .checked_add(amount)
        .ok_or(error!(KeelError::MathOverflow))?;
    Ok(())
}

impl LiquidationTotals {
    fn add(&mut self, values: &LiquidationValues) -> Result<()> {
        accumulate(&mut self.total_coll_in_sequence, values.entire_collateral)?;
        accumulate(&mut self.total_debt_in_sequence, values.entire_debt)?;
        accumulate(&mut self.total_coll_gas_compensation, values.coll_gas_compensation)?;
        accumulate(&mut self.total_debt_gas_compensation, values.debt_gas_compensation)?;
        accumulate(&mut self.total_debt_to_offset, values.debt_to_offset)?;
        accumulate(&mut self.total_coll_to_send_to_pool, values.coll_to_send_to_pool)?;
        accumulate(&mut self.total_debt_to_redistribute, values.debt_to_redistribute)?;
        accumulate(&mut self.total_coll_to_redistribute, values.coll_to_redistribute)?;
        accumulate(&mut self.total_coll_surplus, values.coll_surplus)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiquidatedTrove {
    pub id: TroveId,
    pub owner: Pubkey,
    pub values: LiquidationValues,
    pub outcome: LiquidationOutcome,
    pub recovery_mode: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiquidationReport {
    pub totals: LiquidationTotals,
    pub liquidated: Vec<LiquidatedTrove>,
    pub offset: OffsetReport,
}

/// Running state of one liquidation call
struct Sequence {
    recovery_mode: bool,
    back_to_normal_mode: bool,
    remaining_in_pool: u64,
    system_collateral: u64,
    system_debt: u64,
    totals: LiquidationTotals,
    liquidated: Vec<LiquidatedTrove>,
}

enum Candidate {
    Liquidated,
    /// Closed, unknown, immune or the last trove
    Skipped,
    /// Healthy enough that nothing ranked above it can be liquidated either
    Healthy,
}

impl Engine<'_> {
    // =========================================================================
    // Entry Points
    // =========================================================================

    /// Liquidate a single active trove
    pub fn liquidate(&mut self, id: TroveId) -> Result<LiquidationReport> {
        require!(self.troves.is_active(id), KeelError::TroveNotActive);
        self.batch_liquidate(&[id])
    }

    /// Liquidate every eligible trove of an arbitrary list. Ineligible,
    /// unknown, closed and repeated entries are skipped.
    pub fn batch_liquidate(&mut self, ids: &[TroveId]) -> Result<LiquidationReport> {
        require!(!ids.is_empty(), KeelError::EmptyTroveArray);
        let mut sequence = self.start_sequence()?;
        for &id in ids {
            self.try_liquidate(id, &mut sequence)?;
        }
        self.finish_liquidation(sequence)
    }

    /// Walk up to `n` troves from the bottom of the sorted list
    pub fn liquidate_troves(&mut self, n: u32) -> Result<LiquidationReport> {
        require!(n > 0, KeelError::InvalidAmount);
        let n = n.min(MAX_LIQUIDATION_BATCH_SIZE);
        let mut sequence = self.start_sequence()?;

        if sequence.recovery_mode {
            let first = self.troves.sorted.first();
            let mut cursor = self.troves.sorted.last();
            let mut visited = 0;
            while let Some(id) = cursor {
                if visited >= n || Some(id) == first || self.troves.active_count() <= 1 {
                    break;
                }
                let next = self.troves.sorted.prev(id);
                if let Candidate::Healthy = self.try_liquidate(id, &mut sequence)? {
                    break;
                }
                cursor = next;
                visited += 1;
            }
        } else {
            for _ in 0..n {
                let Some(id) = self.troves.sorted.last() else {
                    break;
                };
                if !matches!(self.try_liquidate(id, &mut sequence)?, Candidate::Liquidated) {
                    break;
                }
            }
        }

        self.finish_liquidation(sequence)
    }

    // =========================================================================
    // Candidate Evaluation
    // =========================================================================

    fn start_sequence(&self) -> Result<Sequence> {
        let recovery_mode = self.is_recovery_mode()?;
        if recovery_mode {
            msg!("Liquidating in recovery mode, TCR {}", self.tcr()?);
        }
        Ok(Sequence {
            recovery_mode,
            back_to_normal_mode: false,
            remaining_in_pool: self.pool.total_deposits,
            system_collateral: self.entire_system_collateral()?,
            system_debt: self.entire_system_debt()?,
            totals: LiquidationTotals::default(),
            liquidated: Vec::new(),
        })
    }

    fn try_liquidate(&mut self, id: TroveId, sequence: &mut Sequence) -> Result<Candidate> {
        if !self.troves.is_active(id) || self.troves.active_count() <= 1 {
            return Ok(Candidate::Skipped);
        }

        let icr = self.current_icr(id)?;
        let mcr = self.config().mcr;
        let in_recovery = sequence.recovery_mode && !sequence.back_to_normal_mode;

        let values = if in_recovery {
            if icr >= mcr && sequence.remaining_in_pool == 0 {
                return Ok(Candidate::Healthy);
            }
            let tcr = compute_cr(sequence.system_collateral, sequence.system_debt, self.price())?;
            let interest = self.accrued_interest(id)?;
            let Some(values) =
                self.liquidate_recovery_mode(id, icr, tcr, sequence.remaining_in_pool)?
            else {
                return Ok(Candidate::Skipped);
            };

            sequence.system_debt = sequence
                .system_debt
                .checked_add(interest)
                .ok_or(error!(KeelError::MathOverflow))?
                .checked_sub(values.debt_to_offset)
                .ok_or(error!(KeelError::MathUnderflow))?;
            sequence.system_collateral = sequence
                .system_collateral
                .checked_sub(
                    values.coll_to_send_to_pool + values.coll_gas_compensation + values.coll_surplus,
                )
                .ok_or(error!(KeelError::MathUnderflow))?;
            values
        } else if icr < mcr {
            self.liquidate_normal_mode(id, sequence.remaining_in_pool)?
        } else {
            return Ok(Candidate::Healthy);
        };

        sequence.remaining_in_pool = sequence
            .remaining_in_pool
            .checked_sub(values.debt_to_offset)
            .ok_or(error!(KeelError::MathUnderflow))?;
        sequence.totals.add(&values)?;
        sequence.liquidated.push(LiquidatedTrove {
            id,
            owner: self.troves.trove(id)?.owner,
            values,
            outcome: values.outcome(),
            recovery_mode: in_recovery,
        });

        if in_recovery {
            sequence.back_to_normal_mode = !check_potential_recovery_mode(
                sequence.system_collateral,
                sequence.system_debt,
                self.price(),
                self.config().ccr,
            )?;
            if sequence.back_to_normal_mode {
                msg!("System back above CCR, continuing in normal mode");
            }
        }

        Ok(Candidate::Liquidated)
    }

    /// Touch and close the trove; gas compensation is set, routing is left
    /// to the caller
    fn close_for_liquidation(&mut self, id: TroveId) -> Result<LiquidationValues> {
        let EntirePosition {
            debt, collateral, ..
        } = self.touch(id)?;
        self.troves.close_trove(id, TroveStatus::ClosedByLiquidation)?;
        Ok(LiquidationValues {
            entire_debt: debt,
            entire_collateral: collateral,
            coll_gas_compensation: collateral_gas_compensation(
                collateral,
                self.price(),
                self.config(),
            )?,
            debt_gas_compensation: debt_gas_compensation(self.config()),
            ..LiquidationValues::default()
        })
    }

    fn liquidate_normal_mode(&mut self, id: TroveId, remaining_in_pool: u64) -> Result<LiquidationValues> {
        let mut values = self.close_for_liquidation(id)?;
        split_offset_and_redistribution(&mut values, remaining_in_pool)?;
        Ok(values)
    }

    fn liquidate_recovery_mode(
        &mut self,
        id: TroveId,
        icr: u128,
        tcr: u128,
        remaining_in_pool: u64,
    ) -> Result<Option<LiquidationValues>> {
        let mcr = self.config().mcr;

        if icr <= ONE_HUNDRED_PERCENT {
            let mut values = self.close_for_liquidation(id)?;
            values.debt_to_redistribute = values.entire_debt;
            values.coll_to_redistribute = values.entire_collateral - values.coll_gas_compensation;
            return Ok(Some(values));
        }

        if icr < mcr {
            return self.liquidate_normal_mode(id, remaining_in_pool).map(Some);
        }

        if icr < tcr && self.prospective_debt(id)? <= remaining_in_pool {
            let mut values = self.close_for_liquidation(id)?;
            let capped = to_u64(mul_div(values.entire_debt as u128, mcr, self.price())?)?
                .min(values.entire_collateral);
            values.coll_gas_compensation =
                collateral_gas_compensation(capped, self.price(), self.config())?;
            values.debt_to_offset = values.entire_debt;
            values.coll_to_send_to_pool = capped - values.coll_gas_compensation;
            values.coll_surplus = values.entire_collateral - capped;
            return Ok(Some(values));
        }

        Ok(None)
    }

    /// Debt the trove would have once touched
    fn prospective_debt(&self, id: TroveId) -> Result<u64> {
        self.troves
            .entire_position(id)?
            .debt
            .checked_add(self.accrued_interest(id)?)
            .ok_or(error!(KeelError::MathOverflow))
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    fn finish_liquidation(&mut self, sequence: Sequence) -> Result<LiquidationReport> {
        let totals = sequence.totals;
        require!(totals.total_debt_in_sequence > 0, KeelError::NothingToLiquidate);

        // Offset against the stability pool
        let offset = self.pool.offset(
            self.sums,
            totals.total_debt_to_offset,
            totals.total_coll_to_send_to_pool,
        )?;
        self.troves.active_pool.sub_debt(totals.total_debt_to_offset)?;
        self.troves.active_pool.sub_collateral(totals.total_coll_to_send_to_pool)?;
        if offset.scale_changed {
            msg!("Stability pool scale is now {}", self.pool.current_scale);
        }

        // Redistribute the remainder over the remaining stakes
        self.troves.redistribute(
            totals.total_coll_to_redistribute,
            totals.total_debt_to_redistribute,
        )?;

        // Park capped surpluses for their owners
        for liquidated in sequence.liquidated.iter() {
            let surplus = liquidated.values.coll_surplus;
            if surplus > 0 {
                self.troves.active_pool.sub_collateral(surplus)?;
                self.troves.surplus.credit(liquidated.owner, surplus)?;
            }
        }

        self.troves
            .refresh_system_snapshots(totals.total_coll_gas_compensation)?;
        self.troves
            .active_pool
            .sub_collateral(totals.total_coll_gas_compensation)?;

        let commands = self.commands_mut();
        commands.burn_debt(Holder::StabilityPoolVault, totals.total_debt_to_offset)?;
        commands.transfer_debt(
            Holder::GasPool,
            Holder::Caller,
            totals.total_debt_gas_compensation,
        )?;
        commands.send_collateral(Holder::Caller, totals.total_coll_gas_compensation)?;

        self.protocol.total_liquidations = self
            .protocol
            .total_liquidations
            .checked_add(sequence.liquidated.len() as u64)
            .ok_or(error!(KeelError::MathOverflow))?;

        msg!(
            "Liquidated {} troves: debt {}, collateral {}, offset {}, redistributed {}",
            sequence.liquidated.len(),
            totals.total_debt_in_sequence,
            totals.total_coll_in_sequence,
            totals.total_debt_to_offset,
            totals.total_debt_to_redistribute
        );

        Ok(LiquidationReport {
            totals,
            liquidated: sequence.liquidated,
            offset,
        })
    }
}

/// Offset as much of the trove's debt as the pool still holds and send the
/// matching share of collateral (after gas compensation) with it
fn split_offset_and_redistribution(
    values: &mut LiquidationValues,
    remaining_in_pool: u64,
) -> Result<()> {
    let collateral = values
        .entire_collateral
        .checked_sub(values.coll_gas_compensation)
        .ok_or(error!(KeelError::MathUnderflow))?;

    if remaining_in_pool > 0 {
        values.debt_to_offset = values.entire_debt.min(remaining_in_pool);
        values.coll_to_send_to_pool = to_u64(mul_div(
            collateral as u128,
            values.debt_to_offset as u128,
            values.entire_debt as u128,
        )?)?;
        values.debt_to_redistribute = values.entire_debt - values.debt_to_offset;
        values.coll_to_redistribute = collateral - values.coll_to_send_to_pool;
    } else {
        values.debt_to_redistribute = values.entire_debt;
        values.coll_to_redistribute = collateral;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::engine::fixtures::*;

    #[test]
    fn split_offsets_what_the_pool_holds() {
        let mut values = LiquidationValues {
            entire_debt: 1_000,
            entire_collateral: 110,
            coll_gas_compensation: 10,
            ..LiquidationValues::default()
        };
        split_offset_and_redistribution(&mut values, 400).unwrap();
        assert_eq!(values.debt_to_offset, 400);
        assert_eq!(values.coll_to_send_to_pool, 40);
        assert_eq!(values.debt_to_redistribute, 600);
        assert_eq!(values.coll_to_redistribute, 60);
        assert_eq!(values.outcome(), LiquidationOutcome::PartiallyOffsetAndRedistributed);

        let mut values = LiquidationValues {
            entire_debt: 1_000,
            entire_collateral: 110,
            coll_gas_compensation: 10,
            ..LiquidationValues::default()
        };
        split_offset_and_redistribution(&mut values, 0).unwrap();
        assert_eq!(values.outcome(), LiquidationOutcome::PureRedistribution);
        assert_eq!(values.coll_to_redistribute, 100);
    }

    #[test]
    fn healthy_trove_is_not_liquidated() {
        let mut system = system();
        let a = open(&mut system, owner(1), 20, 1_800);
        open(&mut system, owner(2), 20, 1_800);

        let before = system.troves.clone();
        let err = run(&mut system, PRICE, |engine, _| engine.liquidate(a)).unwrap_err();
        assert_eq!(err, error!(KeelError::NothingToLiquidate));
        assert_eq!(system.troves.troves, before.troves);
        assert_eq!(system.troves.active_pool, before.active_pool);
    }

    #[test]
    fn closed_or_unknown_trove_cannot_be_liquidated() {
        let mut system = system();
        open(&mut system, owner(1), 20, 1_800);
        let err = run(&mut system, PRICE, |engine, _| engine.liquidate(7)).unwrap_err();
        assert_eq!(err, error!(KeelError::TroveNotActive));
        let err = run(&mut system, PRICE, |engine, _| engine.batch_liquidate(&[])).unwrap_err();
        assert_eq!(err, error!(KeelError::EmptyTroveArray));
    }

    #[test]
    fn normal_mode_offsets_then_redistributes() {
        let mut system = system();
        // 2000 debt each; the victim at 20 collateral
        let victim = open(&mut system, owner(1), 20, 1_800);
        open(&mut system, owner(2), 100, 1_800);
        open(&mut system, owner(3), 100, 1_800);
        deposit(&mut system, owner(9), 1_000);

        // $105: victim ICR = 20 * 105 / 2000 = 105%, TCR well above CCR
        let (report, commands) =
            run(&mut system, 105 * DECIMAL_PRECISION, |engine, _| engine.liquidate(victim)).unwrap();

        let values = report.liquidated[0].values;
        assert_eq!(report.liquidated[0].outcome, LiquidationOutcome::PartiallyOffsetAndRedistributed);
        assert_eq!(values.debt_to_offset, 1_000 * ONE_DEBT_TOKEN);
        assert_eq!(values.debt_to_redistribute, 1_000 * ONE_DEBT_TOKEN);
        // 0.5% of 20 = 0.1 collateral, above the $10 floor
        assert_eq!(values.coll_gas_compensation, ONE_COLLATERAL_TOKEN / 10);

        assert_eq!(system.pool.total_deposits, 0);
        assert_eq!(system.pool.current_epoch, 1);
        assert_eq!(system.troves.default_pool.debt, 1_000 * ONE_DEBT_TOKEN);
        assert_eq!(system.troves.trove(victim).unwrap().status, TroveStatus::ClosedByLiquidation);
        assert_eq!(commands.debt_burned_from(Holder::StabilityPoolVault), 1_000 * ONE_DEBT_TOKEN);
        assert_eq!(commands.collateral_sent_to(Holder::Caller), ONE_COLLATERAL_TOKEN / 10);
        assert_eq!(system.protocol.total_liquidations, 1);
    }

    #[test]
    fn last_trove_is_never_liquidated() {
        let mut system = system();
        let only = open(&mut system, owner(1), 20, 1_800);
        let err = run(&mut system, DECIMAL_PRECISION, |engine, _| engine.liquidate(only)).unwrap_err();
        assert_eq!(err, error!(KeelError::NothingToLiquidate));
        let err = run(&mut system, DECIMAL_PRECISION, |engine, _| engine.liquidate_troves(5)).unwrap_err();
        assert_eq!(err, error!(KeelError::NothingToLiquidate));
    }

    #[test]
    fn sequential_liquidation_stops_at_first_healthy_trove() {
        let mut system = system();
        let low = open(&mut system, owner(1), 20, 1_800);
        let mid = open(&mut system, owner(2), 21, 1_800);
        let high = open(&mut system, owner(3), 400, 1_800);

        let (report, _) =
            run(&mut system, 108 * DECIMAL_PRECISION, |engine, _| engine.liquidate_troves(10)).unwrap();
        // low = 108%, mid = 113.4% (healthy), high far above
        assert_eq!(report.liquidated.len(), 1);
        assert_eq!(report.liquidated[0].id, low);
        assert!(system.troves.is_active(mid));
        assert!(system.troves.is_active(high));

        let err = run(&mut system, PRICE, |engine, _| engine.liquidate_troves(0)).unwrap_err();
        assert_eq!(err, error!(KeelError::InvalidAmount));
    }
}
