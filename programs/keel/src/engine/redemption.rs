// =============================================================================
// Redemption
// =============================================================================
// Any holder can swap debt tokens for collateral at face value, minus a fee.
// The debt is taken from the troves with the lowest collateral ratio first,
// skipping those below MCR (they are for liquidators):
//
// - a trove whose redeemable debt (everything except the gas reserve) is
//   used up is closed as Unredeemable; the reserve is burned from the gas
//   pool and the leftover collateral becomes a surplus for its owner
// - otherwise the trove keeps its reduced balances and moves to its new rank,
//   even when the reduced debt is below the opening minimum
//
// The last active trove is never redeemed against in full.
//
// Fee: the base rate decays by MINUTE_DECAY_FACTOR per minute since the last
// fee operation and grows by half of the redeemed share of the total debt.
// The fee rate is the base rate plus REDEMPTION_FEE_FLOOR, at most 100%, and
// the fee is sent to the treasury.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::{DECIMAL_PRECISION, MAX_REDEMPTION_FEE, REDEMPTION_FEE_FLOOR};
use crate::error::KeelError;
use crate::math::{debt_to_collateral, mul_div};
use crate::state::{SortedTroves, TroveId, TroveStatus};

use super::{Engine, Holder};

/// What one trove gave up to a redemption
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RedeemedTrove {
    pub id: TroveId,
    pub owner: Pubkey,
    pub debt_lot: u64,
    pub collateral_lot: u64,
    /// Remaining balances; zero when the trove was closed
    pub debt: u64,
    pub collateral: u64,
    pub closed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RedemptionReport {
    pub attempted_debt_amount: u64,
    pub actual_debt_amount: u64,
    pub collateral_drawn: u64,
    pub collateral_fee: u64,
    pub base_rate: u128,
    pub redeemed: Vec<RedeemedTrove>,
    /// Surplus credited to owners of troves closed by the redemption
    pub surpluses: Vec<(Pubkey, u64)>,
}

impl RedemptionReport {
    pub fn collateral_sent(&self) -> u64 {
        self.collateral_drawn - self.collateral_fee
    }
}

impl Engine<'_> {
    /// Redeem `amount` debt tokens held by the caller.
    /// `max_iterations` bounds the troves visited, zero means no bound.
    pub fn redeem_collateral(
        &mut self,
        amount: u64,
        max_fee_percentage: u128,
        max_iterations: u32,
        redeemer: Pubkey,
        redeemer_balance: u64,
    ) -> Result<RedemptionReport> {
        require!(
            (REDEMPTION_FEE_FLOOR..=MAX_REDEMPTION_FEE).contains(&max_fee_percentage),
            KeelError::InvalidMaxFeePercentage
        );
        require_gte!(self.tcr()?, self.config().mcr, KeelError::TcrBelowMcr);
        require!(amount > 0, KeelError::InvalidAmount);
        require_gte!(redeemer_balance, amount, KeelError::InsufficientBalance);
        let total_debt_at_start = self.entire_system_debt()?;
        require_gte!(total_debt_at_start, amount, KeelError::ExceedsSystemDebt);

        let mut report = RedemptionReport {
            attempted_debt_amount: amount,
            ..RedemptionReport::default()
        };

        // Skip troves that should be liquidated instead
        let mcr = self.config().mcr;
        let mut cursor = self.troves.sorted.last();
        while let Some(id) = cursor {
            if self.current_icr(id)? >= mcr {
                break;
            }
            cursor = self.troves.sorted.prev(id);
        }

        let mut remaining = amount;
        let mut iterations_left = if max_iterations == 0 {
            u32::MAX
        } else {
            max_iterations
        };

        while let Some(id) = cursor {
            if remaining == 0 || iterations_left == 0 {
                break;
            }
            iterations_left -= 1;
            let next = self.troves.sorted.prev(id);

            let Some(redeemed) = self.redeem_from_trove(id, remaining)? else {
                break;
            };
            if redeemed.closed && redeemed.collateral > 0 {
                report.surpluses.push((redeemed.owner, redeemed.collateral));
            }
            report.actual_debt_amount += redeemed.debt_lot;
            report.collateral_drawn += redeemed.collateral_lot;
            remaining -= redeemed.debt_lot;
            report.redeemed.push(redeemed);

            cursor = next;
        }

        require!(report.collateral_drawn > 0, KeelError::UnableToRedeem);

        let price = self.price();
        let now = self.now();
        let fees = &mut self.protocol.fees;
        report.base_rate = fees.update_base_rate_from_redemption(
            report.collateral_drawn,
            price,
            total_debt_at_start,
            now,
        )?;
        report.collateral_fee = fees.redemption_fee(report.collateral_drawn)?;

        let fee_percentage = mul_div(
            report.collateral_fee as u128,
            DECIMAL_PRECISION,
            report.collateral_drawn as u128,
        )?;
        require!(
            fee_percentage <= max_fee_percentage,
            KeelError::FeeExceedsMaximum
        );

        let collateral_sent = report.collateral_sent();
        let commands = self.commands_mut();
        commands.burn_debt(Holder::Caller, report.actual_debt_amount)?;
        commands.send_collateral(Holder::Treasury, report.collateral_fee)?;
        commands.send_collateral(Holder::Caller, collateral_sent)?;

        self.protocol.total_redemptions = self
            .protocol
            .total_redemptions
            .checked_add(1)
            .ok_or(error!(KeelError::MathOverflow))?;

        msg!(
            "Redeemed {} of {} debt for {} collateral from {} troves, redeemer {}, fee {}",
            report.actual_debt_amount,
            amount,
            report.collateral_drawn,
            report.redeemed.len(),
            redeemer,
            report.collateral_fee
        );
        Ok(report)
    }

    /// Take up to `max_debt` from one trove. `None` means the walk has to stop.
    fn redeem_from_trove(&mut self, id: TroveId, max_debt: u64) -> Result<Option<RedeemedTrove>> {
        let position = self.touch(id)?;
        let gas_compensation = self.config().debt_gas_compensation;
        let owner = self.troves.trove(id)?.owner;

        let debt_lot = max_debt.min(position.debt.saturating_sub(gas_compensation));
        if debt_lot == 0 {
            return Ok(None);
        }
        let collateral_lot = debt_to_collateral(debt_lot, self.price())?;
        let new_debt = position.debt - debt_lot;
        let new_collateral = position
            .collateral
            .checked_sub(collateral_lot)
            .ok_or(error!(KeelError::InsufficientBalance))?;

        if new_debt == gas_compensation {
            if self.troves.active_count() <= 1 {
                return Ok(None);
            }
            self.troves.decrease_debt(id, position.debt)?;
            self.troves.decrease_collateral(id, position.collateral)?;
            self.troves.close_trove(id, TroveStatus::Unredeemable)?;
            self.troves.surplus.credit(owner, new_collateral)?;
            self.commands_mut().burn_debt(Holder::GasPool, gas_compensation)?;

            return Ok(Some(RedeemedTrove {
                id,
                owner,
                debt_lot,
                collateral_lot,
                debt: 0,
                collateral: new_collateral,
                closed: true,
            }));
        }

        self.troves.decrease_debt(id, debt_lot)?;
        self.troves.decrease_collateral(id, collateral_lot)?;
        self.troves.update_stake(id)?;
        self.troves.re_rank(id)?;

        Ok(Some(RedeemedTrove {
            id,
            owner,
            debt_lot,
            collateral_lot,
            debt: new_debt,
            collateral: new_collateral,
            closed: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::engine::fixtures::*;

    const MAX_FEE: u128 = DECIMAL_PRECISION;

    #[test]
    fn invalid_requests_are_rejected() {
        let mut system = system();
        open(&mut system, owner(1), 20, 1_800);
        open(&mut system, owner(2), 30, 1_800);

        let redeem = |system: &mut crate::engine::System, amount: u64, max_fee: u128, balance: u64| {
            run(system, PRICE, |engine, _| {
                engine.redeem_collateral(amount, max_fee, 0, owner(9), balance)
            })
            .unwrap_err()
        };

        assert_eq!(redeem(&mut system, 100, REDEMPTION_FEE_FLOOR - 1, 100), error!(KeelError::InvalidMaxFeePercentage));
        assert_eq!(redeem(&mut system, 100, MAX_FEE + 1, 100), error!(KeelError::InvalidMaxFeePercentage));
        assert_eq!(redeem(&mut system, 0, MAX_FEE, 100), error!(KeelError::InvalidAmount));
        assert_eq!(redeem(&mut system, 100, MAX_FEE, 99), error!(KeelError::InsufficientBalance));
        let too_much = 4_001 * ONE_DEBT_TOKEN;
        assert_eq!(redeem(&mut system, too_much, MAX_FEE, too_much), error!(KeelError::ExceedsSystemDebt));
    }

    #[test]
    fn partial_redemption_hits_the_lowest_trove_first() {
        let mut system = system();
        let low = open(&mut system, owner(1), 20, 1_800);
        let high = open(&mut system, owner(2), 30, 1_800);

        let amount = 400 * ONE_DEBT_TOKEN;
        let (report, commands) = run(&mut system, PRICE, |engine, _| {
            engine.redeem_collateral(amount, MAX_FEE, 0, owner(9), amount)
        })
        .unwrap();

        assert_eq!(report.redeemed.len(), 1);
        assert_eq!(report.redeemed[0].id, low);
        // 400 debt at $200 = 2 collateral
        assert_eq!(report.collateral_drawn, 2 * ONE_COLLATERAL_TOKEN);
        let trove = system.troves.trove(low).unwrap();
        assert_eq!(trove.debt, 1_600 * ONE_DEBT_TOKEN);
        assert_eq!(trove.collateral, 18 * ONE_COLLATERAL_TOKEN);
        assert!(trove.is_active());
        assert_eq!(system.troves.trove(high).unwrap().debt, 2_000 * ONE_DEBT_TOKEN);

        assert_eq!(commands.debt_burned_from(Holder::Caller), amount);
        assert_eq!(
            commands.collateral_sent_to(Holder::Treasury) + commands.collateral_sent_to(Holder::Caller),
            2 * ONE_COLLATERAL_TOKEN
        );
        assert!(system.protocol.fees.base_rate > 0);
    }

    #[test]
    fn exhausted_trove_becomes_unredeemable_with_surplus() {
        let mut system = system();
        let low = open(&mut system, owner(1), 20, 1_800);
        let high = open(&mut system, owner(2), 30, 1_800);

        // Everything redeemable from the low trove: 1800 debt for 9 collateral
        let amount = 1_800 * ONE_DEBT_TOKEN;
        let (report, commands) = run(&mut system, PRICE, |engine, _| {
            engine.redeem_collateral(amount, MAX_FEE, 0, owner(9), amount)
        })
        .unwrap();

        assert!(report.redeemed[0].closed);
        assert_eq!(report.surpluses, vec![(owner(1), 11 * ONE_COLLATERAL_TOKEN)]);
        assert_eq!(system.troves.trove(low).unwrap().status, TroveStatus::Unredeemable);
        assert!(!system.troves.sorted.contains(low));
        assert_eq!(system.troves.surplus.claimable(&owner(1)), 11 * ONE_COLLATERAL_TOKEN);
        assert_eq!(commands.debt_burned_from(Holder::GasPool), DEFAULT_DEBT_GAS_COMPENSATION);
        assert_eq!(system.troves.active_pool.debt, 2_000 * ONE_DEBT_TOKEN);
        assert_eq!(system.troves.active_pool.collateral, 30 * ONE_COLLATERAL_TOKEN);
        assert!(system.troves.is_active(high));
    }

    #[test]
    fn max_iterations_bounds_the_walk() {
        let mut system = system();
        let low = open(&mut system, owner(1), 20, 1_800);
        open(&mut system, owner(2), 21, 1_800);
        open(&mut system, owner(3), 30, 1_800);

        let amount = 3_000 * ONE_DEBT_TOKEN;
        let (report, _) = run(&mut system, PRICE, |engine, _| {
            engine.redeem_collateral(amount, MAX_FEE, 1, owner(9), amount)
        })
        .unwrap();
        assert_eq!(report.redeemed.len(), 1);
        assert_eq!(report.redeemed[0].id, low);
        assert_eq!(report.actual_debt_amount, 1_800 * ONE_DEBT_TOKEN);
    }

    #[test]
    fn fee_above_maximum_is_rejected() {
        let mut system = system();
        open(&mut system, owner(1), 20, 1_800);
        open(&mut system, owner(2), 30, 1_800);

        // Redeeming 10% of the debt raises the base rate to 5%, fee 5.5%
        let amount = 400 * ONE_DEBT_TOKEN;
        let err = run(&mut system, PRICE, |engine, _| {
            engine.redeem_collateral(amount, DECIMAL_PRECISION / 20, 0, owner(9), amount)
        })
        .unwrap_err();
        assert_eq!(err, error!(KeelError::FeeExceedsMaximum));
    }
}
