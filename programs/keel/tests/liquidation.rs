// Liquidation scenarios: redistribution bookkeeping, recovery mode capping,
// batch skip rules and calls that change nothing.

mod common;

use anchor_lang::prelude::*;
use keel::constants::*;
use keel::engine::{Holder, LiquidationOutcome};
use keel::error::KeelError;
use keel::math::compute_cr;
use keel::state::{SortedTroves, TroveStatus};

use common::*;

#[test]
fn redistribution_conserves_stakes_and_only_gas_moves_tcr() {
    let mut system = system();
    let a = open(&mut system, owner(1), 20, 1_800);
    let b = open(&mut system, owner(2), 20, 1_800);
    let c = open(&mut system, owner(3), 100, 1_800);
    let d = open(&mut system, owner(4), 100, 1_800);
    assert_eq!(system.troves.rewards.total_stakes, active_stakes(&system));

    let liquidation_price = price(105);
    let coll_before = view(&mut system, liquidation_price, |engine| engine.entire_system_collateral());
    let debt_before = view(&mut system, liquidation_price, |engine| engine.entire_system_debt());

    // Empty pool: everything is redistributed
    let (report, commands) =
        run(&mut system, liquidation_price, |engine, _| engine.batch_liquidate(&[a, b])).unwrap();
    assert_eq!(report.liquidated.len(), 2);
    for liquidated in report.liquidated.iter() {
        assert_eq!(liquidated.outcome, LiquidationOutcome::PureRedistribution);
        assert!(!liquidated.recovery_mode);
    }
    let gas = report.totals.total_coll_gas_compensation;
    assert_eq!(gas, 2 * (coll(20) / 200));
    assert_eq!(report.totals.total_debt_to_redistribute, debt(4_000));
    assert_eq!(report.totals.total_debt_gas_compensation, 2 * DEFAULT_DEBT_GAS_COMPENSATION);
    assert_eq!(commands.collateral_sent_to(Holder::Caller), gas);

    // Stakes of the closed troves left the total
    assert_eq!(system.troves.rewards.total_stakes, active_stakes(&system));
    assert_eq!(system.troves.rewards.total_stakes, coll(200) as u128);

    // The system lost exactly the collateral paid out as gas compensation
    let coll_after = view(&mut system, liquidation_price, |engine| engine.entire_system_collateral());
    let debt_after = view(&mut system, liquidation_price, |engine| engine.entire_system_debt());
    assert_eq!(coll_after, coll_before - gas);
    assert_eq!(debt_after, debt_before);
    let tcr = view(&mut system, liquidation_price, |engine| engine.tcr());
    assert_eq!(tcr, compute_cr(coll_before - gas, debt_before, liquidation_price).unwrap());

    // Equal stakes share the remainder equally
    for id in [c, d] {
        assert_eq!(
            view(&mut system, liquidation_price, |engine| engine.pending_debt_reward(id)),
            debt(2_000)
        );
        assert_eq!(
            view(&mut system, liquidation_price, |engine| engine.pending_collateral_reward(id)),
            coll(20) - coll(20) / 200
        );
    }
    assert_eq!(system.troves.default_pool.debt, debt(4_000));
}

#[test]
fn touching_a_trove_absorbs_rewards_and_restakes_it() {
    let mut system = system();
    let victim = open(&mut system, owner(1), 20, 1_800);
    let c = open(&mut system, owner(2), 100, 1_800);
    open(&mut system, owner(3), 100, 1_800);

    run(&mut system, price(105), |engine, _| engine.liquidate(victim)).unwrap();
    let snapshot_stakes = system.troves.rewards.total_stakes_snapshot;
    let snapshot_coll = system.troves.rewards.total_collateral_snapshot;
    assert_eq!(snapshot_stakes, coll(200) as u128);
    assert_eq!(snapshot_coll, (coll(220) - coll(20) / 200) as u128);

    // Adding collateral touches the trove
    run(&mut system, price(105), |engine, _| {
        engine.adjust_trove(
            c,
            &owner(2),
            keel::engine::TroveAdjustment {
                collateral_deposit: coll(1),
                ..Default::default()
            },
        )
    })
    .unwrap();

    let trove = *system.troves.trove(c).unwrap();
    let absorbed = (coll(20) - coll(20) / 200) / 2;
    assert_eq!(trove.collateral, coll(101) + absorbed);
    assert_eq!(trove.debt, debt(3_000));
    assert_eq!(
        trove.stake as u128,
        trove.collateral as u128 * snapshot_stakes / snapshot_coll
    );
    assert_eq!(system.troves.rewards.total_stakes, active_stakes(&system));
    assert_eq!(view(&mut system, price(105), |engine| engine.pending_debt_reward(c)), 0);
}

#[test]
fn offset_never_lowers_the_tcr() {
    let mut system = system();
    let victim = open(&mut system, owner(1), 20, 1_800);
    open(&mut system, owner(2), 100, 1_800);
    open(&mut system, owner(3), 100, 1_800);
    deposit(&mut system, owner(10), 1_000);

    let liquidation_price = price(105);
    let before = view(&mut system, liquidation_price, |engine| engine.tcr());
    let (report, commands) =
        run(&mut system, liquidation_price, |engine, _| engine.liquidate(victim)).unwrap();
    let after = view(&mut system, liquidation_price, |engine| engine.tcr());

    assert_eq!(
        report.liquidated[0].outcome,
        LiquidationOutcome::PartiallyOffsetAndRedistributed
    );
    assert_eq!(report.offset.debt_offset, debt(1_000));
    assert!(report.offset.epoch_changed);
    assert_eq!(commands.debt_burned_from(Holder::StabilityPoolVault), debt(1_000));
    assert!(after >= before);
}

#[test]
fn recovery_mode_caps_collateral_and_keeps_the_surplus() {
    let mut system = system();
    // At $100: victim 120%, others 150%, TCR 140%
    let victim = open(&mut system, owner(1), 24, 1_800);
    let b = open(&mut system, owner(2), 30, 1_800);
    open(&mut system, owner(3), 30, 1_800);
    deposit(&mut system, owner(10), 2_000);

    let recovery_price = price(100);
    assert!(view(&mut system, recovery_price, |engine| engine.is_recovery_mode()));

    // ICR above TCR: immune
    let err = run(&mut system, recovery_price, |engine, _| engine.liquidate(b)).unwrap_err();
    assert_eq!(err, error!(KeelError::NothingToLiquidate));

    let (report, commands) =
        run(&mut system, recovery_price, |engine, _| engine.liquidate(victim)).unwrap();
    let liquidated = &report.liquidated[0];
    assert!(liquidated.recovery_mode);
    assert_eq!(liquidated.outcome, LiquidationOutcome::CappedWithSurplus);

    // Collateral capped at debt * MCR / price = 22
    let capped = coll(22);
    let gas = capped / 200;
    assert_eq!(liquidated.values.coll_gas_compensation, gas);
    assert_eq!(liquidated.values.debt_to_offset, debt(2_000));
    assert_eq!(liquidated.values.coll_to_send_to_pool, capped - gas);
    assert_eq!(liquidated.values.coll_surplus, coll(2));
    assert_eq!(report.totals.total_debt_to_redistribute, 0);
    assert_eq!(commands.collateral_sent_to(Holder::Caller), gas);

    assert_eq!(system.troves.surplus.claimable(&owner(1)), coll(2));
    assert_eq!(system.pool.total_collateral, capped - gas);
    assert_eq!(system.troves.trove(victim).unwrap().status, TroveStatus::ClosedByLiquidation);

    // 60 collateral for 4000 debt at $100 is exactly CCR
    assert!(!view(&mut system, recovery_price, |engine| engine.is_recovery_mode()));

    // The surplus is claimable once, at any price
    let (claimed, commands) = run(&mut system, price(1), |engine, _| {
        engine.claim_collateral_surplus(&owner(1))
    })
    .unwrap();
    assert_eq!(claimed, coll(2));
    assert_eq!(commands.collateral_sent_to(Holder::Caller), coll(2));
    let err = run(&mut system, price(1), |engine, _| engine.claim_collateral_surplus(&owner(1)))
        .unwrap_err();
    assert_eq!(err, error!(KeelError::NoCollateralSurplus));
}

#[test]
fn recovery_mode_redistributes_troves_under_water() {
    let mut system = system();
    let victim = open(&mut system, owner(1), 20, 1_800);
    open(&mut system, owner(2), 30, 1_800);
    open(&mut system, owner(3), 30, 1_800);
    deposit(&mut system, owner(10), 5_000);

    // $95: victim 95%, TCR 126%
    let (report, _) = run(&mut system, price(95), |engine, _| engine.liquidate(victim)).unwrap();
    let liquidated = &report.liquidated[0];
    assert!(liquidated.recovery_mode);
    assert_eq!(liquidated.outcome, LiquidationOutcome::PureRedistribution);
    // The pool is left alone even though it could absorb the debt
    assert_eq!(system.pool.total_deposits, debt(5_000));
    assert_eq!(system.troves.default_pool.debt, debt(2_000));
}

#[test]
fn batch_skips_ineligible_entries() {
    let mut system = system();
    let a = open(&mut system, owner(1), 20, 1_800);
    let b = open(&mut system, owner(2), 20, 1_800);
    let c = open(&mut system, owner(3), 100, 1_800);
    open(&mut system, owner(4), 100, 1_800);

    let (report, _) = run(&mut system, price(105), |engine, _| {
        engine.batch_liquidate(&[c, a, 99, a, b])
    })
    .unwrap();

    let ids: Vec<_> = report.liquidated.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![a, b]);
    assert!(system.troves.is_active(c));
    assert_eq!(system.troves.active_count(), 2);
    assert_eq!(system.protocol.total_liquidations, 2);
    assert!(!system.troves.sorted.contains(a));
    assert!(!system.troves.sorted.contains(b));
}

#[test]
fn liquidate_troves_walks_from_the_bottom() {
    let mut system = system();
    let a = open(&mut system, owner(1), 20, 1_800);
    let b = open(&mut system, owner(2), 21, 1_800);
    let c = open(&mut system, owner(3), 100, 1_800);
    open(&mut system, owner(4), 110, 1_800);
    assert_eq!(ranked_from_bottom(&system)[..3], [a, b, c]);

    // $105: a at 105%, b at 110.25%, only a is below MCR
    let (report, _) = run(&mut system, price(105), |engine, _| engine.liquidate_troves(10)).unwrap();
    let ids: Vec<_> = report.liquidated.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![a]);
    assert!(system.troves.is_active(b));
}

#[test]
fn calls_that_liquidate_nothing_change_nothing() {
    let mut system = system();
    let a = open(&mut system, owner(1), 20, 1_800);
    open(&mut system, owner(2), 100, 1_800);
    deposit(&mut system, owner(10), 1_000);

    let troves = system.troves.clone();
    let pool = system.pool.clone();
    let protocol = system.protocol.clone();
    let sums = system.sums.clone();

    let err = run(&mut system, PRICE, |engine, _| engine.liquidate_troves(10)).unwrap_err();
    assert_eq!(err, error!(KeelError::NothingToLiquidate));
    let err = run(&mut system, PRICE, |engine, _| engine.batch_liquidate(&[a, 42])).unwrap_err();
    assert_eq!(err, error!(KeelError::NothingToLiquidate));
    let err = run(&mut system, PRICE, |engine, _| engine.liquidate_troves(0)).unwrap_err();
    assert_eq!(err, error!(KeelError::InvalidAmount));

    assert_eq!(system.troves.troves, troves.troves);
    assert_eq!(system.troves.active, troves.active);
    assert_eq!(system.troves.rewards, troves.rewards);
    assert_eq!(system.pool.p, pool.p);
    assert_eq!(system.pool.total_deposits, pool.total_deposits);
    assert_eq!(system.sums, sums);
    assert_eq!(system.protocol.total_liquidations, protocol.total_liquidations);
}
