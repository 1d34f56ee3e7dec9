// Stability pool scenarios: full and partial offsets, epoch reset and scale
// crossing, seen from the depositors' side.

mod common;

use anchor_lang::prelude::*;
use keel::constants::*;
use keel::engine::Holder;
use keel::error::KeelError;

use common::*;

/// Liquidate `id` at `price` and return the collateral sent to the pool
fn liquidate_into_pool(system: &mut keel::engine::System, price: u128, id: u32) -> u64 {
    let (report, _) = run(system, price, |engine, _| engine.liquidate(id)).unwrap();
    report.totals.total_coll_to_send_to_pool
}

#[test]
fn three_equal_depositors_split_a_full_offset() {
    let mut system = system();
    // 3000 debt against 30 collateral: 105% at $105
    let victim = open(&mut system, owner(1), 30, 2_800);
    open(&mut system, owner(2), 100, 1_800);
    open(&mut system, owner(3), 100, 1_800);
    for n in 10..13 {
        deposit(&mut system, owner(n), 1_000);
    }

    let to_pool = liquidate_into_pool(&mut system, price(105), victim);
    // 0.5% of 30 goes to the liquidator
    assert_eq!(to_pool, coll(30) - coll(30) / 200);
    assert_eq!(system.pool.total_deposits, 0);
    assert_eq!(system.pool.current_epoch, 1);
    assert_eq!(system.pool.p, DECIMAL_PRECISION);

    for n in 10..13 {
        assert_eq!(compounded_deposit(&mut system, owner(n)), 0);
        assert_eq!(collateral_gain(&mut system, owner(n)), to_pool / 3);
    }

    // Claiming the gain empties the position
    let (change, commands) = withdraw(&mut system, price(105), owner(10), 0).unwrap();
    assert_eq!(change.deposit, 0);
    assert_eq!(change.collateral_gain, to_pool / 3);
    assert_eq!(change.debt_loss, debt(1_000));
    assert_eq!(commands.collateral_sent_to(Holder::Caller), to_pool / 3);
    assert_eq!(commands.debt_burned_from(Holder::StabilityPoolVault), 0);
    assert!(!system.depositor(&owner(10)).has_deposit());
    assert_eq!(system.pool.total_collateral, to_pool - to_pool / 3);
}

#[test]
fn deposits_after_an_epoch_reset_start_fresh() {
    let mut system = system();
    let first = open(&mut system, owner(1), 30, 2_800);
    let second = open(&mut system, owner(2), 20, 1_800);
    open(&mut system, owner(3), 100, 1_800);
    open(&mut system, owner(4), 100, 1_800);
    for n in 10..13 {
        deposit(&mut system, owner(n), 1_000);
    }

    let first_gain = liquidate_into_pool(&mut system, price(105), first) / 3;
    assert_eq!(system.pool.current_epoch, 1);

    // A new depositor in the new epoch is valued from P = 1
    deposit(&mut system, owner(20), 4_000);
    assert_eq!(compounded_deposit(&mut system, owner(20)), debt(4_000));
    assert_eq!(collateral_gain(&mut system, owner(20)), 0);

    // 2000 debt offset against 4000: half the deposit is lost
    let to_pool = liquidate_into_pool(&mut system, price(105), second);
    assert_eq!(system.pool.current_epoch, 1);
    assert!(compounded_deposit(&mut system, owner(20)).abs_diff(debt(2_000)) <= 1);
    assert_eq!(collateral_gain(&mut system, owner(20)), to_pool);

    // The old epoch's depositors are unaffected by the new offset
    for n in 10..13 {
        assert_eq!(compounded_deposit(&mut system, owner(n)), 0);
        assert_eq!(collateral_gain(&mut system, owner(n)), first_gain);
    }
}

#[test]
fn crossing_a_scale_keeps_later_deposits_whole() {
    let mut system = system();
    let first = open(&mut system, owner(1), 20, 1_800);
    let second = open(&mut system, owner(2), 20, 1_800);
    open(&mut system, owner(3), 100, 1_800);
    open(&mut system, owner(4), 100, 1_800);

    // 1000 base units stay behind after the first offset: P falls below 1e-9
    deposit_units(&mut system, owner(10), debt(2_000) + 1_000);
    let first_to_pool = liquidate_into_pool(&mut system, price(105), first);
    assert_eq!(system.pool.current_scale, 1);
    assert_eq!(system.pool.current_epoch, 0);
    assert_eq!(system.pool.total_deposits, 1_000);
    assert!(system.pool.p >= SCALE_FACTOR);
    // What is left of the old deposit is dust
    assert_eq!(compounded_deposit(&mut system, owner(10)), 0);

    deposit(&mut system, owner(11), 2_000);
    assert_eq!(compounded_deposit(&mut system, owner(11)), debt(2_000));

    let second_to_pool = liquidate_into_pool(&mut system, price(105), second);

    // The new deposit earns nearly all of the second offset
    let gain = collateral_gain(&mut system, owner(11));
    assert!(gain <= second_to_pool);
    assert!(second_to_pool - gain < 1_000);

    // The old deposit earns the first offset plus its dust share of the second
    let old_gain = collateral_gain(&mut system, owner(10));
    assert!(old_gain + 1_000 >= first_to_pool);
    assert!(old_gain <= first_to_pool + (second_to_pool - gain));
}

#[test]
fn withdrawal_is_capped_at_the_compounded_deposit() {
    let mut system = system();
    let victim = open(&mut system, owner(1), 20, 1_800);
    open(&mut system, owner(2), 100, 1_800);
    open(&mut system, owner(3), 100, 1_800);
    deposit(&mut system, owner(10), 3_000);

    liquidate_into_pool(&mut system, price(105), victim);
    let remaining = compounded_deposit(&mut system, owner(10));
    assert!(remaining.abs_diff(debt(1_000)) <= 1);

    let (change, commands) = withdraw(&mut system, price(105), owner(10), debt(5_000)).unwrap();
    assert_eq!(change.deposit, 0);
    assert_eq!(commands.len(), 2);
    assert_eq!(system.pool.total_deposits, debt(3_000) - debt(2_000) - remaining);

    // Nothing left to withdraw
    let err = withdraw(&mut system, price(105), owner(10), 1).unwrap_err();
    assert_eq!(err, error!(KeelError::NoDeposit));
}

#[test]
fn withdrawal_waits_while_a_trove_is_liquidatable() {
    let mut system = system();
    open(&mut system, owner(1), 20, 1_800);
    open(&mut system, owner(2), 100, 1_800);
    deposit(&mut system, owner(10), 1_000);

    let err = withdraw(&mut system, price(105), owner(10), debt(1)).unwrap_err();
    assert_eq!(err, error!(KeelError::UndercollateralizedTroves));

    // Paying out the gain alone is still allowed
    let (change, _) = withdraw(&mut system, price(105), owner(10), 0).unwrap();
    assert_eq!(change.deposit, debt(1_000));
    assert_eq!(system.pool.total_deposits, debt(1_000));
}

#[test]
fn pool_emptying_liquidations_keep_running() {
    let mut system = keel::engine::System::new(keel::state::ProtocolConfig::default(), 128).unwrap();
    open(&mut system, owner(2), 100, 1_800);
    open(&mut system, owner(3), 100, 1_800);

    // Every round empties the pool and opens a new segment
    for round in 0..100u64 {
        let victim = open(&mut system, owner(1), 20, 1_800);
        deposit(&mut system, owner(10), 2_000);
        let to_pool = liquidate_into_pool(&mut system, price(105), victim);

        assert_eq!(system.pool.current_epoch, round + 1);
        assert_eq!(system.pool.total_deposits, 0);
        assert_eq!(collateral_gain(&mut system, owner(10)), to_pool);
    }
    assert_eq!(system.sums.len(), 100);
}
