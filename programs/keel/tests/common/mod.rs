// Shared setup for the scenario tests. Every operation runs through
// `System::atomically`, so a failed call leaves the system untouched.

#![allow(dead_code)]

use std::collections::BTreeMap;

use anchor_lang::prelude::*;
use keel::constants::*;
use keel::engine::{depositor_entry, DepositChange, Engine, System, TokenCommands};
use keel::interest::NoInterest;
use keel::oracle::FixedPrice;
use keel::state::{Depositor, ProtocolConfig, SortedTroves, TroveId};

pub const PRICE: u128 = 200 * DECIMAL_PRECISION;

pub const fn price(dollars: u128) -> u128 {
    dollars * DECIMAL_PRECISION
}

pub const fn debt(tokens: u64) -> u64 {
    tokens * ONE_DEBT_TOKEN
}

pub const fn coll(tokens: u64) -> u64 {
    tokens * ONE_COLLATERAL_TOKEN
}

pub fn owner(n: u8) -> Pubkey {
    Pubkey::new_from_array([n; 32])
}

pub fn system() -> System {
    System::new(ProtocolConfig::default(), 64).unwrap()
}

pub fn run_at<T>(
    system: &mut System,
    price: u128,
    now: i64,
    operation: impl FnOnce(&mut Engine, &mut BTreeMap<Pubkey, Depositor>) -> Result<T>,
) -> Result<(T, TokenCommands)> {
    system.atomically(&FixedPrice(price), &NoInterest, now, operation)
}

pub fn run<T>(
    system: &mut System,
    price: u128,
    operation: impl FnOnce(&mut Engine, &mut BTreeMap<Pubkey, Depositor>) -> Result<T>,
) -> Result<(T, TokenCommands)> {
    run_at(system, price, 0, operation)
}

/// Read-only query against the current state
pub fn view<T>(system: &mut System, price: u128, query: impl FnOnce(&Engine) -> Result<T>) -> T {
    run(system, price, |engine, _| query(engine)).unwrap().0
}

/// Open a trove at PRICE with whole-token amounts; debt is `borrowed + 200`
pub fn open(system: &mut System, who: Pubkey, collateral: u64, borrowed: u64) -> TroveId {
    run(system, PRICE, |engine, _| {
        engine.open_trove(who, coll(collateral), debt(borrowed), 0)
    })
    .unwrap()
    .0
    .id
}

/// Deposit debt token base units into the stability pool
pub fn deposit_units(system: &mut System, who: Pubkey, amount: u64) -> DepositChange {
    run(system, PRICE, |engine, depositors| {
        engine.provide_to_stability_pool(depositor_entry(depositors, who), amount)
    })
    .unwrap()
    .0
}

pub fn deposit(system: &mut System, who: Pubkey, amount: u64) -> DepositChange {
    deposit_units(system, who, debt(amount))
}

pub fn withdraw(
    system: &mut System,
    price: u128,
    who: Pubkey,
    amount: u64,
) -> Result<(DepositChange, TokenCommands)> {
    run(system, price, |engine, depositors| {
        engine.withdraw_from_stability_pool(depositor_entry(depositors, who), amount)
    })
}

pub fn compounded_deposit(system: &mut System, who: Pubkey) -> u64 {
    let depositor = system.depositor(&who);
    view(system, PRICE, |engine| engine.compounded_deposit(&depositor))
}

pub fn collateral_gain(system: &mut System, who: Pubkey) -> u64 {
    let depositor = system.depositor(&who);
    view(system, PRICE, |engine| engine.depositor_collateral_gain(&depositor))
}

/// Sum of the stakes of every active trove
pub fn active_stakes(system: &System) -> u128 {
    system
        .troves
        .active
        .iter()
        .map(|&id| system.troves.trove(id).unwrap().stake as u128)
        .sum()
}

/// Sorted list from the lowest collateral ratio up
pub fn ranked_from_bottom(system: &System) -> Vec<TroveId> {
    let mut ranked = Vec::new();
    let mut cursor = system.troves.sorted.last();
    while let Some(id) = cursor {
        ranked.push(id);
        cursor = system.troves.sorted.prev(id);
    }
    ranked
}
