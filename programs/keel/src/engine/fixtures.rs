// Shared setup for the engine unit tests

use anchor_lang::prelude::*;

use crate::constants::*;
use crate::interest::NoInterest;
use crate::oracle::FixedPrice;
use crate::state::{Depositor, ProtocolConfig, TroveId};

use super::{depositor_entry, Engine, System, TokenCommands};
use std::collections::BTreeMap;

pub const PRICE: u128 = 200 * DECIMAL_PRECISION;

pub fn owner(n: u8) -> Pubkey {
    Pubkey::new_from_array([n; 32])
}

pub fn system() -> System {
    System::new(ProtocolConfig::default(), 64).unwrap()
}

pub fn run<T>(
    system: &mut System,
    price: u128,
    operation: impl FnOnce(&mut Engine, &mut BTreeMap<Pubkey, Depositor>) -> Result<T>,
) -> Result<(T, TokenCommands)> {
    system.atomically(&FixedPrice(price), &NoInterest, 0, operation)
}

/// Open a trove at PRICE with whole-token amounts
pub fn open(system: &mut System, who: Pubkey, collateral: u64, borrowed: u64) -> TroveId {
    run(system, PRICE, |engine, _| {
        engine.open_trove(who, collateral * ONE_COLLATERAL_TOKEN, borrowed * ONE_DEBT_TOKEN, 0)
    })
    .unwrap()
    .0
    .id
}

/// Deposit whole debt tokens into the stability pool at PRICE
pub fn deposit(system: &mut System, who: Pubkey, amount: u64) {
    run(system, PRICE, |engine, depositors| {
        engine.provide_to_stability_pool(depositor_entry(depositors, who), amount * ONE_DEBT_TOKEN)
    })
    .unwrap();
}
