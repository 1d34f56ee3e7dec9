// =============================================================================
// Engine
// =============================================================================
// Every protocol operation runs through `Engine`, which borrows the three
// ledger accounts for the length of one operation:
//
//   Protocol       configuration, fees, counters
//   TroveBook      troves, sorted list, pools, redistribution, surpluses
//   StabilityPool  deposits, P, epoch, scale
//
// plus the `SumTable` of stability pool segments the operation can see.
//
// The price is read once when the engine is built and the clock is passed in,
// so the whole operation sees one consistent market state. Token movements
// are collected as `TokenCommand`s and handed back to the caller after the
// ledgers are final.
//
// `System` owns the same accounts in memory and runs operations atomically;
// the on-chain handlers get atomicity from the runtime instead.
// =============================================================================

pub mod borrowing;
pub mod commands;
pub mod gas;
pub mod liquidation;
pub mod recovery;
pub mod redemption;
pub mod stability;

#[cfg(test)]
pub(crate) mod fixtures;

pub use borrowing::*;
pub use commands::*;
pub use liquidation::*;
pub use redemption::*;
pub use stability::*;

use std::collections::BTreeMap;

use anchor_lang::prelude::*;

use crate::error::KeelError;
use crate::interest::InterestModel;
use crate::math::compute_cr;
use crate::oracle::PriceFeed;
use crate::state::{
    Depositor, EntirePosition, Protocol, ProtocolConfig, StabilityPool, SumTable, TroveBook,
    TroveId,
};

pub struct Engine<'a> {
    pub protocol: &'a mut Protocol,
    pub troves: &'a mut TroveBook,
    pub pool: &'a mut StabilityPool,
    pub sums: &'a mut SumTable,
    interest: &'a dyn InterestModel,
    price: u128,
    now: i64,
    commands: TokenCommands,
}

impl<'a> Engine<'a> {
    pub fn new(
        protocol: &'a mut Protocol,
        troves: &'a mut TroveBook,
        pool: &'a mut StabilityPool,
        sums: &'a mut SumTable,
        feed: &dyn PriceFeed,
        interest: &'a dyn InterestModel,
        now: i64,
    ) -> Result<Self> {
        let price = feed.current_price(now)?;
        Ok(Self {
            protocol,
            troves,
            pool,
            sums,
            interest,
            price,
            now,
            commands: TokenCommands::default(),
        })
    }

    pub fn price(&self) -> u128 {
        self.price
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.protocol.config
    }

    pub fn commands(&self) -> &TokenCommands {
        &self.commands
    }

    pub fn into_commands(self) -> TokenCommands {
        self.commands
    }

    pub(crate) fn commands_mut(&mut self) -> &mut TokenCommands {
        &mut self.commands
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn entire_system_collateral(&self) -> Result<u64> {
        self.troves.entire_system_collateral()
    }

    pub fn entire_system_debt(&self) -> Result<u64> {
        self.troves.entire_system_debt()
    }

    /// Total collateral ratio at the engine's price
    pub fn tcr(&self) -> Result<u128> {
        compute_cr(
            self.entire_system_collateral()?,
            self.entire_system_debt()?,
            self.price,
        )
    }

    pub fn accrued_interest(&self, id: TroveId) -> Result<u64> {
        self.interest.accrued_interest(self.troves.trove(id)?, self.now)
    }

    /// ICR with pending rewards and accrued interest included
    pub fn current_icr(&self, id: TroveId) -> Result<u128> {
        let interest = self.accrued_interest(id)?;
        self.troves.current_icr(id, self.price, interest)
    }

    pub fn pending_collateral_reward(&self, id: TroveId) -> Result<u64> {
        self.troves.pending_collateral_reward(id)
    }

    pub fn pending_debt_reward(&self, id: TroveId) -> Result<u64> {
        self.troves.pending_debt_reward(id)
    }

    /// Redemption fee rate right now, base rate decayed
    pub fn redemption_rate(&self) -> Result<u128> {
        self.protocol.fees.redemption_rate_with_decay(self.now)
    }

    // =========================================================================
    // Touch
    // =========================================================================

    /// Fold pending rewards and accrued interest into an active trove.
    /// The interest is minted to the treasury.
    pub(crate) fn touch(&mut self, id: TroveId) -> Result<EntirePosition> {
        let interest = self.accrued_interest(id)?;
        let position = self.troves.apply_pending_rewards(id, interest, self.now)?;
        self.commands.mint_debt(Holder::Treasury, interest)?;
        Ok(position)
    }

    pub(crate) fn require_owner(&self, id: TroveId, caller: &Pubkey) -> Result<()> {
        let trove = self.troves.trove(id)?;
        require!(trove.is_active(), KeelError::TroveNotActive);
        require_keys_eq!(trove.owner, *caller, KeelError::NotTroveOwner);
        Ok(())
    }
}

// =============================================================================
// In-Memory System
// =============================================================================

/// The protocol's accounts held in memory, for simulation and tests
#[derive(Clone, Default)]
pub struct System {
    pub protocol: Protocol,
    pub troves: TroveBook,
    pub pool: StabilityPool,
    /// Every stability pool segment
    pub sums: SumTable,
    pub depositors: BTreeMap<Pubkey, Depositor>,
}

impl System {
    pub fn new(config: ProtocolConfig, max_troves: u32) -> Result<Self> {
        config.validate()?;
        let mut system = Self::default();
        system.protocol.config = config;
        system.troves.init(Pubkey::default(), max_troves);
        system.pool.init(Pubkey::default());
        Ok(system)
    }

    /// Run `operation` against a staged copy of the state and commit it only
    /// if the operation succeeds
    pub fn atomically<T>(
        &mut self,
        feed: &dyn PriceFeed,
        interest: &dyn InterestModel,
        now: i64,
        operation: impl FnOnce(&mut Engine, &mut BTreeMap<Pubkey, Depositor>) -> Result<T>,
    ) -> Result<(T, TokenCommands)> {
        let mut staged = self.clone();
        let outcome = {
            let System {
                protocol,
                troves,
                pool,
                sums,
                depositors,
            } = &mut staged;
            let mut engine = Engine::new(protocol, troves, pool, sums, feed, interest, now)?;
            let value = operation(&mut engine, depositors)?;
            (value, engine.into_commands())
        };
        *self = staged;
        Ok(outcome)
    }

    /// The deposit of `owner`, empty if they never deposited
    pub fn depositor(&self, owner: &Pubkey) -> Depositor {
        self.depositors.get(owner).cloned().unwrap_or_else(|| Depositor {
            owner: *owner,
            ..Depositor::default()
        })
    }
}

/// The depositor entry of `owner`, created on first use
pub fn depositor_entry<'m>(
    depositors: &'m mut BTreeMap<Pubkey, Depositor>,
    owner: Pubkey,
) -> &'m mut Depositor {
    depositors.entry(owner).or_insert_with(|| Depositor {
        owner,
        ..Depositor::default()
    })
}
