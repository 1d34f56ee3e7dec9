// =============================================================================
// Token Commands
// =============================================================================
// The engine never moves tokens itself. Each operation records the mints,
// burns and transfers it needs as commands; they are executed only after every
// ledger update of the operation has been made. Commands with the same shape
// are merged so each distinct movement costs one CPI.
//
// All collateral the protocol holds sits in one vault, so moving collateral
// between the active pool, the default pool, the stability pool and the
// surplus ledger is pure bookkeeping and never produces a command.
// =============================================================================

use anchor_lang::prelude::*;

use crate::error::KeelError;

/// A token account taking part in an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Holder {
    /// The signer of the operation
    Caller,
    /// The protocol's external treasury accounts
    Treasury,
    /// Debt tokens deposited in the stability pool
    StabilityPoolVault,
    /// Debt gas compensation reserves
    GasPool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenCommand {
    MintDebt { to: Holder, amount: u64 },
    BurnDebt { from: Holder, amount: u64 },
    TransferDebt { from: Holder, to: Holder, amount: u64 },
    /// Collateral vault -> holder
    SendCollateral { to: Holder, amount: u64 },
    /// Holder -> collateral vault
    ReceiveCollateral { from: Holder, amount: u64 },
}

impl TokenCommand {
    pub fn amount(&self) -> u64 {
        match *self {
            TokenCommand::MintDebt { amount, .. }
            | TokenCommand::BurnDebt { amount, .. }
            | TokenCommand::TransferDebt { amount, .. }
            | TokenCommand::SendCollateral { amount, .. }
            | TokenCommand::ReceiveCollateral { amount, .. } => amount,
        }
    }

    fn amount_mut(&mut self) -> &mut u64 {
        match self {
            TokenCommand::MintDebt { amount, .. }
            | TokenCommand::BurnDebt { amount, .. }
            | TokenCommand::TransferDebt { amount, .. }
            | TokenCommand::SendCollateral { amount, .. }
            | TokenCommand::ReceiveCollateral { amount, .. } => amount,
        }
    }

    fn same_route(&self, other: &TokenCommand) -> bool {
        use TokenCommand::*;
        match (self, other) {
            (MintDebt { to: a, .. }, MintDebt { to: b, .. }) => a == b,
            (BurnDebt { from: a, .. }, BurnDebt { from: b, .. }) => a == b,
            (
                TransferDebt { from: fa, to: ta, .. },
                TransferDebt { from: fb, to: tb, .. },
            ) => fa == fb && ta == tb,
            (SendCollateral { to: a, .. }, SendCollateral { to: b, .. }) => a == b,
            (ReceiveCollateral { from: a, .. }, ReceiveCollateral { from: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// Ordered, merged list of token movements
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenCommands {
    commands: Vec<TokenCommand>,
}

impl TokenCommands {
    /// Record a movement. Zero amounts are dropped.
    pub fn push(&mut self, command: TokenCommand) -> Result<()> {
        if command.amount() == 0 {
            return Ok(());
        }
        if let Some(existing) = self.commands.iter_mut().find(|c| c.same_route(&command)) {
            let amount = existing.amount_mut();
            *amount = amount
                .checked_add(command.amount())
                .ok_or(error!(KeelError::MathOverflow))?;
            return Ok(());
        }
        self.commands.push(command);
        Ok(())
    }

    pub fn mint_debt(&mut self, to: Holder, amount: u64) -> Result<()> {
        self.push(TokenCommand::MintDebt { to, amount })
    }

    pub fn burn_debt(&mut self, from: Holder, amount: u64) -> Result<()> {
        self.push(TokenCommand::BurnDebt { from, amount })
    }

    pub fn transfer_debt(&mut self, from: Holder, to: Holder, amount: u64) -> Result<()> {
        self.push(TokenCommand::TransferDebt { from, to, amount })
    }

    pub fn send_collateral(&mut self, to: Holder, amount: u64) -> Result<()> {
        self.push(TokenCommand::SendCollateral { to, amount })
    }

    pub fn receive_collateral(&mut self, from: Holder, amount: u64) -> Result<()> {
        self.push(TokenCommand::ReceiveCollateral { from, amount })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenCommand> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn into_vec(self) -> Vec<TokenCommand> {
        self.commands
    }

    /// Collateral leaving the vault for `to`
    pub fn collateral_sent_to(&self, to: Holder) -> u64 {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                TokenCommand::SendCollateral { to: t, amount } if t == to => Some(amount),
                _ => None,
            })
            .sum()
    }

    /// Debt tokens burned from `from`
    pub fn debt_burned_from(&self, from: Holder) -> u64 {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                TokenCommand::BurnDebt { from: f, amount } if f == from => Some(amount),
                _ => None,
            })
            .sum()
    }

    /// Debt tokens minted to `to`
    pub fn debt_minted_to(&self, to: Holder) -> u64 {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                TokenCommand::MintDebt { to: t, amount } if t == to => Some(amount),
                _ => None,
            })
            .sum()
    }
}
