// =============================================================================
// Settlement
// =============================================================================
// Executes the TokenCommands an engine operation returned. Runs after every
// ledger write of the instruction, so no CPI can observe a half-updated
// trove book or stability pool.
//
// Every vault and the debt mint have the Protocol PDA as authority; tokens
// leaving the caller's accounts are authorized by the caller's signature.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Burn, MintTo, Transfer};

use crate::constants::PROTOCOL_SEED;
use crate::engine::{Holder, TokenCommand, TokenCommands};
use crate::error::KeelError;

/// The token accounts one instruction can move tokens between. Accounts an
/// instruction does not take are left as None; a command that needs one fails
/// with MissingTokenAccount.
pub struct Settlement<'info> {
    pub token_program: AccountInfo<'info>,
    pub protocol: AccountInfo<'info>,
    pub caller: AccountInfo<'info>,
    pub debt_mint: Option<AccountInfo<'info>>,
    pub collateral_vault: Option<AccountInfo<'info>>,
    pub pool_vault: Option<AccountInfo<'info>>,
    pub gas_pool: Option<AccountInfo<'info>>,
    pub caller_debt: Option<AccountInfo<'info>>,
    pub caller_collateral: Option<AccountInfo<'info>>,
    pub treasury_debt: Option<AccountInfo<'info>>,
    pub treasury_collateral: Option<AccountInfo<'info>>,
}

fn required<'info>(account: &Option<AccountInfo<'info>>) -> Result<AccountInfo<'info>> {
    account
        .clone()
        .ok_or(error!(KeelError::MissingTokenAccount))
}

impl<'info> Settlement<'info> {
    fn debt_account(&self, holder: Holder) -> Result<AccountInfo<'info>> {
        match holder {
            Holder::Caller => required(&self.caller_debt),
            Holder::Treasury => required(&self.treasury_debt),
            Holder::StabilityPoolVault => required(&self.pool_vault),
            Holder::GasPool => required(&self.gas_pool),
        }
    }

    fn collateral_account(&self, holder: Holder) -> Result<AccountInfo<'info>> {
        match holder {
            Holder::Caller => required(&self.caller_collateral),
            Holder::Treasury => required(&self.treasury_collateral),
            Holder::StabilityPoolVault | Holder::GasPool => {
                err!(KeelError::InvalidAddress)
            }
        }
    }

    /// Who signs for tokens held by `holder`
    fn authority(&self, holder: Holder) -> AccountInfo<'info> {
        match holder {
            Holder::Caller => self.caller.clone(),
            _ => self.protocol.clone(),
        }
    }

    /// Run every command in order, signing as the Protocol PDA
    pub fn execute(
        &self,
        commands: &TokenCommands,
        collateral_mint: &Pubkey,
        protocol_bump: u8,
    ) -> Result<()> {
        let bump = [protocol_bump];
        let protocol_seeds: &[&[u8]] = &[PROTOCOL_SEED, collateral_mint.as_ref(), &bump];
        let signer_seeds = &[protocol_seeds];

        for command in commands.iter() {
            match *command {
                TokenCommand::MintDebt { to, amount } => {
                    let cpi = CpiContext::new_with_signer(
                        self.token_program.clone(),
                        MintTo {
                            mint: required(&self.debt_mint)?,
                            to: self.debt_account(to)?,
                            authority: self.protocol.clone(),
                        },
                        signer_seeds,
                    );
                    token::mint_to(cpi, amount)?;
                }
                TokenCommand::BurnDebt { from, amount } => {
                    let cpi = CpiContext::new_with_signer(
                        self.token_program.clone(),
                        Burn {
                            mint: required(&self.debt_mint)?,
                            from: self.debt_account(from)?,
                            authority: self.authority(from),
                        },
                        signer_seeds,
                    );
                    token::burn(cpi, amount)?;
                }
                TokenCommand::TransferDebt { from, to, amount } => {
                    let cpi = CpiContext::new_with_signer(
                        self.token_program.clone(),
                        Transfer {
                            from: self.debt_account(from)?,
                            to: self.debt_account(to)?,
                            authority: self.authority(from),
                        },
                        signer_seeds,
                    );
                    token::transfer(cpi, amount)?;
                }
                TokenCommand::SendCollateral { to, amount } => {
                    let cpi = CpiContext::new_with_signer(
                        self.token_program.clone(),
                        Transfer {
                            from: required(&self.collateral_vault)?,
                            to: self.collateral_account(to)?,
                            authority: self.protocol.clone(),
                        },
                        signer_seeds,
                    );
                    token::transfer(cpi, amount)?;
                }
                TokenCommand::ReceiveCollateral { from, amount } => {
                    let cpi = CpiContext::new_with_signer(
                        self.token_program.clone(),
                        Transfer {
                            from: self.collateral_account(from)?,
                            to: required(&self.collateral_vault)?,
                            authority: self.authority(from),
                        },
                        signer_seeds,
                    );
                    token::transfer(cpi, amount)?;
                }
            }
        }

        Ok(())
    }
}
