// =============================================================================
// Trove Instructions
// =============================================================================
// open_trove, adjust_trove and close_trove share one account layout. The
// borrower signs; collateral moves between their collateral account and the
// vault, debt tokens are minted to or burned from their debt account, and
// the gas compensation reserve is minted to or burned from the gas pool.
// Interest accrued by a touched trove is minted to the treasury.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::constants::*;
use crate::engine::{Engine, TroveAdjustment, TroveChange};
use crate::error::KeelError;
use crate::events::{TroveOperation, TroveUpdated};
use crate::instructions::settle::Settlement;
use crate::interest::SimpleInterest;
use crate::state::{Protocol, StabilityPool, SumTable, TroveBook, TroveId};

#[derive(Accounts)]
pub struct ManageTrove<'info> {
    // =========================================================================
    // Signers
    // =========================================================================

    /// The trove owner
    #[account(mut)]
    pub owner: Signer<'info>,

    // =========================================================================
    // Protocol Accounts
    // =========================================================================

    #[account(
        mut,
        seeds = [PROTOCOL_SEED, protocol.collateral_mint.as_ref()],
        bump = protocol.bump,
        constraint = !protocol.is_paused @ KeelError::ProtocolPaused
    )]
    pub protocol: Box<Account<'info, Protocol>>,

    #[account(
        mut,
        address = protocol.trove_book @ KeelError::InvalidProtocolAccount
    )]
    pub trove_book: Box<Account<'info, TroveBook>>,

    #[account(
        mut,
        address = protocol.stability_pool @ KeelError::InvalidProtocolAccount
    )]
    pub stability_pool: Box<Account<'info, StabilityPool>>,

    // =========================================================================
    // Mint & Vaults
    // =========================================================================

    #[account(
        mut,
        address = protocol.debt_mint @ KeelError::InvalidMint
    )]
    pub debt_mint: Box<Account<'info, Mint>>,

    #[account(
        mut,
        address = protocol.collateral_vault @ KeelError::InvalidAddress
    )]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        address = protocol.gas_pool @ KeelError::InvalidAddress
    )]
    pub gas_pool: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        address = protocol.treasury_debt @ KeelError::InvalidAddress
    )]
    pub treasury_debt: Box<Account<'info, TokenAccount>>,

    // =========================================================================
    // Owner Token Accounts
    // =========================================================================

    #[account(
        mut,
        constraint = owner_collateral.mint == protocol.collateral_mint @ KeelError::InvalidMint,
        constraint = owner_collateral.owner == owner.key() @ KeelError::InvalidTokenAccountOwner
    )]
    pub owner_collateral: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = owner_debt.mint == protocol.debt_mint @ KeelError::InvalidMint,
        constraint = owner_debt.owner == owner.key() @ KeelError::InvalidTokenAccountOwner
    )]
    pub owner_debt: Box<Account<'info, TokenAccount>>,

    // =========================================================================
    // Programs
    // =========================================================================

    pub token_program: Program<'info, Token>,
}

impl<'info> ManageTrove<'info> {
    fn settlement(&self) -> Settlement<'info> {
        Settlement {
            token_program: self.token_program.to_account_info(),
            protocol: self.protocol.to_account_info(),
            caller: self.owner.to_account_info(),
            debt_mint: Some(self.debt_mint.to_account_info()),
            collateral_vault: Some(self.collateral_vault.to_account_info()),
            pool_vault: None,
            gas_pool: Some(self.gas_pool.to_account_info()),
            caller_debt: Some(self.owner_debt.to_account_info()),
            caller_collateral: Some(self.owner_collateral.to_account_info()),
            treasury_debt: Some(self.treasury_debt.to_account_info()),
            treasury_collateral: None,
        }
    }

    /// Run `operation` in the engine, then settle its token movements
    fn run(
        &mut self,
        operation: impl FnOnce(&mut Engine) -> Result<TroveChange>,
    ) -> Result<TroveChange> {
        let clock = Clock::get()?;
        let feed = self.protocol.price_feed();

        // Trove changes never touch a pool segment
        let mut sums = SumTable::default();
        let mut engine = Engine::new(
            &mut self.protocol,
            &mut self.trove_book,
            &mut self.stability_pool,
            &mut sums,
            &feed,
            &SimpleInterest,
            clock.unix_timestamp,
        )?;
        let change = operation(&mut engine)?;
        let commands = engine.into_commands();

        self.settlement()
            .execute(&commands, &self.protocol.collateral_mint, self.protocol.bump)?;
        Ok(change)
    }

    fn emit_update(&self, change: &TroveChange, operation: TroveOperation) {
        emit!(TroveUpdated {
            owner: self.owner.key(),
            trove_id: change.id,
            debt: change.debt,
            collateral: change.collateral,
            stake: change.stake,
            operation,
        });
    }
}

pub fn handler_open_trove(
    ctx: Context<ManageTrove>,
    collateral: u64,
    borrow_amount: u64,
    interest_rate_bps: u16,
) -> Result<()> {
    require!(
        ctx.accounts.owner_collateral.amount >= collateral,
        KeelError::InsufficientBalance
    );

    let owner = ctx.accounts.owner.key();
    let change = ctx.accounts.run(|engine| {
        engine.open_trove(owner, collateral, borrow_amount, interest_rate_bps)
    })?;

    msg!("Trove {} opened for {}", change.id, owner);
    msg!("Collateral: {}, Debt: {}, Stake: {}", change.collateral, change.debt, change.stake);

    ctx.accounts.emit_update(&change, TroveOperation::Open);
    Ok(())
}

pub fn handler_adjust_trove(
    ctx: Context<ManageTrove>,
    trove_id: TroveId,
    adjustment: TroveAdjustment,
) -> Result<()> {
    require!(
        ctx.accounts.owner_collateral.amount >= adjustment.collateral_deposit,
        KeelError::InsufficientBalance
    );
    require!(
        ctx.accounts.owner_debt.amount >= adjustment.debt_repayment,
        KeelError::InsufficientBalance
    );

    let owner = ctx.accounts.owner.key();
    let change = ctx
        .accounts
        .run(|engine| engine.adjust_trove(trove_id, &owner, adjustment))?;

    msg!("Trove {} adjusted", trove_id);
    msg!("Collateral: {}, Debt: {}, Stake: {}", change.collateral, change.debt, change.stake);

    ctx.accounts.emit_update(&change, TroveOperation::Adjust);
    Ok(())
}

pub fn handler_close_trove(ctx: Context<ManageTrove>, trove_id: TroveId) -> Result<()> {
    let owner = ctx.accounts.owner.key();
    let change = ctx
        .accounts
        .run(|engine| engine.close_trove(trove_id, &owner))?;

    msg!("Trove {} closed by {}", trove_id, owner);

    ctx.accounts.emit_update(&change, TroveOperation::Close);
    Ok(())
}
