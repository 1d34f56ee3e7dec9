// =============================================================================
// Stability Pool Instructions
// =============================================================================
// Deposits, withdrawals and collateral surplus claims.
//
// provide/withdraw:
// 1. Pay out the depositor's pending collateral gain
// 2. Rewrite the deposit at its compounded value +/- the amount
// 3. Snapshot P, S, scale and epoch
// 4. Move debt tokens between the depositor and the pool vault
//
// The gain is read from the deposit's snapshot segment and the one after it,
// the new snapshot from the pool's current segment. All three are read only
// and may not exist yet.
//
// A surplus claim does not depend on the price and runs even while the
// protocol is paused.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{Token, TokenAccount};

use crate::constants::*;
use crate::engine::{DepositChange, Engine, TokenCommands};
use crate::error::KeelError;
use crate::events::{CollateralSurplusClaimed, DepositUpdated};
use crate::instructions::settle::Settlement;
use crate::interest::SimpleInterest;
use crate::state::{Depositor, Protocol, StabilityPool, SumTable, TroveBook};

// =============================================================================
// Provide / Withdraw
// =============================================================================

#[derive(Accounts)]
pub struct StabilityPoolOperation<'info> {
    // =========================================================================
    // Signers
    // =========================================================================

    #[account(mut)]
    pub depositor: Signer<'info>,

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

    /// Read for the undercollateralized-trove check on withdrawal
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

    /// First-time depositors get their account created here
    #[account(
        init_if_needed,
        payer = depositor,
        space = 8 + Depositor::INIT_SPACE,
        seeds = [DEPOSITOR_SEED, stability_pool.key().as_ref(), depositor.key().as_ref()],
        bump
    )]
    pub depositor_account: Box<Account<'info, Depositor>>,

    // =========================================================================
    // Pool Segments
    // =========================================================================

    /// CHECK: S of the deposit's snapshot segment, address checked by seeds
    #[account(
        seeds = [
            EPOCH_SCALE_SEED,
            stability_pool.key().as_ref(),
            &depositor_account.snapshot.epoch.to_le_bytes(),
            &depositor_account.snapshot.scale.to_le_bytes(),
        ],
        bump
    )]
    pub snapshot_segment: UncheckedAccount<'info>,

    /// CHECK: S of the segment after the snapshot's, address checked by seeds
    #[account(
        seeds = [
            EPOCH_SCALE_SEED,
            stability_pool.key().as_ref(),
            &depositor_account.snapshot.epoch.to_le_bytes(),
            &depositor_account.snapshot.scale.saturating_add(1).to_le_bytes(),
        ],
        bump
    )]
    pub next_segment: UncheckedAccount<'info>,

    /// CHECK: S of the pool's current segment, address checked by seeds
    #[account(
        seeds = [
            EPOCH_SCALE_SEED,
            stability_pool.key().as_ref(),
            &stability_pool.current_epoch.to_le_bytes(),
            &stability_pool.current_scale.to_le_bytes(),
        ],
        bump
    )]
    pub current_segment: UncheckedAccount<'info>,

    // =========================================================================
    // Vaults
    // =========================================================================

    #[account(
        mut,
        address = protocol.stability_pool_vault @ KeelError::InvalidAddress
    )]
    pub pool_vault: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        address = protocol.collateral_vault @ KeelError::InvalidAddress
    )]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,

    // =========================================================================
    // Depositor Token Accounts
    // =========================================================================

    #[account(
        mut,
        constraint = depositor_debt.mint == protocol.debt_mint @ KeelError::InvalidMint,
        constraint = depositor_debt.owner == depositor.key() @ KeelError::InvalidTokenAccountOwner
    )]
    pub depositor_debt: Box<Account<'info, TokenAccount>>,

    /// Receives the collateral gain
    #[account(
        mut,
        constraint = depositor_collateral.mint == protocol.collateral_mint @ KeelError::InvalidMint,
        constraint = depositor_collateral.owner == depositor.key() @ KeelError::InvalidTokenAccountOwner
    )]
    pub depositor_collateral: Box<Account<'info, TokenAccount>>,

    // =========================================================================
    // Programs
    // =========================================================================

    pub system_program: Program<'info, System>,
    pub token_program: Program<'info, Token>,
}

impl<'info> StabilityPoolOperation<'info> {
    fn settlement(&self) -> Settlement<'info> {
        Settlement {
            token_program: self.token_program.to_account_info(),
            protocol: self.protocol.to_account_info(),
            caller: self.depositor.to_account_info(),
            debt_mint: None,
            collateral_vault: Some(self.collateral_vault.to_account_info()),
            pool_vault: Some(self.pool_vault.to_account_info()),
            gas_pool: None,
            caller_debt: Some(self.depositor_debt.to_account_info()),
            caller_collateral: Some(self.depositor_collateral.to_account_info()),
            treasury_debt: None,
            treasury_collateral: None,
        }
    }

    fn run(
        &mut self,
        depositor_bump: u8,
        operation: impl FnOnce(&mut Engine, &mut Depositor) -> Result<DepositChange>,
    ) -> Result<DepositChange> {
        let clock = Clock::get()?;
        let feed = self.protocol.price_feed();

        // A fresh account still has the default owner
        if self.depositor_account.owner == Pubkey::default() {
            self.depositor_account.pool = self.stability_pool.key();
            self.depositor_account.owner = self.depositor.key();
            self.depositor_account.bump = depositor_bump;
        }

        let mut sums = SumTable::default();
        sums.load(&self.snapshot_segment)?;
        sums.load(&self.next_segment)?;
        sums.load(&self.current_segment)?;

        let mut engine = Engine::new(
            &mut self.protocol,
            &mut self.trove_book,
            &mut self.stability_pool,
            &mut sums,
            &feed,
            &SimpleInterest,
            clock.unix_timestamp,
        )?;
        let change = operation(&mut engine, &mut **self.depositor_account)?;
        let commands = engine.into_commands();

        self.settlement()
            .execute(&commands, &self.protocol.collateral_mint, self.protocol.bump)?;

        let snapshot = self.depositor_account.snapshot;
        emit!(DepositUpdated {
            owner: self.depositor.key(),
            deposit: change.deposit,
            collateral_gain_paid: change.collateral_gain,
            p: snapshot.p,
            scale: snapshot.scale,
            epoch: snapshot.epoch,
        });
        Ok(change)
    }
}

pub fn handler_provide_to_stability_pool(ctx: Context<StabilityPoolOperation>, amount: u64) -> Result<()> {
    require!(
        ctx.accounts.depositor_debt.amount >= amount,
        KeelError::InsufficientBalance
    );

    let bump = ctx.bumps.depositor_account;
    let change = ctx
        .accounts
        .run(bump, |engine, depositor| engine.provide_to_stability_pool(depositor, amount))?;

    msg!("Stability pool deposit successful!");
    msg!("Deposited: {}", amount);
    msg!("Deposit now: {}", change.deposit);
    msg!("Collateral gain paid: {}", change.collateral_gain);
    msg!("Pool total deposits: {}", ctx.accounts.stability_pool.total_deposits);

    Ok(())
}

pub fn handler_withdraw_from_stability_pool(ctx: Context<StabilityPoolOperation>, amount: u64) -> Result<()> {
    let bump = ctx.bumps.depositor_account;
    let change = ctx
        .accounts
        .run(bump, |engine, depositor| engine.withdraw_from_stability_pool(depositor, amount))?;

    msg!("Stability pool withdrawal successful!");
    msg!("Deposit now: {}", change.deposit);
    msg!("Collateral gain paid: {}", change.collateral_gain);
    msg!("Loss to liquidations since last change: {}", change.debt_loss);
    msg!("Pool total deposits: {}", ctx.accounts.stability_pool.total_deposits);

    Ok(())
}

// =============================================================================
// Claim Collateral Surplus
// =============================================================================

#[derive(Accounts)]
pub struct ClaimCollateralSurplus<'info> {
    pub owner: Signer<'info>,

    #[account(
        seeds = [PROTOCOL_SEED, protocol.collateral_mint.as_ref()],
        bump = protocol.bump
    )]
    pub protocol: Box<Account<'info, Protocol>>,

    #[account(
        mut,
        address = protocol.trove_book @ KeelError::InvalidProtocolAccount
    )]
    pub trove_book: Box<Account<'info, TroveBook>>,

    #[account(
        mut,
        address = protocol.collateral_vault @ KeelError::InvalidAddress
    )]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = owner_collateral.mint == protocol.collateral_mint @ KeelError::InvalidMint,
        constraint = owner_collateral.owner == owner.key() @ KeelError::InvalidTokenAccountOwner
    )]
    pub owner_collateral: Box<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
}

pub fn handler_claim_collateral_surplus(ctx: Context<ClaimCollateralSurplus>) -> Result<()> {
    let owner = ctx.accounts.owner.key();
    let amount = ctx.accounts.trove_book.surplus.claim(&owner)?;

    let mut commands = TokenCommands::default();
    commands.send_collateral(crate::engine::Holder::Caller, amount)?;

    let accounts = &ctx.accounts;
    let settlement = Settlement {
        token_program: accounts.token_program.to_account_info(),
        protocol: accounts.protocol.to_account_info(),
        caller: accounts.owner.to_account_info(),
        debt_mint: None,
        collateral_vault: Some(accounts.collateral_vault.to_account_info()),
        pool_vault: None,
        gas_pool: None,
        caller_debt: None,
        caller_collateral: Some(accounts.owner_collateral.to_account_info()),
        treasury_debt: None,
        treasury_collateral: None,
    };
    settlement.execute(&commands, &accounts.protocol.collateral_mint, accounts.protocol.bump)?;

    msg!("Collateral surplus claimed by {}: {}", owner, amount);

    emit!(CollateralSurplusClaimed { owner, amount });
    Ok(())
}
