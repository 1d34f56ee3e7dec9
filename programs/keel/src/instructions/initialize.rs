// =============================================================================
// Initialize Instructions
// =============================================================================
// Setup happens in two steps:
//
// 1. initialize_protocol creates the Protocol PDA, the debt mint and the
//    collateral, stability pool and gas pool vaults
// 2. initialize_books takes over the TroveBook and StabilityPool accounts.
//    The book is too large to create through CPI, so the client allocates
//    both (owned by this program, zeroed, sized with TroveBook::space and
//    8 + StabilityPool::INIT_SPACE) in an earlier instruction of the same
//    transaction.
//    The treasury's debt token account is registered here as well, since the
//    debt mint only exists after step 1.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::constants::*;
use crate::error::KeelError;
use crate::state::{Protocol, ProtocolConfig, StabilityPool, TroveBook};

// =============================================================================
// Initialize Protocol
// =============================================================================

#[derive(Accounts)]
pub struct InitializeProtocol<'info> {
    // =========================================================================
    // Signers
    // =========================================================================

    /// Becomes protocol.admin
    #[account(mut)]
    pub admin: Signer<'info>,

    // =========================================================================
    // Protocol Account (PDA - created by this instruction)
    // =========================================================================

    #[account(
        init,
        payer = admin,
        space = 8 + Protocol::INIT_SPACE,
        seeds = [PROTOCOL_SEED, collateral_mint.key().as_ref()],
        bump
    )]
    pub protocol: Box<Account<'info, Protocol>>,

    // =========================================================================
    // Token Mints
    // =========================================================================

    pub collateral_mint: Box<Account<'info, Mint>>,

    /// The debt token, minted and burned only by the protocol
    #[account(
        init,
        payer = admin,
        mint::decimals = DEBT_DECIMALS,
        mint::authority = protocol,
        seeds = [DEBT_MINT_SEED, protocol.key().as_ref()],
        bump
    )]
    pub debt_mint: Box<Account<'info, Mint>>,

    // =========================================================================
    // Vaults (PDAs owned by the protocol)
    // =========================================================================

    #[account(
        init,
        payer = admin,
        token::mint = collateral_mint,
        token::authority = protocol,
        seeds = [COLLATERAL_VAULT_SEED, protocol.key().as_ref()],
        bump
    )]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,

    #[account(
        init,
        payer = admin,
        token::mint = debt_mint,
        token::authority = protocol,
        seeds = [POOL_VAULT_SEED, protocol.key().as_ref()],
        bump
    )]
    pub pool_vault: Box<Account<'info, TokenAccount>>,

    #[account(
        init,
        payer = admin,
        token::mint = debt_mint,
        token::authority = protocol,
        seeds = [GAS_POOL_SEED, protocol.key().as_ref()],
        bump
    )]
    pub gas_pool: Box<Account<'info, TokenAccount>>,

    // =========================================================================
    // External Accounts
    // =========================================================================

    /// Receives redemption fees. Its owner is the treasury wallet.
    #[account(
        constraint = treasury_collateral.mint == collateral_mint.key() @ KeelError::InvalidMint,
    )]
    pub treasury_collateral: Box<Account<'info, TokenAccount>>,

    /// CHECK: Only stored; the oracle authority signs post_price
    pub oracle_authority: UncheckedAccount<'info>,

    // =========================================================================
    // Programs
    // =========================================================================

    pub system_program: Program<'info, System>,
    pub token_program: Program<'info, Token>,
}

pub fn handler_initialize_protocol(ctx: Context<InitializeProtocol>, config: ProtocolConfig) -> Result<()> {
    config.validate()?;

    let protocol = &mut ctx.accounts.protocol;

    protocol.admin = ctx.accounts.admin.key();
    protocol.oracle_authority = ctx.accounts.oracle_authority.key();
    protocol.collateral_mint = ctx.accounts.collateral_mint.key();
    protocol.debt_mint = ctx.accounts.debt_mint.key();
    protocol.collateral_vault = ctx.accounts.collateral_vault.key();
    protocol.stability_pool_vault = ctx.accounts.pool_vault.key();
    protocol.gas_pool = ctx.accounts.gas_pool.key();
    protocol.treasury_collateral = ctx.accounts.treasury_collateral.key();

    protocol.config = config;
    protocol.is_paused = false;

    protocol.bump = ctx.bumps.protocol;
    protocol.debt_mint_bump = ctx.bumps.debt_mint;
    protocol.collateral_vault_bump = ctx.bumps.collateral_vault;
    protocol.stability_pool_vault_bump = ctx.bumps.pool_vault;
    protocol.gas_pool_bump = ctx.bumps.gas_pool;

    msg!("KEEL protocol initialized");
    msg!("Protocol: {}", protocol.key());
    msg!("Collateral Mint: {}", protocol.collateral_mint);
    msg!("Debt Mint: {}", protocol.debt_mint);
    msg!("MCR: {}, CCR: {}", config.mcr, config.ccr);

    Ok(())
}

// =============================================================================
// Initialize Books
// =============================================================================

#[derive(Accounts)]
pub struct InitializeBooks<'info> {
    #[account(
        constraint = admin.key() == protocol.admin @ KeelError::AdminOnly
    )]
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [PROTOCOL_SEED, protocol.collateral_mint.as_ref()],
        bump = protocol.bump,
        constraint = protocol.trove_book == Pubkey::default() @ KeelError::InvalidProtocolAccount
    )]
    pub protocol: Box<Account<'info, Protocol>>,

    #[account(zero)]
    pub trove_book: Box<Account<'info, TroveBook>>,

    #[account(zero)]
    pub stability_pool: Box<Account<'info, StabilityPool>>,

    /// Receives accrued interest
    #[account(
        constraint = treasury_debt.mint == protocol.debt_mint @ KeelError::InvalidMint,
    )]
    pub treasury_debt: Box<Account<'info, TokenAccount>>,
}

pub fn handler_initialize_books(ctx: Context<InitializeBooks>, max_troves: u32) -> Result<()> {
    require!(
        max_troves > 0 && max_troves <= TroveBook::max_capacity(),
        KeelError::InvalidConfig
    );
    require_gte!(
        ctx.accounts.trove_book.to_account_info().data_len(),
        TroveBook::space(max_troves),
        KeelError::InvalidConfig
    );
    require_gte!(
        ctx.accounts.stability_pool.to_account_info().data_len(),
        8 + StabilityPool::INIT_SPACE,
        KeelError::InvalidConfig
    );

    let protocol_key = ctx.accounts.protocol.key();
    ctx.accounts.trove_book.init(protocol_key, max_troves);
    ctx.accounts.stability_pool.init(protocol_key);

    let protocol = &mut ctx.accounts.protocol;
    protocol.trove_book = ctx.accounts.trove_book.key();
    protocol.stability_pool = ctx.accounts.stability_pool.key();
    protocol.treasury_debt = ctx.accounts.treasury_debt.key();

    msg!("Trove book {} with capacity {}", protocol.trove_book, max_troves);
    msg!("Stability pool {}", protocol.stability_pool);

    Ok(())
}
