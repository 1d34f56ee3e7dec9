// =============================================================================
// Admin & Oracle Instructions
// =============================================================================
// Functions only the protocol admin (or, for prices, the oracle authority)
// can call.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::*;
use crate::error::KeelError;
use crate::events::{ConfigUpdated, PricePosted};
use crate::state::{Protocol, ProtocolConfig};

// =============================================================================
// Update Config
// =============================================================================

#[derive(Accounts)]
pub struct UpdateConfig<'info> {
    #[account(
        constraint = admin.key() == protocol.admin @ KeelError::AdminOnly
    )]
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [PROTOCOL_SEED, protocol.collateral_mint.as_ref()],
        bump = protocol.bump
    )]
    pub protocol: Box<Account<'info, Protocol>>,
}

/// Replace the risk parameters. Applies from the next operation on; open
/// troves are not re-checked.
pub fn handler_update_config(ctx: Context<UpdateConfig>, config: ProtocolConfig) -> Result<()> {
    config.validate()?;

    let protocol = &mut ctx.accounts.protocol;
    let old = protocol.config;
    protocol.config = config;

    msg!("Config updated by admin {}", ctx.accounts.admin.key());
    msg!("MCR: {} -> {}", old.mcr, config.mcr);
    msg!("CCR: {} -> {}", old.ccr, config.ccr);
    msg!(
        "Collateral gas compensation cap: {} -> {}",
        old.coll_gas_compensation_cap,
        config.coll_gas_compensation_cap
    );

    emit!(ConfigUpdated {
        admin: ctx.accounts.admin.key(),
        mcr: config.mcr,
        ccr: config.ccr,
        debt_gas_compensation: config.debt_gas_compensation,
        coll_gas_compensation_cap: config.coll_gas_compensation_cap,
        min_net_debt: config.min_net_debt,
    });

    Ok(())
}

// =============================================================================
// Pause
// =============================================================================

#[derive(Accounts)]
pub struct SetPaused<'info> {
    #[account(
        constraint = admin.key() == protocol.admin @ KeelError::AdminOnly
    )]
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [PROTOCOL_SEED, protocol.collateral_mint.as_ref()],
        bump = protocol.bump
    )]
    pub protocol: Box<Account<'info, Protocol>>,
}

pub fn handler_set_paused(ctx: Context<SetPaused>, paused: bool) -> Result<()> {
    let protocol = &mut ctx.accounts.protocol;

    if protocol.is_paused == paused {
        msg!(
            "Protocol is already {}",
            if paused { "paused" } else { "unpaused" }
        );
        return Ok(());
    }

    protocol.is_paused = paused;

    msg!(
        "Protocol {} by admin {}",
        if paused { "PAUSED" } else { "UNPAUSED" },
        ctx.accounts.admin.key()
    );

    Ok(())
}

// =============================================================================
// Transfer Admin
// =============================================================================

#[derive(Accounts)]
pub struct TransferAdmin<'info> {
    #[account(
        constraint = admin.key() == protocol.admin @ KeelError::AdminOnly
    )]
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [PROTOCOL_SEED, protocol.collateral_mint.as_ref()],
        bump = protocol.bump
    )]
    pub protocol: Box<Account<'info, Protocol>>,

    /// CHECK: Only stored as the new admin
    pub new_admin: UncheckedAccount<'info>,
}

pub fn handler_transfer_admin(ctx: Context<TransferAdmin>) -> Result<()> {
    let new_admin = ctx.accounts.new_admin.key();
    require!(new_admin != Pubkey::default(), KeelError::InvalidAddress);

    let protocol = &mut ctx.accounts.protocol;
    let old_admin = protocol.admin;
    protocol.admin = new_admin;

    msg!("Admin transferred from {} to {}", old_admin, new_admin);

    Ok(())
}

// =============================================================================
// Post Price
// =============================================================================

#[derive(Accounts)]
pub struct PostPrice<'info> {
    #[account(
        constraint = oracle_authority.key() == protocol.oracle_authority @ KeelError::OracleOnly
    )]
    pub oracle_authority: Signer<'info>,

    #[account(
        mut,
        seeds = [PROTOCOL_SEED, protocol.collateral_mint.as_ref()],
        bump = protocol.bump
    )]
    pub protocol: Box<Account<'info, Protocol>>,
}

pub fn handler_post_price(ctx: Context<PostPrice>, price: u128) -> Result<()> {
    require!(price > 0, KeelError::InvalidAmount);

    let clock = Clock::get()?;
    let protocol = &mut ctx.accounts.protocol;
    protocol.oracle.price = price;
    protocol.oracle.updated_at = clock.unix_timestamp;

    msg!("Price posted: {} at {}", price, clock.unix_timestamp);

    emit!(PricePosted {
        price,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}
