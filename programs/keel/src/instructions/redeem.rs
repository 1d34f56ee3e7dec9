// =============================================================================
// Redeem Collateral
// =============================================================================
// Burns the redeemer's debt tokens and pays out collateral at face value,
// taken from the troves with the lowest collateral ratio. The fee part of
// the collateral goes to the collateral treasury. Runs while paused.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::constants::*;
use crate::engine::{Engine, RedemptionReport};
use crate::error::KeelError;
use crate::events::{
    BaseRateUpdated, CollateralSurplusCredited, Redemption, TroveOperation, TroveUpdated,
};
use crate::instructions::settle::Settlement;
use crate::interest::SimpleInterest;
use crate::state::{Protocol, StabilityPool, SumTable, TroveBook};

#[derive(Accounts)]
pub struct RedeemCollateral<'info> {
    pub redeemer: Signer<'info>,

    // =========================================================================
    // Protocol Accounts
    // =========================================================================

    #[account(
        mut,
        seeds = [PROTOCOL_SEED, protocol.collateral_mint.as_ref()],
        bump = protocol.bump
    )]
    pub protocol: Box<Account<'info, Protocol>>,

    #[account(
        mut,
        address = protocol.trove_book @ KeelError::InvalidProtocolAccount
    )]
    pub trove_book: Box<Account<'info, TroveBook>>,

    /// Only read for the system totals
    #[account(
        mut,
        address = protocol.stability_pool @ KeelError::InvalidProtocolAccount
    )]
    pub stability_pool: Box<Account<'info, StabilityPool>>,

    // =========================================================================
    // Mint, Vaults & Treasury
    // =========================================================================

    #[account(
        mut,
        address = protocol.debt_mint @ KeelError::InvalidMint
    )]
    pub debt_mint: Box<Account<'info, Mint>>,

    /// Reserves of troves closed by the redemption are burned from here
    #[account(
        mut,
        address = protocol.gas_pool @ KeelError::InvalidAddress
    )]
    pub gas_pool: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        address = protocol.collateral_vault @ KeelError::InvalidAddress
    )]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        address = protocol.treasury_collateral @ KeelError::InvalidAddress
    )]
    pub treasury_collateral: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        address = protocol.treasury_debt @ KeelError::InvalidAddress
    )]
    pub treasury_debt: Box<Account<'info, TokenAccount>>,

    // =========================================================================
    // Redeemer Token Accounts
    // =========================================================================

    #[account(
        mut,
        constraint = redeemer_debt.mint == protocol.debt_mint @ KeelError::InvalidMint,
        constraint = redeemer_debt.owner == redeemer.key() @ KeelError::InvalidTokenAccountOwner
    )]
    pub redeemer_debt: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = redeemer_collateral.mint == protocol.collateral_mint @ KeelError::InvalidMint,
        constraint = redeemer_collateral.owner == redeemer.key() @ KeelError::InvalidTokenAccountOwner
    )]
    pub redeemer_collateral: Box<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
}

impl<'info> RedeemCollateral<'info> {
    fn settlement(&self) -> Settlement<'info> {
        Settlement {
            token_program: self.token_program.to_account_info(),
            protocol: self.protocol.to_account_info(),
            caller: self.redeemer.to_account_info(),
            debt_mint: Some(self.debt_mint.to_account_info()),
            collateral_vault: Some(self.collateral_vault.to_account_info()),
            pool_vault: None,
            gas_pool: Some(self.gas_pool.to_account_info()),
            caller_debt: Some(self.redeemer_debt.to_account_info()),
            caller_collateral: Some(self.redeemer_collateral.to_account_info()),
            treasury_debt: Some(self.treasury_debt.to_account_info()),
            treasury_collateral: Some(self.treasury_collateral.to_account_info()),
        }
    }

    fn emit_report(&self, report: &RedemptionReport) {
        for redeemed in report.redeemed.iter() {
            emit!(TroveUpdated {
                owner: redeemed.owner,
                trove_id: redeemed.id,
                debt: redeemed.debt,
                collateral: if redeemed.closed { 0 } else { redeemed.collateral },
                stake: if redeemed.closed {
                    0
                } else {
                    self.trove_book
                        .trove(redeemed.id)
                        .map(|trove| trove.stake)
                        .unwrap_or_default()
                },
                operation: TroveOperation::Redeem,
            });
        }
        for (owner, amount) in report.surpluses.iter() {
            emit!(CollateralSurplusCredited {
                owner: *owner,
                amount: *amount,
            });
        }

        emit!(Redemption {
            redeemer: self.redeemer.key(),
            attempted_debt_amount: report.attempted_debt_amount,
            actual_debt_amount: report.actual_debt_amount,
            collateral_sent: report.collateral_sent(),
            collateral_fee: report.collateral_fee,
        });
        emit!(BaseRateUpdated {
            base_rate: report.base_rate,
            last_fee_operation_time: self.protocol.fees.last_fee_operation_time,
        });
    }
}

pub fn handler_redeem_collateral(
    mut ctx: Context<RedeemCollateral>,
    amount: u64,
    max_fee_percentage: u128,
    max_iterations: u32,
) -> Result<()> {
    let accounts = &mut ctx.accounts;
    let clock = Clock::get()?;
    let feed = accounts.protocol.price_feed();
    let redeemer = accounts.redeemer.key();
    let balance = accounts.redeemer_debt.amount;

    // Redemptions never touch a pool segment
    let mut sums = SumTable::default();
    let mut engine = Engine::new(
        &mut accounts.protocol,
        &mut accounts.trove_book,
        &mut accounts.stability_pool,
        &mut sums,
        &feed,
        &SimpleInterest,
        clock.unix_timestamp,
    )?;
    let report = engine.redeem_collateral(amount, max_fee_percentage, max_iterations, redeemer, balance)?;
    let commands = engine.into_commands();

    accounts
        .settlement()
        .execute(&commands, &accounts.protocol.collateral_mint, accounts.protocol.bump)?;

    msg!("Redemption successful!");
    msg!("Redeemed: {} of {}", report.actual_debt_amount, amount);
    msg!("Collateral sent: {}", report.collateral_sent());
    msg!("Fee: {}", report.collateral_fee);
    msg!("Base rate: {}", report.base_rate);

    accounts.emit_report(&report);
    Ok(())
}
