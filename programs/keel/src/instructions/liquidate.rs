// =============================================================================
// Liquidation Instructions
// =============================================================================
// Anyone can liquidate. The liquidator is paid the debt gas compensation of
// every liquidated trove out of the gas pool, plus the collateral gas
// compensation out of the vault. Liquidations keep running while the
// protocol is paused.
//
// Offset debt is burned from the stability pool vault; the collateral that
// goes with it stays in the collateral vault, now owed to depositors. The
// depositors' share is added to S of the pool's current segment, whose
// account the first liquidation in that segment pays for.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::constants::*;
use crate::engine::{Engine, LiquidationReport};
use crate::error::KeelError;
use crate::events::{CollateralSurplusCredited, Liquidation, StabilityPoolUpdated, TroveLiquidated};
use crate::instructions::settle::Settlement;
use crate::interest::SimpleInterest;
use crate::state::{EpochScale, Protocol, StabilityPool, SumTable, TroveBook, TroveId};

#[derive(Accounts)]
pub struct Liquidate<'info> {
    #[account(mut)]
    pub liquidator: Signer<'info>,

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

    #[account(
        mut,
        address = protocol.stability_pool @ KeelError::InvalidProtocolAccount
    )]
    pub stability_pool: Box<Account<'info, StabilityPool>>,

    /// S of the segment the pool is in before this liquidation
    #[account(
        init_if_needed,
        payer = liquidator,
        space = 8 + EpochScale::INIT_SPACE,
        seeds = [
            EPOCH_SCALE_SEED,
            stability_pool.key().as_ref(),
            &stability_pool.current_epoch.to_le_bytes(),
            &stability_pool.current_scale.to_le_bytes(),
        ],
        bump
    )]
    pub current_segment: Box<Account<'info, EpochScale>>,

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
        address = protocol.stability_pool_vault @ KeelError::InvalidAddress
    )]
    pub pool_vault: Box<Account<'info, TokenAccount>>,

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

    /// Interest accrued by liquidated troves is minted here
    #[account(
        mut,
        address = protocol.treasury_debt @ KeelError::InvalidAddress
    )]
    pub treasury_debt: Box<Account<'info, TokenAccount>>,

    // =========================================================================
    // Liquidator Token Accounts
    // =========================================================================

    #[account(
        mut,
        constraint = liquidator_debt.mint == protocol.debt_mint @ KeelError::InvalidMint,
        constraint = liquidator_debt.owner == liquidator.key() @ KeelError::InvalidTokenAccountOwner
    )]
    pub liquidator_debt: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = liquidator_collateral.mint == protocol.collateral_mint @ KeelError::InvalidMint,
        constraint = liquidator_collateral.owner == liquidator.key() @ KeelError::InvalidTokenAccountOwner
    )]
    pub liquidator_collateral: Box<Account<'info, TokenAccount>>,

    pub system_program: Program<'info, System>,
    pub token_program: Program<'info, Token>,
}

impl<'info> Liquidate<'info> {
    fn settlement(&self) -> Settlement<'info> {
        Settlement {
            token_program: self.token_program.to_account_info(),
            protocol: self.protocol.to_account_info(),
            caller: self.liquidator.to_account_info(),
            debt_mint: Some(self.debt_mint.to_account_info()),
            collateral_vault: Some(self.collateral_vault.to_account_info()),
            pool_vault: Some(self.pool_vault.to_account_info()),
            gas_pool: Some(self.gas_pool.to_account_info()),
            caller_debt: Some(self.liquidator_debt.to_account_info()),
            caller_collateral: Some(self.liquidator_collateral.to_account_info()),
            treasury_debt: Some(self.treasury_debt.to_account_info()),
            treasury_collateral: None,
        }
    }

    fn run(
        &mut self,
        segment_bump: u8,
        operation: impl FnOnce(&mut Engine) -> Result<LiquidationReport>,
    ) -> Result<()> {
        let clock = Clock::get()?;
        let feed = self.protocol.price_feed();

        // A fresh segment account still has the default pool
        if self.current_segment.stability_pool == Pubkey::default() {
            self.current_segment.stability_pool = self.stability_pool.key();
            self.current_segment.epoch = self.stability_pool.current_epoch;
            self.current_segment.scale = self.stability_pool.current_scale;
            self.current_segment.bump = segment_bump;
        }
        let mut sums = SumTable::default();
        sums.insert(
            self.current_segment.epoch,
            self.current_segment.scale,
            self.current_segment.sum(),
        );

        let mut engine = Engine::new(
            &mut self.protocol,
            &mut self.trove_book,
            &mut self.stability_pool,
            &mut sums,
            &feed,
            &SimpleInterest,
            clock.unix_timestamp,
        )?;
        let report = operation(&mut engine)?;
        let commands = engine.into_commands();
        sums.store(&mut self.current_segment);

        self.settlement()
            .execute(&commands, &self.protocol.collateral_mint, self.protocol.bump)?;

        self.emit_report(&report);
        Ok(())
    }

    fn emit_report(&self, report: &LiquidationReport) {
        for liquidated in report.liquidated.iter() {
            emit!(TroveLiquidated {
                owner: liquidated.owner,
                trove_id: liquidated.id,
                debt: liquidated.values.entire_debt,
                collateral: liquidated.values.entire_collateral,
                recovery_mode: liquidated.recovery_mode,
            });
            if liquidated.values.coll_surplus > 0 {
                emit!(CollateralSurplusCredited {
                    owner: liquidated.owner,
                    amount: liquidated.values.coll_surplus,
                });
            }
        }

        let totals = &report.totals;
        emit!(Liquidation {
            liquidated_debt: totals.total_debt_in_sequence,
            liquidated_collateral: totals.total_coll_in_sequence,
            collateral_gas_compensation: totals.total_coll_gas_compensation,
            debt_gas_compensation: totals.total_debt_gas_compensation,
            troves_liquidated: report.liquidated.len() as u32,
        });

        if report.offset.debt_offset > 0 {
            let pool = &self.stability_pool;
            emit!(StabilityPoolUpdated {
                p: pool.p,
                current_scale: pool.current_scale,
                current_epoch: pool.current_epoch,
                total_deposits: pool.total_deposits,
                total_collateral: pool.total_collateral,
            });
        }

        msg!("Liquidation by {}", self.liquidator.key());
        msg!("Troves liquidated: {}", report.liquidated.len());
        msg!("Debt offset: {}", totals.total_debt_to_offset);
        msg!("Debt redistributed: {}", totals.total_debt_to_redistribute);
        msg!("Collateral surplus: {}", totals.total_coll_surplus);
    }
}

pub fn handler_liquidate(ctx: Context<Liquidate>, trove_id: TroveId) -> Result<()> {
    let bump = ctx.bumps.current_segment;
    ctx.accounts.run(bump, |engine| engine.liquidate(trove_id))
}

pub fn handler_batch_liquidate(ctx: Context<Liquidate>, trove_ids: Vec<TroveId>) -> Result<()> {
    let bump = ctx.bumps.current_segment;
    ctx.accounts.run(bump, |engine| engine.batch_liquidate(&trove_ids))
}

pub fn handler_liquidate_troves(ctx: Context<Liquidate>, n: u32) -> Result<()> {
    let bump = ctx.bumps.current_segment;
    ctx.accounts.run(bump, |engine| engine.liquidate_troves(n))
}
