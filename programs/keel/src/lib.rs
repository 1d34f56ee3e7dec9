// =============================================================================
// KEEL - Trove Liquidation, Redistribution and Redemption Engine
// =============================================================================
//
// Borrowers lock collateral in Troves and mint a debt token against it.
// KEEL keeps the system solvent:
// - Troves below the minimum collateral ratio are liquidated, their debt
//   offset against the Stability Pool and any remainder redistributed
//   pro-rata over every other Trove
// - In Recovery Mode (system ratio below the critical ratio) the rules
//   tighten and healthier Troves can be liquidated with their excess
//   collateral kept for the owner
// - Any debt token holder can redeem it at face value against the
//   worst-collateralized Troves, for a decaying fee
//
// The engine (`engine::Engine`) runs every operation against the Protocol,
// TroveBook and StabilityPool accounts; the instruction handlers below load
// those accounts, run the engine and then execute its token movements.
// =============================================================================

pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod instructions;
pub mod interest;
pub mod math;
pub mod oracle;
pub mod state;

use anchor_lang::prelude::*;

pub use constants::*;
pub use error::*;
pub use instructions::*;
pub use state::*;

declare_id!("KEELyJ8bGv4h1kX4f7oWmZgqGQ3k2uVdE1cYdPq8Rbn");

// The trove book is deserialized whole on every instruction, so the program
// allocates from the full requested heap frame instead of the default 32 KiB
#[cfg(all(feature = "custom-heap", target_os = "solana", not(feature = "no-entrypoint")))]
#[global_allocator]
static ALLOCATOR: anchor_lang::solana_program::entrypoint::BumpAllocator =
    anchor_lang::solana_program::entrypoint::BumpAllocator {
        start: anchor_lang::solana_program::entrypoint::HEAP_START_ADDRESS as usize,
        len: HEAP_FRAME_BYTES,
    };

#[program]
pub mod keel {
    use super::*;

    // =========================================================================
    // Setup
    // =========================================================================

    /// Create the Protocol account, the debt mint and the three vaults for
    /// one collateral mint
    pub fn initialize_protocol(ctx: Context<InitializeProtocol>, config: ProtocolConfig) -> Result<()> {
        instructions::initialize::handler_initialize_protocol(ctx, config)
    }

    /// Take ownership of the preallocated TroveBook and StabilityPool accounts
    ///
    /// # Arguments
    /// * `max_troves` - Arena capacity of the trove book
    pub fn initialize_books(ctx: Context<InitializeBooks>, max_troves: u32) -> Result<()> {
        instructions::initialize::handler_initialize_books(ctx, max_troves)
    }

    // =========================================================================
    // Admin & Oracle
    // =========================================================================

    pub fn update_config(ctx: Context<UpdateConfig>, config: ProtocolConfig) -> Result<()> {
        instructions::admin::handler_update_config(ctx, config)
    }

    /// Pausing stops trove and deposit changes; liquidations, redemptions
    /// and claims keep running
    pub fn set_paused(ctx: Context<SetPaused>, paused: bool) -> Result<()> {
        instructions::admin::handler_set_paused(ctx, paused)
    }

    pub fn transfer_admin(ctx: Context<TransferAdmin>) -> Result<()> {
        instructions::admin::handler_transfer_admin(ctx)
    }

    /// Post the collateral price (oracle authority only)
    ///
    /// # Arguments
    /// * `price` - Debt tokens per whole collateral token, 1e18 scaled
    pub fn post_price(ctx: Context<PostPrice>, price: u128) -> Result<()> {
        instructions::admin::handler_post_price(ctx, price)
    }

    // =========================================================================
    // Borrower Operations
    // =========================================================================

    /// Open a trove
    ///
    /// # Arguments
    /// * `collateral` - Collateral to lock, in base units
    /// * `borrow_amount` - Debt tokens to mint to the borrower
    /// * `interest_rate_bps` - Annual interest rate of the trove
    pub fn open_trove(
        ctx: Context<ManageTrove>,
        collateral: u64,
        borrow_amount: u64,
        interest_rate_bps: u16,
    ) -> Result<()> {
        instructions::manage_trove::handler_open_trove(ctx, collateral, borrow_amount, interest_rate_bps)
    }

    pub fn adjust_trove(
        ctx: Context<ManageTrove>,
        trove_id: u32,
        collateral_deposit: u64,
        collateral_withdrawal: u64,
        debt_increase: u64,
        debt_repayment: u64,
    ) -> Result<()> {
        instructions::manage_trove::handler_adjust_trove(
            ctx,
            trove_id,
            engine::TroveAdjustment {
                collateral_deposit,
                collateral_withdrawal,
                debt_increase,
                debt_repayment,
            },
        )
    }

    pub fn close_trove(ctx: Context<ManageTrove>, trove_id: u32) -> Result<()> {
        instructions::manage_trove::handler_close_trove(ctx, trove_id)
    }

    // =========================================================================
    // Stability Pool
    // =========================================================================

    pub fn provide_to_stability_pool(ctx: Context<StabilityPoolOperation>, amount: u64) -> Result<()> {
        instructions::stability_deposit::handler_provide_to_stability_pool(ctx, amount)
    }

    /// Withdraw up to `amount` of the compounded deposit; zero only pays out
    /// the collateral gain
    pub fn withdraw_from_stability_pool(ctx: Context<StabilityPoolOperation>, amount: u64) -> Result<()> {
        instructions::stability_deposit::handler_withdraw_from_stability_pool(ctx, amount)
    }

    pub fn claim_collateral_surplus(ctx: Context<ClaimCollateralSurplus>) -> Result<()> {
        instructions::stability_deposit::handler_claim_collateral_surplus(ctx)
    }

    // =========================================================================
    // Liquidation
    // =========================================================================

    pub fn liquidate(ctx: Context<Liquidate>, trove_id: u32) -> Result<()> {
        instructions::liquidate::handler_liquidate(ctx, trove_id)
    }

    /// Liquidate every eligible trove of `trove_ids`, skipping the rest
    pub fn batch_liquidate(ctx: Context<Liquidate>, trove_ids: Vec<u32>) -> Result<()> {
        instructions::liquidate::handler_batch_liquidate(ctx, trove_ids)
    }

    /// Liquidate up to `n` troves starting from the lowest collateral ratio
    pub fn liquidate_troves(ctx: Context<Liquidate>, n: u32) -> Result<()> {
        instructions::liquidate::handler_liquidate_troves(ctx, n)
    }

    // =========================================================================
    // Redemption
    // =========================================================================

    /// Swap debt tokens for collateral at face value minus the redemption fee
    ///
    /// # Arguments
    /// * `amount` - Debt tokens to redeem
    /// * `max_fee_percentage` - Highest acceptable fee, 1e18 = 100%
    /// * `max_iterations` - Most troves to visit, 0 for no limit
    pub fn redeem_collateral(
        ctx: Context<RedeemCollateral>,
        amount: u64,
        max_fee_percentage: u128,
        max_iterations: u32,
    ) -> Result<()> {
        instructions::redeem::handler_redeem_collateral(ctx, amount, max_fee_percentage, max_iterations)
    }
}
