// =============================================================================
// Instructions Module
// =============================================================================
// Account layouts and handlers for every KEEL instruction. Handlers run the
// engine against the loaded accounts, then settle the token movements it
// returned (see `settle`).
// =============================================================================

// Setup & admin
pub mod admin;
pub mod initialize;

// Borrower & depositor operations
pub mod manage_trove;
pub mod stability_deposit;

// Keeper operations
pub mod liquidate;
pub mod redeem;

pub mod settle;

// The #[derive(Accounts)] macro generates helper types that need to be at crate root
pub use admin::*;
pub use initialize::*;
pub use liquidate::*;
pub use manage_trove::*;
pub use redeem::*;
pub use stability_deposit::*;
