// =============================================================================
// State Module
// =============================================================================
// Account structures and the ledgers they embed.
//
// Accounts:
// - Protocol     (PDA) configuration, market state, authorities
// - TroveBook    (preallocated) troves, sorted list, pools, rewards, surpluses
// - StabilityPool (preallocated) deposits, P, epoch and scale
// - EpochScale   (PDA) S of one (epoch, scale) segment
// - Depositor    (PDA) one stability pool position
// =============================================================================

pub mod depositor;
pub mod epoch_scale;
pub mod protocol;
pub mod rewards;
pub mod sorted_troves;
pub mod stability_pool;
pub mod surplus;
pub mod trove;
pub mod trove_book;

pub use depositor::*;
pub use epoch_scale::*;
pub use protocol::*;
pub use rewards::*;
pub use sorted_troves::*;
pub use stability_pool::*;
pub use surplus::*;
pub use trove::*;
pub use trove_book::*;
