// =============================================================================
// KEEL Protocol Constants
// =============================================================================
// Fixed-point precisions, default risk parameters and PDA seeds.
//
// Number formats used throughout the program:
// - Token amounts (collateral and debt token) are u64 base units, 9 decimals
// - Ratios, prices and reward accumulators are u128 scaled by DECIMAL_PRECISION
// - The price is "debt tokens per whole collateral token", scaled by 1e18
// =============================================================================

// =============================================================================
// FIXED-POINT PRECISION
// =============================================================================

/// One unit in 18-decimal fixed point (1.0)
pub const DECIMAL_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Precision of the nominal collateral ratio used as the sorted-list rank key
/// NICR = collateral * 1e20 / debt
pub const NICR_PRECISION: u128 = 100_000_000_000_000_000_000;

/// Scale boundary of the stability pool product P
/// Whenever P would drop below this value it is multiplied back up by it
/// and the current scale is incremented
pub const SCALE_FACTOR: u128 = 1_000_000_000;

/// A compounded deposit below initial / DEPOSIT_DUST_DIVISOR is floored to zero
pub const DEPOSIT_DUST_DIVISOR: u64 = 1_000_000_000;

/// 100% as a collateral ratio
pub const ONE_HUNDRED_PERCENT: u128 = DECIMAL_PRECISION;

// =============================================================================
// TOKEN DECIMALS
// =============================================================================

/// Debt token decimals (1 debt token = 1_000_000_000 base units)
pub const DEBT_DECIMALS: u8 = 9;

/// One whole debt token in base units
pub const ONE_DEBT_TOKEN: u64 = 1_000_000_000;

/// One whole collateral token in base units
pub const ONE_COLLATERAL_TOKEN: u64 = 1_000_000_000;

// =============================================================================
// DEFAULT RISK PARAMETERS (stored in ProtocolConfig, adjustable by admin)
// =============================================================================

/// Minimum collateral ratio: 110%
pub const DEFAULT_MCR: u128 = 1_100_000_000_000_000_000;

/// Critical system collateral ratio: 150%
pub const DEFAULT_CCR: u128 = 1_500_000_000_000_000_000;

/// Debt reserved in the gas pool at open and paid to the liquidator: 200 debt tokens
pub const DEFAULT_DEBT_GAS_COMPENSATION: u64 = 200 * ONE_DEBT_TOKEN;

/// Lower bound of the collateral gas compensation, valued in debt tokens: $10
pub const DEFAULT_COLL_GAS_COMPENSATION_FLOOR_VALUE: u64 = 10 * ONE_DEBT_TOKEN;

/// Absolute cap of the collateral gas compensation: 2 collateral tokens
pub const DEFAULT_COLL_GAS_COMPENSATION_CAP: u64 = 2 * ONE_COLLATERAL_TOKEN;

/// Minimum net debt of a trove (excluding the gas compensation reserve)
pub const DEFAULT_MIN_NET_DEBT: u64 = 1_800 * ONE_DEBT_TOKEN;

/// Posted prices older than this many seconds are rejected
pub const DEFAULT_PRICE_MAX_AGE: i64 = 300;

/// Collateral gas compensation is 1/200th (0.5%) of the liquidated collateral
pub const COLL_GAS_COMPENSATION_DIVISOR: u64 = 200;

// =============================================================================
// REDEMPTION FEES
// =============================================================================

/// Minimum redemption fee: 0.5%
pub const REDEMPTION_FEE_FLOOR: u128 = 5_000_000_000_000_000;

/// Maximum redemption fee and base rate: 100%
pub const MAX_REDEMPTION_FEE: u128 = DECIMAL_PRECISION;

/// Divisor applied to the redeemed fraction when raising the base rate
pub const BETA: u128 = 2;

/// Per-minute decay factor of the base rate, giving a 12 hour half-life
/// 0.999037758833783000 ^ 720 = 0.5
pub const MINUTE_DECAY_FACTOR: u128 = 999_037_758_833_783_000;

pub const SECONDS_IN_ONE_MINUTE: i64 = 60;

/// Decay exponent cap (1000 years in minutes)
pub const MAX_DECAY_MINUTES: u64 = 525_600_000;

// =============================================================================
// INTEREST
// =============================================================================

pub const SECONDS_PER_YEAR: u128 = 31_536_000;

/// Basis point denominator (10000 BPS = 100%)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Highest annual interest rate a trove can carry: 100%
pub const MAX_INTEREST_RATE_BPS: u16 = 10_000;

// =============================================================================
// LIMITS
// =============================================================================

/// Upper bound on troves processed by one liquidate_troves call
pub const MAX_LIQUIDATION_BATCH_SIZE: u32 = 50;

/// Heap available to one instruction. With `custom-heap` the program runs
/// its own allocator over the largest frame the runtime grants, and every
/// transaction calling it must request that frame from the compute budget
/// program (`RequestHeapFrame`).
#[cfg(feature = "custom-heap")]
pub const HEAP_FRAME_BYTES: usize = 256 * 1024;
#[cfg(not(feature = "custom-heap"))]
pub const HEAP_FRAME_BYTES: usize = 32 * 1024;

/// Heap kept free of the trove book for the other accounts and the engine's
/// working memory (token commands, liquidation and redemption reports)
pub const HEAP_RESERVE_BYTES: usize = 16 * 1024;

// =============================================================================
// PDA SEEDS
// =============================================================================

/// Seed for the Protocol account PDA
/// Full seed: ["protocol", collateral_mint_pubkey]
pub const PROTOCOL_SEED: &[u8] = b"protocol";

/// Seed for the debt token mint PDA
/// Full seed: ["debt_mint", protocol_pubkey]
pub const DEBT_MINT_SEED: &[u8] = b"debt_mint";

/// Seed for the collateral vault PDA (active pool, default pool,
/// stability pool gains and surpluses all live here)
/// Full seed: ["collateral_vault", protocol_pubkey]
pub const COLLATERAL_VAULT_SEED: &[u8] = b"collateral_vault";

/// Seed for the stability pool debt token vault PDA
/// Full seed: ["pool_vault", protocol_pubkey]
pub const POOL_VAULT_SEED: &[u8] = b"pool_vault";

/// Seed for the gas pool PDA (holds the debt gas compensation reserves)
/// Full seed: ["gas_pool", protocol_pubkey]
pub const GAS_POOL_SEED: &[u8] = b"gas_pool";

/// Seed for Depositor account PDA
/// Full seed: ["depositor", stability_pool_pubkey, owner_pubkey]
pub const DEPOSITOR_SEED: &[u8] = b"depositor";

/// Seed for the stability pool segment PDAs
/// Full seed: ["epoch_scale", stability_pool_pubkey, epoch_le_bytes, scale_le_bytes]
pub const EPOCH_SCALE_SEED: &[u8] = b"epoch_scale";
