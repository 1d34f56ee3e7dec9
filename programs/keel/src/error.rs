// =============================================================================
// KEEL Error Codes
// =============================================================================
// Every failure the program can return. Anchor assigns numeric codes starting
// at 6000 in declaration order; the message is what shows up in client logs.
// =============================================================================

use anchor_lang::prelude::*;

#[error_code]
pub enum KeelError {
    // =========================================================================
    // Protocol State
    // =========================================================================

    /// Admin paused the protocol; only liquidations and redemptions run
    #[msg("Protocol is currently paused")]
    ProtocolPaused,

    #[msg("Invalid protocol configuration")]
    InvalidConfig,

    #[msg("Posted price is zero or older than the allowed maximum age")]
    StalePrice,

    // =========================================================================
    // Balance & Amount
    // =========================================================================

    /// Zero amounts never reach the engine
    #[msg("Amount must be greater than zero")]
    InvalidAmount,

    #[msg("Insufficient balance for operation")]
    InsufficientBalance,

    #[msg("Requested amount exceeds the entire system debt")]
    ExceedsSystemDebt,

    // =========================================================================
    // Trove Ledger
    // =========================================================================

    #[msg("Trove does not exist")]
    TroveNotFound,

    #[msg("Trove does not exist or is closed")]
    TroveNotActive,

    /// The last active trove can never be closed or liquidated
    #[msg("Only one trove in the system")]
    OnlyOneTroveInSystem,

    #[msg("Trove book has reached its capacity")]
    TroveBookFull,

    #[msg("Trove is already in the sorted list")]
    TroveAlreadyListed,

    #[msg("Trove is not in the sorted list")]
    TroveNotListed,

    #[msg("Net debt is below the minimum")]
    NetDebtBelowMinimum,

    #[msg("Operation would leave the trove below the minimum collateral ratio")]
    IcrBelowMcr,

    #[msg("In recovery mode troves must keep ICR above the critical ratio")]
    IcrBelowCcr,

    #[msg("Operation would push the system below the critical collateral ratio")]
    TcrBelowCcr,

    #[msg("Cannot decrease the trove's ICR in recovery mode")]
    IcrDecreasedInRecoveryMode,

    #[msg("Collateral withdrawal is not permitted in recovery mode")]
    CollateralWithdrawalInRecoveryMode,

    #[msg("Operation not permitted during recovery mode")]
    NotPermittedInRecoveryMode,

    #[msg("Cannot deposit and withdraw collateral in the same adjustment")]
    ConflictingCollateralChange,

    #[msg("Adjustment must change collateral or debt")]
    EmptyAdjustment,

    #[msg("Repayment exceeds the trove's repayable debt")]
    RepaymentTooLarge,

    #[msg("Interest rate exceeds the maximum")]
    InterestRateTooHigh,

    #[msg("Signer does not own this trove")]
    NotTroveOwner,

    // =========================================================================
    // Redistribution
    // =========================================================================

    /// A remainder exists but there are no stakes left to take it
    #[msg("No stakes to redistribute liquidated debt and collateral to")]
    NoStakesToRedistribute,

    // =========================================================================
    // Liquidation
    // =========================================================================

    #[msg("Nothing to liquidate")]
    NothingToLiquidate,

    #[msg("Trove array must not be empty")]
    EmptyTroveArray,

    // =========================================================================
    // Redemption
    // =========================================================================

    #[msg("Max fee percentage must be between 0.5% and 100%")]
    InvalidMaxFeePercentage,

    #[msg("Fee exceeded provided maximum")]
    FeeExceedsMaximum,

    #[msg("Fee would eat up all returned collateral")]
    FeeExceedsCollateral,

    #[msg("Cannot redeem when TCR is below the minimum collateral ratio")]
    TcrBelowMcr,

    #[msg("Unable to redeem any amount")]
    UnableToRedeem,

    // =========================================================================
    // Stability Pool
    // =========================================================================

    #[msg("Offset exceeds stability pool deposits")]
    OffsetExceedsDeposits,

    #[msg("Depositor has no stability pool deposit")]
    NoDeposit,

    #[msg("Cannot withdraw while there are troves below the minimum collateral ratio")]
    UndercollateralizedTroves,

    // =========================================================================
    // Collateral Surplus
    // =========================================================================

    #[msg("No collateral available to claim")]
    NoCollateralSurplus,

    // =========================================================================
    // Math
    // =========================================================================

    #[msg("Math operation overflow")]
    MathOverflow,

    #[msg("Math operation underflow")]
    MathUnderflow,

    #[msg("Division by zero")]
    DivisionByZero,

    // =========================================================================
    // Authorization & Account Validation
    // =========================================================================

    #[msg("Only admin can perform this action")]
    AdminOnly,

    #[msg("Only the oracle authority can post prices")]
    OracleOnly,

    #[msg("Invalid address")]
    InvalidAddress,

    #[msg("Token account has the wrong mint")]
    InvalidMint,

    #[msg("Token account has the wrong owner")]
    InvalidTokenAccountOwner,

    #[msg("Account does not belong to this protocol")]
    InvalidProtocolAccount,

    #[msg("A token account required by this operation was not provided")]
    MissingTokenAccount,
}
