// =============================================================================
// Events
// =============================================================================
// Structured records emitted by the instruction handlers with `emit!`.
// =============================================================================

use anchor_lang::prelude::*;

use crate::state::TroveId;

/// What changed a trove
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TroveOperation {
    Open,
    Adjust,
    Close,
    Liquidate,
    Redeem,
}

#[event]
pub struct TroveUpdated {
    pub owner: Pubkey,
    pub trove_id: TroveId,
    pub debt: u64,
    pub collateral: u64,
    pub stake: u64,
    pub operation: TroveOperation,
}

#[event]
pub struct TroveLiquidated {
    pub owner: Pubkey,
    pub trove_id: TroveId,
    pub debt: u64,
    pub collateral: u64,
    pub recovery_mode: bool,
}

/// Totals of one liquidation call
#[event]
pub struct Liquidation {
    pub liquidated_debt: u64,
    pub liquidated_collateral: u64,
    pub collateral_gas_compensation: u64,
    pub debt_gas_compensation: u64,
    pub troves_liquidated: u32,
}

#[event]
pub struct Redemption {
    pub redeemer: Pubkey,
    pub attempted_debt_amount: u64,
    pub actual_debt_amount: u64,
    pub collateral_sent: u64,
    pub collateral_fee: u64,
}

#[event]
pub struct BaseRateUpdated {
    pub base_rate: u128,
    pub last_fee_operation_time: i64,
}

/// Running product/sum after an offset
#[event]
pub struct StabilityPoolUpdated {
    pub p: u128,
    pub current_scale: u64,
    pub current_epoch: u64,
    pub total_deposits: u64,
    pub total_collateral: u64,
}

#[event]
pub struct DepositUpdated {
    pub owner: Pubkey,
    pub deposit: u64,
    pub collateral_gain_paid: u64,
    pub p: u128,
    pub scale: u64,
    pub epoch: u64,
}

#[event]
pub struct CollateralSurplusCredited {
    pub owner: Pubkey,
    pub amount: u64,
}

#[event]
pub struct CollateralSurplusClaimed {
    pub owner: Pubkey,
    pub amount: u64,
}

#[event]
pub struct PricePosted {
    pub price: u128,
    pub timestamp: i64,
}

#[event]
pub struct ConfigUpdated {
    pub admin: Pubkey,
    pub mcr: u128,
    pub ccr: u128,
    pub debt_gas_compensation: u64,
    pub coll_gas_compensation_cap: u64,
    pub min_net_debt: u64,
}
