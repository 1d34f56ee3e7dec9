// =============================================================================
// Gas Compensation
// =============================================================================
// Whoever triggers a liquidation is paid from two sources:
// - the debt gas compensation, reserved in the gas pool when the trove opened
// - a slice of the liquidated collateral: 0.5% of it, raised to a floor value
//   (in debt tokens, converted at the current price) and never more than the
//   configured cap nor the collateral itself
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::COLL_GAS_COMPENSATION_DIVISOR;
use crate::error::KeelError;
use crate::math::debt_to_collateral;
use crate::state::ProtocolConfig;

pub fn collateral_gas_compensation(
    collateral: u64,
    price: u128,
    config: &ProtocolConfig,
) -> Result<u64> {
    let cap = config.coll_gas_compensation_cap;
    let percentage = collateral / COLL_GAS_COMPENSATION_DIVISOR;
    let floor = debt_to_collateral(config.coll_gas_compensation_floor_value, price)?.min(cap);
    Ok(percentage.max(floor).min(cap).min(collateral))
}

pub fn debt_gas_compensation(config: &ProtocolConfig) -> u64 {
    config.debt_gas_compensation
}

/// Recorded debt of a trove borrowing `net_debt`
pub fn composite_debt(net_debt: u64, config: &ProtocolConfig) -> Result<u64> {
    net_debt
        .checked_add(config.debt_gas_compensation)
        .ok_or(error!(KeelError::MathOverflow))
}

/// Debt the owner has to repay, excluding the gas reserve
pub fn net_debt(debt: u64, config: &ProtocolConfig) -> u64 {
    debt.saturating_sub(config.debt_gas_compensation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    fn config() -> ProtocolConfig {
        ProtocolConfig::default()
    }

    #[test]
    fn large_positions_pay_half_a_percent_up_to_the_cap() {
        let price = 200 * DECIMAL_PRECISION;
        // 100 collateral -> 0.5 collateral
        assert_eq!(
            collateral_gas_compensation(100 * ONE_COLLATERAL_TOKEN, price, &config()).unwrap(),
            ONE_COLLATERAL_TOKEN / 2
        );
        // 1000 collateral -> 5, capped at 2
        assert_eq!(
            collateral_gas_compensation(1_000 * ONE_COLLATERAL_TOKEN, price, &config()).unwrap(),
            DEFAULT_COLL_GAS_COMPENSATION_CAP
        );
    }

    #[test]
    fn small_positions_pay_the_floor_value() {
        let price = 200 * DECIMAL_PRECISION;
        // 0.5% of 1 collateral ($1) is below the $10 floor: $10 / $200 = 0.05
        assert_eq!(
            collateral_gas_compensation(ONE_COLLATERAL_TOKEN, price, &config()).unwrap(),
            ONE_COLLATERAL_TOKEN / 20
        );
    }

    #[test]
    fn floor_is_capped_when_collateral_is_cheap() {
        // At $1 the $10 floor would be 10 collateral, above the cap of 2
        let price = DECIMAL_PRECISION;
        assert_eq!(
            collateral_gas_compensation(50 * ONE_COLLATERAL_TOKEN, price, &config()).unwrap(),
            DEFAULT_COLL_GAS_COMPENSATION_CAP
        );
        let custom = ProtocolConfig {
            coll_gas_compensation_cap: ONE_COLLATERAL_TOKEN,
            ..config()
        };
        assert_eq!(
            collateral_gas_compensation(50 * ONE_COLLATERAL_TOKEN, price, &custom).unwrap(),
            ONE_COLLATERAL_TOKEN
        );
    }

    #[test]
    fn compensation_never_exceeds_collateral() {
        let price = DECIMAL_PRECISION;
        assert_eq!(collateral_gas_compensation(1_000, price, &config()).unwrap(), 1_000);
        assert_eq!(collateral_gas_compensation(0, price, &config()).unwrap(), 0);
    }

    #[test]
    fn composite_and_net_debt() {
        assert_eq!(
            composite_debt(DEFAULT_MIN_NET_DEBT, &config()).unwrap(),
            DEFAULT_MIN_NET_DEBT + DEFAULT_DEBT_GAS_COMPENSATION
        );
        assert_eq!(net_debt(DEFAULT_DEBT_GAS_COMPENSATION + 5, &config()), 5);
        assert_eq!(net_debt(1, &config()), 0);
    }
}
