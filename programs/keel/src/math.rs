// =============================================================================
// Fixed-Point Math
// =============================================================================
// Checked 18-decimal fixed-point helpers. Every product of two u128 values is
// taken in 256 bits so only the final quotient has to fit back into u128.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::*;
use crate::error::KeelError;

mod wide {
    uint::construct_uint! {
        /// 256-bit unsigned integer for intermediate products and the pool sums
        pub struct U256(4);
    }
}

pub use wide::U256;

impl U256 {
    /// Narrow to u128, failing if the value does not fit
    pub fn try_to_u128(self) -> Result<u128> {
        require!(self.bits() <= 128, KeelError::MathOverflow);
        Ok(self.low_u128())
    }

    /// Narrow to u64, failing if the value does not fit
    pub fn try_to_u64(self) -> Result<u64> {
        require!(self.bits() <= 64, KeelError::MathOverflow);
        Ok(self.low_u64())
    }
}

/// `a * b / d` rounded down
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128> {
    require!(d != 0, KeelError::DivisionByZero);
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(error!(KeelError::MathOverflow))?;
    (product / U256::from(d)).try_to_u128()
}

/// `a * b / d` rounded up
pub fn mul_div_up(a: u128, b: u128, d: u128) -> Result<u128> {
    require!(d != 0, KeelError::DivisionByZero);
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(error!(KeelError::MathOverflow))?;
    let divisor = U256::from(d);
    let mut quotient = product / divisor;
    if !(product % divisor).is_zero() {
        quotient = quotient + U256::one();
    }
    quotient.try_to_u128()
}

pub fn to_u64(value: u128) -> Result<u64> {
    u64::try_from(value).map_err(|_| error!(KeelError::MathOverflow))
}

/// Collateral ratio `coll * price / debt`, 1e18 = 100%.
/// A debt-free position has an infinite ratio.
pub fn compute_cr(collateral: u64, debt: u64, price: u128) -> Result<u128> {
    if debt == 0 {
        return Ok(u128::MAX);
    }
    mul_div(collateral as u128, price, debt as u128)
}

/// Price-independent ratio used to rank troves: `coll * 1e20 / debt`
pub fn compute_nominal_cr(collateral: u64, debt: u64) -> Result<u128> {
    if debt == 0 {
        return Ok(u128::MAX);
    }
    mul_div(collateral as u128, NICR_PRECISION, debt as u128)
}

/// Value of `collateral` in debt token base units at `price`
pub fn collateral_value(collateral: u64, price: u128) -> Result<u64> {
    to_u64(mul_div(collateral as u128, price, DECIMAL_PRECISION)?)
}

/// Collateral worth `debt` at `price`
pub fn debt_to_collateral(debt: u64, price: u128) -> Result<u64> {
    to_u64(mul_div(debt as u128, DECIMAL_PRECISION, price)?)
}

/// Fixed-point multiply rounded half up
pub fn dec_mul(x: u128, y: u128) -> Result<u128> {
    let product = U256::from(x)
        .checked_mul(U256::from(y))
        .ok_or(error!(KeelError::MathOverflow))?;
    let rounded = product
        .checked_add(U256::from(DECIMAL_PRECISION / 2))
        .ok_or(error!(KeelError::MathOverflow))?;
    (rounded / U256::from(DECIMAL_PRECISION)).try_to_u128()
}

/// `base ^ minutes` in fixed point by repeated squaring.
/// The exponent is capped at MAX_DECAY_MINUTES, past which any decaying
/// base is indistinguishable from zero.
pub fn dec_pow(base: u128, minutes: u64) -> Result<u128> {
    let mut n = minutes.min(MAX_DECAY_MINUTES);
    if n == 0 {
        return Ok(DECIMAL_PRECISION);
    }

    let mut x = base;
    let mut y = DECIMAL_PRECISION;
    while n > 1 {
        if n % 2 == 0 {
            x = dec_mul(x, x)?;
            n /= 2;
        } else {
            y = dec_mul(x, y)?;
            x = dec_mul(x, x)?;
            n = (n - 1) / 2;
        }
    }
    dec_mul(x, y)
}
