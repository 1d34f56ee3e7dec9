// =============================================================================
// Interest Accrual
// =============================================================================
// Interest is folded into a trove's debt whenever the trove is touched,
// together with its pending redistribution rewards. The engine mints the
// accrued amount to the protocol treasury.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::{BPS_DENOMINATOR, SECONDS_PER_YEAR};
use crate::math::{mul_div, to_u64};
use crate::state::Trove;

pub trait InterestModel {
    /// Interest owed by `trove` since its last update, in debt base units
    fn accrued_interest(&self, trove: &Trove, now: i64) -> Result<u64>;
}

/// Troves carry no interest
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInterest;

impl InterestModel for NoInterest {
    fn accrued_interest(&self, _trove: &Trove, _now: i64) -> Result<u64> {
        Ok(0)
    }
}

/// Linear accrual at the trove's own annual rate
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleInterest;

impl InterestModel for SimpleInterest {
    fn accrued_interest(&self, trove: &Trove, now: i64) -> Result<u64> {
        if !trove.is_active() || trove.interest_rate_bps == 0 || trove.debt == 0 {
            return Ok(0);
        }
        let elapsed = now.saturating_sub(trove.last_interest_update);
        if elapsed <= 0 {
            return Ok(0);
        }

        let per_year = mul_div(
            trove.debt as u128,
            trove.interest_rate_bps as u128,
            BPS_DENOMINATOR,
        )?;
        let accrued = mul_div(per_year, elapsed as u128, SECONDS_PER_YEAR)?;
        to_u64(accrued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TroveStatus;

    fn trove(debt: u64, rate_bps: u16) -> Trove {
        Trove {
            debt,
            collateral: 1,
            status: TroveStatus::Active,
            interest_rate_bps: rate_bps,
            ..Trove::default()
        }
    }

    #[test]
    fn simple_interest_is_linear() {
        let model = SimpleInterest;
        let t = trove(1_000_000, 500);
        assert_eq!(model.accrued_interest(&t, SECONDS_PER_YEAR as i64).unwrap(), 50_000);
        assert_eq!(model.accrued_interest(&t, SECONDS_PER_YEAR as i64 / 2).unwrap(), 25_000);
    }

    #[test]
    fn no_interest_without_time_or_rate() {
        let model = SimpleInterest;
        assert_eq!(model.accrued_interest(&trove(1_000_000, 500), 0).unwrap(), 0);
        assert_eq!(model.accrued_interest(&trove(1_000_000, 0), 1_000).unwrap(), 0);

        let mut closed = trove(1_000_000, 500);
        closed.status = TroveStatus::ClosedByOwner;
        assert_eq!(model.accrued_interest(&closed, 1_000).unwrap(), 0);
        assert_eq!(NoInterest.accrued_interest(&trove(1, 1), 1_000).unwrap(), 0);
    }
}
