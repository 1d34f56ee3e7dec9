// =============================================================================
// Redistribution Accumulator
// =============================================================================
// Liquidated debt and collateral that the stability pool cannot absorb is
// spread over every active trove in proportion to its stake, without touching
// any trove:
//
//   L_coll += coll * 1e18 / total_stakes
//   L_debt += debt * 1e18 / total_stakes
//
// A trove's pending reward is `stake * (L - snapshot) / 1e18`, folded into the
// trove the next time it is touched. Division remainders are carried into the
// next distribution so nothing is lost to rounding over time.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::DECIMAL_PRECISION;
use crate::error::KeelError;
use crate::math::{mul_div, to_u64};
use crate::state::{RewardSnapshot, Trove};

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, Debug, PartialEq, Eq, InitSpace)]
pub struct RewardAccumulator {
    /// Cumulative redistributed collateral per unit staked (1e18 scaled)
    pub l_collateral: u128,

    /// Cumulative redistributed debt per unit staked (1e18 scaled)
    pub l_debt: u128,

    /// Sum of the stakes of all active troves
    pub total_stakes: u128,

    /// total_stakes as of the end of the last liquidation
    pub total_stakes_snapshot: u128,

    /// System collateral (minus gas compensation) as of the end of the last liquidation
    pub total_collateral_snapshot: u128,

    pub last_collateral_error: u128,
    pub last_debt_error: u128,
}

impl RewardAccumulator {
    pub fn snapshot(&self) -> RewardSnapshot {
        RewardSnapshot {
            collateral_per_stake: self.l_collateral,
            debt_per_stake: self.l_debt,
        }
    }

    /// Redistributed collateral the trove has not yet absorbed
    pub fn pending_collateral(&self, trove: &Trove) -> Result<u64> {
        if !trove.is_active() {
            return Ok(0);
        }
        let delta = self
            .l_collateral
            .checked_sub(trove.snapshot.collateral_per_stake)
            .ok_or(error!(KeelError::MathUnderflow))?;
        Self::reward_for(trove.stake, delta)
    }

    /// Redistributed debt the trove has not yet absorbed
    pub fn pending_debt(&self, trove: &Trove) -> Result<u64> {
        if !trove.is_active() {
            return Ok(0);
        }
        let delta = self
            .l_debt
            .checked_sub(trove.snapshot.debt_per_stake)
            .ok_or(error!(KeelError::MathUnderflow))?;
        Self::reward_for(trove.stake, delta)
    }

    pub fn has_pending(&self, trove: &Trove) -> bool {
        trove.is_active()
            && (trove.snapshot.collateral_per_stake < self.l_collateral
                || trove.snapshot.debt_per_stake < self.l_debt)
    }

    // Saturates at u64::MAX rather than failing the touch
    fn reward_for(stake: u64, per_unit_staked: u128) -> Result<u64> {
        if per_unit_staked == 0 || stake == 0 {
            return Ok(0);
        }
        let reward = mul_div(stake as u128, per_unit_staked, DECIMAL_PRECISION)?;
        Ok(reward.min(u64::MAX as u128) as u64)
    }

    /// Stake for a trove holding `collateral`.
    ///
    /// Before the first liquidation every unit of collateral is one unit of
    /// stake. Afterwards new collateral is discounted by the ratio of stakes to
    /// collateral at the last liquidation, so fresh troves do not share in
    /// rewards earned before they existed.
    pub fn compute_stake(&self, collateral: u64) -> Result<u64> {
        if self.total_collateral_snapshot == 0 {
            return Ok(collateral);
        }
        // A non-zero collateral snapshot always has stakes behind it
        require!(self.total_stakes_snapshot > 0, KeelError::DivisionByZero);
        to_u64(mul_div(
            collateral as u128,
            self.total_stakes_snapshot,
            self.total_collateral_snapshot,
        )?)
    }

    pub fn add_stake(&mut self, stake: u64) -> Result<()> {
        self.total_stakes = self
            .total_stakes
            .checked_add(stake as u128)
            .ok_or(error!(KeelError::MathOverflow))?;
        Ok(())
    }

    pub fn remove_stake(&mut self, stake: u64) -> Result<()> {
        self.total_stakes = self
            .total_stakes
            .checked_sub(stake as u128)
            .ok_or(error!(KeelError::MathUnderflow))?;
        Ok(())
    }

    /// Raise L_coll and L_debt by the given remainder, carrying the division
    /// error of both into the next call
    pub fn distribute(&mut self, collateral: u64, debt: u64) -> Result<()> {
        if collateral == 0 && debt == 0 {
            return Ok(());
        }
        require!(self.total_stakes > 0, KeelError::NoStakesToRedistribute);

        let collateral_numerator = (collateral as u128)
            .checked_mul(DECIMAL_PRECISION)
            .ok_or(error!(KeelError::MathOverflow))?
            .checked_add(self.last_collateral_error)
            .ok_or(error!(KeelError::MathOverflow))?;
        let debt_numerator = (debt as u128)
            .checked_mul(DECIMAL_PRECISION)
            .ok_or(error!(KeelError::MathOverflow))?
            .checked_add(self.last_debt_error)
            .ok_or(error!(KeelError::MathOverflow))?;

        let collateral_per_stake = collateral_numerator / self.total_stakes;
        let debt_per_stake = debt_numerator / self.total_stakes;

        self.last_collateral_error = collateral_numerator - collateral_per_stake * self.total_stakes;
        self.last_debt_error = debt_numerator - debt_per_stake * self.total_stakes;

        self.l_collateral = self
            .l_collateral
            .checked_add(collateral_per_stake)
            .ok_or(error!(KeelError::MathOverflow))?;
        self.l_debt = self
            .l_debt
            .checked_add(debt_per_stake)
            .ok_or(error!(KeelError::MathOverflow))?;

        Ok(())
    }

    /// Record the stake/collateral ratio at the end of a liquidation.
    /// `total_collateral` must already exclude the gas compensation paid out.
    pub fn refresh_snapshots(&mut self, total_collateral: u64) {
        self.total_stakes_snapshot = self.total_stakes;
        self.total_collateral_snapshot = total_collateral as u128;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TroveStatus;

    fn active_trove(stake: u64, snapshot: RewardSnapshot) -> Trove {
        Trove {
            stake,
            collateral: stake,
            status: TroveStatus::Active,
            snapshot,
            ..Trove::default()
        }
    }

    #[test]
    fn stake_equals_collateral_before_first_liquidation() {
        let rewards = RewardAccumulator::default();
        assert_eq!(rewards.compute_stake(5_000).unwrap(), 5_000);
    }

    #[test]
    fn stake_is_discounted_after_redistribution() {
        let rewards = RewardAccumulator {
            total_stakes_snapshot: 100,
            total_collateral_snapshot: 150,
            ..RewardAccumulator::default()
        };
        assert_eq!(rewards.compute_stake(300).unwrap(), 200);
    }

    #[test]
    fn distribute_without_stakes_is_rejected() {
        let mut rewards = RewardAccumulator::default();
        assert_eq!(
            rewards.distribute(10, 10).unwrap_err(),
            error!(KeelError::NoStakesToRedistribute)
        );
        // Nothing to distribute is fine even without stakes
        rewards.distribute(0, 0).unwrap();
    }

    #[test]
    fn pending_rewards_are_proportional_to_stake() {
        let mut rewards = RewardAccumulator::default();
        rewards.add_stake(300).unwrap();
        rewards.add_stake(100).unwrap();

        let start = rewards.snapshot();
        rewards.distribute(40, 80).unwrap();

        let big = active_trove(300, start);
        let small = active_trove(100, start);
        assert_eq!(rewards.pending_collateral(&big).unwrap(), 30);
        assert_eq!(rewards.pending_debt(&big).unwrap(), 60);
        assert_eq!(rewards.pending_collateral(&small).unwrap(), 10);
        assert_eq!(rewards.pending_debt(&small).unwrap(), 20);
        assert!(rewards.has_pending(&big));

        let closed = Trove { status: TroveStatus::ClosedByOwner, ..big };
        assert_eq!(rewards.pending_collateral(&closed).unwrap(), 0);
    }

    #[test]
    fn division_error_is_carried_forward() {
        let mut rewards = RewardAccumulator::default();
        rewards.add_stake(3).unwrap();

        rewards.distribute(1, 0).unwrap();
        assert_eq!(rewards.l_collateral, DECIMAL_PRECISION / 3);
        assert_eq!(rewards.last_collateral_error, 1);

        rewards.distribute(2, 0).unwrap();
        // (2e18 + 1) / 3 = 666..667 with no remainder
        assert_eq!(rewards.l_collateral, DECIMAL_PRECISION / 3 + (2 * DECIMAL_PRECISION + 1) / 3);
        assert_eq!(rewards.last_collateral_error, 0);
        assert_eq!(rewards.l_collateral, DECIMAL_PRECISION);
    }

    #[test]
    fn snapshots_follow_stakes() {
        let mut rewards = RewardAccumulator::default();
        rewards.add_stake(500).unwrap();
        rewards.remove_stake(200).unwrap();
        rewards.refresh_snapshots(450);
        assert_eq!(rewards.total_stakes_snapshot, 300);
        assert_eq!(rewards.total_collateral_snapshot, 450);
        assert_eq!(rewards.remove_stake(301).unwrap_err(), error!(KeelError::MathUnderflow));
    }
}
