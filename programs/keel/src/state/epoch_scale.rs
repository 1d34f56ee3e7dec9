// =============================================================================
// Epoch/Scale Sum Accounts
// =============================================================================
// S is tracked per (epoch, scale) segment of the stability pool. Each segment
// has its own PDA, created by the first liquidation that runs in it:
//
//   ["epoch_scale", stability_pool, epoch (le), scale (le)]
//
// An instruction loads only the segments it can touch into a `SumTable`:
// - liquidations: the current segment, the only one an offset writes
// - deposit changes: the deposit's snapshot segment, the one after it, and
//   the current segment
//
// A segment account that was never created stands for S = 0.
// =============================================================================

use std::collections::BTreeMap;

use anchor_lang::prelude::*;

use crate::error::KeelError;
use crate::math::U256;

#[account]
#[derive(Default, InitSpace)]
pub struct EpochScale {
    /// The stability pool this segment belongs to
    pub stability_pool: Pubkey,

    pub epoch: u64,
    pub scale: u64,

    /// Little-endian words of a U256
    pub sum: [u64; 4],

    pub bump: u8,
}

impl EpochScale {
    pub fn sum(&self) -> U256 {
        U256(self.sum)
    }
}

/// S of every segment an operation can see, keyed by (epoch, scale)
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct SumTable {
    sums: BTreeMap<(u64, u64), U256>,
}

impl SumTable {
    pub fn get(&self, epoch: u64, scale: u64) -> U256 {
        self.sums.get(&(epoch, scale)).copied().unwrap_or_default()
    }

    pub fn insert(&mut self, epoch: u64, scale: u64, sum: U256) {
        self.sums.insert((epoch, scale), sum);
    }

    pub fn add(&mut self, epoch: u64, scale: u64, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let sum = self.sums.entry((epoch, scale)).or_default();
        *sum = sum.checked_add(amount).ok_or(error!(KeelError::MathOverflow))?;
        Ok(())
    }

    /// Segments holding a non-zero sum
    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Add a segment account to the table. The address is checked by the
    /// caller's seeds constraint; an account with no data is an unused
    /// segment.
    pub fn load(&mut self, info: &AccountInfo) -> Result<()> {
        if info.data_is_empty() {
            return Ok(());
        }
        require_keys_eq!(*info.owner, crate::ID, KeelError::InvalidProtocolAccount);
        let data = info.try_borrow_data()?;
        let segment = EpochScale::try_deserialize(&mut &data[..])?;
        self.insert(segment.epoch, segment.scale, segment.sum());
        Ok(())
    }

    /// Copy the table's value for `segment` back into the account
    pub fn store(&self, segment: &mut EpochScale) {
        segment.sum = self.get(segment.epoch, segment.scale).0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_segments_read_as_zero() {
        let mut table = SumTable::default();
        table.add(0, 0, U256::from(7u64)).unwrap();
        assert_eq!(table.get(0, 0), U256::from(7u64));
        assert_eq!(table.get(0, 1), U256::zero());
        assert_eq!(table.get(1, 0), U256::zero());
    }

    #[test]
    fn adding_zero_creates_no_segment() {
        let mut table = SumTable::default();
        table.add(3, 2, U256::zero()).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn store_writes_the_segment_sum_back() {
        let mut table = SumTable::default();
        table.add(1, 2, U256::from(5u64)).unwrap();
        table.add(1, 2, U256::from(6u64)).unwrap();

        let mut segment = EpochScale {
            epoch: 1,
            scale: 2,
            ..EpochScale::default()
        };
        table.store(&mut segment);
        assert_eq!(segment.sum(), U256::from(11u64));
    }

    #[test]
    fn sum_overflow_is_an_error() {
        let mut table = SumTable::default();
        table.insert(0, 0, U256::MAX);
        assert_eq!(
            table.add(0, 0, U256::one()).unwrap_err(),
            error!(KeelError::MathOverflow)
        );
    }
}
