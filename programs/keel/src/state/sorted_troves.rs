// =============================================================================
// Sorted Trove List
// =============================================================================
// Ordered by nominal collateral ratio. "first" is the best-collateralized
// trove, "last" the worst. Redemptions start at last and walk toward first.
//
// The engine only talks to the SortedTroves trait. SortedTroveList is the
// account-resident implementation: a Vec of (rank key, id) kept in ascending
// order plus a key lookup indexed by trove id, so every position update is a
// binary search.
// =============================================================================

use anchor_lang::prelude::*;

use crate::error::KeelError;
use crate::state::TroveId;

/// Ordered-iteration primitive over active troves
pub trait SortedTroves {
    fn insert(&mut self, id: TroveId, rank_key: u128) -> Result<()>;

    fn remove(&mut self, id: TroveId) -> Result<()>;

    /// Move a listed trove to the position of its new rank key
    fn re_insert(&mut self, id: TroveId, new_rank_key: u128) -> Result<()> {
        self.remove(id)?;
        self.insert(id, new_rank_key)
    }

    fn contains(&self, id: TroveId) -> bool;

    fn rank_key(&self, id: TroveId) -> Option<u128>;

    /// Best-ranked trove (highest NICR)
    fn first(&self) -> Option<TroveId>;

    /// Worst-ranked trove (lowest NICR)
    fn last(&self) -> Option<TroveId>;

    /// Neighbour of `id` one step toward `first`
    fn prev(&self, id: TroveId) -> Option<TroveId>;

    /// Neighbour of `id` one step toward `last`
    fn next(&self, id: TroveId) -> Option<TroveId>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, InitSpace)]
pub struct RankEntry {
    pub rank_key: u128,
    /// A TroveId, spelled out for InitSpace
    pub id: u32,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Default, Debug)]
pub struct SortedTroveList {
    /// Ascending by (rank_key, id); index 0 is the worst trove
    pub entries: Vec<RankEntry>,

    /// Rank key of each listed trove, indexed by trove id
    pub keys: Vec<Option<u128>>,
}

impl SortedTroveList {
    /// Serialized size for `capacity` troves
    pub fn space(capacity: usize) -> usize {
        4 + capacity * RankEntry::INIT_SPACE + 4 + capacity * (1 + 16)
    }

    fn position(&self, id: TroveId) -> Option<usize> {
        let rank_key = self.rank_key(id)?;
        self.entries.binary_search(&RankEntry { rank_key, id }).ok()
    }

    pub fn iter_worst_first(&self) -> impl Iterator<Item = TroveId> + '_ {
        self.entries.iter().map(|entry| entry.id)
    }
}

impl SortedTroves for SortedTroveList {
    fn insert(&mut self, id: TroveId, rank_key: u128) -> Result<()> {
        require!(!self.contains(id), KeelError::TroveAlreadyListed);

        let slot = id as usize;
        if self.keys.len() <= slot {
            self.keys.resize(slot + 1, None);
        }
        self.keys[slot] = Some(rank_key);

        let entry = RankEntry { rank_key, id };
        let at = self.entries.binary_search(&entry).unwrap_or_else(|at| at);
        self.entries.insert(at, entry);
        Ok(())
    }

    fn remove(&mut self, id: TroveId) -> Result<()> {
        let at = self.position(id).ok_or(error!(KeelError::TroveNotListed))?;
        self.entries.remove(at);
        self.keys[id as usize] = None;
        Ok(())
    }

    fn contains(&self, id: TroveId) -> bool {
        self.rank_key(id).is_some()
    }

    fn rank_key(&self, id: TroveId) -> Option<u128> {
        self.keys.get(id as usize).copied().flatten()
    }

    fn first(&self) -> Option<TroveId> {
        self.entries.last().map(|entry| entry.id)
    }

    fn last(&self) -> Option<TroveId> {
        self.entries.first().map(|entry| entry.id)
    }

    fn prev(&self, id: TroveId) -> Option<TroveId> {
        let at = self.position(id)?;
        self.entries.get(at + 1).map(|entry| entry.id)
    }

    fn next(&self, id: TroveId) -> Option<TroveId> {
        let at = self.position(id)?;
        at.checked_sub(1).map(|below| self.entries[below].id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
