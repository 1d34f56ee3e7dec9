// =============================================================================
// Trove Book Account
// =============================================================================
// The trove ledger: every trove ever opened, the dense index of active troves,
// the sorted list, the redistribution accumulator, the active/default pool
// balances and the collateral surplus ledger.
//
// Storage layout:
// - `troves` is an arena addressed by TroveId that only ever grows
// - `active` holds the ids of open troves with no gaps; each trove keeps its
//   position in `array_index` so removal is a swap with the last element
//
// The book is allocated by the client at full size (see `space`) and
// initialized through `#[account(zero)]`, so growing the vectors never needs
// a realloc. Every instruction deserializes the whole book onto the heap,
// which bounds its capacity (see `max_capacity`).
// =============================================================================

use std::mem::size_of;

use anchor_lang::prelude::*;

use crate::constants::{HEAP_FRAME_BYTES, HEAP_RESERVE_BYTES};
use crate::error::KeelError;
use crate::math::compute_cr;
use crate::state::{
    RankEntry, RewardAccumulator, RewardSnapshot, SortedTroveList, SortedTroves, SurplusEntry,
    SurplusLedger, Trove, TroveId, TroveStatus,
};

/// Collateral and debt held by one accounting pool
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, Debug, PartialEq, Eq, InitSpace)]
pub struct PoolBalance {
    pub collateral: u64,
    pub debt: u64,
}

impl PoolBalance {
    pub fn add_collateral(&mut self, amount: u64) -> Result<()> {
        self.collateral = self
            .collateral
            .checked_add(amount)
            .ok_or(error!(KeelError::MathOverflow))?;
        Ok(())
    }

    pub fn sub_collateral(&mut self, amount: u64) -> Result<()> {
        self.collateral = self
            .collateral
            .checked_sub(amount)
            .ok_or(error!(KeelError::MathUnderflow))?;
        Ok(())
    }

    pub fn add_debt(&mut self, amount: u64) -> Result<()> {
        self.debt = self
            .debt
            .checked_add(amount)
            .ok_or(error!(KeelError::MathOverflow))?;
        Ok(())
    }

    pub fn sub_debt(&mut self, amount: u64) -> Result<()> {
        self.debt = self
            .debt
            .checked_sub(amount)
            .ok_or(error!(KeelError::MathUnderflow))?;
        Ok(())
    }
}

/// A trove's balances including rewards it has not absorbed yet
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct EntirePosition {
    pub debt: u64,
    pub collateral: u64,
    pub pending_debt: u64,
    pub pending_collateral: u64,
}

#[account]
#[derive(Default)]
pub struct TroveBook {
    /// The protocol this book belongs to
    pub protocol: Pubkey,

    /// Arena capacity fixed at initialization
    pub max_troves: u32,

    pub troves: Vec<Trove>,

    /// Ids of all active troves, dense
    pub active: Vec<TroveId>,

    pub sorted: SortedTroveList,

    pub rewards: RewardAccumulator,

    /// Balances of active troves
    pub active_pool: PoolBalance,

    /// Redistributed balances not yet absorbed by any trove
    pub default_pool: PoolBalance,

    pub surplus: SurplusLedger,
}

impl TroveBook {
    /// Account size (discriminator included) for a book of `max_troves`
    pub fn space(max_troves: u32) -> usize {
        let n = max_troves as usize;
        8 + 32
            + 4
            + (4 + n * Trove::INIT_SPACE)
            + (4 + n * 4)
            + SortedTroveList::space(n)
            + RewardAccumulator::INIT_SPACE
            + 2 * PoolBalance::INIT_SPACE
            + SurplusLedger::space(n)
    }

    /// Heap a book of `max_troves` can take in one instruction. Vectors grow
    /// by doubling and the bump allocator never frees, so each one may cost
    /// up to four times its final length.
    pub fn heap_footprint(max_troves: u32) -> usize {
        let per_trove = size_of::<Trove>()
            + size_of::<TroveId>()
            + size_of::<RankEntry>()
            + size_of::<Option<u128>>()
            + size_of::<SurplusEntry>();
        4 * per_trove * max_troves as usize
    }

    /// Largest book that fits the heap frame next to the reserve
    pub fn max_capacity() -> u32 {
        ((HEAP_FRAME_BYTES - HEAP_RESERVE_BYTES) / Self::heap_footprint(1)) as u32
    }

    pub fn init(&mut self, protocol: Pubkey, max_troves: u32) {
        self.protocol = protocol;
        self.max_troves = max_troves;
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn trove(&self, id: TroveId) -> Result<&Trove> {
        self.troves
            .get(id as usize)
            .ok_or(error!(KeelError::TroveNotFound))
    }

    fn trove_mut(&mut self, id: TroveId) -> Result<&mut Trove> {
        self.troves
            .get_mut(id as usize)
            .ok_or(error!(KeelError::TroveNotFound))
    }

    fn active_trove_mut(&mut self, id: TroveId) -> Result<&mut Trove> {
        let trove = self.trove_mut(id)?;
        require!(trove.is_active(), KeelError::TroveNotActive);
        Ok(trove)
    }

    /// Unknown ids are simply not active
    pub fn is_active(&self, id: TroveId) -> bool {
        self.troves
            .get(id as usize)
            .map(Trove::is_active)
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn entire_system_collateral(&self) -> Result<u64> {
        self.active_pool
            .collateral
            .checked_add(self.default_pool.collateral)
            .ok_or(error!(KeelError::MathOverflow))
    }

    pub fn entire_system_debt(&self) -> Result<u64> {
        self.active_pool
            .debt
            .checked_add(self.default_pool.debt)
            .ok_or(error!(KeelError::MathOverflow))
    }

    pub fn pending_collateral_reward(&self, id: TroveId) -> Result<u64> {
        self.rewards.pending_collateral(self.trove(id)?)
    }

    pub fn pending_debt_reward(&self, id: TroveId) -> Result<u64> {
        self.rewards.pending_debt(self.trove(id)?)
    }

    pub fn entire_position(&self, id: TroveId) -> Result<EntirePosition> {
        let trove = self.trove(id)?;
        let pending_debt = self.rewards.pending_debt(trove)?;
        let pending_collateral = self.rewards.pending_collateral(trove)?;
        Ok(EntirePosition {
            debt: trove
                .debt
                .checked_add(pending_debt)
                .ok_or(error!(KeelError::MathOverflow))?,
            collateral: trove
                .collateral
                .checked_add(pending_collateral)
                .ok_or(error!(KeelError::MathOverflow))?,
            pending_debt,
            pending_collateral,
        })
    }

    /// ICR including pending rewards and `accrued_interest` not yet folded in
    pub fn current_icr(&self, id: TroveId, price: u128, accrued_interest: u64) -> Result<u128> {
        let position = self.entire_position(id)?;
        let debt = position
            .debt
            .checked_add(accrued_interest)
            .ok_or(error!(KeelError::MathOverflow))?;
        compute_cr(position.collateral, debt, price)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Allocate a fresh slot, stake it, rank it and add its balances to the
    /// active pool
    pub fn open_trove(
        &mut self,
        owner: Pubkey,
        collateral: u64,
        debt: u64,
        interest_rate_bps: u16,
        now: i64,
    ) -> Result<TroveId> {
        require!(
            (self.troves.len() as u64) < self.max_troves as u64,
            KeelError::TroveBookFull
        );

        let id = self.troves.len() as TroveId;
        let stake = self.rewards.compute_stake(collateral)?;
        let trove = Trove {
            owner,
            debt,
            collateral,
            stake,
            status: TroveStatus::Active,
            interest_rate_bps,
            last_interest_update: now,
            array_index: self.active.len() as u32,
            snapshot: self.rewards.snapshot(),
        };

        self.sorted.insert(id, trove.nominal_cr()?)?;
        self.rewards.add_stake(stake)?;
        self.active_pool.add_collateral(collateral)?;
        self.active_pool.add_debt(debt)?;
        self.troves.push(trove);
        self.active.push(id);

        Ok(id)
    }

    /// Fold pending redistribution rewards and `accrued_interest` into the
    /// trove. The pending share moves from the default pool to the active pool
    /// and the trove's reward snapshot catches up with the accumulators.
    pub fn apply_pending_rewards(
        &mut self,
        id: TroveId,
        accrued_interest: u64,
        now: i64,
    ) -> Result<EntirePosition> {
        require!(self.is_active(id), KeelError::TroveNotActive);
        let position = self.entire_position(id)?;
        let snapshot = self.rewards.snapshot();

        // Rounding can leave pending rewards a few units above what the
        // default pool holds
        let moved_collateral = position.pending_collateral.min(self.default_pool.collateral);
        let moved_debt = position.pending_debt.min(self.default_pool.debt);
        self.default_pool.sub_collateral(moved_collateral)?;
        self.default_pool.sub_debt(moved_debt)?;
        self.active_pool.add_collateral(moved_collateral)?;
        self.active_pool.add_debt(moved_debt)?;
        self.active_pool.add_debt(accrued_interest)?;

        let trove = self.active_trove_mut(id)?;
        trove.collateral = position.collateral;
        trove.debt = position
            .debt
            .checked_add(accrued_interest)
            .ok_or(error!(KeelError::MathOverflow))?;
        trove.snapshot = snapshot;
        trove.last_interest_update = now;

        Ok(EntirePosition {
            debt: trove.debt,
            collateral: trove.collateral,
            ..position
        })
    }

    pub fn increase_collateral(&mut self, id: TroveId, amount: u64) -> Result<()> {
        let trove = self.active_trove_mut(id)?;
        trove.collateral = trove
            .collateral
            .checked_add(amount)
            .ok_or(error!(KeelError::MathOverflow))?;
        self.active_pool.add_collateral(amount)
    }

    pub fn decrease_collateral(&mut self, id: TroveId, amount: u64) -> Result<()> {
        let trove = self.active_trove_mut(id)?;
        trove.collateral = trove
            .collateral
            .checked_sub(amount)
            .ok_or(error!(KeelError::InsufficientBalance))?;
        self.active_pool.sub_collateral(amount)
    }

    pub fn increase_debt(&mut self, id: TroveId, amount: u64) -> Result<()> {
        let trove = self.active_trove_mut(id)?;
        trove.debt = trove
            .debt
            .checked_add(amount)
            .ok_or(error!(KeelError::MathOverflow))?;
        self.active_pool.add_debt(amount)
    }

    pub fn decrease_debt(&mut self, id: TroveId, amount: u64) -> Result<()> {
        let trove = self.active_trove_mut(id)?;
        trove.debt = trove
            .debt
            .checked_sub(amount)
            .ok_or(error!(KeelError::MathUnderflow))?;
        self.active_pool.sub_debt(amount)
    }

    /// Recompute the trove's stake from its collateral and fix up total stakes
    pub fn update_stake(&mut self, id: TroveId) -> Result<u64> {
        let (old_stake, collateral) = {
            let trove = self.trove(id)?;
            (trove.stake, trove.collateral)
        };
        let new_stake = self.rewards.compute_stake(collateral)?;
        self.rewards.remove_stake(old_stake)?;
        self.rewards.add_stake(new_stake)?;
        self.active_trove_mut(id)?.stake = new_stake;
        Ok(new_stake)
    }

    pub fn remove_stake(&mut self, id: TroveId) -> Result<()> {
        let stake = self.trove(id)?.stake;
        self.rewards.remove_stake(stake)?;
        self.trove_mut(id)?.stake = 0;
        Ok(())
    }

    /// Move the trove in the sorted list to the position of its current NICR
    pub fn re_rank(&mut self, id: TroveId) -> Result<()> {
        let nicr = self.trove(id)?.nominal_cr()?;
        self.sorted.re_insert(id, nicr)
    }

    /// Take an active trove out of circulation.
    ///
    /// Zeroes the trove's balances without touching the pools; the caller
    /// decides where the balances went. The last active trove can never be
    /// closed.
    pub fn close_trove(&mut self, id: TroveId, status: TroveStatus) -> Result<()> {
        require!(self.is_active(id), KeelError::TroveNotActive);
        require!(self.active_count() > 1, KeelError::OnlyOneTroveInSystem);
        require!(status != TroveStatus::Active, KeelError::TroveNotActive);

        self.remove_stake(id)?;
        self.sorted.remove(id)?;

        let index = self.trove(id)?.array_index as usize;
        let moved = self.active.swap_remove(index);
        require!(moved == id, KeelError::TroveNotActive);
        if let Some(&relocated) = self.active.get(index) {
            self.trove_mut(relocated)?.array_index = index as u32;
        }

        let trove = self.trove_mut(id)?;
        trove.status = status;
        trove.collateral = 0;
        trove.debt = 0;
        trove.array_index = 0;
        trove.snapshot = RewardSnapshot::default();
        Ok(())
    }

    // =========================================================================
    // Redistribution
    // =========================================================================

    /// Spread an unabsorbed remainder over all stakes and park the balances in
    /// the default pool until troves absorb them
    pub fn redistribute(&mut self, collateral: u64, debt: u64) -> Result<()> {
        if collateral == 0 && debt == 0 {
            return Ok(());
        }
        self.rewards.distribute(collateral, debt)?;
        self.active_pool.sub_collateral(collateral)?;
        self.active_pool.sub_debt(debt)?;
        self.default_pool.add_collateral(collateral)?;
        self.default_pool.add_debt(debt)?;
        Ok(())
    }

    /// Snapshot total stakes and system collateral after a liquidation.
    /// `collateral_remainder` is still sitting in the active pool but is about
    /// to be paid out as gas compensation.
    pub fn refresh_system_snapshots(&mut self, collateral_remainder: u64) -> Result<()> {
        let total = self
            .active_pool
            .collateral
            .checked_sub(collateral_remainder)
            .ok_or(error!(KeelError::MathUnderflow))?
            .checked_add(self.default_pool.collateral)
            .ok_or(error!(KeelError::MathOverflow))?;
        self.rewards.refresh_snapshots(total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    fn owner(n: u8) -> Pubkey {
        Pubkey::new_from_array([n; 32])
    }

    fn book_with(troves: &[(u64, u64)]) -> TroveBook {
        let mut book = TroveBook::default();
        book.init(owner(0), 16);
        for (i, &(collateral, debt)) in troves.iter().enumerate() {
            book.open_trove(owner(i as u8 + 1), collateral, debt, 0, 0).unwrap();
        }
        book
    }

    #[test]
    fn capacity_is_bounded_by_the_heap_frame() {
        let max = TroveBook::max_capacity();
        assert!(max > 0);
        assert!(TroveBook::heap_footprint(max) + HEAP_RESERVE_BYTES <= HEAP_FRAME_BYTES);
        assert!(TroveBook::heap_footprint(max + 1) + HEAP_RESERVE_BYTES > HEAP_FRAME_BYTES);
    }

    #[test]
    fn open_tracks_pools_stakes_and_rank() {
        let book = book_with(&[(10 * ONE_COLLATERAL_TOKEN, 1_000 * ONE_DEBT_TOKEN), (5 * ONE_COLLATERAL_TOKEN, 1_000 * ONE_DEBT_TOKEN)]);
        assert_eq!(book.active_count(), 2);
        assert_eq!(book.active_pool.collateral, 15 * ONE_COLLATERAL_TOKEN);
        assert_eq!(book.active_pool.debt, 2_000 * ONE_DEBT_TOKEN);
        assert_eq!(book.rewards.total_stakes, 15 * ONE_COLLATERAL_TOKEN as u128);
        assert_eq!(book.sorted.last(), Some(1));
        assert_eq!(book.sorted.first(), Some(0));
    }

    #[test]
    fn book_capacity_is_enforced() {
        let mut book = TroveBook::default();
        book.init(owner(0), 1);
        book.open_trove(owner(1), 10, 10, 0, 0).unwrap();
        assert_eq!(
            book.open_trove(owner(2), 10, 10, 0, 0).unwrap_err(),
            error!(KeelError::TroveBookFull)
        );
    }

    #[test]
    fn close_swaps_last_into_vacated_slot() {
        let mut book = book_with(&[(100, 10), (200, 10), (300, 10)]);
        book.close_trove(0, TroveStatus::ClosedByOwner).unwrap();

        assert_eq!(book.active, vec![2, 1]);
        assert_eq!(book.trove(2).unwrap().array_index, 0);
        assert_eq!(book.trove(1).unwrap().array_index, 1);
        assert_eq!(book.trove(0).unwrap().status, TroveStatus::ClosedByOwner);
        assert!(!book.sorted.contains(0));
        assert_eq!(book.rewards.total_stakes, 500);
    }

    #[test]
    fn last_trove_cannot_be_closed() {
        let mut book = book_with(&[(100, 10), (200, 10)]);
        book.close_trove(1, TroveStatus::ClosedByLiquidation).unwrap();
        assert_eq!(
            book.close_trove(0, TroveStatus::ClosedByOwner).unwrap_err(),
            error!(KeelError::OnlyOneTroveInSystem)
        );
        assert_eq!(
            book.close_trove(1, TroveStatus::ClosedByOwner).unwrap_err(),
            error!(KeelError::TroveNotActive)
        );
    }

    #[test]
    fn redistributed_rewards_are_absorbed_on_touch() {
        let mut book = book_with(&[(300, 30), (100, 10)]);
        book.redistribute(40, 8).unwrap();

        assert_eq!(book.default_pool, PoolBalance { collateral: 40, debt: 8 });
        assert_eq!(book.pending_collateral_reward(0).unwrap(), 30);
        assert_eq!(book.pending_debt_reward(0).unwrap(), 6);

        let position = book.apply_pending_rewards(0, 5, 60).unwrap();
        assert_eq!(position.collateral, 330);
        assert_eq!(position.debt, 41);
        assert_eq!(book.default_pool, PoolBalance { collateral: 10, debt: 2 });
        assert_eq!(book.active_pool.collateral, 400 - 40 + 30);
        assert_eq!(book.active_pool.debt, 40 - 8 + 6 + 5);
        assert_eq!(book.pending_collateral_reward(0).unwrap(), 0);
        assert_eq!(book.trove(0).unwrap().last_interest_update, 60);

        // System totals are unchanged by absorbing rewards, only by interest
        assert_eq!(book.entire_system_collateral().unwrap(), 400);
        assert_eq!(book.entire_system_debt().unwrap(), 45);
    }

    #[test]
    fn current_icr_includes_pending_rewards() {
        let mut book = book_with(&[(300, 30), (100, 10)]);
        let price = DECIMAL_PRECISION;
        assert_eq!(book.current_icr(1, price, 0).unwrap(), 10 * DECIMAL_PRECISION);
        book.redistribute(100, 30).unwrap();
        // (100 + 25) / (10 + 7) with the 1e18 price
        assert_eq!(
            book.current_icr(1, price, 0).unwrap(),
            125 * DECIMAL_PRECISION / 17
        );
    }

    #[test]
    fn snapshots_exclude_gas_compensation() {
        let mut book = book_with(&[(300, 30), (100, 10)]);
        book.redistribute(50, 5).unwrap();
        book.refresh_system_snapshots(20).unwrap();
        assert_eq!(book.rewards.total_collateral_snapshot, 380);
        assert_eq!(book.rewards.total_stakes_snapshot, 400);
    }
}
