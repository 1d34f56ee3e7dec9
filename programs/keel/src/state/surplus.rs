// =============================================================================
// Collateral Surplus Ledger
// =============================================================================
// Collateral that belongs to the owner of a closed trove: the excess above
// 110% of debt taken in a capped recovery-mode liquidation, or what is left
// after a trove is fully redeemed. It is credited by the engine and only ever
// leaves through an explicit claim. The tokens themselves stay in the
// collateral vault until claimed.
// =============================================================================

use anchor_lang::prelude::*;

use crate::error::KeelError;

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug, InitSpace)]
pub struct SurplusEntry {
    pub owner: Pubkey,
    pub amount: u64,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Default, Debug)]
pub struct SurplusLedger {
    /// Sorted by owner, at most one entry per owner
    pub entries: Vec<SurplusEntry>,

    /// Sum of all claimable amounts
    pub total: u64,
}

impl SurplusLedger {
    pub fn space(capacity: usize) -> usize {
        4 + capacity * SurplusEntry::INIT_SPACE + 8
    }

    pub fn claimable(&self, owner: &Pubkey) -> u64 {
        self.entries
            .binary_search_by(|entry| entry.owner.cmp(owner))
            .map(|at| self.entries[at].amount)
            .unwrap_or(0)
    }

    pub fn credit(&mut self, owner: Pubkey, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        self.total = self
            .total
            .checked_add(amount)
            .ok_or(error!(KeelError::MathOverflow))?;

        match self.entries.binary_search_by(|entry| entry.owner.cmp(&owner)) {
            Ok(at) => {
                let entry = &mut self.entries[at];
                entry.amount = entry
                    .amount
                    .checked_add(amount)
                    .ok_or(error!(KeelError::MathOverflow))?;
            }
            Err(at) => self.entries.insert(at, SurplusEntry { owner, amount }),
        }
        Ok(())
    }

    /// Remove and return everything claimable by `owner`
    pub fn claim(&mut self, owner: &Pubkey) -> Result<u64> {
        let at = self
            .entries
            .binary_search_by(|entry| entry.owner.cmp(owner))
            .map_err(|_| error!(KeelError::NoCollateralSurplus))?;
        let entry = self.entries.remove(at);
        self.total = self
            .total
            .checked_sub(entry.amount)
            .ok_or(error!(KeelError::MathUnderflow))?;
        Ok(entry.amount)
    }
}
