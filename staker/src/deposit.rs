//! Per-deposit records and the arena that owns them.

use crate::accrual::SCALE_FACTOR;
use crate::error::StakerError;
use regen_types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier for a deposit.
///
/// Ids are allocated sequentially and never reused; the record behind an id
/// is never deleted, so historical claimer/delegatee linkage survives a
/// full withdrawal.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DepositId(u64);

impl DepositId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DepositId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single deposit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deposit {
    pub owner: Address,
    pub delegatee: Address,
    /// Address entitled to claim rewards alongside the owner.
    pub claimer: Address,
    pub balance: u128,
    /// Oracle-derived weight used for reward share.
    pub earning_power: u128,
    /// Rewards accrued but not yet claimed/compounded/contributed.
    pub unclaimed_reward: u128,
    /// The accumulator value this deposit last settled against (scaled).
    pub reward_per_power_paid: u128,
}

impl Deposit {
    /// Settle newly accrued rewards against the global accumulator.
    ///
    /// `unclaimed += earning_power × (accumulated − paid) / SCALE`, then the
    /// paid checkpoint catches up. Loses at most one smallest unit to
    /// truncation per call.
    pub fn sync(&mut self, reward_per_power_accumulated: u128) -> Result<(), StakerError> {
        let delta = reward_per_power_accumulated
            .checked_sub(self.reward_per_power_paid)
            .ok_or(StakerError::Overflow)?;
        let newly_accrued = self
            .earning_power
            .checked_mul(delta)
            .ok_or(StakerError::Overflow)?
            / SCALE_FACTOR;
        self.unclaimed_reward = self
            .unclaimed_reward
            .checked_add(newly_accrued)
            .ok_or(StakerError::Overflow)?;
        self.reward_per_power_paid = reward_per_power_accumulated;
        Ok(())
    }
}

/// Append-only arena of deposits keyed by [`DepositId`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepositArena {
    next_id: u64,
    deposits: BTreeMap<DepositId, Deposit>,
}

impl DepositArena {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            deposits: BTreeMap::new(),
        }
    }

    /// Append a deposit, returning its freshly allocated id.
    pub fn insert(&mut self, deposit: Deposit) -> Result<DepositId, StakerError> {
        let id = DepositId::new(self.next_id);
        self.next_id = self.next_id.checked_add(1).ok_or(StakerError::Overflow)?;
        self.deposits.insert(id, deposit);
        Ok(id)
    }

    /// Re-insert a deposit under a known id (restore path only).
    pub fn restore(&mut self, id: DepositId, deposit: Deposit) {
        self.deposits.insert(id, deposit);
        if id.raw() >= self.next_id {
            self.next_id = id.raw() + 1;
        }
    }

    /// The id the next insert will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Ensure the next allocated id is at least `next_id` (restore path).
    pub fn reserve_through(&mut self, next_id: u64) {
        if next_id > self.next_id {
            self.next_id = next_id;
        }
    }

    pub fn get(&self, id: DepositId) -> Result<&Deposit, StakerError> {
        self.deposits
            .get(&id)
            .ok_or(StakerError::DepositNotFound(id.raw()))
    }

    pub fn get_mut(&mut self, id: DepositId) -> Result<&mut Deposit, StakerError> {
        self.deposits
            .get_mut(&id)
            .ok_or(StakerError::DepositNotFound(id.raw()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (DepositId, &Deposit)> {
        self.deposits.iter().map(|(id, d)| (*id, d))
    }

    pub fn len(&self) -> usize {
        self.deposits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty()
    }
}

impl Default for DepositArena {
    fn default() -> Self {
        Self::new()
    }
}
