//! Address membership oracles.

use regen_types::Address;
use std::collections::HashSet;
use std::sync::RwLock;

/// A membership check against an externally-owned whitelist.
pub trait WhitelistOracle: Send + Sync {
    fn is_whitelisted(&self, address: &Address) -> bool;
}

/// A plain mutable address set.
pub struct AddressWhitelist {
    members: RwLock<HashSet<Address>>,
}

impl AddressWhitelist {
    pub fn new() -> Self {
        Self {
            members: RwLock::new(HashSet::new()),
        }
    }

    /// Build a whitelist pre-populated with `members`.
    pub fn with_members(members: impl IntoIterator<Item = Address>) -> Self {
        Self {
            members: RwLock::new(members.into_iter().collect()),
        }
    }

    pub fn add(&self, address: Address) {
        self.members.write().unwrap().insert(address);
    }

    pub fn remove(&self, address: &Address) {
        self.members.write().unwrap().remove(address);
    }

    pub fn len(&self) -> usize {
        self.members.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AddressWhitelist {
    fn default() -> Self {
        Self::new()
    }
}

impl WhitelistOracle for AddressWhitelist {
    fn is_whitelisted(&self, address: &Address) -> bool {
        self.members.read().unwrap().contains(address)
    }
}
