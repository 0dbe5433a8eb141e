//! In-memory store — thread-safe backend for tests and embedders.

use crate::staker::StakerStore;
use crate::StoreError;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// An in-memory [`StakerStore`].
pub struct MemoryStore {
    deposits: Mutex<BTreeMap<u64, Vec<u8>>>,
    meta: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            deposits: Mutex::new(BTreeMap::new()),
            meta: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StakerStore for MemoryStore {
    fn get_deposit(&self, id: u64) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.deposits.lock().unwrap().get(&id).cloned())
    }

    fn put_deposit(&self, id: u64, record: &[u8]) -> Result<(), StoreError> {
        self.deposits.lock().unwrap().insert(id, record.to_vec());
        Ok(())
    }

    fn iter_deposits(&self) -> Result<Vec<(u64, Vec<u8>)>, StoreError> {
        Ok(self
            .deposits
            .lock()
            .unwrap()
            .iter()
            .map(|(id, bytes)| (*id, bytes.clone()))
            .collect())
    }

    fn get_meta(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.meta.lock().unwrap().get(key).cloned())
    }

    fn put_meta(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.meta
            .lock()
            .unwrap()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}
