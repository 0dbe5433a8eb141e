//! Store trait for persisting staker engine state.

use crate::StoreError;

/// Durable storage for the staker engine.
///
/// Records are opaque `Vec<u8>` so the store does not depend on the engine
/// crate (which would create a circular dependency). The engine
/// serializes/deserializes its own types.
pub trait StakerStore: Send + Sync {
    fn get_deposit(&self, id: u64) -> Result<Option<Vec<u8>>, StoreError>;
    fn put_deposit(&self, id: u64, record: &[u8]) -> Result<(), StoreError>;
    fn iter_deposits(&self) -> Result<Vec<(u64, Vec<u8>)>, StoreError>;

    fn get_meta(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn put_meta(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
}
