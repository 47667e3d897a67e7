use crate::{KVStore, Result, StorageError};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// In-process store backend
///
/// Used for tests and single-node development. `set_available(false)`
/// simulates an unreachable store: every call fails with `Unavailable`
/// until it is switched back on.
pub struct MemoryBackend {
    records: RwLock<BTreeMap<Vec<u8>, Bytes>>,
    available: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Bring the simulated store up or down
    pub fn set_available(&self, available: bool) {
        debug!("Memory store available: {}", available);
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::unavailable("memory store is offline", None))
        }
    }
}

impl KVStore for MemoryBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.check_available()?;
        Ok(self.records.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_available()?;
        self.records
            .write()
            .insert(key.to_vec(), Bytes::copy_from_slice(value));
        Ok(())
    }

    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_available()?;
        match self.records.write().entry(key.to_vec()) {
            Entry::Vacant(entry) => {
                entry.insert(Bytes::copy_from_slice(value));
                Ok(())
            }
            Entry::Occupied(_) => Err(StorageError::already_exists(String::from_utf8_lossy(key))),
        }
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_available()?;
        match self.records.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::key_not_found(String::from_utf8_lossy(key))),
        }
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        self.check_available()?;
        let records = self.records.read();
        Ok(records
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (Bytes::from(key.clone()), value.clone()))
            .collect())
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Bytes>> {
        Ok(self.scan(prefix)?.into_iter().map(|(key, _)| key).collect())
    }
}
