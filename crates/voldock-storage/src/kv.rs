use crate::Result;
use bytes::Bytes;

/// Client contract for the shared key-value store.
///
/// Implementations must keep "key absent" (`Ok(None)` / `KeyNotFound`)
/// distinguishable from "store unreachable" (`Unavailable`). Every write is
/// visible to reads that start after it returns.
pub trait KVStore: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Put a key-value pair, overwriting any prior value
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Put a key-value pair only if the key is absent. Fails with
    /// `AlreadyExists` otherwise; the check and the write are atomic.
    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key. Fails with `KeyNotFound` if it did not exist; the
    /// check and the removal are atomic.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Scan keys with a given prefix, in key order
    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>>;

    /// Get all keys with a given prefix, in key order
    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Bytes>>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
