use crate::{KVStore, Result, StorageError};
use bytes::Bytes;
use redb::{Database, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

// Table definitions
const RECORDS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");

/// redb-based store backend
///
/// Durable and file-backed. Every redb failure is reported as
/// `StorageError::Unavailable`.
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Create a new RedbBackend
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening redb database at: {}", path.as_ref().display());

        let db = Database::create(path.as_ref()).map_err(|e| {
            StorageError::unavailable(
                format!("Failed to create database: {}", e),
                Some(Box::new(e)),
            )
        })?;

        // Create the table if it doesn't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS_TABLE)?;
        }
        write_txn.commit()?;

        info!("redb database initialized successfully");

        Ok(Self { db: Arc::new(db) })
    }

    fn collect_prefix(&self, prefix: &[u8], with_values: bool) -> Result<Vec<(Bytes, Bytes)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECORDS_TABLE)?;

        let mut results = Vec::new();

        // Keys are ordered, so everything with the prefix is contiguous
        for entry in table.range::<&[u8]>(prefix..)? {
            let (key, value) = entry?;
            let key_bytes = key.value();

            if !key_bytes.starts_with(prefix) {
                break;
            }

            let value = if with_values {
                Bytes::from(value.value().to_vec())
            } else {
                Bytes::new()
            };
            results.push((Bytes::from(key_bytes.to_vec()), value));
        }

        debug!(
            "Prefix {:?} matched {} keys",
            String::from_utf8_lossy(prefix),
            results.len()
        );
        Ok(results)
    }
}

impl KVStore for RedbBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        debug!("Getting key: {:?}", String::from_utf8_lossy(key));

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RECORDS_TABLE)?;

        match table.get(key)? {
            Some(value) => Ok(Some(Bytes::from(value.value().to_vec()))),
            None => Ok(None),
        }
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        debug!("Putting key: {:?}", String::from_utf8_lossy(key));

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RECORDS_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;

        Ok(())
    }

    fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<()> {
        debug!("Creating key: {:?}", String::from_utf8_lossy(key));

        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(RECORDS_TABLE)?;
            let previous = table.insert(key, value)?;
            previous.is_some()
        };

        if existed {
            write_txn.abort()?;
            return Err(StorageError::already_exists(String::from_utf8_lossy(key)));
        }

        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        debug!("Deleting key: {:?}", String::from_utf8_lossy(key));

        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(RECORDS_TABLE)?;
            let removed = table.remove(key)?;
            removed.is_some()
        };

        if !existed {
            write_txn.abort()?;
            return Err(StorageError::key_not_found(String::from_utf8_lossy(key)));
        }

        write_txn.commit()?;
        Ok(())
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Bytes, Bytes)>> {
        self.collect_prefix(prefix, true)
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Bytes>> {
        Ok(self
            .collect_prefix(prefix, false)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_redb_backend_basic_operations() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.redb");
        let backend = RedbBackend::new(&db_path).unwrap();

        // Test put and get
        backend.put(b"key1", b"value1").unwrap();
        let value = backend.get(b"key1").unwrap();
        assert_eq!(value, Some(Bytes::from("value1")));

        // Test exists
        assert!(backend.exists(b"key1").unwrap());
        assert!(!backend.exists(b"key2").unwrap());

        // Test delete
        backend.delete(b"key1").unwrap();
        let value = backend.get(b"key1").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_redb_backend_delete_missing_key() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::new(dir.path().join("test.redb")).unwrap();

        let err = backend.delete(b"missing").unwrap_err();
        assert!(err.is_not_found());

        // The store is still usable after the aborted delete
        backend.put(b"key", b"value").unwrap();
        assert!(backend.exists(b"key").unwrap());
    }

    #[test]
    fn test_redb_backend_put_if_absent() {
        let dir = tempdir().unwrap();
        let backend = RedbBackend::new(dir.path().join("test.redb")).unwrap();

        backend.put_if_absent(b"key", b"first").unwrap();
        let err = backend.put_if_absent(b"key", b"second").unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));

        // The aborted insert left the first value in place
        assert_eq!(backend.get(b"key").unwrap(), Some(Bytes::from("first")));
    }

    #[test]
    fn test_redb_backend_scan() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.redb");
        let backend = RedbBackend::new(&db_path).unwrap();

        // Insert multiple keys with same prefix
        backend.put(b"prefix/key1", b"value1").unwrap();
        backend.put(b"prefix/key2", b"value2").unwrap();
        backend.put(b"other/key3", b"value3").unwrap();
        backend.put(b"prefiy", b"value4").unwrap();

        let results = backend.scan(b"prefix/").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, Bytes::from("prefix/key1"));
        assert_eq!(results[1].1, Bytes::from("value2"));

        let keys = backend.keys_with_prefix(b"prefix/").unwrap();
        assert_eq!(keys.len(), 2);
        assert!(backend.keys_with_prefix(b"none/").unwrap().is_empty());
    }

    #[test]
    fn test_redb_backend_reopen_is_durable() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let backend = RedbBackend::new(&db_path).unwrap();
            backend.put(b"durable", b"yes").unwrap();
        }

        let backend = RedbBackend::new(&db_path).unwrap();
        assert_eq!(backend.get(b"durable").unwrap(), Some(Bytes::from("yes")));
    }
}
