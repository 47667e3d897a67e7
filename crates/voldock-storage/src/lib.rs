//! Voldock Storage - Shared policy and volume configuration store
//!
//! This crate provides:
//! - KVStore trait: the Get/Set/Delete/List contract of the shared store
//! - redb-based durable implementation
//! - In-memory implementation with outage simulation
//! - Key layout encoding
//! - ConfigStore: typed policy, volume and global records

pub mod config_store;
pub mod encoding;
pub mod error;
pub mod kv;
pub mod memory;
pub mod redb_backend;

// Re-export commonly used types
pub use config_store::ConfigStore;
pub use encoding::{KeyEncoder, RecordKind, DEFAULT_PREFIX};
pub use error::{Result, StorageError};
pub use kv::KVStore;
pub use memory::MemoryBackend;
pub use redb_backend::RedbBackend;
