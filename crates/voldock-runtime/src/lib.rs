// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

//! Voldock Runtime - Volume lifecycle against pluggable storage backends
//!
//! This crate provides:
//! - StorageBackend trait with mock and RBD implementations
//! - VolumeOrchestrator: create, format and remove, each time-bounded
//! - VolumeManager: lifecycle plus per-volume records in the store

pub mod command;
pub mod error;
pub mod manager;
pub mod orchestrator;
pub mod storage;
pub mod timeout;
pub mod types;

// Re-export primary types
pub use error::{Result, RuntimeError};
pub use manager::VolumeManager;
pub use orchestrator::{resolve_fs_command, VolumeOrchestrator};
pub use types::{DriverOptions, DriverVolume, FsOptions, Params, VolumeRef, POOL_PARAM};

// Re-export storage types
pub use storage::{
    BackendCall, MockStorageBackend, RbdConfig, RbdStorageBackend, StorageBackend,
};
