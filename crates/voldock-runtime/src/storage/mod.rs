mod mock;
mod rbd;

pub use mock::{BackendCall, MockStorageBackend};
pub use rbd::{RbdConfig, RbdStorageBackend};

use crate::error::Result;
use crate::types::{DriverOptions, VolumeRef};
use async_trait::async_trait;

/// Trait for pluggable block-storage backends
///
/// `RbdStorageBackend` drives Ceph RBD through the `rbd` CLI.
/// `MockStorageBackend` keeps volumes and snapshots in memory for tests
/// and development.
///
/// Implementations arbitrate races on the same volume: when several
/// `destroy` calls target one volume, exactly one succeeds and the others
/// fail with `RuntimeError::VolumeNotFound`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Create a block device of `opts.volume.size` bytes.
    async fn create(&self, opts: &DriverOptions) -> Result<()>;

    /// Put a filesystem on the volume with `opts.fs_options.create_command`.
    async fn format(&self, opts: &DriverOptions) -> Result<()>;

    /// Destroy the volume and its snapshots.
    async fn destroy(&self, opts: &DriverOptions) -> Result<()>;

    /// Snapshot identifiers, oldest first.
    async fn list_snapshots(&self, volume: &VolumeRef) -> Result<Vec<String>>;

    /// Create a snapshot named `label`.
    async fn create_snapshot(&self, volume: &VolumeRef, label: &str) -> Result<()>;

    /// Remove one snapshot.
    async fn remove_snapshot(&self, volume: &VolumeRef, snapshot: &str) -> Result<()>;
}
