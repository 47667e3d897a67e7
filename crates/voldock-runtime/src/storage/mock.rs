use crate::error::{Result, RuntimeError};
use crate::storage::StorageBackend;
use crate::types::{DriverOptions, VolumeRef};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// A call received by the mock backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Create(String),
    Format(String),
    Destroy(String),
    ListSnapshots(String),
    CreateSnapshot(String, String),
    RemoveSnapshot(String, String),
}

#[derive(Debug, Clone)]
struct MockVolume {
    size: u64,
    fs_type: Option<String>,
    snapshots: Vec<String>,
}

/// In-memory storage backend for tests and development
///
/// Volumes are keyed by `pool/name`. Every mutation happens under one
/// write lock, so concurrent destroys of the same volume resolve to exactly
/// one success. Latency and per-item failures can be injected.
#[derive(Default)]
pub struct MockStorageBackend {
    volumes: Arc<RwLock<HashMap<String, MockVolume>>>,
    calls: Arc<RwLock<Vec<BackendCall>>>,
    latency: Arc<RwLock<Option<Duration>>>,
    failing_formats: Arc<RwLock<HashSet<String>>>,
    failing_snapshot_removals: Arc<RwLock<HashSet<String>>>,
}

impl MockStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before acting
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().await = latency;
    }

    /// Make `format` fail for the given filesystem type
    pub async fn fail_format_for(&self, fs_type: &str) {
        self.failing_formats.write().await.insert(fs_type.to_string());
    }

    /// Make `remove_snapshot` fail for the given snapshot
    pub async fn fail_snapshot_removal(&self, snapshot: &str) {
        self.failing_snapshot_removals
            .write()
            .await
            .insert(snapshot.to_string());
    }

    /// Add a volume with existing snapshots, bypassing `create`
    pub async fn seed_volume(&self, volume: &VolumeRef, size: u64, snapshots: &[&str]) {
        self.volumes.write().await.insert(
            volume.to_string(),
            MockVolume {
                size,
                fs_type: None,
                snapshots: snapshots.iter().map(|s| s.to_string()).collect(),
            },
        );
    }

    pub async fn volume_exists(&self, volume: &VolumeRef) -> bool {
        self.volumes.read().await.contains_key(&volume.to_string())
    }

    pub async fn volume_size(&self, volume: &VolumeRef) -> Option<u64> {
        self.volumes
            .read()
            .await
            .get(&volume.to_string())
            .map(|v| v.size)
    }

    /// Filesystem the volume was formatted with, if any
    pub async fn formatted_with(&self, volume: &VolumeRef) -> Option<String> {
        self.volumes
            .read()
            .await
            .get(&volume.to_string())
            .and_then(|v| v.fs_type.clone())
    }

    pub async fn snapshots(&self, volume: &VolumeRef) -> Vec<String> {
        self.volumes
            .read()
            .await
            .get(&volume.to_string())
            .map(|v| v.snapshots.clone())
            .unwrap_or_default()
    }

    /// Every call received so far, in order
    pub async fn calls(&self) -> Vec<BackendCall> {
        self.calls.read().await.clone()
    }

    async fn record(&self, call: BackendCall) {
        let latency = *self.latency.read().await;
        self.calls.write().await.push(call);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl StorageBackend for MockStorageBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create(&self, opts: &DriverOptions) -> Result<()> {
        let volume = opts.volume_ref();
        self.record(BackendCall::Create(volume.to_string())).await;

        let mut volumes = self.volumes.write().await;
        let key = volume.to_string();
        if volumes.contains_key(&key) {
            return Err(RuntimeError::volume_already_exists(key));
        }
        volumes.insert(
            key,
            MockVolume {
                size: opts.volume.size,
                fs_type: None,
                snapshots: Vec::new(),
            },
        );
        debug!("Mock: created volume {} ({} bytes)", volume, opts.volume.size);
        Ok(())
    }

    async fn format(&self, opts: &DriverOptions) -> Result<()> {
        let volume = opts.volume_ref();
        self.record(BackendCall::Format(volume.to_string())).await;

        let fs_type = &opts.fs_options.fs_type;
        if self.failing_formats.read().await.contains(fs_type) {
            return Err(RuntimeError::command_failed(
                opts.fs_options.create_command.render("/dev/mock0"),
                1,
                format!("mock format failure for {}", fs_type),
            ));
        }

        let mut volumes = self.volumes.write().await;
        let entry = volumes
            .get_mut(&volume.to_string())
            .ok_or_else(|| RuntimeError::volume_not_found(volume.to_string()))?;
        entry.fs_type = Some(fs_type.clone());
        debug!("Mock: formatted volume {} as {}", volume, fs_type);
        Ok(())
    }

    async fn destroy(&self, opts: &DriverOptions) -> Result<()> {
        let volume = opts.volume_ref();
        self.record(BackendCall::Destroy(volume.to_string())).await;

        match self.volumes.write().await.remove(&volume.to_string()) {
            Some(_) => {
                debug!("Mock: destroyed volume {}", volume);
                Ok(())
            }
            None => Err(RuntimeError::volume_not_found(volume.to_string())),
        }
    }

    async fn list_snapshots(&self, volume: &VolumeRef) -> Result<Vec<String>> {
        self.record(BackendCall::ListSnapshots(volume.to_string()))
            .await;

        self.volumes
            .read()
            .await
            .get(&volume.to_string())
            .map(|v| v.snapshots.clone())
            .ok_or_else(|| RuntimeError::volume_not_found(volume.to_string()))
    }

    async fn create_snapshot(&self, volume: &VolumeRef, label: &str) -> Result<()> {
        self.record(BackendCall::CreateSnapshot(
            volume.to_string(),
            label.to_string(),
        ))
        .await;

        let mut volumes = self.volumes.write().await;
        let entry = volumes
            .get_mut(&volume.to_string())
            .ok_or_else(|| RuntimeError::volume_not_found(volume.to_string()))?;
        if entry.snapshots.iter().any(|s| s == label) {
            return Err(RuntimeError::backend_error(
                volume.to_string(),
                format!("snapshot {} already exists", label),
            ));
        }
        entry.snapshots.push(label.to_string());
        debug!("Mock: created snapshot {}@{}", volume, label);
        Ok(())
    }

    async fn remove_snapshot(&self, volume: &VolumeRef, snapshot: &str) -> Result<()> {
        self.record(BackendCall::RemoveSnapshot(
            volume.to_string(),
            snapshot.to_string(),
        ))
        .await;

        if self.failing_snapshot_removals.read().await.contains(snapshot) {
            return Err(RuntimeError::backend_error(
                volume.to_string(),
                format!("mock failure removing snapshot {}", snapshot),
            ));
        }

        let mut volumes = self.volumes.write().await;
        let entry = volumes
            .get_mut(&volume.to_string())
            .ok_or_else(|| RuntimeError::volume_not_found(volume.to_string()))?;
        let index = entry
            .snapshots
            .iter()
            .position(|s| s == snapshot)
            .ok_or_else(|| RuntimeError::snapshot_not_found(volume.to_string(), snapshot))?;
        entry.snapshots.remove(index);
        debug!("Mock: removed snapshot {}@{}", volume, snapshot);
        Ok(())
    }
}
