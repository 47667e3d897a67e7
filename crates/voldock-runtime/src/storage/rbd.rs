use crate::command::{exec, exec_line, exec_unchecked};
use crate::error::{Result, RuntimeError};
use crate::storage::StorageBackend;
use crate::types::{DriverOptions, VolumeRef};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

const MIB: u64 = 1024 * 1024;

/// Settings for the RBD backend
#[derive(Debug, Clone)]
pub struct RbdConfig {
    /// Path to the `rbd` binary
    pub rbd_binary: String,
}

impl Default for RbdConfig {
    fn default() -> Self {
        Self {
            rbd_binary: "rbd".to_string(),
        }
    }
}

/// Ceph RBD storage backend
///
/// Manages images, filesystems and snapshots by driving the `rbd` CLI.
pub struct RbdStorageBackend {
    config: RbdConfig,
}

impl RbdStorageBackend {
    pub fn new(config: RbdConfig) -> Self {
        Self { config }
    }

    async fn rbd(&self, args: &[&str]) -> Result<String> {
        Ok(exec(&self.config.rbd_binary, args).await?.stdout)
    }
}

/// Image size in whole MiB, rounded up (`rbd --size` takes MiB)
pub fn size_in_mib(bytes: u64) -> u64 {
    bytes.div_ceil(MIB).max(1)
}

fn snapshot_spec(volume: &VolumeRef, snapshot: &str) -> String {
    format!("{}@{}", volume, snapshot)
}

/// True when `rbd` reported that the image is missing
fn is_missing_image(stderr: &str) -> bool {
    stderr.contains("No such file or directory") || stderr.contains("image does not exist")
}

#[derive(Debug, Deserialize)]
struct RbdSnapshot {
    id: u64,
    name: String,
}

/// Parse `rbd snap ls --format json` output into names, oldest first
fn parse_snapshot_list(json: &str) -> Result<Vec<String>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut snapshots: Vec<RbdSnapshot> = serde_json::from_str(json).map_err(|e| {
        RuntimeError::internal_error(format!("Malformed rbd snapshot list: {}", e))
    })?;

    // Snapshot ids increase monotonically with creation time
    snapshots.sort_by_key(|s| s.id);
    Ok(snapshots.into_iter().map(|s| s.name).collect())
}

#[async_trait]
impl StorageBackend for RbdStorageBackend {
    fn name(&self) -> &'static str {
        "rbd"
    }

    async fn create(&self, opts: &DriverOptions) -> Result<()> {
        let image = opts.volume_ref().to_string();
        let size = size_in_mib(opts.volume.size).to_string();
        info!("Creating RBD image {} ({} MiB)", image, size);

        let output = exec_unchecked(&self.config.rbd_binary, &["create", &image, "--size", &size])
            .await?;
        if !output.success() {
            if output.stderr.contains("File exists") {
                return Err(RuntimeError::volume_already_exists(image));
            }
            return Err(RuntimeError::command_failed(
                format!("{} create {}", self.config.rbd_binary, image),
                output.exit_code,
                output.stderr.trim(),
            ));
        }

        info!("RBD image created: {}", image);
        Ok(())
    }

    async fn format(&self, opts: &DriverOptions) -> Result<()> {
        let image = opts.volume_ref().to_string();
        let device = self.rbd(&["map", &image]).await?.trim().to_string();
        if device.is_empty() {
            return Err(RuntimeError::backend_error(&image, "rbd map returned no device"));
        }

        let command = opts.fs_options.create_command.render(&device);
        info!("Formatting {} ({}) with: {}", image, device, command);
        let result = exec_line(&command).await;

        // Unmap even when formatting failed
        if let Err(e) = self.rbd(&["unmap", &device]).await {
            warn!("Failed to unmap {} after formatting {}: {}", device, image, e);
        }

        result?;
        info!("RBD image formatted: {}", image);
        Ok(())
    }

    async fn destroy(&self, opts: &DriverOptions) -> Result<()> {
        let image = opts.volume_ref().to_string();
        info!("Destroying RBD image {}", image);

        let output = exec_unchecked(&self.config.rbd_binary, &["rm", &image]).await?;
        if !output.success() {
            if is_missing_image(&output.stderr) {
                return Err(RuntimeError::volume_not_found(image));
            }
            return Err(RuntimeError::command_failed(
                format!("{} rm {}", self.config.rbd_binary, image),
                output.exit_code,
                output.stderr.trim(),
            ));
        }

        info!("RBD image destroyed: {}", image);
        Ok(())
    }

    async fn list_snapshots(&self, volume: &VolumeRef) -> Result<Vec<String>> {
        let image = volume.to_string();
        let stdout = self.rbd(&["snap", "ls", &image, "--format", "json"]).await?;
        parse_snapshot_list(&stdout)
    }

    async fn create_snapshot(&self, volume: &VolumeRef, label: &str) -> Result<()> {
        let snap = snapshot_spec(volume, label);
        self.rbd(&["snap", "create", &snap]).await?;
        info!("RBD snapshot created: {}", snap);
        Ok(())
    }

    async fn remove_snapshot(&self, volume: &VolumeRef, snapshot: &str) -> Result<()> {
        let snap = snapshot_spec(volume, snapshot);
        self.rbd(&["snap", "rm", &snap]).await?;
        info!("RBD snapshot removed: {}", snap);
        Ok(())
    }
}
