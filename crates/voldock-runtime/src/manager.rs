use crate::error::{Result, RuntimeError};
use crate::orchestrator::VolumeOrchestrator;
use crate::types::DriverOptions;
use std::collections::BTreeMap;
use tracing::{error, info, warn};
use voldock_core::{VolumeConfig, VolumeRequest};
use voldock_storage::ConfigStore;

/// Volume lifecycle on top of the shared store
///
/// Reads policies and the global timeout from the store, drives the
/// orchestrator, and keeps the per-volume records in step.
#[derive(Clone)]
pub struct VolumeManager {
    store: ConfigStore,
    orchestrator: VolumeOrchestrator,
}

impl VolumeManager {
    pub fn new(store: ConfigStore, orchestrator: VolumeOrchestrator) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Create, format and record a volume
    ///
    /// A volume that fails to format stays created and has no record.
    pub async fn provision(&self, request: &VolumeRequest) -> Result<DriverOptions> {
        let policy = self.store.get_policy(&request.policy)?;
        let config = VolumeConfig::from_request(&policy, request)?;

        match self.store.get_volume(&config.policy_name, &config.volume_name) {
            Ok(_) => return Err(RuntimeError::volume_already_exists(config.to_string())),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let timeout = self.store.get_global()?.timeout;
        let opts = self
            .orchestrator
            .create_volume(&policy, &config, timeout)
            .await?;

        if let Err(e) = self.orchestrator.format_volume(&config, &opts).await {
            error!("Failed to format volume {}, leaving it created: {}", config, e);
            return Err(e);
        }

        self.store.create_volume(&config)?;
        info!("Provisioned volume {}", config);
        Ok(opts)
    }

    /// Destroy a volume and drop its record
    ///
    /// Whichever step notices the volume is gone reports `VolumeNotFound`.
    pub async fn deprovision(&self, policy: &str, volume: &str) -> Result<()> {
        let volume_id = format!("{}/{}", policy, volume);
        let config = self
            .store
            .get_volume(policy, volume)
            .map_err(|e| not_found_as_gone(e, &volume_id))?;

        let timeout = self.store.get_global()?.timeout;
        self.orchestrator.remove_volume(&config, timeout).await?;

        self.store
            .remove_volume(policy, volume)
            .map_err(|e| not_found_as_gone(e, &volume_id))?;

        info!("Deprovisioned volume {}", volume_id);
        Ok(())
    }

    /// Volume records of one tenant; a tenant without volumes yields an
    /// empty map
    pub fn list(&self, policy: &str) -> Result<BTreeMap<String, VolumeConfig>> {
        match self.store.list_volumes(policy) {
            Ok(volumes) => Ok(volumes),
            Err(e) if e.is_not_found() => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn not_found_as_gone(e: voldock_storage::StorageError, volume: &str) -> RuntimeError {
    if e.is_not_found() {
        warn!("Volume {} has no record", volume);
        RuntimeError::volume_not_found(volume)
    } else {
        e.into()
    }
}
