use crate::encoding::{KeyEncoder, RecordKind};
use crate::{KVStore, Result, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use voldock_core::{validate_name, GlobalConfig, Policy, VolumeConfig};

/// Typed access to policies, volume configurations and the global record.
///
/// Holds no state beyond the store handle: every call re-reads the store.
#[derive(Clone)]
pub struct ConfigStore {
    kv: Arc<dyn KVStore>,
    keys: KeyEncoder,
}

impl ConfigStore {
    pub fn new(kv: Arc<dyn KVStore>, keys: KeyEncoder) -> Self {
        Self { kv, keys }
    }

    /// Store handle rooted at the default prefix
    pub fn with_default_prefix(kv: Arc<dyn KVStore>) -> Self {
        Self::new(kv, KeyEncoder::default())
    }

    pub fn keys(&self) -> &KeyEncoder {
        &self.keys
    }

    // --- Policies ---

    /// Validate and store a policy under `name`, overwriting any prior value.
    ///
    /// Returns the policy as stored (named and defaulted). Nothing is
    /// written when validation fails.
    pub fn publish_policy(&self, name: &str, mut policy: Policy) -> Result<Policy> {
        validate_name(name)?;
        policy.name = name.to_string();
        policy.validate()?;

        let key = self.keys.policy_key(name);
        self.write(&key, &policy)?;

        info!("Published policy {:?}", name);
        Ok(policy)
    }

    pub fn get_policy(&self, name: &str) -> Result<Policy> {
        let key = self.keys.policy_key(name);
        self.read(RecordKind::Policy, &key)
    }

    /// Names of all published policies, in no guaranteed order.
    ///
    /// Fails with `KeyNotFound` when no policy has ever been published.
    pub fn list_policies(&self) -> Result<Vec<String>> {
        let container = self.keys.policies_prefix();
        self.list_children(&container)
    }

    /// Remove a policy. Volumes that still name it are left untouched.
    pub fn delete_policy(&self, name: &str) -> Result<()> {
        let key = self.keys.policy_key(name);
        self.kv.delete(key.as_bytes())?;
        info!("Deleted policy {:?}", name);
        Ok(())
    }

    /// Tenants are policy names
    pub fn list_tenants(&self) -> Result<Vec<String>> {
        self.list_policies()
    }

    // --- Volumes ---

    /// All volume configurations of a tenant, keyed by volume name.
    ///
    /// Fails with `KeyNotFound` when the tenant has no volumes.
    pub fn list_volumes(&self, tenant: &str) -> Result<BTreeMap<String, VolumeConfig>> {
        let container = self.keys.volumes_prefix(tenant);
        let entries = self.kv.scan(container.as_bytes())?;
        if entries.is_empty() {
            return Err(StorageError::key_not_found(container));
        }

        let mut volumes = BTreeMap::new();
        for (key, value) in entries {
            let key = String::from_utf8_lossy(&key).into_owned();
            let Some(name) = KeyEncoder::child_name(&container, &key) else {
                continue;
            };
            let volume: VolumeConfig = decode(RecordKind::Volume, &key, &value)?;
            volumes.insert(name.to_string(), volume);
        }

        Ok(volumes)
    }

    pub fn get_volume(&self, tenant: &str, volume: &str) -> Result<VolumeConfig> {
        let key = self.keys.volume_key(tenant, volume);
        self.read(RecordKind::Volume, &key)
    }

    /// Persist a new volume configuration; fails if one already exists
    pub fn create_volume(&self, config: &VolumeConfig) -> Result<()> {
        validate_name(&config.policy_name)?;
        validate_name(&config.volume_name)?;

        let key = self.keys.volume_key(&config.policy_name, &config.volume_name);
        let value = serde_json::to_vec(config)?;
        self.kv.put_if_absent(key.as_bytes(), &value)?;
        info!("Stored volume configuration {}", config);
        Ok(())
    }

    pub fn remove_volume(&self, tenant: &str, volume: &str) -> Result<()> {
        let key = self.keys.volume_key(tenant, volume);
        self.kv.delete(key.as_bytes())?;
        info!("Removed volume configuration {}/{}", tenant, volume);
        Ok(())
    }

    // --- Global configuration ---

    pub fn publish_global(&self, global: &GlobalConfig) -> Result<()> {
        let key = self.keys.global_key();
        self.write(&key, global)?;
        info!("Published global configuration");
        Ok(())
    }

    /// The global record, or the built-in defaults if none was published
    pub fn get_global(&self) -> Result<GlobalConfig> {
        match self.read(RecordKind::Global, &self.keys.global_key()) {
            Err(e) if e.is_not_found() => {
                debug!("No global configuration published; using defaults");
                Ok(GlobalConfig::default())
            }
            other => other,
        }
    }

    // --- Helpers ---

    fn read<T: DeserializeOwned>(&self, kind: RecordKind, key: &str) -> Result<T> {
        let value = self
            .kv
            .get(key.as_bytes())?
            .ok_or_else(|| StorageError::key_not_found(key))?;
        decode(kind, key, &value)
    }

    fn write<T: Serialize>(&self, key: &str, record: &T) -> Result<()> {
        let value = serde_json::to_vec(record)?;
        self.kv.put(key.as_bytes(), &value)
    }

    fn list_children(&self, container: &str) -> Result<Vec<String>> {
        let keys = self.kv.keys_with_prefix(container.as_bytes())?;
        if keys.is_empty() {
            return Err(StorageError::key_not_found(container));
        }

        Ok(keys
            .iter()
            .filter_map(|key| {
                let key = String::from_utf8_lossy(key);
                KeyEncoder::child_name(container, &key).map(str::to_string)
            })
            .collect())
    }
}

fn decode<T: DeserializeOwned>(kind: RecordKind, key: &str, value: &[u8]) -> Result<T> {
    serde_json::from_slice(value).map_err(|e| {
        StorageError::serialization_error(
            format!("Failed to decode {} record at {}: {}", kind, key, e),
            Some(Box::new(e)),
        )
    })
}
