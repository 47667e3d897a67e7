use crate::error::{Result, VoldockError};
use crate::filesystems::{FileSystems, DEFAULT_FILESYSTEM};
use crate::quantities::{parse_frequency_secs, parse_size};
use crate::validation::{validate_name, validate_volume_options};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Snapshot retention settings for a volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotConfig {
    /// Number of snapshots to retain
    pub keep: u32,
    /// How often to snapshot (e.g., "1h")
    pub frequency: String,
}

/// Options for a single volume; also used as a policy's defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeOptions {
    pub pool: String,
    /// Human byte size (e.g., "10MB")
    pub size: String,
    pub use_snapshots: bool,
    pub file_system: String,
    pub snapshot: SnapshotConfig,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self {
            pool: String::new(),
            size: String::new(),
            use_snapshots: false,
            file_system: DEFAULT_FILESYSTEM.to_string(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl VolumeOptions {
    /// Volume size in bytes
    pub fn actual_size(&self) -> Result<u64> {
        parse_size(&self.size)
    }

    /// Requested filesystem type, falling back to the default when unset
    pub fn file_system_or_default(&self) -> &str {
        if self.file_system.is_empty() {
            DEFAULT_FILESYSTEM
        } else {
            &self.file_system
        }
    }

    /// Apply per-volume overrides from a request's option map.
    ///
    /// Recognized keys: `pool`, `size`, `filesystem`, `snapshots`,
    /// `snapshots.frequency`, `snapshots.keep`.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) -> Result<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "pool" => self.pool = value.clone(),
                "size" => self.size = value.clone(),
                "filesystem" => self.file_system = value.clone(),
                "snapshots" => {
                    self.use_snapshots = value.parse().map_err(|_| {
                        VoldockError::validation_failed(
                            "VolumeOptions",
                            format!("snapshots must be true or false, got {:?}", value),
                            "Use snapshots=true or snapshots=false",
                        )
                    })?;
                }
                "snapshots.frequency" => self.snapshot.frequency = value.clone(),
                "snapshots.keep" => {
                    self.snapshot.keep = value.parse().map_err(|_| {
                        VoldockError::validation_failed(
                            "VolumeOptions",
                            format!("snapshots.keep must be a non-negative integer, got {:?}", value),
                            "Use a whole number such as snapshots.keep=10",
                        )
                    })?;
                }
                other => {
                    return Err(VoldockError::validation_failed(
                        "VolumeOptions",
                        format!("unknown option {:?}", other),
                        "Supported options: pool, size, filesystem, snapshots, snapshots.frequency, snapshots.keep",
                    ))
                }
            }
        }
        Ok(())
    }
}

/// A named, administrator-defined volume policy. The policy name is also
/// the tenant that scopes its volumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default_volume_options: VolumeOptions,
    #[serde(default)]
    pub file_systems: FileSystems,
}

impl Policy {
    /// Fill in the built-in filesystem table when the policy defines none
    pub fn apply_defaults(&mut self) {
        self.file_systems = std::mem::take(&mut self.file_systems).with_defaults();
    }

    /// Default the filesystem table, then check the default volume options.
    ///
    /// The two passes are independent: the table is defaulted even when
    /// the options turn out to be invalid.
    pub fn validate(&mut self) -> Result<()> {
        self.apply_defaults();
        validate_volume_options(&self.default_volume_options)
    }
}

/// Concrete configuration of one provisioned volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeConfig {
    /// Name of the owning policy (also the tenant)
    pub policy_name: String,
    pub volume_name: String,
    pub options: VolumeOptions,
}

impl VolumeConfig {
    pub fn new(
        policy_name: impl Into<String>,
        volume_name: impl Into<String>,
        options: VolumeOptions,
    ) -> Self {
        Self {
            policy_name: policy_name.into(),
            volume_name: volume_name.into(),
            options,
        }
    }

    /// Build a volume configuration from a policy's defaults plus the
    /// request's overrides, and validate the result
    pub fn from_request(policy: &Policy, request: &VolumeRequest) -> Result<Self> {
        validate_name(&request.policy)?;
        validate_name(&request.name)?;

        let mut options = policy.default_volume_options.clone();
        options.apply_overrides(&request.options)?;
        validate_volume_options(&options)?;
        if options.use_snapshots {
            // Snapshots are scheduled on a one-second grid
            parse_frequency_secs(&options.snapshot.frequency).map_err(|e| {
                VoldockError::validation_failed(
                    "SnapshotConfig",
                    format!("invalid frequency for a volume: {}", e),
                    "Use a snapshot frequency of at least one second, such as \"1s\" or \"1h\"",
                )
            })?;
        }

        Ok(Self::new(&request.policy, &request.name, options))
    }

    /// Backend-internal name, unique across tenants.
    ///
    /// Names cannot contain '.', so joining on it is unambiguous.
    pub fn internal_name(&self) -> Result<String> {
        validate_name(&self.policy_name)?;
        validate_name(&self.volume_name)?;
        Ok(format!("{}.{}", self.policy_name, self.volume_name))
    }
}

impl fmt::Display for VolumeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.policy_name, self.volume_name)
    }
}

/// A request to provision a volume under a policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    pub policy: String,
    pub name: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl VolumeRequest {
    pub fn new(policy: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            name: name.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Service-wide runtime configuration held in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalConfig {
    /// Bound on every backend call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Tick interval for the snapshot loops
    #[serde(with = "humantime_serde")]
    pub snapshot_interval: Duration,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            snapshot_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_policy() -> Policy {
        Policy {
            name: "basic".to_string(),
            default_volume_options: VolumeOptions {
                pool: "rbd".to_string(),
                size: "10MB".to_string(),
                ..Default::default()
            },
            file_systems: FileSystems::new(),
        }
    }

    #[test]
    fn test_validate_defaults_file_systems() {
        let mut policy = basic_policy();
        policy.validate().unwrap();
        assert_eq!(policy.file_systems, FileSystems::builtin());
    }

    #[test]
    fn test_validate_defaults_even_on_failure() {
        let mut policy = basic_policy();
        policy.default_volume_options.pool.clear();
        assert!(policy.validate().is_err());
        assert!(!policy.file_systems.is_empty());
    }

    #[test]
    fn test_from_request_applies_overrides() {
        let policy = basic_policy();
        let request = VolumeRequest::new("basic", "data")
            .with_option("size", "20MB")
            .with_option("snapshots", "true")
            .with_option("snapshots.frequency", "1h")
            .with_option("snapshots.keep", "5");

        let config = VolumeConfig::from_request(&policy, &request).unwrap();
        assert_eq!(config.options.pool, "rbd");
        assert_eq!(config.options.size, "20MB");
        assert!(config.options.use_snapshots);
        assert_eq!(config.options.snapshot.keep, 5);
        assert_eq!(config.to_string(), "basic/data");
    }

    #[test]
    fn test_from_request_rejects_bad_overrides() {
        let policy = basic_policy();

        let unknown = VolumeRequest::new("basic", "data").with_option("color", "blue");
        assert!(VolumeConfig::from_request(&policy, &unknown).is_err());

        let bad_keep = VolumeRequest::new("basic", "data").with_option("snapshots.keep", "-1");
        assert!(VolumeConfig::from_request(&policy, &bad_keep).is_err());

        // Snapshots enabled without a frequency fails revalidation
        let no_freq = VolumeRequest::new("basic", "data")
            .with_option("snapshots", "true")
            .with_option("snapshots.keep", "2");
        assert!(VolumeConfig::from_request(&policy, &no_freq).is_err());
    }

    #[test]
    fn test_from_request_rejects_sub_second_frequency() {
        let policy = basic_policy();
        let fast = VolumeRequest::new("basic", "fast")
            .with_option("snapshots", "true")
            .with_option("snapshots.keep", "2")
            .with_option("snapshots.frequency", "500ms");
        let err = VolumeConfig::from_request(&policy, &fast).unwrap_err();
        assert!(matches!(err, VoldockError::ValidationFailed { .. }));

        // Policy validation still only asks for a positive duration
        let mut fast_policy = basic_policy();
        fast_policy.default_volume_options.use_snapshots = true;
        fast_policy.default_volume_options.snapshot = SnapshotConfig {
            keep: 2,
            frequency: "500ms".to_string(),
        };
        assert!(fast_policy.validate().is_ok());

        let ok = VolumeRequest::new("basic", "slow")
            .with_option("snapshots", "true")
            .with_option("snapshots.keep", "2")
            .with_option("snapshots.frequency", "1s");
        assert!(VolumeConfig::from_request(&policy, &ok).is_ok());
    }

    #[test]
    fn test_internal_name_is_tenant_scoped() {
        let a = VolumeConfig::new("tenant-a", "data", VolumeOptions::default());
        let b = VolumeConfig::new("tenant-b", "data", VolumeOptions::default());
        assert_eq!(a.internal_name().unwrap(), "tenant-a.data");
        assert_ne!(a.internal_name().unwrap(), b.internal_name().unwrap());

        let dotted = VolumeConfig::new("tenant.a", "data", VolumeOptions::default());
        assert!(dotted.internal_name().is_err());
    }

    #[test]
    fn test_global_config_round_trip() {
        let json = r#"{"timeout":"30s","snapshotInterval":"2s"}"#;
        let global: GlobalConfig = serde_json::from_str(json).unwrap();
        assert_eq!(global.timeout, Duration::from_secs(30));
        assert_eq!(global.snapshot_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_policy_deserializes_without_file_systems() {
        let json = r#"{"defaultVolumeOptions":{"pool":"rbd","size":"10MB"}}"#;
        let policy: Policy = serde_json::from_str(json).unwrap();
        assert!(policy.file_systems.is_empty());
        assert_eq!(policy.default_volume_options.file_system, "ext4");
    }
}
