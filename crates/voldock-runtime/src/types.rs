use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use voldock_core::FsCommand;

/// Backend-specific volume parameters (e.g., `pool`)
pub type Params = BTreeMap<String, String>;

/// Parameter key naming the pool a volume lives in
pub const POOL_PARAM: &str = "pool";

/// Volume description handed to the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverVolume {
    /// Backend-internal name, unique across tenants
    pub name: String,
    /// Size in bytes; zero when the operation does not need it
    pub size: u64,
    pub params: Params,
}

/// Filesystem settings used by the format step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsOptions {
    pub fs_type: String,
    pub create_command: FsCommand,
}

/// Parameter bundle for one backend operation. Built per call, never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverOptions {
    pub volume: DriverVolume,
    pub fs_options: FsOptions,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl DriverOptions {
    pub fn pool(&self) -> &str {
        self.volume
            .params
            .get(POOL_PARAM)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The pool-qualified reference to this volume
    pub fn volume_ref(&self) -> VolumeRef {
        VolumeRef::new(self.pool(), &self.volume.name)
    }
}

/// Pool-qualified backend volume reference used by snapshot operations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeRef {
    pub pool: String,
    pub name: String,
}

impl VolumeRef {
    pub fn new(pool: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pool: pool.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for VolumeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pool, self.name)
    }
}
