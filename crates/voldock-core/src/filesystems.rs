use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Filesystem type used when a volume does not ask for one
pub const DEFAULT_FILESYSTEM: &str = "ext4";

/// Format command for the default filesystem, with minimal reserved metadata
pub const DEFAULT_FS_COMMAND: &str = "mkfs.ext4 -m0 %";

/// Placeholder in a format command that is replaced with the device path
pub const DEVICE_PLACEHOLDER: char = '%';

/// A format-command template such as `mkfs.xfs -f %`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FsCommand(String);

impl FsCommand {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute the device path for every placeholder in the template
    pub fn render(&self, device: &str) -> String {
        self.0.replace(DEVICE_PLACEHOLDER, device)
    }
}

impl fmt::Display for FsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FsCommand {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Mapping from filesystem type name to its format-command template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSystems(BTreeMap<String, FsCommand>);

impl FileSystems {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table: a single ext4 entry
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.insert(DEFAULT_FILESYSTEM, DEFAULT_FS_COMMAND);
        table
    }

    pub fn insert(&mut self, fs_type: impl Into<String>, command: impl Into<FsCommand>) {
        self.0.insert(fs_type.into(), command.into());
    }

    pub fn get(&self, fs_type: &str) -> Option<&FsCommand> {
        self.0.get(fs_type)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Replace an empty table with the built-in one. Non-empty tables are
    /// left untouched.
    pub fn with_defaults(self) -> Self {
        if self.is_empty() {
            Self::builtin()
        } else {
            self
        }
    }
}

impl<K: Into<String>, V: Into<FsCommand>> FromIterator<(K, V)> for FileSystems {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
