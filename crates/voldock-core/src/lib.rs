//! Voldock Core - Data model and validation for the Voldock volume service
//!
//! This crate provides:
//! - Policy, volume and global configuration records
//! - Size and duration grammars
//! - Policy validation and filesystem-table defaulting
//! - Error types with miette diagnostics
//! - Serialization helpers

pub mod error;
pub mod filesystems;
pub mod quantities;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use error::{Result, VoldockError};
pub use filesystems::{FileSystems, FsCommand, DEFAULT_FILESYSTEM, DEFAULT_FS_COMMAND};
pub use quantities::{format_size, parse_duration, parse_frequency_secs, parse_size};
pub use types::{GlobalConfig, Policy, SnapshotConfig, VolumeConfig, VolumeOptions, VolumeRequest};
pub use validation::{is_valid_name, validate_name, validate_volume_options};

/// Serialize a record to JSON
pub fn to_json<T: serde::Serialize>(record: &T) -> Result<String> {
    serde_json::to_string(record).map_err(|e| {
        VoldockError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Serialize a record to pretty JSON
pub fn to_json_pretty<T: serde::Serialize>(record: &T) -> Result<String> {
    serde_json::to_string_pretty(record).map_err(|e| {
        VoldockError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a record from JSON
pub fn from_json<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| {
        VoldockError::serialization_error(
            format!("Failed to deserialize from JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a record from YAML
pub fn from_yaml<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_yaml::from_str(data).map_err(|e| {
        VoldockError::serialization_error(
            format!("Failed to deserialize from YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}
