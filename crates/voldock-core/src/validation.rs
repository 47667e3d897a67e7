use crate::error::{Result, VoldockError};
use crate::quantities::{parse_duration, parse_size};
use crate::types::VolumeOptions;

/// Maximum length of a policy or volume name
pub const MAX_NAME_LEN: usize = 63;

/// Check that a policy or volume name is usable as a store key segment and
/// as part of a backend-internal name
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }

    let bytes = name.as_bytes();
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    // Must start and end with alphanumeric
    if !bytes.first().is_some_and(alnum) || !bytes.last().is_some_and(alnum) {
        return false;
    }

    bytes.iter().all(|b| alnum(b) || *b == b'-' || *b == b'_')
}

/// Validate a policy or volume name
pub fn validate_name(name: &str) -> Result<()> {
    if !is_valid_name(name) {
        return Err(VoldockError::invalid_name(name));
    }
    Ok(())
}

/// Validate volume options: a non-empty pool, a positive size, and a usable
/// snapshot configuration when snapshots are enabled
pub fn validate_volume_options(options: &VolumeOptions) -> Result<()> {
    if options.pool.is_empty() {
        return Err(VoldockError::validation_failed(
            "VolumeOptions",
            "pool is empty",
            "Set the pool the volume should be created in (e.g. \"rbd\")",
        ));
    }

    parse_size(&options.size)?;

    if options.use_snapshots {
        if options.snapshot.keep == 0 {
            return Err(VoldockError::validation_failed(
                "SnapshotConfig",
                "keep must be greater than zero when snapshots are enabled",
                "Set snapshot.keep to the number of snapshots to retain",
            ));
        }

        parse_duration(&options.snapshot.frequency).map_err(|e| {
            VoldockError::validation_failed(
                "SnapshotConfig",
                format!("invalid frequency: {}", e),
                "Set snapshot.frequency to a duration such as \"30m\" or \"1h\"",
            )
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystems::FileSystems;
    use crate::types::{Policy, SnapshotConfig};

    fn options(pool: &str, size: &str) -> VolumeOptions {
        VolumeOptions {
            pool: pool.to_string(),
            size: size.to_string(),
            ..Default::default()
        }
    }

    fn policy_with(options: VolumeOptions) -> Policy {
        Policy {
            name: "test".to_string(),
            default_volume_options: options,
            file_systems: FileSystems::new(),
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("policy1").is_ok());
        assert!(validate_name("my-volume").is_ok());
        assert!(validate_name("my_volume_2").is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name("Policy").is_err()); // uppercase
        assert!(validate_name("-vol").is_err()); // starts with dash
        assert!(validate_name("vol-").is_err()); // ends with dash
        assert!(validate_name("a.b").is_err()); // dot reserved for internal names
        assert!(validate_name("a/b").is_err());
        assert!(validate_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_valid_policies() {
        for size in ["10MB", "20MB", "1GB"] {
            let mut policy = policy_with(options("rbd", size));
            assert!(policy.validate().is_ok(), "size {} should be valid", size);
        }
    }

    #[test]
    fn test_invalid_policies() {
        // zero size, no pool, missing unit letter
        for opts in [options("rbd", "0"), options("", "20MB"), options("", "0"), options("rbd", "10M")] {
            let mut policy = policy_with(opts.clone());
            assert!(policy.validate().is_err(), "{:?} should be invalid", opts);
        }
    }

    #[test]
    fn test_snapshot_rules_only_apply_when_enabled() {
        let mut opts = options("rbd", "10MB");
        opts.snapshot = SnapshotConfig {
            keep: 0,
            frequency: String::new(),
        };
        assert!(validate_volume_options(&opts).is_ok());

        opts.use_snapshots = true;
        assert!(validate_volume_options(&opts).is_err());

        opts.snapshot.keep = 2;
        assert!(validate_volume_options(&opts).is_err()); // empty frequency

        opts.snapshot.frequency = "0s".to_string();
        assert!(validate_volume_options(&opts).is_err()); // not positive

        opts.snapshot.frequency = "1s".to_string();
        assert!(validate_volume_options(&opts).is_ok());
    }

    #[test]
    fn test_size_error_is_size_parse() {
        let err = validate_volume_options(&options("rbd", "not a number")).unwrap_err();
        assert!(matches!(err, VoldockError::SizeParse { .. }));
    }
}
