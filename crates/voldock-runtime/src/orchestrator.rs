use crate::error::{Result, RuntimeError};
use crate::storage::StorageBackend;
use crate::timeout::bounded;
use crate::types::{DriverOptions, DriverVolume, FsOptions, Params, POOL_PARAM};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use voldock_core::{format_size, FsCommand, Policy, VolumeConfig, DEFAULT_FS_COMMAND};

/// Resolve the format command for `fs_type` from the policy's table.
///
/// A policy without a table gets the built-in default command whatever
/// type was asked for. A non-empty table must list the type.
pub fn resolve_fs_command(policy: &Policy, fs_type: &str) -> Result<FsCommand> {
    if policy.file_systems.is_empty() {
        return Ok(FsCommand::new(DEFAULT_FS_COMMAND));
    }

    policy
        .file_systems
        .get(fs_type)
        .cloned()
        .ok_or_else(|| RuntimeError::invalid_filesystem(fs_type, &policy.name))
}

fn pool_params(config: &VolumeConfig) -> Params {
    let mut params = Params::new();
    params.insert(POOL_PARAM.to_string(), config.options.pool.clone());
    params
}

/// Turns volume configurations into backend calls
///
/// Every backend call is bounded by a timeout. Outcomes, including the
/// `VolumeNotFound` a backend reports when it loses a removal race, are
/// returned unchanged.
#[derive(Clone)]
pub struct VolumeOrchestrator {
    backend: Arc<dyn StorageBackend>,
}

impl VolumeOrchestrator {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Create the backing volume and return the options used
    pub async fn create_volume(
        &self,
        policy: &Policy,
        config: &VolumeConfig,
        timeout: Duration,
    ) -> Result<DriverOptions> {
        let fs_type = config.options.file_system_or_default();
        let create_command = resolve_fs_command(policy, fs_type)?;
        let size = config.options.actual_size()?;
        let name = config.internal_name()?;

        let opts = DriverOptions {
            volume: DriverVolume {
                name,
                size,
                params: pool_params(config),
            },
            fs_options: FsOptions {
                fs_type: fs_type.to_string(),
                create_command,
            },
            timeout,
        };

        let target = opts.volume_ref().to_string();
        info!(
            "Creating volume {} as {} ({}) via {} backend",
            config,
            target,
            format_size(size),
            self.backend.name()
        );
        bounded("create", &target, timeout, self.backend.create(&opts)).await?;

        info!("Created volume {}", config);
        Ok(opts)
    }

    /// Format a created volume with the options returned by `create_volume`.
    ///
    /// Formatting twice is not guarded against.
    pub async fn format_volume(&self, config: &VolumeConfig, opts: &DriverOptions) -> Result<()> {
        let mut opts = opts.clone();
        opts.volume.size = config.options.actual_size()?;
        opts.volume.name = config.internal_name()?;

        let target = opts.volume_ref().to_string();
        info!(
            "Formatting volume {} with {} filesystem",
            config, opts.fs_options.fs_type
        );
        bounded("format", &target, opts.timeout, self.backend.format(&opts)).await?;

        info!("Formatted volume {}", config);
        Ok(())
    }

    /// Destroy the backing volume
    pub async fn remove_volume(&self, config: &VolumeConfig, timeout: Duration) -> Result<()> {
        let opts = DriverOptions {
            volume: DriverVolume {
                name: config.internal_name()?,
                size: 0,
                params: pool_params(config),
            },
            fs_options: FsOptions::default(),
            timeout,
        };

        let target = opts.volume_ref().to_string();
        info!("Removing volume {} ({})", config, target);
        bounded("destroy", &target, timeout, self.backend.destroy(&opts)).await?;

        info!("Removed volume {}", config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockStorageBackend;
    use crate::types::VolumeRef;
    use voldock_core::{FileSystems, VolumeOptions};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn basic_policy() -> Policy {
        let mut policy = Policy {
            name: "basic".to_string(),
            default_volume_options: VolumeOptions {
                pool: "rbd".to_string(),
                size: "10MB".to_string(),
                ..Default::default()
            },
            file_systems: FileSystems::new(),
        };
        policy.validate().unwrap();
        policy
    }

    fn basic_volume(policy: &Policy, name: &str) -> VolumeConfig {
        VolumeConfig::new(&policy.name, name, policy.default_volume_options.clone())
    }

    fn setup() -> (Arc<MockStorageBackend>, VolumeOrchestrator) {
        let backend = Arc::new(MockStorageBackend::new());
        let orchestrator = VolumeOrchestrator::new(backend.clone());
        (backend, orchestrator)
    }

    #[test]
    fn test_resolve_fs_command() {
        let mut policy = basic_policy();
        assert_eq!(
            resolve_fs_command(&policy, "ext4").unwrap().as_str(),
            DEFAULT_FS_COMMAND
        );
        let err = resolve_fs_command(&policy, "xfs").unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidFilesystem { .. }));

        policy.file_systems = FileSystems::new();
        assert_eq!(
            resolve_fs_command(&policy, "xfs").unwrap().as_str(),
            DEFAULT_FS_COMMAND
        );
    }

    #[tokio::test]
    async fn test_create_and_format() {
        let (backend, orchestrator) = setup();
        let policy = basic_policy();
        let config = basic_volume(&policy, "data");

        let opts = orchestrator
            .create_volume(&policy, &config, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(opts.volume.name, "basic.data");
        assert_eq!(opts.volume.size, 10 * 1024 * 1024);
        assert_eq!(opts.pool(), "rbd");
        assert_eq!(opts.fs_options.fs_type, "ext4");
        assert_eq!(opts.timeout, TIMEOUT);

        orchestrator.format_volume(&config, &opts).await.unwrap();
        let volume = VolumeRef::new("rbd", "basic.data");
        assert_eq!(backend.formatted_with(&volume).await.as_deref(), Some("ext4"));
    }

    #[tokio::test]
    async fn test_same_volume_name_in_two_tenants() {
        let (backend, orchestrator) = setup();
        let a = basic_policy();
        let mut b = basic_policy();
        b.name = "other".to_string();

        orchestrator
            .create_volume(&a, &basic_volume(&a, "data"), TIMEOUT)
            .await
            .unwrap();
        orchestrator
            .create_volume(&b, &basic_volume(&b, "data"), TIMEOUT)
            .await
            .unwrap();

        assert!(backend.volume_exists(&VolumeRef::new("rbd", "basic.data")).await);
        assert!(backend.volume_exists(&VolumeRef::new("rbd", "other.data")).await);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_filesystem() {
        let (backend, orchestrator) = setup();
        let policy = basic_policy();
        let mut config = basic_volume(&policy, "data");
        config.options.file_system = "zfs".to_string();

        let err = orchestrator
            .create_volume(&policy, &config, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidFilesystem { .. }));
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_size() {
        let (backend, orchestrator) = setup();
        let policy = basic_policy();
        let mut config = basic_volume(&policy, "data");
        config.options.size = "10M".to_string();

        let err = orchestrator
            .create_volume(&policy, &config, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::CoreError(voldock_core::VoldockError::SizeParse { .. })
        ));
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_times_out() {
        let (backend, orchestrator) = setup();
        backend.set_latency(Some(Duration::from_secs(60))).await;
        let policy = basic_policy();
        let config = basic_volume(&policy, "data");

        let err = orchestrator
            .create_volume(&policy, &config, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_format_failure_leaves_volume_created() {
        let (backend, orchestrator) = setup();
        backend.fail_format_for("ext4").await;
        let policy = basic_policy();
        let config = basic_volume(&policy, "data");

        let opts = orchestrator
            .create_volume(&policy, &config, TIMEOUT)
            .await
            .unwrap();
        assert!(orchestrator.format_volume(&config, &opts).await.is_err());
        assert!(backend.volume_exists(&opts.volume_ref()).await);
    }

    #[tokio::test]
    async fn test_concurrent_removals_exactly_one_wins() {
        let (backend, orchestrator) = setup();
        backend
            .set_latency(Some(Duration::from_millis(10)))
            .await;
        let policy = basic_policy();
        let config = basic_volume(&policy, "data");
        orchestrator
            .create_volume(&policy, &config, TIMEOUT)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let orchestrator = orchestrator.clone();
            let config = config.clone();
            handles.push(tokio::spawn(async move {
                orchestrator.remove_volume(&config, TIMEOUT).await
            }));
        }

        let mut successes = 0;
        let mut gone = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(e) if e.is_volume_not_found() => gone += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(gone, 4);
        assert!(!backend.volume_exists(&VolumeRef::new("rbd", "basic.data")).await);
    }
}
