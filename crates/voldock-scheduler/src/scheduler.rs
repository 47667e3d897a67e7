use crate::types::{
    PruneReport, SnapshotRemoval, SnapshotTask, TickReport, VolumeOutcome, VolumeReport,
};
use crate::{Result, SchedulerError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use voldock_core::{parse_duration, VolumeConfig};
use voldock_runtime::timeout::bounded;
use voldock_runtime::{RuntimeError, StorageBackend, VolumeRef};
use voldock_storage::ConfigStore;

/// Configuration for the snapshot scheduler
#[derive(Debug, Clone)]
pub struct SnapshotSchedulerConfig {
    /// Interval between ticks of each loop
    pub interval: Duration,
    /// Bound on every backend call
    pub backend_timeout: Duration,
}

impl Default for SnapshotSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            backend_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Snapshot label for a tick time, e.g. `20261016T120000Z`
pub fn snapshot_label(now: u64) -> Result<String> {
    let time: DateTime<Utc> = i64::try_from(now)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| {
            SchedulerError::internal_error(format!("tick time {} is out of range", now))
        })?;
    Ok(time.format("%Y%m%dT%H%M%SZ").to_string())
}

/// Current wall-clock time in Unix seconds
pub fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// Creates and prunes snapshots for every volume that asks for them
///
/// Reads all state from the store on every tick and never writes to it.
pub struct SnapshotScheduler {
    store: ConfigStore,
    backend: Arc<dyn StorageBackend>,
    config: SnapshotSchedulerConfig,
}

impl SnapshotScheduler {
    pub fn new(
        store: ConfigStore,
        backend: Arc<dyn StorageBackend>,
        config: SnapshotSchedulerConfig,
    ) -> Self {
        Self {
            store,
            backend,
            config,
        }
    }

    pub fn config(&self) -> &SnapshotSchedulerConfig {
        &self.config
    }

    /// Run one task's loop until `token` is cancelled.
    ///
    /// Cancellation is only observed between ticks.
    pub async fn run(&self, task: SnapshotTask, token: CancellationToken) {
        info!(
            "Starting {} loop (interval: {:?}, backend timeout: {:?})",
            task, self.config.interval, self.config.backend_timeout
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("{} loop shutting down", task);
                    return;
                }
                _ = interval.tick() => {
                    match self.tick(task, unix_now()).await {
                        Ok(report) if report.failures() > 0 => {
                            warn!(
                                "{} tick finished with {} failure(s)",
                                task,
                                report.failures()
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!("{} tick aborted: {}", task, e),
                    }
                }
            }
        }
    }

    /// Run one tick of `task` at Unix time `now`
    pub async fn tick(&self, task: SnapshotTask, now: u64) -> Result<TickReport> {
        debug!("Running {} tick at {}", task, now);
        let mut report = TickReport::new(task, now);

        let tenants = match self.store.list_tenants() {
            Ok(tenants) => tenants,
            Err(e) if e.is_not_found() => {
                debug!("No tenants yet");
                return Ok(report);
            }
            Err(e) => {
                error!("runtime configuration incorrect: cannot list tenants: {}", e);
                return Err(e.into());
            }
        };

        for tenant in tenants {
            let volumes = match self.store.list_volumes(&tenant) {
                Ok(volumes) => volumes,
                Err(e) if e.is_not_found() => {
                    debug!("Tenant {} has no volumes", tenant);
                    continue;
                }
                Err(e) => {
                    error!(
                        "runtime configuration incorrect: cannot list volumes of {}: {}",
                        tenant, e
                    );
                    return Err(e.into());
                }
            };

            for config in volumes.values() {
                if !config.options.use_snapshots {
                    continue;
                }

                // An unparsable frequency abandons the rest of the tick
                let frequency = &config.options.snapshot.frequency;
                let every = parse_duration(frequency)
                    .map_err(|e| {
                        error!(
                            "runtime configuration incorrect: volume {} has snapshot frequency {:?}: {}",
                            config, frequency, e
                        );
                        SchedulerError::invalid_frequency(
                            config.to_string(),
                            frequency,
                            e.to_string(),
                        )
                    })?
                    .as_secs();

                // A sub-second frequency has no place on the one-second grid;
                // only this volume is affected
                if every == 0 {
                    error!(
                        "runtime configuration incorrect: volume {} has sub-second snapshot frequency {:?}",
                        config, frequency
                    );
                    report.volumes.push(VolumeReport {
                        volume: config.to_string(),
                        outcome: VolumeOutcome::Failed(RuntimeError::invalid_config(
                            format!(
                                "snapshot frequency {:?} of volume {} is below one second",
                                frequency, config
                            ),
                            "Republish the volume with a frequency of at least one second",
                        )),
                    });
                    continue;
                }

                if now % every != 0 {
                    continue;
                }

                let outcome = match task {
                    SnapshotTask::Create => self.create_snapshot(config, now).await?,
                    SnapshotTask::Prune => self.prune_snapshots(config).await,
                };
                report.volumes.push(VolumeReport {
                    volume: config.to_string(),
                    outcome,
                });
            }
        }

        Ok(report)
    }

    async fn create_snapshot(&self, config: &VolumeConfig, now: u64) -> Result<VolumeOutcome> {
        let label = snapshot_label(now)?;
        let volume = match volume_ref(config) {
            Ok(volume) => volume,
            Err(e) => return Ok(VolumeOutcome::Failed(e)),
        };
        let target = volume.to_string();

        let result = bounded(
            "snapshot create",
            &target,
            self.config.backend_timeout,
            self.backend.create_snapshot(&volume, &label),
        )
        .await;

        Ok(match result {
            Ok(()) => {
                info!("Created snapshot {}@{} for {}", target, label, config);
                VolumeOutcome::Created { label }
            }
            Err(e) => {
                error!("Failed to snapshot volume {}: {}", config, e);
                VolumeOutcome::Failed(e)
            }
        })
    }

    /// Remove the oldest snapshots beyond `keep`, one at a time,
    /// continuing past failures
    async fn prune_snapshots(&self, config: &VolumeConfig) -> VolumeOutcome {
        let volume = match volume_ref(config) {
            Ok(volume) => volume,
            Err(e) => return VolumeOutcome::Failed(e),
        };
        let target = volume.to_string();
        let timeout = self.config.backend_timeout;

        let snapshots = match bounded(
            "snapshot list",
            &target,
            timeout,
            self.backend.list_snapshots(&volume),
        )
        .await
        {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!("Failed to list snapshots of {}: {}", config, e);
                return VolumeOutcome::Failed(e);
            }
        };

        let keep = config.options.snapshot.keep as usize;
        let excess = snapshots.len().saturating_sub(keep);
        let mut report = PruneReport {
            listed: snapshots.len(),
            removals: Vec::with_capacity(excess),
        };

        for snapshot in snapshots.into_iter().take(excess) {
            let result = bounded(
                "snapshot remove",
                &target,
                timeout,
                self.backend.remove_snapshot(&volume, &snapshot),
            )
            .await;

            match &result {
                Ok(()) => info!("Pruned snapshot {}@{}", target, snapshot),
                Err(e) => error!("Failed to prune snapshot {}@{}: {}", target, snapshot, e),
            }
            report.removals.push(SnapshotRemoval { snapshot, result });
        }

        VolumeOutcome::Pruned(report)
    }
}

fn volume_ref(config: &VolumeConfig) -> std::result::Result<VolumeRef, RuntimeError> {
    Ok(VolumeRef::new(&config.options.pool, config.internal_name()?))
}
