use crate::scheduler::SnapshotScheduler;
use crate::types::SnapshotTask;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Owns the snapshot-create and snapshot-prune loops.
///
/// Both loops share one cancellation token. `shutdown` waits for a tick
/// already in progress to finish.
pub struct SnapshotSupervisor {
    token: CancellationToken,
    handles: Vec<(SnapshotTask, JoinHandle<()>)>,
}

impl SnapshotSupervisor {
    /// Spawn both loops on the current runtime
    pub fn start(scheduler: Arc<SnapshotScheduler>) -> Self {
        Self::start_with_token(scheduler, CancellationToken::new())
    }

    /// Spawn both loops, stopping when `token` (or a parent of it) is cancelled
    pub fn start_with_token(scheduler: Arc<SnapshotScheduler>, token: CancellationToken) -> Self {
        let handles = SnapshotTask::ALL
            .into_iter()
            .map(|task| {
                let scheduler = scheduler.clone();
                let token = token.clone();
                let handle = tokio::spawn(async move { scheduler.run(task, token).await });
                (task, handle)
            })
            .collect();

        info!("Snapshot supervisor started");
        Self { token, handles }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop both loops and wait for them to exit
    pub async fn shutdown(self) {
        self.token.cancel();
        for (task, handle) in self.handles {
            if let Err(e) = handle.await {
                error!("{} loop terminated abnormally: {}", task, e);
            }
        }
        info!("Snapshot supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SnapshotSchedulerConfig;
    use std::time::Duration;
    use voldock_core::{Policy, SnapshotConfig, VolumeConfig, VolumeOptions};
    use voldock_runtime::{BackendCall, MockStorageBackend, VolumeRef};
    use voldock_storage::{ConfigStore, MemoryBackend};

    #[tokio::test]
    async fn test_supervisor_runs_both_loops_until_shutdown() {
        let store = ConfigStore::with_default_prefix(Arc::new(MemoryBackend::new()));
        let options = VolumeOptions {
            pool: "rbd".to_string(),
            size: "10MB".to_string(),
            use_snapshots: true,
            snapshot: SnapshotConfig {
                keep: 100,
                frequency: "1s".to_string(),
            },
            ..Default::default()
        };
        store
            .publish_policy(
                "basic",
                Policy {
                    default_volume_options: options.clone(),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .create_volume(&VolumeConfig::new("basic", "data", options))
            .unwrap();

        let backend = Arc::new(MockStorageBackend::new());
        backend
            .seed_volume(&VolumeRef::new("rbd", "basic.data"), 1024, &[])
            .await;

        let scheduler = Arc::new(SnapshotScheduler::new(
            store,
            backend.clone(),
            SnapshotSchedulerConfig {
                interval: Duration::from_millis(10),
                backend_timeout: Duration::from_secs(5),
            },
        ));

        let supervisor = SnapshotSupervisor::start(scheduler);
        let token = supervisor.token();
        tokio::time::sleep(Duration::from_millis(100)).await;
        supervisor.shutdown().await;
        assert!(token.is_cancelled());

        let calls = backend.calls().await;
        assert!(calls
            .iter()
            .any(|c| matches!(c, BackendCall::CreateSnapshot(..))));
        assert!(calls
            .iter()
            .any(|c| matches!(c, BackendCall::ListSnapshots(..))));

        // No further ticks after shutdown
        let settled = calls.len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.calls().await.len(), settled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_tick_in_progress() {
        let store = ConfigStore::with_default_prefix(Arc::new(MemoryBackend::new()));
        let options = VolumeOptions {
            pool: "rbd".to_string(),
            size: "10MB".to_string(),
            use_snapshots: true,
            snapshot: SnapshotConfig {
                keep: 1,
                frequency: "1s".to_string(),
            },
            ..Default::default()
        };
        store
            .publish_policy(
                "basic",
                Policy {
                    default_volume_options: options.clone(),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .create_volume(&VolumeConfig::new("basic", "data", options))
            .unwrap();

        let volume = VolumeRef::new("rbd", "basic.data");
        let backend = Arc::new(MockStorageBackend::new());
        backend.seed_volume(&volume, 1024, &["s1", "s2", "s3"]).await;
        // List, then two removals at least: the prune tick spans 900ms
        backend.set_latency(Some(Duration::from_millis(300))).await;

        let scheduler = Arc::new(SnapshotScheduler::new(
            store,
            backend.clone(),
            SnapshotSchedulerConfig {
                interval: Duration::from_secs(3600),
                backend_timeout: Duration::from_secs(5),
            },
        ));

        let supervisor = SnapshotSupervisor::start(scheduler);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = tokio::time::Instant::now();
        supervisor.shutdown().await;
        assert!(started.elapsed() >= Duration::from_millis(500));

        // Both ticks ran to completion before the loops exited
        let snapshots = backend.snapshots(&volume).await;
        assert!(!snapshots.contains(&"s1".to_string()));
        assert!(!snapshots.contains(&"s2".to_string()));
        assert!(snapshots.iter().any(|s| s.ends_with('Z')));

        let settled = backend.calls().await.len();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.calls().await.len(), settled);
    }

    #[tokio::test]
    async fn test_parent_token_stops_loops() {
        let store = ConfigStore::with_default_prefix(Arc::new(MemoryBackend::new()));
        let scheduler = Arc::new(SnapshotScheduler::new(
            store,
            Arc::new(MockStorageBackend::new()),
            SnapshotSchedulerConfig {
                interval: Duration::from_millis(10),
                ..Default::default()
            },
        ));

        let parent = CancellationToken::new();
        let supervisor = SnapshotSupervisor::start_with_token(scheduler, parent.child_token());
        parent.cancel();
        tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown())
            .await
            .unwrap();
    }
}
