use std::fmt;
use voldock_runtime::RuntimeError;

/// The two periodic snapshot tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotTask {
    Create,
    Prune,
}

impl SnapshotTask {
    pub const ALL: [SnapshotTask; 2] = [SnapshotTask::Create, SnapshotTask::Prune];
}

impl fmt::Display for SnapshotTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotTask::Create => write!(f, "snapshot-create"),
            SnapshotTask::Prune => write!(f, "snapshot-prune"),
        }
    }
}

/// Outcome of one attempted snapshot removal
#[derive(Debug)]
pub struct SnapshotRemoval {
    pub snapshot: String,
    pub result: Result<(), RuntimeError>,
}

/// Per-snapshot results of pruning one volume
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Snapshots listed before pruning
    pub listed: usize,
    pub removals: Vec<SnapshotRemoval>,
}

impl PruneReport {
    /// Snapshots actually removed, oldest first
    pub fn removed(&self) -> Vec<&str> {
        self.removals
            .iter()
            .filter(|r| r.result.is_ok())
            .map(|r| r.snapshot.as_str())
            .collect()
    }

    /// Snapshots that could not be removed
    pub fn failed(&self) -> Vec<&str> {
        self.removals
            .iter()
            .filter(|r| r.result.is_err())
            .map(|r| r.snapshot.as_str())
            .collect()
    }
}

/// What a tick did for one due volume
#[derive(Debug)]
pub enum VolumeOutcome {
    Created { label: String },
    Pruned(PruneReport),
    Failed(RuntimeError),
}

#[derive(Debug)]
pub struct VolumeReport {
    /// `policy/volume`
    pub volume: String,
    pub outcome: VolumeOutcome,
}

/// Result of one scheduler tick over all tenants
#[derive(Debug)]
pub struct TickReport {
    pub task: SnapshotTask,
    /// Tick time in Unix seconds
    pub time: u64,
    /// Due volumes only, in tenant then volume order
    pub volumes: Vec<VolumeReport>,
}

impl TickReport {
    pub fn new(task: SnapshotTask, time: u64) -> Self {
        Self {
            task,
            time,
            volumes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn get(&self, volume: &str) -> Option<&VolumeOutcome> {
        self.volumes
            .iter()
            .find(|r| r.volume == volume)
            .map(|r| &r.outcome)
    }

    /// Failed volume actions plus failed snapshot removals
    pub fn failures(&self) -> usize {
        self.volumes
            .iter()
            .map(|r| match &r.outcome {
                VolumeOutcome::Failed(_) => 1,
                VolumeOutcome::Pruned(prune) => prune.failed().len(),
                VolumeOutcome::Created { .. } => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_report_partitions() {
        let report = PruneReport {
            listed: 5,
            removals: vec![
                SnapshotRemoval {
                    snapshot: "s1".to_string(),
                    result: Err(RuntimeError::backend_error("rbd/basic.data", "busy")),
                },
                SnapshotRemoval {
                    snapshot: "s2".to_string(),
                    result: Ok(()),
                },
            ],
        };
        assert_eq!(report.removed(), vec!["s2"]);
        assert_eq!(report.failed(), vec!["s1"]);

        let mut tick = TickReport::new(SnapshotTask::Prune, 0);
        tick.volumes.push(VolumeReport {
            volume: "basic/data".to_string(),
            outcome: VolumeOutcome::Pruned(report),
        });
        assert_eq!(tick.failures(), 1);
        assert!(tick.get("basic/data").is_some());
    }

    #[test]
    fn test_task_names() {
        assert_eq!(SnapshotTask::Create.to_string(), "snapshot-create");
        assert_eq!(SnapshotTask::Prune.to_string(), "snapshot-prune");
    }
}
