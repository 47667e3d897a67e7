//! Voldock Scheduler - Periodic snapshot creation and pruning
//!
//! This crate provides:
//! - SnapshotScheduler: per-tick scan of all tenants and their volumes
//! - Second-grid due test driven by each volume's snapshot frequency
//! - Per-volume and per-snapshot result reports
//! - SnapshotSupervisor: starts and stops both loops together

pub mod error;
pub mod scheduler;
pub mod supervisor;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SchedulerError};
pub use scheduler::{snapshot_label, unix_now, SnapshotScheduler, SnapshotSchedulerConfig};
pub use supervisor::SnapshotSupervisor;
pub use types::{
    PruneReport, SnapshotRemoval, SnapshotTask, TickReport, VolumeOutcome, VolumeReport,
};
