// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
///
/// Any of these aborts the current tick; the loop carries on with the next.
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// A volume's snapshot frequency does not parse as a duration
    #[error("Invalid snapshot frequency {frequency:?} for volume {volume}: {reason}")]
    #[diagnostic(
        code(scheduler::invalid_frequency),
        help("Republish the volume with a frequency of at least one second, such as \"1h\" or \"30m\"")
    )]
    InvalidFrequency {
        #[allow(unused)]
        volume: String,
        #[allow(unused)]
        frequency: String,
        #[allow(unused)]
        reason: String,
    },

    /// Storage error
    #[error(transparent)]
    #[diagnostic(transparent)]
    StorageError(#[from] voldock_storage::StorageError),

    /// Runtime error
    #[error(transparent)]
    #[diagnostic(transparent)]
    RuntimeError(#[from] voldock_runtime::RuntimeError),

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(scheduler::internal_error),
        help("This is likely a bug. Please report it")
    )]
    InternalError {
        #[allow(unused)]
        message: String,
    },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create an InvalidFrequency error
    pub fn invalid_frequency(
        volume: impl Into<String>,
        frequency: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidFrequency {
            volume: volume.into(),
            frequency: frequency.into(),
            reason: reason.into(),
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// True when the store could not be reached
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StorageError(e) if e.is_unavailable())
    }
}
