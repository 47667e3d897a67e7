use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

/// Runtime error type for volume lifecycle and backend operations
#[derive(Error, Debug, Diagnostic)]
pub enum RuntimeError {
    /// Volume does not exist (or was removed by a concurrent request)
    #[error("Volume {volume} no longer exists")]
    #[diagnostic(
        code(voldock::runtime::volume_not_found),
        help("The volume was already removed, possibly by a concurrent request. Nothing left to do")
    )]
    VolumeNotFound {
        #[allow(unused)]
        volume: String,
    },

    /// Volume already exists
    #[error("Volume {volume} already exists")]
    #[diagnostic(
        code(voldock::runtime::volume_already_exists),
        help("Remove the existing volume first, or use a different volume name")
    )]
    VolumeAlreadyExists {
        #[allow(unused)]
        volume: String,
    },

    /// Requested filesystem is not offered by the policy
    #[error("Invalid filesystem {fs_type:?} for policy {policy:?}")]
    #[diagnostic(
        code(voldock::runtime::invalid_filesystem),
        help("Use one of the filesystems listed in the policy's fileSystems table, or add an entry for it")
    )]
    InvalidFilesystem {
        #[allow(unused)]
        fs_type: String,
        #[allow(unused)]
        policy: String,
    },

    /// Backend call exceeded its time bound
    #[error("{operation} of {target} timed out after {timeout:?}")]
    #[diagnostic(
        code(voldock::runtime::timeout),
        help("The storage backend did not answer in time. Check backend health or raise the timeout in the global configuration")
    )]
    Timeout {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        target: String,
        #[allow(unused)]
        timeout: Duration,
    },

    /// Opaque backend failure
    #[error("Backend operation failed for '{volume}': {message}")]
    #[diagnostic(
        code(voldock::runtime::backend_error),
        help("Check the storage backend logs for details")
    )]
    BackendError {
        #[allow(unused)]
        volume: String,
        #[allow(unused)]
        message: String,
    },

    /// Snapshot does not exist
    #[error("Snapshot {snapshot} of volume {volume} does not exist")]
    #[diagnostic(
        code(voldock::runtime::snapshot_not_found),
        help("List the volume's snapshots to see which ones remain")
    )]
    SnapshotNotFound {
        #[allow(unused)]
        volume: String,
        #[allow(unused)]
        snapshot: String,
    },

    /// Command execution failed
    #[error("Command '{command}' failed with exit code {exit_code}")]
    #[diagnostic(code(voldock::runtime::command_failed), help("stderr: {stderr}"))]
    CommandFailed {
        #[allow(unused)]
        command: String,
        #[allow(unused)]
        exit_code: i32,
        #[allow(unused)]
        stderr: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(voldock::runtime::invalid_config), help("{suggestion}"))]
    InvalidConfig {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// Core library error
    #[error(transparent)]
    #[diagnostic(transparent)]
    CoreError(#[from] voldock_core::VoldockError),

    /// Storage error
    #[error(transparent)]
    #[diagnostic(transparent)]
    StorageError(#[from] voldock_storage::StorageError),

    /// Internal error
    #[error("Internal runtime error: {message}")]
    #[diagnostic(
        code(voldock::runtime::internal_error),
        help("This is likely a bug in voldock-runtime. Please report it with the full error details")
    )]
    InternalError {
        #[allow(unused)]
        message: String,
    },
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    pub fn volume_not_found(volume: impl Into<String>) -> Self {
        Self::VolumeNotFound {
            volume: volume.into(),
        }
    }

    pub fn volume_already_exists(volume: impl Into<String>) -> Self {
        Self::VolumeAlreadyExists {
            volume: volume.into(),
        }
    }

    pub fn invalid_filesystem(fs_type: impl Into<String>, policy: impl Into<String>) -> Self {
        Self::InvalidFilesystem {
            fs_type: fs_type.into(),
            policy: policy.into(),
        }
    }

    pub fn timeout(
        operation: impl Into<String>,
        target: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::Timeout {
            operation: operation.into(),
            target: target.into(),
            timeout,
        }
    }

    pub fn backend_error(volume: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendError {
            volume: volume.into(),
            message: message.into(),
        }
    }

    pub fn snapshot_not_found(volume: impl Into<String>, snapshot: impl Into<String>) -> Self {
        Self::SnapshotNotFound {
            volume: volume.into(),
            snapshot: snapshot.into(),
        }
    }

    pub fn command_failed(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// True when the error means the volume is already gone
    pub fn is_volume_not_found(&self) -> bool {
        matches!(self, Self::VolumeNotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
