// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Storage error type
#[derive(Error, Debug, Diagnostic)]
pub enum StorageError {
    /// Key not found
    #[error("Key not found: {key}")]
    #[diagnostic(
        code(storage::key_not_found),
        help("Verify the key exists in the store")
    )]
    KeyNotFound {
        key: String,
    },

    /// Key already exists
    #[error("Key already exists: {key}")]
    #[diagnostic(
        code(storage::key_already_exists),
        help("Remove the existing record first, or use a different name")
    )]
    AlreadyExists {
        key: String,
    },

    /// Store unreachable
    #[error("Store unavailable: {message}")]
    #[diagnostic(
        code(storage::unavailable),
        help("Check that the store is running and reachable. This layer does not retry; retry the operation once the store is back")
    )]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(storage::serialization_error),
        help("The stored record is not valid for this version of voldock. Re-publish it")
    )]
    SerializationError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Record rejected by validation
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] voldock_core::VoldockError),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    /// Create a KeyNotFound error
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Create an AlreadyExists error
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Create an Unavailable error
    pub fn unavailable(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Unavailable {
            message: message.into(),
            source,
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::unavailable(format!("redb error: {}", err), Some(Box::new(err)))
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::unavailable(format!("Database error: {}", err), Some(Box::new(err)))
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::unavailable(format!("Transaction error: {}", err), Some(Box::new(err)))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::unavailable(format!("Storage error: {}", err), Some(Box::new(err)))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::unavailable(format!("Table error: {}", err), Some(Box::new(err)))
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::unavailable(format!("Commit error: {}", err), Some(Box::new(err)))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::serialization_error(format!("JSON error: {}", err), Some(Box::new(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes_are_distinguishable() {
        let err = StorageError::key_not_found("/voldock/policies/bar");
        assert!(err.is_not_found());
        assert!(!err.is_unavailable());

        let err = StorageError::unavailable("connection refused", None);
        assert!(err.is_unavailable());
        assert!(!err.is_not_found());
    }
}
