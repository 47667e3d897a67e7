// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for Voldock data model operations
#[derive(Error, Debug, Diagnostic)]
pub enum VoldockError {
    /// Validation failed
    #[error("Validation failed for {resource_type}: {details}")]
    #[diagnostic(code(voldock::validation_failed), help("{help_text}"))]
    ValidationFailed {
        #[allow(unused)]
        resource_type: String,
        #[allow(unused)]
        details: String,
        #[allow(unused)]
        help_text: String,
    },

    /// Size string could not be parsed
    #[error("Invalid size {size:?}: {reason}")]
    #[diagnostic(
        code(voldock::size_parse),
        help("Sizes are a positive integer followed by one of B, KB, MB, GB, TB, PB (e.g. \"10MB\")")
    )]
    SizeParse {
        #[allow(unused)]
        size: String,
        #[allow(unused)]
        reason: String,
    },

    /// Duration string could not be parsed
    #[error("Invalid duration {duration:?}: {reason}")]
    #[diagnostic(
        code(voldock::duration_parse),
        help("Durations are a positive integer followed by a time unit (e.g. \"30s\", \"5m\", \"1h\")")
    )]
    DurationParse {
        #[allow(unused)]
        duration: String,
        #[allow(unused)]
        reason: String,
    },

    /// Invalid policy or volume name
    #[error("Invalid name: {name}")]
    #[diagnostic(
        code(voldock::invalid_name),
        help("Names must be 1-63 lowercase alphanumeric characters, '-' or '_', starting and ending with an alphanumeric character")
    )]
    InvalidName {
        #[allow(unused)]
        name: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(voldock::serialization_error),
        help("Ensure the document is valid JSON or YAML and matches the expected structure")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for Voldock core operations
pub type Result<T> = std::result::Result<T, VoldockError>;

impl VoldockError {
    /// Create a ValidationFailed error
    pub fn validation_failed(
        resource_type: impl Into<String>,
        details: impl Into<String>,
        help_text: impl Into<String>,
    ) -> Self {
        Self::ValidationFailed {
            resource_type: resource_type.into(),
            details: details.into(),
            help_text: help_text.into(),
        }
    }

    /// Create a SizeParse error
    pub fn size_parse(size: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SizeParse {
            size: size.into(),
            reason: reason.into(),
        }
    }

    /// Create a DurationParse error
    pub fn duration_parse(duration: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DurationParse {
            duration: duration.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidName error
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
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
}
