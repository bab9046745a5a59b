//! Error types for Syllabus

use thiserror::Error;

/// Main error type for Syllabus operations
#[derive(Debug, Error)]
pub enum SyllabusError {
    /// Session could not be established, or was already closed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Record violates the schema
    #[error("Validation failed for field '{field}': {message}")]
    Validation {
        /// Offending field
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// Any other store-reported failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Optimistic save lost against a concurrent writer
    #[error("Version conflict on record '{id}': expected version {expected_version}")]
    Conflict {
        /// Record identifier
        id: String,
        /// Version the caller loaded
        expected_version: i64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient Result type using SyllabusError
pub type Result<T> = std::result::Result<T, SyllabusError>;

impl SyllabusError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        SyllabusError::Connection(msg.into())
    }

    /// Create a validation error for a field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SyllabusError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        SyllabusError::Storage(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(id: impl Into<String>, expected_version: i64) -> Self {
        SyllabusError::Conflict {
            id: id.into(),
            expected_version,
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        SyllabusError::Config(msg.into())
    }

    /// Field named by a validation error
    pub fn field(&self) -> Option<&str> {
        match self {
            SyllabusError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}
