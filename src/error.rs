//! Error types and handling for repsol-sync
//!
//! This module defines the internal error type used throughout the crate.
//! Upstream failures carry the [`Operation`] that observed them so the
//! classifier can fold them into the outward [`ErrorKind`] taxonomy.

use crate::classify::{ErrorKind, Operation, classify};
use thiserror::Error;

/// Result type alias for repsol-sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for repsol-sync
///
/// `Clone` so a single refresh outcome can be handed to every caller that
/// joined the same in-flight cycle.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors outside the upstream boundary
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// An upstream call exceeded its time bound
    #[error("Timeout during {operation}: {message}")]
    Timeout { operation: Operation, message: String },

    /// The upstream could not be reached
    #[error("Network error during {operation}: {message}")]
    Network { operation: Operation, message: String },

    /// The upstream answered with a non-success HTTP status
    #[error("HTTP {status} during {operation}: {message}")]
    Http {
        operation: Operation,
        status: u16,
        message: String,
    },

    /// The provider refused the credentials in its response payload
    #[error("Credentials rejected during {operation}: {message}")]
    Rejected { operation: Operation, message: String },

    /// The upstream payload did not have the expected shape
    #[error("Unexpected payload during {operation}: {message}")]
    Schema { operation: Operation, message: String },

    /// Authenticated, but the account lists no contracts
    #[error("Account has no contracts")]
    NoContracts,

    /// The operation was abandoned because the coordinator shut down
    #[error("Cancelled: {message}")]
    Cancelled { message: String },
}

impl SyncError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(operation: Operation, message: S) -> Self {
        Self::Timeout {
            operation,
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(operation: Operation, message: S) -> Self {
        Self::Network {
            operation,
            message: message.into(),
        }
    }

    /// Create a new HTTP status error
    pub fn http<S: Into<String>>(operation: Operation, status: u16, message: S) -> Self {
        Self::Http {
            operation,
            status,
            message: message.into(),
        }
    }

    /// Create a new credential rejection error
    pub fn rejected<S: Into<String>>(operation: Operation, message: S) -> Self {
        Self::Rejected {
            operation,
            message: message.into(),
        }
    }

    /// Create a new schema error
    pub fn schema<S: Into<String>>(operation: Operation, message: S) -> Self {
        Self::Schema {
            operation,
            message: message.into(),
        }
    }

    /// Create a new cancellation error
    pub fn cancelled<S: Into<String>>(message: S) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Operation that observed the failure, if it came from upstream
    pub const fn operation(&self) -> Option<Operation> {
        match self {
            Self::Timeout { operation, .. }
            | Self::Network { operation, .. }
            | Self::Http { operation, .. }
            | Self::Rejected { operation, .. }
            | Self::Schema { operation, .. } => Some(*operation),
            Self::NoContracts => Some(Operation::ListContracts),
            _ => None,
        }
    }

    /// Outward classification of this error
    pub fn kind(&self) -> ErrorKind {
        classify(self.operation().unwrap_or(Operation::Refresh), self)
    }

    /// Whether the upstream rejected the session or credentials
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            Self::Http {
                status: 401 | 403,
                ..
            } | Self::Rejected { .. }
        )
    }

    /// Re-tag a schema failure raised by a pure helper with the calling operation
    #[must_use]
    pub fn during(self, operation: Operation) -> Self {
        match self {
            Self::Schema { message, .. } => Self::Schema { operation, message },
            other => other,
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for SyncError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for SyncError {
    fn from(err: chrono::ParseError) -> Self {
        Self::validation("datetime".to_string(), err.to_string())
    }
}
