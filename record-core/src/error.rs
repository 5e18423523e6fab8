//! Error types for gateway records

use crate::error_set::ErrorSet;
use crate::types::{EntityKind, Operation};
use thiserror::Error;

/// Result type for record operations
pub type Result<T> = std::result::Result<T, Error>;

/// Record errors
#[derive(Error, Debug)]
pub enum Error {
    /// Local validation rejected the record before any transport call
    #[error("Validation failed: {0}")]
    ValidationFailed(ErrorSet),

    /// The gateway rejected the record with field-level errors
    #[error("Remote validation failed: {0}")]
    RemoteValidationFailed(ErrorSet),

    /// Operation not declared for this entity type
    #[error("Unsupported operation: {operation} on {kind}")]
    UnsupportedOperation {
        /// Entity type the call was made on
        kind: EntityKind,
        /// Operation that was attempted
        operation: Operation,
    },

    /// Operation requires a persisted record
    #[error("Record not persisted: {0}")]
    NotPersisted(EntityKind),

    /// Create called on a record that already has an identity
    #[error("Record already persisted: {0}")]
    AlreadyPersisted(EntityKind),

    /// Transport collaborator failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Validation failures, local or remote, carry an error set
    pub fn error_set(&self) -> Option<&ErrorSet> {
        match self {
            Error::ValidationFailed(errors) | Error::RemoteValidationFailed(errors) => Some(errors),
            _ => None,
        }
    }

    /// Whether this is a local or remote validation failure
    pub fn is_validation(&self) -> bool {
        self.error_set().is_some()
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_expose_error_set() {
        let mut errors = ErrorSet::new();
        errors.add("amount", "can't be blank");

        let err = Error::RemoteValidationFailed(errors);
        assert!(err.is_validation());
        assert_eq!(err.error_set().unwrap().on("amount"), ["can't be blank"]);

        let err = Error::Transport("connection reset".into());
        assert!(!err.is_validation());
        assert!(err.error_set().is_none());
    }

    #[test]
    fn test_unsupported_operation_message() {
        let err = Error::UnsupportedOperation {
            kind: EntityKind::Transaction,
            operation: Operation::Delete,
        };
        assert_eq!(err.to_string(), "Unsupported operation: delete on transaction");
    }
}
