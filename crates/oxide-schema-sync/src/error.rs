//! Error types for the synchronization engine.

use oxide_schema::error::SchemaError;

/// Errors that can occur while synchronizing a schema.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The target model is internally inconsistent, or references objects
    /// that do not exist. Raised before any statement executes.
    #[error("invalid definition of {object}: {message}")]
    Validation {
        /// The object whose definition is invalid.
        object: String,
        /// What is wrong with it.
        message: String,
    },

    /// A type descriptor has no resolvable native type for the active
    /// dialect. Raised during planning.
    #[error("cannot map type of column '{column}' to {dialect}: {message}")]
    TypeMapping {
        /// Dialect the mapping was attempted for.
        dialect: &'static str,
        /// Column whose type failed to map.
        column: String,
        /// Why the mapping failed.
        message: String,
    },

    /// A requested change would silently lose data (an unrequested column
    /// drop, or a non-nullable column with no usable default). Always
    /// fatal, never auto-resolved.
    #[error("refusing change to table '{table}': {detail}")]
    DataLoss {
        /// The table the change targets.
        table: String,
        /// What would be lost.
        detail: String,
    },

    /// The live database rejected a statement. Never retried
    /// automatically: DDL is not safe to blindly re-issue.
    #[error("statement failed for {object}: {message}\n  statement: {statement}")]
    Backend {
        /// The object the statement belonged to.
        object: String,
        /// The statement that failed.
        statement: String,
        /// The backend's error message.
        message: String,
    },

    /// Post-swap verification found the rebuilt table differing from the
    /// target definition.
    #[error("rebuilt table '{table}' does not match its target: {detail}")]
    RecreationIntegrity {
        /// The table that was rebuilt.
        table: String,
        /// The observed differences.
        detail: String,
    },

    /// The caller's cancellation signal fired. Checked before each
    /// statement, never by aborting one in flight.
    #[error("operation on {object} cancelled before the next statement")]
    Cancelled {
        /// The object being synchronized when cancellation was observed.
        object: String,
    },
}

impl SyncError {
    /// Creates a validation error for the given object.
    #[must_use]
    pub fn validation(object: impl AsRef<str>, message: impl AsRef<str>) -> Self {
        Self::Validation {
            object: object.as_ref().to_string(),
            message: message.as_ref().to_string(),
        }
    }
}

impl From<SchemaError> for SyncError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Validation { object, message } => Self::Validation { object, message },
            SchemaError::TypeMapping {
                dialect,
                column,
                message,
            } => Self::TypeMapping {
                dialect,
                column,
                message,
            },
            SchemaError::MalformedIdentifier { name, message } => Self::Validation {
                object: format!("identifier {name:?}"),
                message,
            },
        }
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
