//! Error types for the schema model and dialect layer.

/// Errors raised while validating schema models or mapping types.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The model is internally inconsistent (dangling constraint reference,
    /// duplicate column name, mismatched foreign key arity, ...).
    #[error("invalid definition of {object}: {message}")]
    Validation {
        /// The object whose definition is invalid (e.g. `table 'orders'`).
        object: String,
        /// What is wrong with it.
        message: String,
    },

    /// A type descriptor has no native representation for the active dialect
    /// and no usable override.
    #[error("cannot map type of column '{column}' to {dialect}: {message}")]
    TypeMapping {
        /// Dialect the mapping was attempted for.
        dialect: &'static str,
        /// Column whose type failed to map.
        column: String,
        /// Why the mapping failed.
        message: String,
    },

    /// An identifier cannot be safely quoted for the active dialect.
    #[error("malformed identifier {name:?}: {message}")]
    MalformedIdentifier {
        /// The offending identifier.
        name: String,
        /// Why it was rejected.
        message: String,
    },
}

impl SchemaError {
    /// Creates a validation error for the given object.
    #[must_use]
    pub fn validation(object: impl AsRef<str>, message: impl AsRef<str>) -> Self {
        Self::Validation {
            object: object.as_ref().to_string(),
            message: message.as_ref().to_string(),
        }
    }
}

/// Result type for schema model operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
