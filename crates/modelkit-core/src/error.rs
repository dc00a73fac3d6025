//! Error types shared by every modelkit crate.
//!
//! Errors here are reserved for programming mistakes and violated
//! preconditions. The outcome of executing a statement is reported through
//! a result object by the query layer and never through this enum.

use thiserror::Error;

/// Result alias used across modelkit.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All failures raised by descriptor compilation and the save pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A model declaration is structurally invalid.
    ///
    /// Raised for unknown generator references, timestamp roles on columns
    /// that cannot hold a timestamp, invalid identifiers, or a missing
    /// declaration that an operation requires (for example a soft-delete
    /// operation on a model without a soft-delete declaration).
    #[error("invalid model configuration for `{class}`: {message}")]
    Configuration {
        /// The class whose declaration is wrong.
        class: String,
        /// What is wrong with it.
        message: String,
    },

    /// No declaration is registered under this class name.
    #[error("unknown model class `{0}`")]
    UnknownModel(String),

    /// A mutating statement could not be scoped, e.g. no primary key value.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A value does not fit the column it was assigned to.
    #[error("invalid value for field `{field}`: {message}")]
    Value {
        /// Property name of the offending field.
        field: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The connection could not run a statement at all.
    #[error("query error: {0}")]
    Query(String),

    /// JSON encoding or decoding failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error for `class`.
    pub fn configuration(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Build a value error for `field`.
    pub fn value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Value {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error reports a mistake in a model declaration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::UnknownModel(_))
    }

    /// Whether this error reports an unscoped mutating statement.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let err = Error::configuration("app::Article", "unknown generator `snow`");
        assert_eq!(
            err.to_string(),
            "invalid model configuration for `app::Article`: unknown generator `snow`"
        );
        assert!(err.is_configuration());
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_precondition_classification() {
        let err = Error::Precondition("primary key can not be null".into());
        assert!(err.is_precondition());
        assert!(!err.is_configuration());
    }
}
