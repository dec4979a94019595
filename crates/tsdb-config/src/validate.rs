//! Settings validation errors.

use thiserror::Error;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Settings validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Connection test failed: {0}")]
    ConnectionTest(String),
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<ValidationError> for tsdb_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::MissingField(key) => tsdb_common::Error::MissingSetting { key },
            ValidationError::InvalidValue { field, message } => {
                tsdb_common::Error::InvalidSetting { field, message }
            }
            ValidationError::ConnectionTest(message) => tsdb_common::Error::Connection {
                host: String::new(),
                port: 0,
                attempts: 1,
                message,
            },
            other => tsdb_common::Error::Config(other.to_string()),
        }
    }
}
