use http::StatusCode;
use thiserror::Error;

use crate::validation::ValidationFailure;

#[derive(Error, Debug)]
pub enum DataError {
    /// A one-shot contract was used twice, or in the wrong state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("The '{0}' is read-only")]
    ReadOnly(&'static str),

    #[error("Validation failed: {}", format_failures(.0))]
    Validation(Vec<ValidationFailure>),

    #[error("Storage error ({status}): {message}")]
    Storage { status: StatusCode, message: String },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Field '{0}' not found on '{1}'")]
    FieldNotFound(String, &'static str),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, DataError>;

impl DataError {
    pub fn storage(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Storage {
            status,
            message: message.into(),
        }
    }

    /// HTTP status a caller would surface for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Storage { status, .. } => *status,
            Self::Cancelled => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation(_))
    }

    pub fn validation_failures(&self) -> Option<&[ValidationFailure]> {
        match self {
            Self::Validation(failures) => Some(failures),
            _ => None,
        }
    }
}

fn format_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.property_name, failure.error_message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl<T> From<std::sync::PoisonError<T>> for DataError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let validation = DataError::Validation(vec![ValidationFailure::new("id", "must not be empty")]);
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);

        let conflict = DataError::storage(StatusCode::CONFLICT, "etag mismatch");
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let misuse = DataError::InvalidOperation("already saved".into());
        assert_eq!(misuse.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(misuse.is_invalid_operation());
    }

    #[test]
    fn test_validation_message_lists_every_failure() {
        let err = DataError::Validation(vec![
            ValidationFailure::new("id", "must not be empty"),
            ValidationFailure::new("partitionKey", "must not be empty"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: id: must not be empty; partitionKey: must not be empty"
        );
    }

    #[test]
    fn test_read_only_message_names_type() {
        let err = DataError::ReadOnly("test-item");
        assert_eq!(err.to_string(), "The 'test-item' is read-only");
    }
}
