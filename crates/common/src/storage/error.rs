//! Storage error types

use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Connection timeout after {0}s")]
    Timeout(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Common(#[from] crate::CommonError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    R2d2(#[from] r2d2::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// True when SQLite reported a uniqueness or primary-key violation.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Rusqlite(err) => {
                matches!(err.sqlite_error_code(), Some(rusqlite::ErrorCode::ConstraintViolation))
            }
            _ => false,
        }
    }

    /// Add operation context to the error
    pub fn with_operation(self, operation: impl Into<String>) -> Self {
        Self::Common(crate::CommonError::storage(self.to_string(), Some(operation.into())))
    }
}

impl ErrorClassification for StorageError {
    /// Busy and locked databases are transient, as are pool timeouts.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Rusqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
            ),
            Self::Common(common_err) => common_err.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Migration(_) => ErrorSeverity::Critical,
            Self::Common(common_err) => common_err.severity(),
            Self::Rusqlite(_) if self.is_retryable() => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Migration(_))
            || matches!(self, Self::Common(err) if err.is_critical())
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::Common(common_err) => common_err.retry_after(),
            _ => None,
        }
    }
}

impl From<StorageError> for crate::CommonError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Common(common) => common,
            other => crate::CommonError::storage(other.to_string(), None),
        }
    }
}
