//! Common error types and classification
//!
//! Every error type in the workspace implements [`ErrorClassification`] so
//! callers can make retry and logging decisions without matching on concrete
//! variants.
//!
//! | Level | Use Case |
//! |-------|----------|
//! | **Info** | Expected conditions such as a missing record |
//! | **Warning** | Degraded but operational, usually transient |
//! | **Error** | Failure requiring attention |
//! | **Critical** | Data integrity at risk |
//!
//! Module errors compose with [`CommonError`] rather than repeating its
//! variants:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum LedgerError {
//!     #[error("ledger closed for {0}")]
//!     Closed(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Error patterns shared by several modules
#[derive(Debug, Clone, Error)]
pub enum CommonError {
    /// Configuration-related errors
    #[error("Configuration error{}: {message}", field_suffix(.field))]
    Config { message: String, field: Option<String> },

    /// Lock acquisition or concurrency errors
    #[error("Lock error{}: {message}", field_suffix(.resource))]
    Lock { message: String, resource: Option<String> },

    /// Serialization or deserialization errors
    #[error("Serialization error{}: {message}", field_suffix(.format))]
    Serialization { message: String, format: Option<String> },

    /// Timeout errors
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// Validation errors
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    /// Credential or permission failures
    #[error("Unauthorized: {operation}")]
    Unauthorized { operation: String },

    /// Storage/database errors
    #[error("Storage error{}: {message}", field_suffix(.operation))]
    Storage { message: String, operation: Option<String> },

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn field_suffix(value: &Option<String>) -> String {
    value.as_ref().map(|v| format!(" ({v})")).unwrap_or_default()
}

impl CommonError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn lock(message: impl Into<String>) -> Self {
        Self::Lock { message: message.into(), resource: None }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), format: None }
    }

    pub fn serialization_format(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn unauthorized(operation: impl Into<String>) -> Self {
        Self::Unauthorized { operation: operation.into() }
    }

    pub fn storage(message: impl Into<String>, operation: Option<String>) -> Self {
        Self::Storage { message: message.into(), operation }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Lock { .. } | Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Lock { .. } | Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Validation { .. } | Self::Unauthorized { .. } => ErrorSeverity::Info,
            Self::Config { .. } | Self::Serialization { .. } | Self::Storage { .. } => {
                ErrorSeverity::Error
            }
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Timeout { duration, .. } => Some(*duration),
            _ => None,
        }
    }
}

/// Classification interface implemented by every error in the workspace.
pub trait ErrorClassification {
    /// Whether the failed operation may succeed if attempted again.
    fn is_retryable(&self) -> bool;

    /// Severity used for logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Whether the error signals an integrity problem.
    fn is_critical(&self) -> bool;

    /// Suggested retry delay, if any.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string(), Some("io".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_ascending() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }

    #[test]
    fn display_includes_optional_context() {
        let err = CommonError::config_field("database.path", "must not be empty");
        assert_eq!(err.to_string(), "Configuration error (database.path): must not be empty");

        let err = CommonError::config("missing file");
        assert_eq!(err.to_string(), "Configuration error: missing file");
    }

    #[test]
    fn timeouts_are_retryable_with_delay() {
        let err = CommonError::timeout("acquire", Duration::from_secs(5));
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn validation_is_not_retryable() {
        let err = CommonError::validation("amount", "must be positive");
        assert!(!err.is_retryable());
        assert!(!err.is_critical());
        assert_eq!(err.severity(), ErrorSeverity::Info);
    }

    #[test]
    fn internal_errors_are_critical() {
        assert!(CommonError::internal("invariant broken").is_critical());
    }

    #[test]
    fn serde_json_errors_convert_to_serialization() {
        let raw = serde_json::from_str::<serde_json::Value>("{not json");
        let err = CommonError::from(raw.unwrap_err());
        assert!(matches!(err, CommonError::Serialization { format: Some(ref f), .. } if f == "JSON"));
    }
}
