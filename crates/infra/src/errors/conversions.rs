//! Conversions from external infrastructure errors into domain errors.

use r2d2::Error as PoolError;
use rusqlite::Error as SqlError;
use tokio::task::JoinError;
use tradeflow_common::storage::StorageError;
use tradeflow_domain::TradeflowError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TradeflowError);

impl From<InfraError> for TradeflowError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TradeflowError> for InfraError {
    fn from(value: TradeflowError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoTradeflowError {
    fn into_tradeflow(self) -> TradeflowError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → TradeflowError */
/* -------------------------------------------------------------------------- */

const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_TRIGGER: i32 = 1811;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

impl IntoTradeflowError for SqlError {
    fn into_tradeflow(self) -> TradeflowError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => TradeflowError::storage("database is busy"),
                    (ErrorCode::DatabaseLocked, _) => TradeflowError::storage("database is locked"),
                    (
                        ErrorCode::ConstraintViolation,
                        SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY,
                    ) => TradeflowError::DuplicateId(message),
                    (ErrorCode::ConstraintViolation, SQLITE_CONSTRAINT_TRIGGER) => {
                        TradeflowError::storage(format!("rejected by schema trigger: {message}"))
                    }
                    _ => TradeflowError::storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => TradeflowError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                TradeflowError::storage(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                TradeflowError::storage(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => TradeflowError::storage(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => TradeflowError::storage(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_tradeflow())
    }
}

/* -------------------------------------------------------------------------- */
/* StorageError → TradeflowError */
/* -------------------------------------------------------------------------- */

impl IntoTradeflowError for StorageError {
    fn into_tradeflow(self) -> TradeflowError {
        match self {
            StorageError::Rusqlite(err) => err.into_tradeflow(),
            StorageError::SerdeJson(err) => {
                TradeflowError::internal(format!("stored document is not valid JSON: {err}"))
            }
            StorageError::Timeout(secs) => {
                TradeflowError::storage(format!("no database connection within {secs}s"))
            }
            other => TradeflowError::storage(other.to_string()),
        }
    }
}

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        InfraError(value.into_tradeflow())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2 / tokio / io → TradeflowError */
/* -------------------------------------------------------------------------- */

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        InfraError(TradeflowError::storage(format!("connection pool error: {value}")))
    }
}

impl From<JoinError> for InfraError {
    fn from(value: JoinError) -> Self {
        let message = if value.is_panic() {
            "blocking database task panicked".to_string()
        } else {
            format!("blocking database task was cancelled: {value}")
        };
        InfraError(TradeflowError::internal(message))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(TradeflowError::storage(format!("io error: {value}")))
    }
}

/// Shorthand used by the adapters: storage failure to domain error.
pub fn storage_error(err: StorageError) -> TradeflowError {
    InfraError::from(err).into()
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use rusqlite::ffi::{Error as FfiError, ErrorCode};

    use super::*;

    fn failure(code: ErrorCode, extended_code: i32, message: &str) -> SqlError {
        SqlError::SqliteFailure(FfiError { code, extended_code }, Some(message.into()))
    }

    #[test]
    fn sqlite_busy_maps_to_storage_error() {
        let mapped: TradeflowError =
            InfraError::from(failure(ErrorCode::DatabaseBusy, 5, "database is locked")).into();
        match mapped {
            TradeflowError::Storage(msg) => assert!(msg.contains("busy")),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[test]
    fn unique_violation_maps_to_duplicate_id() {
        let err = failure(
            ErrorCode::ConstraintViolation,
            SQLITE_CONSTRAINT_UNIQUE,
            "UNIQUE constraint failed: cash_transactions.id",
        );
        let mapped: TradeflowError = InfraError::from(err).into();
        assert_eq!(mapped.kind(), "duplicate_id");
        assert_eq!(mapped.exit_code(), 3);
    }

    #[test]
    fn append_only_trigger_maps_to_storage_error() {
        let err = failure(
            ErrorCode::ConstraintViolation,
            SQLITE_CONSTRAINT_TRIGGER,
            "events are append-only",
        );
        let mapped: TradeflowError = storage_error(StorageError::Rusqlite(err));
        assert_eq!(mapped.kind(), "storage_error");
    }

    #[test]
    fn missing_row_maps_to_not_found() {
        let mapped: TradeflowError = InfraError::from(SqlError::QueryReturnedNoRows).into();
        assert_eq!(mapped.exit_code(), 2);
    }

    #[test]
    fn pool_timeout_is_a_storage_error() {
        let mapped = storage_error(StorageError::Timeout(5));
        assert!(matches!(mapped, TradeflowError::Storage(ref msg) if msg.contains("5s")));
    }
}
