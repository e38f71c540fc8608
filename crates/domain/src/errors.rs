//! Domain error types
//!
//! Every command returns exactly one of these kinds. The `kind()` label and
//! `exit_code()` are part of the external contract (command envelopes and the
//! CLI); keep them stable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::effects::EffectFailureReport;
use crate::types::ids::EntityKind;
use crate::types::money::Currency;

/// Main error type for Tradeflow
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TradeflowError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Duplicate workflow: {0}")]
    DuplicateWorkflow(String),

    #[error("Already decided: {0}")]
    AlreadyDecided(String),

    #[error("No {currency} rate on or before {date}")]
    RateUnavailable { currency: Currency, date: NaiveDate },

    #[error("Partial effect failure: {0}")]
    PartialEffectFailure(EffectFailureReport),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Tradeflow operations
pub type Result<T> = std::result::Result<T, TradeflowError>;

impl TradeflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: EntityKind, id: impl AsRef<str>) -> Self {
        Self::NotFound(format!("{kind} '{}'", id.as_ref()))
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::StateConflict(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable snake_case label reported as `error_kind`.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::StateConflict(_) => "state_conflict",
            Self::DuplicateId(_) => "duplicate_id",
            Self::DuplicateWorkflow(_) => "duplicate_workflow",
            Self::AlreadyDecided(_) => "already_decided",
            Self::RateUnavailable { .. } => "rate_unavailable",
            Self::PartialEffectFailure(_) => "partial_effect_failure",
            Self::Storage(_) => "storage_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::Config(_) => "config_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Process exit code for CLI callers.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_)
            | Self::Unauthorized(_)
            | Self::RateUnavailable { .. }
            | Self::Config(_) => 1,
            Self::NotFound(_) => 2,
            Self::StateConflict(_)
            | Self::DuplicateId(_)
            | Self::DuplicateWorkflow(_)
            | Self::AlreadyDecided(_) => 3,
            Self::Storage(_) | Self::Internal(_) => 4,
            Self::PartialEffectFailure(_) => 5,
        }
    }

    /// True when the command changed nothing before failing.
    pub const fn is_side_effect_free(&self) -> bool {
        !matches!(self, Self::PartialEffectFailure(_))
    }
}

impl From<serde_json::Error> for TradeflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization failed: {err}"))
    }
}
