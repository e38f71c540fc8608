//! The `{ok, error_kind, message, result}` reply every command returns.

use serde::Serialize;
use serde_json::Value;
use tradeflow_domain::{Result, TradeflowError};

/// Transport-agnostic command reply.
///
/// On success `result` holds the command's output. On failure `error_kind`
/// and `message` describe the error; a partial effect failure also carries
/// its report in `result` so callers know what to retry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandEnvelope {
    pub ok: bool,
    pub error_kind: Option<String>,
    pub message: Option<String>,
    pub result: Option<Value>,
    #[serde(skip)]
    exit_code: i32,
}

impl CommandEnvelope {
    pub fn success<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(result) => Self { ok: true, error_kind: None, message: None, result: Some(result), exit_code: 0 },
            Err(err) => Self::failure(&TradeflowError::from(err)),
        }
    }

    pub fn failure(error: &TradeflowError) -> Self {
        let result = match error {
            TradeflowError::PartialEffectFailure(report) => serde_json::to_value(report).ok(),
            _ => None,
        };
        Self {
            ok: false,
            error_kind: Some(error.kind().to_string()),
            message: Some(error.to_string()),
            result,
            exit_code: error.exit_code(),
        }
    }

    pub fn from_result<T: Serialize>(result: &Result<T>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(err) => Self::failure(err),
        }
    }

    /// Process exit code: 0 on success, else the error's code.
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// `result[pointer]`, e.g. `/workflow/id`.
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.result.as_ref().and_then(|r| r.pointer(pointer))
    }

    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.get(pointer).and_then(Value::as_str)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|err| {
            format!(r#"{{"ok":false,"error_kind":"internal_error","message":"{err}","result":null}}"#)
        })
    }
}
