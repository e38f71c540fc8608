//! Audit log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::EntityKind;

/// One appended audit event. `seq` is strictly increasing across the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub actor: String,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub verb: String,
    pub before_snapshot: Option<Value>,
    pub after_snapshot: Option<Value>,
    pub reason: Option<String>,
}
