use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tradeflow_domain::{EntityKind, Event, Result};

use super::sequencer::SequenceAllocator;
use crate::clock::Clock;
use crate::store::{EventRepository, Write, WriteBatch};

/// An event before it has a sequence number.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub actor: String,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub verb: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub reason: Option<String>,
}

impl EventDraft {
    pub fn new(
        actor: impl Into<String>,
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        verb: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            entity_kind,
            entity_id: entity_id.into(),
            verb: verb.into(),
            before: None,
            after: None,
            reason: None,
        }
    }

    pub fn before<T: Serialize>(mut self, snapshot: &T) -> Result<Self> {
        self.before = Some(serde_json::to_value(snapshot)?);
        Ok(self)
    }

    pub fn after<T: Serialize>(mut self, snapshot: &T) -> Result<Self> {
        self.after = Some(serde_json::to_value(snapshot)?);
        Ok(self)
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

pub struct AuditLog {
    allocator: SequenceAllocator,
    events: Arc<dyn EventRepository>,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new(events: Arc<dyn EventRepository>, clock: Arc<dyn Clock>, block_size: u32) -> Self {
        Self { allocator: SequenceAllocator::new(events.clone(), block_size), events, clock }
    }

    /// Assign the next sequence number and timestamp to `draft`.
    pub async fn stamp(&self, draft: EventDraft) -> Result<Event> {
        let seq = self.allocator.next().await?;
        Ok(Event {
            seq,
            at: self.clock.now(),
            actor: draft.actor,
            entity_kind: draft.entity_kind,
            entity_id: draft.entity_id,
            verb: draft.verb,
            before_snapshot: draft.before,
            after_snapshot: draft.after,
            reason: draft.reason,
        })
    }

    /// Stamp `draft` and add it to `batch`.
    pub async fn record(&self, batch: &mut WriteBatch, draft: EventDraft) -> Result<u64> {
        let event = self.stamp(draft).await?;
        let seq = event.seq;
        batch.push(Write::Event(event));
        Ok(seq)
    }

    pub async fn history(&self, kind: EntityKind, id: &str) -> Result<Vec<Event>> {
        self.events.history(kind, id).await
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Event>> {
        self.events.recent(limit).await
    }
}
