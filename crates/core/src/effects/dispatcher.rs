//! Effect dispatcher
//!
//! Runs the planned effects of one source in ordinal order, each committed
//! on its own together with its completion mark. Completed effects are never
//! applied again, so dispatching a source any number of times applies each
//! effect exactly once. The first failure stops the run: the failed effect
//! is marked `failed`, the partial failure is logged as an event and the
//! remaining effects stay pending until `retry`.

use std::sync::Arc;

use tracing::{debug, info, warn};
use tradeflow_domain::{
    EffectFailure, EffectFailureReport, EffectRecord, EffectReport, EffectStatus, Result,
    TradeflowError,
};

use super::handler::{EffectContext, EffectHandlerRegistry};
use crate::audit::{AuditLog, EventDraft};
use crate::clock::Clock;
use crate::locks::{keys, AggregateLocks};
use crate::store::{EffectRepository, UnitOfWork, Write, WriteBatch};

pub struct EffectDispatcher {
    ctx: EffectContext,
    registry: EffectHandlerRegistry,
    effects: Arc<dyn EffectRepository>,
    uow: Arc<dyn UnitOfWork>,
    audit: Arc<AuditLog>,
    locks: Arc<AggregateLocks>,
    clock: Arc<dyn Clock>,
}

impl EffectDispatcher {
    pub fn new(
        ctx: EffectContext,
        registry: EffectHandlerRegistry,
        audit: Arc<AuditLog>,
        locks: Arc<AggregateLocks>,
    ) -> Self {
        let effects = ctx.stores.effects.clone();
        let uow = ctx.stores.uow.clone();
        let clock = ctx.clock.clone();
        Self { ctx, registry, effects, uow, audit, locks, clock }
    }

    /// Apply every effect of `source_id` that is not completed yet.
    pub async fn dispatch(&self, source_id: &str) -> Result<EffectReport> {
        let _guard = self.locks.lock(&keys::effects(source_id)).await;
        let records = self.effects.effects_for_source(source_id).await?;
        let mut report = EffectReport { source_id: source_id.to_string(), ..EffectReport::default() };
        let mut completed = Vec::new();

        let mut remaining = records.into_iter();
        while let Some(record) = remaining.next() {
            if record.is_completed() {
                completed.push(record.key.clone());
                report.already_done.push(record.key);
                continue;
            }
            match self.apply(&record).await {
                Ok(()) => {
                    completed.push(record.key.clone());
                    report.applied.push(record.key);
                }
                Err(err) => {
                    let mut failure = EffectFailureReport::new(source_id);
                    failure.failed.push(EffectFailure { key: record.key.clone(), error: err.to_string() });
                    for rest in remaining {
                        if rest.is_completed() {
                            completed.push(rest.key);
                        } else {
                            failure.pending.push(rest.key);
                        }
                    }
                    failure.completed = completed;
                    warn!(
                        source_id,
                        effect = %record.key,
                        error = %err,
                        completed = failure.completed.len(),
                        pending = failure.pending.len(),
                        "effect failed"
                    );
                    self.record_failure(&record, &err, &failure).await;
                    return Err(TradeflowError::PartialEffectFailure(failure));
                }
            }
        }

        if !report.applied.is_empty() {
            info!(source_id, applied = report.applied.len(), already_done = report.already_done.len(), "effects applied");
        }
        Ok(report)
    }

    /// Re-run the unfinished effects of a source.
    pub async fn retry(&self, source_id: &str) -> Result<EffectReport> {
        if self.effects.effects_for_source(source_id).await?.is_empty() {
            return Err(TradeflowError::NotFound(format!("no effects recorded for '{source_id}'")));
        }
        info!(source_id, "retrying effects");
        self.dispatch(source_id).await
    }

    pub async fn effects_for(&self, source_id: &str) -> Result<Vec<EffectRecord>> {
        self.effects.effects_for_source(source_id).await
    }

    /// Effects waiting for a first run or a retry.
    pub async fn unfinished(&self) -> Result<Vec<EffectRecord>> {
        let mut records = self.effects.effects_with_status(EffectStatus::Failed).await?;
        records.extend(self.effects.effects_with_status(EffectStatus::Pending).await?);
        records.sort_by(|a, b| (&a.key.source_id, a.ordinal).cmp(&(&b.key.source_id, b.ordinal)));
        Ok(records)
    }

    async fn apply(&self, record: &EffectRecord) -> Result<()> {
        let handler = self
            .registry
            .get(record.key.kind)
            .ok_or_else(|| TradeflowError::internal(format!("no handler for effect {}", record.key.kind)))?;
        let _lock = match handler.lock_key(record) {
            Some(key) => Some(self.locks.lock(&key).await),
            None => None,
        };

        let mut batch = handler.apply(&self.ctx, record).await?;
        let mut done = record.clone();
        done.status = EffectStatus::Completed;
        done.attempts += 1;
        done.last_error = None;
        done.completed_at = Some(self.clock.now());
        batch.push(Write::Effect(done));
        self.uow.commit(batch).await?;

        debug!(effect = %record.key, "effect applied");
        Ok(())
    }

    /// Best effort: the run already failed, so a failure to record it is
    /// only logged.
    async fn record_failure(&self, record: &EffectRecord, err: &TradeflowError, report: &EffectFailureReport) {
        let mut failed = record.clone();
        failed.status = EffectStatus::Failed;
        failed.attempts += 1;
        failed.last_error = Some(err.to_string());

        let draft = EventDraft::new(
            record.trigger.actor(),
            record.source_kind,
            &record.key.source_id,
            "effects_partially_failed",
        )
        .reason(Some(err.to_string()));
        let outcome = async {
            let draft = draft.after(report)?;
            let mut batch = WriteBatch::new().with(Write::Effect(failed));
            self.audit.record(&mut batch, draft).await?;
            self.uow.commit(batch).await
        }
        .await;
        if let Err(record_err) = outcome {
            warn!(effect = %record.key, error = %record_err, "could not record effect failure");
        }
    }
}
