//! Workflow engine
//!
//! Runs the five-stage fulfilment pipeline of an approved quotation. Each
//! command locks the workflow, applies the transition on the domain type,
//! re-checks the stage invariants and commits the workflow, its event and
//! the effects the transition planned in one batch.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};
use tradeflow_domain::{
    EffectTrigger, EntityKind, IdFamily, Quotation, RecognitionBasis, Result, StageOutcome,
    StageStatus, TradeflowError, Workflow, WorkflowFilter,
};

use crate::audit::{AuditLog, EventDraft};
use crate::clock::Clock;
use crate::effects::plan::{self, PlanContext};
use crate::ids::IdService;
use crate::locks::{keys, AggregateLocks};
use crate::store::{Stores, Write, WriteBatch};

/// Result of `advance` or `skip`.
#[derive(Debug, Clone, Serialize)]
pub struct Transitioned {
    pub workflow: Workflow,
    pub outcome: StageOutcome,
    pub planned_effects: bool,
}

pub struct WorkflowService {
    stores: Stores,
    ids: Arc<IdService>,
    audit: Arc<AuditLog>,
    locks: Arc<AggregateLocks>,
    clock: Arc<dyn Clock>,
    recognition: RecognitionBasis,
}

impl WorkflowService {
    pub fn new(
        stores: Stores,
        ids: Arc<IdService>,
        audit: Arc<AuditLog>,
        locks: Arc<AggregateLocks>,
        clock: Arc<dyn Clock>,
        recognition: RecognitionBasis,
    ) -> Self {
        Self { stores, ids, audit, locks, clock, recognition }
    }

    /// Build a new workflow for `quotation` and the writes that persist it.
    /// The caller must hold the quotation's lock.
    pub async fn prepare_start(
        &self,
        quotation: &Quotation,
        approval_ref: Option<String>,
        actor: &str,
        reason: Option<String>,
    ) -> Result<(Workflow, WriteBatch)> {
        if quotation.is_closed() {
            return Err(TradeflowError::state_conflict(format!(
                "quotation {} is {}; it cannot start a workflow",
                quotation.id, quotation.status
            )));
        }
        if let Some(existing) = self.stores.workflows.find_active_workflow(&quotation.id).await? {
            return Err(TradeflowError::DuplicateWorkflow(format!(
                "quotation {} already has workflow {}",
                quotation.id, existing.id
            )));
        }

        let id = self.ids.next_id(IdFamily::Workflow, self.clock.today()).await?;
        let workflow = Workflow::start(id, &quotation.id, approval_ref, actor, reason.clone(), self.clock.now());
        let verb = workflow.history.first().map_or("created", |t| t.action.as_str());
        let mut batch = WriteBatch::new().with(Write::Workflow(workflow.clone()));
        let draft = EventDraft::new(actor, EntityKind::Workflow, &workflow.id, verb)
            .after(&workflow)?
            .reason(reason);
        self.audit.record(&mut batch, draft).await?;
        Ok((workflow, batch))
    }

    /// Start a workflow for a quotation that has not been approved.
    pub async fn start_without_approval(&self, quotation_id: &str, actor: &str, reason: &str) -> Result<Workflow> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TradeflowError::validation("starting without approval requires a reason"));
        }
        let _guard = self.locks.lock(&keys::quotation(quotation_id)).await;
        let quotation = self.quotation(quotation_id).await?;
        let (workflow, batch) = self.prepare_start(&quotation, None, actor, Some(reason.to_string())).await?;
        self.stores.uow.commit(batch).await?;

        info!(workflow_id = %workflow.id, quotation = quotation_id, actor, "workflow started without approval");
        Ok(workflow)
    }

    pub async fn advance(&self, id: &str, actor: &str, note: Option<String>) -> Result<Transitioned> {
        self.transition(id, actor, |wf, at| wf.advance(actor, note.clone(), at), note.clone()).await
    }

    pub async fn skip(&self, id: &str, actor: &str, reason: &str) -> Result<Transitioned> {
        self.transition(id, actor, |wf, at| wf.skip(actor, reason, at), Some(reason.trim().to_string()))
            .await
    }

    async fn transition<F>(&self, id: &str, actor: &str, apply: F, reason: Option<String>) -> Result<Transitioned>
    where
        F: FnOnce(&mut Workflow, chrono::DateTime<chrono::Utc>) -> Result<StageOutcome>,
    {
        let _guard = self.locks.lock(&keys::workflow(id)).await;
        let mut workflow = self.get(id).await?;
        let before = workflow.clone();
        let now = self.clock.now();
        let outcome = apply(&mut workflow, now)?;
        self.check(&workflow)?;

        let verb = workflow.history.last().map_or("advanced", |t| t.action.as_str());
        let mut batch = WriteBatch::new().with(Write::Workflow(workflow.clone()));
        let draft = EventDraft::new(actor, EntityKind::Workflow, id, verb)
            .before(&before)?
            .after(&workflow)?
            .reason(reason);
        self.audit.record(&mut batch, draft).await?;

        let planned = self.plan_effects(&workflow, outcome, actor, now).await?;
        let planned_effects = !planned.is_empty();
        batch.extend(planned.into_iter().map(Write::PlanEffect));
        self.stores.uow.commit(batch).await?;

        info!(
            workflow_id = id,
            actor,
            closed = %outcome.closed,
            closed_as = %outcome.closed_as,
            opened = ?outcome.opened.map(|s| s.as_str()),
            "workflow stage closed"
        );
        Ok(Transitioned { workflow, outcome, planned_effects })
    }

    async fn plan_effects(
        &self,
        workflow: &Workflow,
        outcome: StageOutcome,
        actor: &str,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<tradeflow_domain::EffectRecord>> {
        let mut triggers = Vec::new();
        if outcome.closed_as == StageStatus::Done {
            triggers.push(EffectTrigger::StageDone {
                workflow_id: workflow.id.clone(),
                quotation_ref: workflow.quotation_ref.clone(),
                stage: outcome.closed,
                actor: actor.to_string(),
            });
        }
        if outcome.completed_workflow() {
            triggers.push(EffectTrigger::WorkflowCompleted {
                workflow_id: workflow.id.clone(),
                quotation_ref: workflow.quotation_ref.clone(),
                actor: actor.to_string(),
            });
        }
        if triggers.is_empty() {
            return Ok(Vec::new());
        }

        let line_count = self.quotation(&workflow.quotation_ref).await?.lines.len();
        let ctx = PlanContext::new(line_count, self.recognition);
        let existing = self.stores.effects.effects_for_source(&workflow.id).await?;
        let mut ordinal = plan::next_ordinal(&existing);
        let mut planned = Vec::new();
        for trigger in &triggers {
            let records = plan::plan(trigger, ctx, ordinal, at);
            ordinal += u32::try_from(records.len()).unwrap_or(0);
            planned.extend(records);
        }
        Ok(planned)
    }

    pub async fn rewind(&self, id: &str, actor: &str, reason: &str) -> Result<Workflow> {
        let _guard = self.locks.lock(&keys::workflow(id)).await;
        let mut workflow = self.get(id).await?;
        let before = workflow.clone();
        let reopened = workflow.rewind(actor, reason, self.clock.now())?;
        self.check(&workflow)?;
        self.commit_simple(&before, &workflow, actor, "rewound", reason).await?;

        info!(workflow_id = id, actor, reopened = %reopened, "workflow rewound");
        Ok(workflow)
    }

    pub async fn cancel(&self, id: &str, actor: &str, reason: &str) -> Result<Workflow> {
        let _guard = self.locks.lock(&keys::workflow(id)).await;
        let mut workflow = self.get(id).await?;
        let before = workflow.clone();
        workflow.cancel(actor, reason, self.clock.now())?;
        self.commit_simple(&before, &workflow, actor, "cancelled", reason).await?;

        info!(workflow_id = id, actor, "workflow cancelled");
        Ok(workflow)
    }

    async fn commit_simple(
        &self,
        before: &Workflow,
        after: &Workflow,
        actor: &str,
        verb: &str,
        reason: &str,
    ) -> Result<()> {
        let mut batch = WriteBatch::new().with(Write::Workflow(after.clone()));
        let draft = EventDraft::new(actor, EntityKind::Workflow, &after.id, verb)
            .before(before)?
            .after(after)?
            .reason(Some(reason.trim().to_string()));
        self.audit.record(&mut batch, draft).await?;
        self.stores.uow.commit(batch).await
    }

    fn check(&self, workflow: &Workflow) -> Result<()> {
        workflow.check_invariants().map_err(|violation| {
            error!(workflow_id = %workflow.id, violation = %violation, "workflow invariant violated");
            TradeflowError::internal(format!("workflow {}: {violation}", workflow.id))
        })
    }

    async fn quotation(&self, id: &str) -> Result<Quotation> {
        self.stores
            .quotations
            .get_quotation(id)
            .await?
            .ok_or_else(|| TradeflowError::not_found(EntityKind::Quotation, id))
    }

    pub async fn get(&self, id: &str) -> Result<Workflow> {
        self.stores
            .workflows
            .get_workflow(id)
            .await?
            .ok_or_else(|| TradeflowError::not_found(EntityKind::Workflow, id))
    }

    /// The quotation's live workflow, falling back to its latest cancelled one.
    pub async fn find_by_quotation(&self, quotation_ref: &str) -> Result<Workflow> {
        if let Some(workflow) = self.stores.workflows.find_active_workflow(quotation_ref).await? {
            return Ok(workflow);
        }
        let filter = WorkflowFilter { quotation_ref: Some(quotation_ref.to_string()), ..WorkflowFilter::default() };
        self.stores
            .workflows
            .list_workflows(&filter)
            .await?
            .into_iter()
            .max_by_key(|w| w.created_at)
            .ok_or_else(|| TradeflowError::NotFound(format!("workflow for quotation '{quotation_ref}'")))
    }

    pub async fn list(&self, filter: &WorkflowFilter) -> Result<Vec<Workflow>> {
        self.stores.workflows.list_workflows(filter).await
    }
}
