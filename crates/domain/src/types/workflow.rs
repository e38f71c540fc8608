//! Quotation fulfilment workflow and its stage state machine
//!
//! A workflow walks a fixed five-stage pipeline. While it is in progress
//! exactly one stage is `in_progress`, every earlier stage is `done` or
//! `skipped`, every later stage is `pending`, and `current_stage_index`
//! points at the active stage. Every mutator below preserves that shape and
//! appends a [`StageTransition`] to the workflow's own history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, TradeflowError};
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StageName {
    CreatePurchaseOrder,
    ReceiveInventory,
    PrepareShipment,
    IssueInvoice,
    CollectPayment,
}

impl_domain_status_conversions!(StageName {
    CreatePurchaseOrder => "create_purchase_order" | "발주",
    ReceiveInventory => "receive_inventory" | "입고",
    PrepareShipment => "prepare_shipment" | "출고",
    IssueInvoice => "issue_invoice" | "청구",
    CollectPayment => "collect_payment" | "수금",
});

impl StageName {
    /// The canonical pipeline, in order.
    pub const PIPELINE: [Self; 5] = [
        Self::CreatePurchaseOrder,
        Self::ReceiveInventory,
        Self::PrepareShipment,
        Self::IssueInvoice,
        Self::CollectPayment,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StageStatus {
    Pending,
    InProgress,
    Done,
    Skipped,
}

impl_domain_status_conversions!(StageStatus {
    Pending => "pending" | "대기",
    InProgress => "in_progress" | "진행중" | "진행",
    Done => "done" | "완료",
    Skipped => "skipped" | "건너뜀" | "생략",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WorkflowStatus {
    InProgress,
    Completed,
    Cancelled,
}

impl_domain_status_conversions!(WorkflowStatus {
    InProgress => "in_progress" | "진행중",
    Completed => "completed" | "완료",
    Cancelled => "cancelled" | "canceled" | "취소",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: StageName,
    pub status: StageStatus,
    pub assignee: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl Stage {
    const fn pending(name: StageName) -> Self {
        Self { name, status: StageStatus::Pending, assignee: None, started_at: None, completed_at: None, note: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WorkflowAction {
    Created,
    StartedWithoutApproval,
    Advanced,
    Skipped,
    Rewound,
    Completed,
    Cancelled,
}

impl_domain_status_conversions!(WorkflowAction {
    Created => "created",
    StartedWithoutApproval => "started_without_approval",
    Advanced => "advanced",
    Skipped => "skipped",
    Rewound => "rewound",
    Completed => "completed",
    Cancelled => "cancelled",
});

/// One entry of the workflow's own audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub action: WorkflowAction,
    pub from_stage: Option<StageName>,
    pub to_stage: Option<StageName>,
    pub note: Option<String>,
}

/// What a successful `advance` or `skip` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Stage that was closed.
    pub closed: StageName,
    pub closed_as: StageStatus,
    /// Stage now in progress; `None` once the workflow completed.
    pub opened: Option<StageName>,
}

impl StageOutcome {
    pub fn completed_workflow(&self) -> bool {
        self.opened.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub quotation_ref: String,
    /// Approval request that started the workflow, if any.
    pub approval_ref: Option<String>,
    pub stages: Vec<Stage>,
    pub current_stage_index: usize,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub history: Vec<StageTransition>,
}

impl Workflow {
    /// New workflow with the first stage in progress.
    pub fn start(
        id: impl Into<String>,
        quotation_ref: impl Into<String>,
        approval_ref: Option<String>,
        actor: &str,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut stages: Vec<Stage> = StageName::PIPELINE.into_iter().map(Stage::pending).collect();
        stages[0].status = StageStatus::InProgress;
        stages[0].started_at = Some(at);
        let action = if approval_ref.is_some() {
            WorkflowAction::Created
        } else {
            WorkflowAction::StartedWithoutApproval
        };
        Self {
            id: id.into(),
            quotation_ref: quotation_ref.into(),
            approval_ref,
            stages,
            current_stage_index: 0,
            status: WorkflowStatus::InProgress,
            created_at: at,
            completed_at: None,
            history: vec![StageTransition {
                at,
                actor: actor.to_string(),
                action,
                from_stage: None,
                to_stage: Some(StageName::PIPELINE[0]),
                note: reason,
            }],
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != WorkflowStatus::Cancelled
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        self.stages.get(self.current_stage_index)
    }

    fn ensure_in_progress(&self, operation: &str) -> Result<()> {
        if self.status == WorkflowStatus::InProgress {
            Ok(())
        } else {
            Err(TradeflowError::state_conflict(format!(
                "cannot {operation} workflow {}: it is {}",
                self.id, self.status
            )))
        }
    }

    fn close_current(
        &mut self,
        closed_as: StageStatus,
        actor: &str,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> StageOutcome {
        let index = self.current_stage_index;
        let closed = self.stages[index].name;
        {
            let stage = &mut self.stages[index];
            stage.status = closed_as;
            stage.completed_at = Some(at);
            if note.is_some() {
                stage.note.clone_from(&note);
            }
        }

        let opened = if let Some(next) = self.stages.get_mut(index + 1) {
            next.status = StageStatus::InProgress;
            next.started_at = Some(at);
            self.current_stage_index = index + 1;
            Some(next.name)
        } else {
            self.status = WorkflowStatus::Completed;
            self.completed_at = Some(at);
            None
        };

        let action = match (closed_as, opened) {
            (_, None) => WorkflowAction::Completed,
            (StageStatus::Skipped, _) => WorkflowAction::Skipped,
            _ => WorkflowAction::Advanced,
        };
        self.history.push(StageTransition {
            at,
            actor: actor.to_string(),
            action,
            from_stage: Some(closed),
            to_stage: opened,
            note,
        });
        StageOutcome { closed, closed_as, opened }
    }

    /// Current stage → `done`, next stage → `in_progress`; completes the
    /// workflow after the last stage.
    pub fn advance(&mut self, actor: &str, note: Option<String>, at: DateTime<Utc>) -> Result<StageOutcome> {
        self.ensure_in_progress("advance")?;
        Ok(self.close_current(StageStatus::Done, actor, note, at))
    }

    /// Current stage → `skipped`, next stage → `in_progress`.
    pub fn skip(&mut self, actor: &str, reason: &str, at: DateTime<Utc>) -> Result<StageOutcome> {
        let reason = require_reason(reason)?;
        self.ensure_in_progress("skip a stage of")?;
        Ok(self.close_current(StageStatus::Skipped, actor, Some(reason), at))
    }

    /// Reopen the previous stage. The stage being left returns to `pending`
    /// with its timestamps cleared; the reopened stage loses `completed_at`.
    pub fn rewind(&mut self, actor: &str, reason: &str, at: DateTime<Utc>) -> Result<StageName> {
        let reason = require_reason(reason)?;
        self.ensure_in_progress("rewind")?;
        let index = self.current_stage_index;
        if index == 0 {
            return Err(TradeflowError::state_conflict(format!(
                "workflow {} is at its first stage; nothing to rewind to",
                self.id
            )));
        }
        let previous = &self.stages[index - 1];
        if !matches!(previous.status, StageStatus::Done | StageStatus::Skipped) {
            return Err(TradeflowError::state_conflict(format!(
                "stage {} is {}; only done or skipped stages can be reopened",
                previous.name, previous.status
            )));
        }

        let left = self.stages[index].name;
        {
            let current = &mut self.stages[index];
            current.status = StageStatus::Pending;
            current.started_at = None;
            current.completed_at = None;
        }
        let reopened = {
            let stage = &mut self.stages[index - 1];
            stage.status = StageStatus::InProgress;
            stage.completed_at = None;
            stage.name
        };
        self.current_stage_index = index - 1;
        self.history.push(StageTransition {
            at,
            actor: actor.to_string(),
            action: WorkflowAction::Rewound,
            from_stage: Some(left),
            to_stage: Some(reopened),
            note: Some(reason),
        });
        Ok(reopened)
    }

    /// Terminate a workflow that has not completed.
    pub fn cancel(&mut self, actor: &str, reason: &str, at: DateTime<Utc>) -> Result<()> {
        let reason = require_reason(reason)?;
        self.ensure_in_progress("cancel")?;
        self.status = WorkflowStatus::Cancelled;
        self.completed_at = Some(at);
        self.history.push(StageTransition {
            at,
            actor: actor.to_string(),
            action: WorkflowAction::Cancelled,
            from_stage: self.current_stage().map(|s| s.name),
            to_stage: None,
            note: Some(reason),
        });
        Ok(())
    }

    /// Describe the first structural violation, if any.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.stages.len() != StageName::PIPELINE.len() {
            return Err(format!("expected {} stages, found {}", StageName::PIPELINE.len(), self.stages.len()));
        }
        for (stage, expected) in self.stages.iter().zip(StageName::PIPELINE) {
            if stage.name != expected {
                return Err(format!("stage order broken at {}", stage.name));
            }
        }
        if self.status != WorkflowStatus::InProgress {
            return Ok(());
        }
        let active: Vec<usize> = self
            .stages
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status == StageStatus::InProgress)
            .map(|(i, _)| i)
            .collect();
        if active != [self.current_stage_index] {
            return Err(format!(
                "expected only stage {} in progress, found {active:?}",
                self.current_stage_index
            ));
        }
        for (index, stage) in self.stages.iter().enumerate() {
            let ok = match index.cmp(&self.current_stage_index) {
                std::cmp::Ordering::Less => {
                    matches!(stage.status, StageStatus::Done | StageStatus::Skipped)
                }
                std::cmp::Ordering::Equal => true,
                std::cmp::Ordering::Greater => stage.status == StageStatus::Pending,
            };
            if !ok {
                return Err(format!("stage {} has unexpected status {}", stage.name, stage.status));
            }
        }
        Ok(())
    }
}

fn require_reason(reason: &str) -> Result<String> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        Err(TradeflowError::validation("a reason is required"))
    } else {
        Ok(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFilter {
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    #[serde(default)]
    pub quotation_ref: Option<String>,
    /// Current stage of in-progress workflows.
    #[serde(default)]
    pub stage: Option<StageName>,
}

impl WorkflowFilter {
    pub fn matches(&self, workflow: &Workflow) -> bool {
        self.status.map_or(true, |s| s == workflow.status)
            && self.quotation_ref.as_ref().map_or(true, |q| q == &workflow.quotation_ref)
            && self.stage.map_or(true, |stage| {
                workflow.status == WorkflowStatus::InProgress
                    && workflow.current_stage().is_some_and(|s| s.name == stage)
            })
    }
}
