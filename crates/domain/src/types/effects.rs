//! Side-effect bookkeeping shared by the dispatcher and its store.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::approval::ApprovalType;
use super::ids::EntityKind;
use super::invoice::PaymentMethod;
use super::money::Money;
use super::workflow::StageName;
use crate::impl_domain_status_conversions;

/// Every side effect the dispatcher knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EffectKind {
    MarkTargetApproved,
    MarkTargetRejected,
    CreateWorkflow,
    PostPotentialIncome,
    CreatePurchaseOrder,
    ReceivePurchaseOrder,
    InventoryCredit,
    RecordSupplierExpense,
    InventoryDebit,
    IssueInvoice,
    ProjectReceivable,
    ClosePurchaseOrder,
    PostPaymentIncome,
    RecognizeSale,
}

impl_domain_status_conversions!(EffectKind {
    MarkTargetApproved => "mark_target_approved",
    MarkTargetRejected => "mark_target_rejected",
    CreateWorkflow => "create_workflow",
    PostPotentialIncome => "post_potential_income",
    CreatePurchaseOrder => "create_purchase_order",
    ReceivePurchaseOrder => "receive_purchase_order",
    InventoryCredit => "inventory_credit",
    RecordSupplierExpense => "record_supplier_expense",
    InventoryDebit => "inventory_debit",
    IssueInvoice => "issue_invoice",
    ProjectReceivable => "project_receivable",
    ClosePurchaseOrder => "close_purchase_order",
    PostPaymentIncome => "post_payment_income",
    RecognizeSale => "recognize_sale",
});

/// Deduplication key: `(source_id, effect_kind, line_index?)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EffectKey {
    pub source_id: String,
    pub kind: EffectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_index: Option<u32>,
}

impl EffectKey {
    pub fn new(source_id: impl Into<String>, kind: EffectKind, line_index: Option<u32>) -> Self {
        Self { source_id: source_id.into(), kind, line_index }
    }
}

impl fmt::Display for EffectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line_index {
            Some(line) => write!(f, "{}:{}:{line}", self.source_id, self.kind),
            None => write!(f, "{}:{}", self.source_id, self.kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EffectStatus {
    Pending,
    Completed,
    Failed,
}

impl_domain_status_conversions!(EffectStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

/// The state transition that planned an effect, with the context its
/// handler needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum EffectTrigger {
    ApprovalApproved {
        approval_id: String,
        request_type: ApprovalType,
        target_ref: String,
        approver: String,
    },
    ApprovalRejected {
        approval_id: String,
        request_type: ApprovalType,
        target_ref: String,
        approver: String,
        reason: Option<String>,
    },
    StageDone {
        workflow_id: String,
        quotation_ref: String,
        stage: StageName,
        actor: String,
    },
    WorkflowCompleted {
        workflow_id: String,
        quotation_ref: String,
        actor: String,
    },
    PaymentReceived {
        invoice_id: String,
        payment_id: String,
        amount: Money,
        date: NaiveDate,
        method: PaymentMethod,
        actor: String,
    },
}

impl EffectTrigger {
    /// Actor the resulting writes are attributed to.
    pub fn actor(&self) -> &str {
        match self {
            Self::ApprovalApproved { approver, .. } | Self::ApprovalRejected { approver, .. } => {
                approver
            }
            Self::StageDone { actor, .. }
            | Self::WorkflowCompleted { actor, .. }
            | Self::PaymentReceived { actor, .. } => actor,
        }
    }
}

/// Durable record of one planned effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRecord {
    pub key: EffectKey,
    /// Position in the dispatch plan for its source; effects run in this order.
    pub ordinal: u32,
    pub source_kind: EntityKind,
    pub trigger: EffectTrigger,
    pub status: EffectStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EffectRecord {
    pub fn planned(
        key: EffectKey,
        ordinal: u32,
        source_kind: EntityKind,
        trigger: EffectTrigger,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            ordinal,
            source_kind,
            trigger,
            status: EffectStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: at,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == EffectStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectFailure {
    pub key: EffectKey,
    pub error: String,
}

/// Outcome of a dispatch run that did not finish.
///
/// `completed` were committed (now or in an earlier run), `failed` raised an
/// error, `pending` were not attempted because an earlier effect failed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EffectFailureReport {
    pub source_id: String,
    pub completed: Vec<EffectKey>,
    pub failed: Vec<EffectFailure>,
    pub pending: Vec<EffectKey>,
}

impl EffectFailureReport {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self { source_id: source_id.into(), ..Self::default() }
    }
}

impl fmt::Display for EffectFailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "effects for '{}': {} completed, {} failed, {} pending",
            self.source_id,
            self.completed.len(),
            self.failed.len(),
            self.pending.len()
        )?;
        if let Some(first) = self.failed.first() {
            write!(f, " (first failure {}: {})", first.key, first.error)?;
        }
        Ok(())
    }
}

/// Outcome of a dispatch run where every effect is now completed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EffectReport {
    pub source_id: String,
    /// Applied during this run.
    pub applied: Vec<EffectKey>,
    /// Already completed by an earlier run; left untouched.
    pub already_done: Vec<EffectKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display_includes_line_when_present() {
        let plain = EffectKey::new("WF202503001", EffectKind::IssueInvoice, None);
        let line = EffectKey::new("WF202503001", EffectKind::InventoryCredit, Some(2));
        assert_eq!(plain.to_string(), "WF202503001:issue_invoice");
        assert_eq!(line.to_string(), "WF202503001:inventory_credit:2");
    }

    #[test]
    fn trigger_round_trips_through_json() {
        let trigger = EffectTrigger::StageDone {
            workflow_id: "WF202503001".into(),
            quotation_ref: "Q202503001".into(),
            stage: StageName::IssueInvoice,
            actor: "E02".into(),
        };
        let json = serde_json::to_string(&trigger).unwrap();
        assert!(json.contains("\"trigger\":\"stage_done\""));
        let back: EffectTrigger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trigger);
        assert_eq!(back.actor(), "E02");
    }
}
