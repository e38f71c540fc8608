//! Multi-step approval requests
//!
//! Once a request reaches `approved` or `rejected` its status never changes
//! again: replaying a decision already recorded is a silent no-op, anything
//! else fails with `AlreadyDecided`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::money::Money;
use crate::errors::{Result, TradeflowError};
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ApprovalType {
    Quotation,
    PurchaseOrder,
    Expense,
    Vacation,
    Other,
}

impl_domain_status_conversions!(ApprovalType {
    Quotation => "quotation" | "견적",
    PurchaseOrder => "purchase_order" | "발주",
    Expense => "expense" | "경비",
    Vacation => "vacation" | "휴가",
    Other => "other" | "기타",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl_domain_status_conversions!(Priority {
    Low => "low" | "낮음",
    Normal => "normal" | "보통",
    High => "high" | "높음",
    Urgent => "urgent" | "긴급",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl_domain_status_conversions!(ApprovalStatus {
    Pending => "pending" | "대기" | "검토중",
    Approved => "approved" | "승인",
    Rejected => "rejected" | "반려" | "거절",
    Cancelled => "cancelled" | "canceled" | "취소",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Decision {
    Approve,
    Reject,
}

impl_domain_status_conversions!(Decision {
    Approve => "approve" | "approved" | "승인",
    Reject => "reject" | "rejected" | "반려" | "거절",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub approver_ref: String,
    pub required: bool,
    pub decision: Option<Decision>,
    pub decided_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl ApprovalStep {
    pub fn required(approver_ref: impl Into<String>) -> Self {
        Self { approver_ref: approver_ref.into(), required: true, decision: None, decided_at: None, note: None }
    }
}

/// Input for `submit_approval`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApprovalRequest {
    #[serde(rename = "type")]
    pub request_type: ApprovalType,
    pub target_ref: String,
    pub requester_ref: String,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub request_type: ApprovalType,
    pub target_ref: String,
    pub requester_ref: String,
    pub amount: Option<Money>,
    pub priority: Priority,
    pub status: ApprovalStatus,
    pub approval_chain: Vec<ApprovalStep>,
    pub current_step: usize,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
}

/// Result of a `decide` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Step approved; the next step is now current.
    Advanced,
    /// Final required step approved.
    Approved,
    /// Chain terminated by a rejection.
    Rejected,
    /// Identical decision already on record; nothing changed.
    Replayed,
}

impl DecisionOutcome {
    pub const fn changed_state(self) -> bool {
        !matches!(self, Self::Replayed)
    }
}

impl ApprovalRequest {
    pub fn open(
        id: impl Into<String>,
        request: NewApprovalRequest,
        chain: Vec<ApprovalStep>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            request_type: request.request_type,
            target_ref: request.target_ref,
            requester_ref: request.requester_ref,
            amount: request.amount,
            priority: request.priority,
            status: ApprovalStatus::Pending,
            approval_chain: chain,
            current_step: 0,
            created_at: at,
            resolved_at: None,
            cancel_reason: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Approver expected to act next, while pending.
    pub fn current_approver(&self) -> Option<&str> {
        if !self.is_pending() {
            return None;
        }
        self.approval_chain.get(self.current_step).map(|s| s.approver_ref.as_str())
    }

    pub fn decide(
        &mut self,
        approver: &str,
        decision: Decision,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<DecisionOutcome> {
        if self.current_approver() == Some(approver) {
            return Ok(self.apply(decision, note, at));
        }

        if let Some(prior) = self
            .approval_chain
            .iter()
            .find(|s| s.approver_ref == approver && s.decision.is_some())
        {
            return if prior.decision == Some(decision) {
                Ok(DecisionOutcome::Replayed)
            } else {
                Err(TradeflowError::AlreadyDecided(format!(
                    "{approver} already decided {} on request {}",
                    prior.decision.map_or("", |d| d.as_str()),
                    self.id
                )))
            };
        }

        match self.status {
            ApprovalStatus::Pending => Err(TradeflowError::Unauthorized(format!(
                "{approver} is not the current approver of request {} (expected {})",
                self.id,
                self.current_approver().unwrap_or("nobody")
            ))),
            ApprovalStatus::Cancelled => Err(TradeflowError::state_conflict(format!(
                "request {} was cancelled",
                self.id
            ))),
            ApprovalStatus::Approved | ApprovalStatus::Rejected => Err(TradeflowError::AlreadyDecided(
                format!("request {} is already {}", self.id, self.status),
            )),
        }
    }

    fn apply(&mut self, decision: Decision, note: Option<String>, at: DateTime<Utc>) -> DecisionOutcome {
        let index = self.current_step;
        let step = &mut self.approval_chain[index];
        step.decision = Some(decision);
        step.decided_at = Some(at);
        step.note = note;

        match decision {
            Decision::Reject => {
                self.status = ApprovalStatus::Rejected;
                self.resolved_at = Some(at);
                DecisionOutcome::Rejected
            }
            Decision::Approve => {
                let more_required = self.approval_chain[index + 1..].iter().any(|s| s.required);
                if more_required {
                    self.current_step = index + 1;
                    DecisionOutcome::Advanced
                } else {
                    self.status = ApprovalStatus::Approved;
                    self.resolved_at = Some(at);
                    DecisionOutcome::Approved
                }
            }
        }
    }

    pub fn cancel(&mut self, reason: &str, at: DateTime<Utc>) -> Result<()> {
        if reason.trim().is_empty() {
            return Err(TradeflowError::validation("a reason is required"));
        }
        if !self.is_pending() {
            return Err(TradeflowError::state_conflict(format!(
                "request {} is {}; only pending requests can be cancelled",
                self.id, self.status
            )));
        }
        self.status = ApprovalStatus::Cancelled;
        self.resolved_at = Some(at);
        self.cancel_reason = Some(reason.trim().to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalFilter {
    #[serde(default)]
    pub status: Option<ApprovalStatus>,
    #[serde(default)]
    pub target_ref: Option<String>,
    #[serde(default)]
    pub requester_ref: Option<String>,
}

impl ApprovalFilter {
    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        self.status.map_or(true, |s| s == request.status)
            && self.target_ref.as_ref().map_or(true, |t| t == &request.target_ref)
            && self.requester_ref.as_ref().map_or(true, |r| r == &request.requester_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(chain: &[&str]) -> ApprovalRequest {
        ApprovalRequest::open(
            "APR_test",
            NewApprovalRequest {
                request_type: ApprovalType::Quotation,
                target_ref: "Q202503001".into(),
                requester_ref: "E01".into(),
                amount: Some(Money::usd(15_000)),
                priority: Priority::Normal,
            },
            chain.iter().map(|a| ApprovalStep::required(*a)).collect(),
            Utc::now(),
        )
    }

    #[test]
    fn two_step_chain_needs_both_approvals() {
        let mut req = request(&["sales_manager", "ceo"]);
        assert_eq!(req.decide("sales_manager", Decision::Approve, None, Utc::now()).unwrap(), DecisionOutcome::Advanced);
        assert_eq!(req.status, ApprovalStatus::Pending);
        assert_eq!(req.current_approver(), Some("ceo"));
        assert_eq!(req.decide("ceo", Decision::Approve, None, Utc::now()).unwrap(), DecisionOutcome::Approved);
        assert_eq!(req.status, ApprovalStatus::Approved);
        assert!(req.resolved_at.is_some());
    }

    #[test]
    fn wrong_approver_is_unauthorized() {
        let mut req = request(&["sales_manager", "ceo"]);
        let err = req.decide("ceo", Decision::Approve, None, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "unauthorized");
    }

    #[test]
    fn rejection_terminates_chain() {
        let mut req = request(&["sales_manager", "ceo"]);
        req.decide("sales_manager", Decision::Reject, Some("price too low".into()), Utc::now()).unwrap();
        assert_eq!(req.status, ApprovalStatus::Rejected);
        let err = req.decide("ceo", Decision::Approve, None, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "already_decided");
    }

    #[test]
    fn replay_is_noop_and_contradiction_fails() {
        let mut req = request(&["sales_manager"]);
        req.decide("sales_manager", Decision::Approve, None, Utc::now()).unwrap();
        let snapshot = req.clone();
        assert_eq!(
            req.decide("sales_manager", Decision::Approve, None, Utc::now()).unwrap(),
            DecisionOutcome::Replayed
        );
        assert_eq!(req, snapshot);
        let err = req.decide("sales_manager", Decision::Reject, None, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "already_decided");
        assert_eq!(req.status, ApprovalStatus::Approved);
    }

    #[test]
    fn optional_trailing_steps_do_not_block() {
        let mut req = request(&["sales_manager"]);
        req.approval_chain.push(ApprovalStep { required: false, ..ApprovalStep::required("observer") });
        assert_eq!(req.decide("sales_manager", Decision::Approve, None, Utc::now()).unwrap(), DecisionOutcome::Approved);
    }

    #[test]
    fn cancel_only_while_pending() {
        let mut req = request(&["sales_manager"]);
        assert!(req.cancel("", Utc::now()).is_err());
        req.cancel("customer withdrew", Utc::now()).unwrap();
        assert_eq!(req.status, ApprovalStatus::Cancelled);
        assert_eq!(req.cancel("again", Utc::now()).unwrap_err().kind(), "state_conflict");
        assert_eq!(
            req.decide("sales_manager", Decision::Approve, None, Utc::now()).unwrap_err().kind(),
            "state_conflict"
        );
    }
}
