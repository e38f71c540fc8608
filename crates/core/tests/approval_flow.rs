//! Integration tests for quotation approval
//!
//! Covers the route from a submitted quotation to a running workflow:
//! - single and two-step approval chains
//! - rejection, replayed and conflicting decisions
//! - the happy path through to a paid invoice

use tradeflow_domain::{
    ApprovalStatus, ApprovalType, CashEntryType, CashKind, Decision, DecisionOutcome, EffectStatus,
    EntityKind, Money, NewApprovalRequest, PaymentMethod, PaymentStatus, Priority, QuotationStatus,
    SalesSourceKind, StageName, StageStatus, TradeflowError, WorkflowFilter, WorkflowStatus,
};

mod support;
use support::{date, dec, payload, Harness};

fn quotation_request(target: &str, amount: Option<i64>) -> NewApprovalRequest {
    NewApprovalRequest {
        request_type: ApprovalType::Quotation,
        target_ref: target.to_string(),
        requester_ref: "E01".to_string(),
        amount: amount.map(Money::usd),
        priority: Priority::Normal,
    }
}

fn approvers(request: &tradeflow_domain::ApprovalRequest) -> Vec<&str> {
    request.approval_chain.iter().map(|s| s.approver_ref.as_str()).collect()
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_quotation_to_paid_invoice() {
    let h = Harness::new().await;

    let quotation = h.submit(&[("P1", 10, Some(100))]).await;
    assert_eq!(quotation.id, "Q202503001");
    assert_eq!(quotation.status, QuotationStatus::Submitted);
    assert_eq!(quotation.total, dec(1000));

    let request = h.engine.submit_approval(quotation_request(&quotation.id, Some(1000))).await.unwrap();
    assert!(request.id.starts_with("APR"));
    assert_eq!(approvers(&request), vec!["sales_manager"]);

    let decided = h.engine.decide_approval(&request.id, "sales_manager", Decision::Approve, None).await.unwrap();
    assert_eq!(decided.outcome, DecisionOutcome::Approved);
    assert_eq!(decided.request.status, ApprovalStatus::Approved);
    assert_eq!(h.engine.get_quotation(&quotation.id).await.unwrap().status, QuotationStatus::Approved);

    let workflow = h.engine.workflow_for_quotation(&quotation.id).await.unwrap();
    assert_eq!(workflow.id, "WF202503001");
    assert_eq!(workflow.approval_ref.as_deref(), Some(request.id.as_str()));
    assert_eq!(workflow.stages[0].name, StageName::CreatePurchaseOrder);
    assert_eq!(workflow.stages[0].status, StageStatus::InProgress);

    for _ in 0..5 {
        h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();
    }
    let workflow = h.engine.get_workflow(&workflow.id).await.unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert!(workflow.stages.iter().all(|s| s.status == StageStatus::Done));

    let invoice = h.engine.get_invoice("INV202503001").await.unwrap();
    assert_eq!(invoice.workflow_ref.as_deref(), Some(workflow.id.as_str()));
    assert_eq!(invoice.total, dec(1000));
    assert_eq!(invoice.due_date, date(2025, 4, 4), "C001 pays in 30 days");

    let paid = h
        .engine
        .record_payment(&invoice.id, Money::usd(1000), date(2025, 3, 20), PaymentMethod::Bank, "E01")
        .await
        .unwrap();
    assert_eq!(paid.invoice.payment_status, PaymentStatus::Paid);

    let sales = h.store.sales();
    assert_eq!(sales.len(), 1, "one product line, one sales record");
    assert_eq!(sales[0].amount_usd, dec(1000));
    assert_eq!(sales[0].source_kind, SalesSourceKind::Cash);

    let income: Vec<_> = h
        .store
        .cash()
        .into_iter()
        .filter(|c| c.kind == CashKind::Income && c.entry_type == CashEntryType::Actual)
        .collect();
    assert_eq!(income.len(), 1);
    assert_eq!(income[0].amount, dec(1000));

    let unfinished = h.engine.unfinished_effects().await.unwrap();
    assert!(unfinished.is_empty(), "every effect completed: {unfinished:?}");
}

#[tokio::test]
async fn test_approval_effects_are_completed_in_order() {
    let h = Harness::new().await;
    let quotation = h.submit(&[("P1", 2, None), ("P3", 1, None)]).await;
    let decided = h.engine.approve_quotation(&quotation.id, "sales_manager", None).await.unwrap();

    let effects = h.engine.effects_for(&decided.request.id).await.unwrap();
    let kinds: Vec<_> = effects.iter().map(|e| e.key.kind.as_str()).collect();
    assert_eq!(kinds, vec!["mark_target_approved", "create_workflow", "post_potential_income"]);
    assert!(effects.iter().all(|e| e.status == EffectStatus::Completed));

    let forecasts = h.engine.sales_forecasts(None).await.unwrap();
    assert_eq!(forecasts.len(), 1);
    assert_eq!(forecasts[0].quotation_ref, quotation.id);
    assert_eq!(forecasts[0].amount_usd, dec(220), "list prices 2 x 100 + 1 x 20");
}

// ============================================================================
// Two-step approval
// ============================================================================

#[tokio::test]
async fn test_large_quotation_needs_ceo() {
    let h = Harness::new().await;
    let quotation = h.submit(&[("P1", 150, Some(100))]).await;
    assert_eq!(quotation.total, dec(15_000));

    let request = h.engine.submit_approval(quotation_request(&quotation.id, None)).await.unwrap();
    assert_eq!(approvers(&request), vec!["sales_manager", "ceo"]);

    let first = h.engine.decide_approval(&request.id, "sales_manager", Decision::Approve, None).await.unwrap();
    assert_eq!(first.outcome, DecisionOutcome::Advanced);
    assert_eq!(first.request.status, ApprovalStatus::Pending);
    assert_eq!(first.request.current_approver(), Some("ceo"));
    assert!(h.engine.list_workflows(&WorkflowFilter::default()).await.unwrap().is_empty());

    let pending_for_ceo = h.engine.list_pending_approvals("ceo").await.unwrap();
    assert_eq!(pending_for_ceo.len(), 1);
    assert!(h.engine.list_pending_approvals("sales_manager").await.unwrap().is_empty());

    let second = h.engine.decide_approval(&request.id, "ceo", Decision::Approve, None).await.unwrap();
    assert_eq!(second.outcome, DecisionOutcome::Approved);
    let workflow = h.engine.workflow_for_quotation(&quotation.id).await.unwrap();
    assert_eq!(workflow.status, WorkflowStatus::InProgress);
}

#[tokio::test]
async fn test_vnd_quotation_is_routed_on_usd_value() {
    let h = Harness::new().await;
    let mut input = payload("C001", &[("P3", 1, Some(300_000_000))]);
    input.currency = tradeflow_domain::Currency::Vnd;
    let quotation = h.engine.submit_quotation(input, "E01").await.unwrap();

    // 300,000,000 VND at 24,500 is about 12,245 USD.
    let request = h.engine.submit_approval(quotation_request(&quotation.id, None)).await.unwrap();
    assert_eq!(approvers(&request), vec!["sales_manager", "ceo"]);
}

// ============================================================================
// Rejection and repeated decisions
// ============================================================================

#[tokio::test]
async fn test_rejection_marks_quotation_and_creates_nothing() {
    let h = Harness::new().await;
    let _first = h.submit(&[("P1", 1, None)]).await;
    let quotation = h.submit(&[("P2", 4, None)]).await;
    assert_eq!(quotation.id, "Q202503002");

    let decided = h.engine.reject_quotation(&quotation.id, "sales_manager", "price too low").await.unwrap();
    assert_eq!(decided.outcome, DecisionOutcome::Rejected);
    assert_eq!(h.engine.get_quotation(&quotation.id).await.unwrap().status, QuotationStatus::Rejected);

    let err = h.engine.workflow_for_quotation(&quotation.id).await.unwrap_err();
    assert!(matches!(err, TradeflowError::NotFound(_)));
    assert!(h.store.cash().is_empty());
    assert!(h.store.sales().is_empty());
    assert!(h.engine.sales_forecasts(None).await.unwrap().is_empty());

    let effects = h.engine.effects_for(&decided.request.id).await.unwrap();
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].key.kind.as_str(), "mark_target_rejected");
}

#[tokio::test]
async fn test_decided_request_never_changes_status() {
    let h = Harness::new().await;
    let quotation = h.submit(&[("P1", 1, None)]).await;
    let approved = h.engine.approve_quotation(&quotation.id, "sales_manager", None).await.unwrap();
    let id = approved.request.id.clone();

    let replay = h.engine.decide_approval(&id, "sales_manager", Decision::Approve, None).await.unwrap();
    assert_eq!(replay.outcome, DecisionOutcome::Replayed);
    assert!(!replay.planned_effects);

    let flip = h.engine.decide_approval(&id, "sales_manager", Decision::Reject, None).await.unwrap_err();
    assert!(matches!(flip, TradeflowError::AlreadyDecided(_)), "got {flip:?}");

    let outsider = h.engine.decide_approval(&id, "ceo", Decision::Reject, None).await.unwrap_err();
    assert!(matches!(outsider, TradeflowError::AlreadyDecided(_)), "got {outsider:?}");

    assert_eq!(h.engine.get_approval(&id).await.unwrap().status, ApprovalStatus::Approved);
    let workflows = h.engine.list_workflows(&WorkflowFilter::default()).await.unwrap();
    assert_eq!(workflows.len(), 1, "replay must not start a second workflow");
}

#[tokio::test]
async fn test_wrong_approver_is_unauthorized() {
    let h = Harness::new().await;
    let quotation = h.submit(&[("P1", 1, None)]).await;
    let request = h.engine.submit_approval(quotation_request(&quotation.id, None)).await.unwrap();

    let err = h.engine.decide_approval(&request.id, "E02", Decision::Approve, None).await.unwrap_err();
    assert!(matches!(err, TradeflowError::Unauthorized(_)));
    let err = h.engine.decide_approval(&request.id, "  ", Decision::Approve, None).await.unwrap_err();
    assert!(matches!(err, TradeflowError::Unauthorized(_)));
    assert!(h.engine.get_approval(&request.id).await.unwrap().is_pending());
}

#[tokio::test]
async fn test_second_pending_request_for_target_conflicts() {
    let h = Harness::new().await;
    let quotation = h.submit(&[("P1", 1, None)]).await;
    h.engine.submit_approval(quotation_request(&quotation.id, None)).await.unwrap();

    let err = h.engine.submit_approval(quotation_request(&quotation.id, None)).await.unwrap_err();
    assert!(matches!(err, TradeflowError::StateConflict(_)));
}

#[tokio::test]
async fn test_draft_quotation_cannot_be_sent_for_approval() {
    let h = Harness::new().await;
    let draft = h.engine.draft_quotation(payload("C001", &[("P1", 1, None)]), "E01").await.unwrap();
    assert_eq!(draft.status, QuotationStatus::Draft);

    let err = h.engine.submit_approval(quotation_request(&draft.id, None)).await.unwrap_err();
    assert!(matches!(err, TradeflowError::StateConflict(_)));

    let submitted = h.engine.submit_draft_quotation(&draft.id, "E01").await.unwrap();
    assert_eq!(submitted.status, QuotationStatus::Submitted);
    h.engine.submit_approval(quotation_request(&draft.id, None)).await.unwrap();
}

#[tokio::test]
async fn test_cancelled_request_can_be_resubmitted() {
    let h = Harness::new().await;
    let quotation = h.submit(&[("P1", 1, None)]).await;
    let request = h.engine.submit_approval(quotation_request(&quotation.id, None)).await.unwrap();

    let cancelled = h.engine.cancel_approval(&request.id, "E01", "wrong customer contact").await.unwrap();
    assert_eq!(cancelled.status, ApprovalStatus::Cancelled);
    let err = h.engine.decide_approval(&request.id, "sales_manager", Decision::Approve, None).await.unwrap_err();
    assert!(matches!(err, TradeflowError::StateConflict(_)));

    let again = h.engine.submit_approval(quotation_request(&quotation.id, None)).await.unwrap();
    assert_ne!(again.id, request.id);
}

#[tokio::test]
async fn test_vacation_goes_to_supervisor_then_hr() {
    let h = Harness::new().await;
    let request = h
        .engine
        .submit_approval(NewApprovalRequest {
            request_type: ApprovalType::Vacation,
            target_ref: "LEAVE-2025-03-10".to_string(),
            requester_ref: "E01".to_string(),
            amount: None,
            priority: Priority::Low,
        })
        .await
        .unwrap();
    assert_eq!(approvers(&request), vec!["E02", "hr"]);

    h.engine.decide_approval(&request.id, "E02", Decision::Approve, None).await.unwrap();
    let done = h.engine.decide_approval(&request.id, "hr", Decision::Approve, None).await.unwrap();
    assert_eq!(done.request.status, ApprovalStatus::Approved);
    assert!(!done.planned_effects, "leave approvals carry no effects");
}

#[tokio::test]
async fn test_approval_events_follow_decisions() {
    let h = Harness::new().await;
    let quotation = h.submit(&[("P1", 150, Some(100))]).await;
    let request = h.engine.submit_approval(quotation_request(&quotation.id, None)).await.unwrap();
    h.engine.decide_approval(&request.id, "sales_manager", Decision::Approve, None).await.unwrap();
    h.engine.decide_approval(&request.id, "ceo", Decision::Approve, Some("ok".into())).await.unwrap();

    let history = h.engine.event_history(EntityKind::Approval, &request.id).await.unwrap();
    let verbs: Vec<_> = history.iter().map(|e| e.verb.as_str()).collect();
    assert_eq!(verbs, vec!["submitted", "step_approved", "approved"]);
    assert!(history.windows(2).all(|w| w[0].seq < w[1].seq));

    let quotation_events = h.engine.event_history(EntityKind::Quotation, &quotation.id).await.unwrap();
    let approved = quotation_events.last().unwrap();
    assert!(approved.seq > history.last().unwrap().seq, "effects log after their cause");
}

#[tokio::test]
async fn test_on_approval_basis_recognizes_quotation_sales() {
    let config = tradeflow_domain::EngineConfig {
        sales_recognition: tradeflow_domain::RecognitionBasis::OnApproval,
        ..tradeflow_domain::EngineConfig::default()
    };
    let h = Harness::with(config, Vec::new()).await;
    let quotation = h.submit(&[("P1", 3, None), ("P2", 2, None)]).await;
    h.engine.approve_quotation(&quotation.id, "sales_manager", None).await.unwrap();

    let sales = h.store.sales();
    assert_eq!(sales.len(), 2);
    assert!(sales.iter().all(|s| s.source_kind == SalesSourceKind::Quotation));
    let total: rust_decimal::Decimal = sales.iter().map(|s| s.amount_usd).sum();
    assert_eq!(total, dec(400));

    let approval = h.engine.list_approvals(&Default::default()).await.unwrap().remove(0);
    let report = h.engine.retry_effects(&approval.id).await.unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(h.store.sales().len(), 2, "re-dispatch adds no sales");
}
