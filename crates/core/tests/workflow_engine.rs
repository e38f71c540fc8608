//! Integration tests for the five-stage order workflow
//!
//! Advance, skip, rewind and cancel against the in-memory store, checking
//! the single-active-stage rule after every transition.

use chrono::Duration;
use tradeflow_domain::{
    EntityKind, Period, PurchaseOrderStatus, StageName, StageStatus, TradeflowError, Workflow,
    WorkflowAction, WorkflowStatus, YearMonth,
};

mod support;
use support::{dec, Harness};

async fn approved_workflow(h: &Harness, lines: &[(&str, i64, Option<i64>)]) -> Workflow {
    let quotation = h.submit(lines).await;
    h.engine.approve_quotation(&quotation.id, "sales_manager", None).await.unwrap();
    h.engine.workflow_for_quotation(&quotation.id).await.unwrap()
}

fn assert_single_active_stage(workflow: &Workflow) {
    workflow.check_invariants().unwrap();
    if workflow.status != WorkflowStatus::InProgress {
        return;
    }
    let active: Vec<_> = workflow.stages.iter().filter(|s| s.status == StageStatus::InProgress).collect();
    assert_eq!(active.len(), 1, "exactly one stage in progress");
    for (index, stage) in workflow.stages.iter().enumerate() {
        match index.cmp(&workflow.current_stage_index) {
            std::cmp::Ordering::Less => {
                assert!(matches!(stage.status, StageStatus::Done | StageStatus::Skipped));
            }
            std::cmp::Ordering::Equal => assert_eq!(stage.status, StageStatus::InProgress),
            std::cmp::Ordering::Greater => assert_eq!(stage.status, StageStatus::Pending),
        }
    }
}

// ============================================================================
// Advance
// ============================================================================

#[tokio::test]
async fn test_advance_walks_pipeline_in_order() {
    let h = Harness::new().await;
    let workflow = approved_workflow(&h, &[("P1", 10, Some(100))]).await;

    let mut opened = Vec::new();
    for _ in 0..5 {
        let step = h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();
        assert_single_active_stage(&step.workflow);
        opened.push(step.outcome.opened);
    }
    assert_eq!(
        opened,
        vec![
            Some(StageName::ReceiveInventory),
            Some(StageName::PrepareShipment),
            Some(StageName::IssueInvoice),
            Some(StageName::CollectPayment),
            None,
        ]
    );

    let done = h.engine.get_workflow(&workflow.id).await.unwrap();
    assert_eq!(done.status, WorkflowStatus::Completed);
    assert_eq!(done.history.last().unwrap().action, WorkflowAction::Completed);

    let err = h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap_err();
    assert!(matches!(err, TradeflowError::StateConflict(_)));
}

#[tokio::test]
async fn test_stage_effects_move_documents_and_stock() {
    let h = Harness::new().await;
    let workflow = approved_workflow(&h, &[("P1", 10, Some(100))]).await;

    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();
    let orders = h.engine.list_purchase_orders(Some(&workflow.quotation_ref)).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].supplier_ref, "S001");
    assert_eq!(orders[0].total, dec(700), "cost price 70 x 10");
    assert!(orders[0].id.starts_with("PO202503"));

    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();
    assert_eq!(h.engine.on_hand("P1").await.unwrap(), dec(10));
    let received = h.engine.get_purchase_order(&orders[0].id).await.unwrap();
    assert_eq!(received.status, PurchaseOrderStatus::Received);
    assert!(h.store.cash().is_empty(), "S001 pays on net terms, no expense at receipt");

    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();
    assert_eq!(h.engine.on_hand("P1").await.unwrap(), dec(0));

    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();
    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();
    let closed = h.engine.get_purchase_order(&orders[0].id).await.unwrap();
    assert_eq!(closed.status, PurchaseOrderStatus::Closed);
}

#[tokio::test]
async fn test_on_receipt_supplier_books_expense() {
    let h = Harness::new().await;
    let workflow = approved_workflow(&h, &[("P2", 4, None)]).await;

    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();
    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();

    let cash = h.store.cash();
    assert_eq!(cash.len(), 1);
    // P2 has no cost price: list 50 less the 20% default margin.
    assert_eq!(cash[0].amount, dec(160));
    assert_eq!(cash[0].workflow_ref.as_deref(), Some(workflow.id.as_str()));
}

// ============================================================================
// Rewind
// ============================================================================

#[tokio::test]
async fn test_rewind_reopens_previous_stage() {
    let h = Harness::new().await;
    let workflow = approved_workflow(&h, &[("P1", 10, Some(100))]).await;
    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();
    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();

    let before = h.engine.get_workflow(&workflow.id).await.unwrap();
    assert_eq!(before.current_stage().unwrap().name, StageName::PrepareShipment);

    let rewound = h.engine.rewind_workflow(&workflow.id, "E02", "return to receiving").await.unwrap();
    assert_single_active_stage(&rewound);
    assert_eq!(rewound.current_stage_index, 1);
    assert_eq!(rewound.stages[1].status, StageStatus::InProgress);
    assert!(rewound.stages[1].completed_at.is_none());
    assert_eq!(rewound.stages[2].status, StageStatus::Pending);
    assert!(rewound.stages[2].started_at.is_none());
    assert!(rewound.stages[2].completed_at.is_none());

    let events = h.engine.event_history(EntityKind::Workflow, &workflow.id).await.unwrap();
    let verbs: Vec<_> = events.iter().map(|e| e.verb.as_str()).collect();
    assert_eq!(verbs, vec!["created", "advanced", "advanced", "rewound"]);
    let last = events.last().unwrap();
    assert_eq!(last.reason.as_deref(), Some("return to receiving"));
    assert!(last.before_snapshot.is_some() && last.after_snapshot.is_some());
}

#[tokio::test]
async fn test_readvancing_a_rewound_stage_does_not_repeat_effects() {
    let h = Harness::new().await;
    let workflow = approved_workflow(&h, &[("P1", 10, Some(100))]).await;
    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();
    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();
    assert_eq!(h.engine.on_hand("P1").await.unwrap(), dec(10));

    h.engine.rewind_workflow(&workflow.id, "E02", "recount pallets").await.unwrap();
    h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap();

    assert_eq!(h.engine.on_hand("P1").await.unwrap(), dec(10), "stock credited once");
    assert_eq!(h.engine.list_purchase_orders(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rewind_at_first_stage_conflicts() {
    let h = Harness::new().await;
    let workflow = approved_workflow(&h, &[("P1", 1, None)]).await;

    let err = h.engine.rewind_workflow(&workflow.id, "E02", "nothing to go back to").await.unwrap_err();
    assert!(matches!(err, TradeflowError::StateConflict(_)));
    let err = h.engine.rewind_workflow(&workflow.id, "E02", "   ").await.unwrap_err();
    assert!(matches!(err, TradeflowError::Validation(_)));
}

// ============================================================================
// Skip and cancel
// ============================================================================

#[tokio::test]
async fn test_skip_requires_reason_and_plans_nothing() {
    let h = Harness::new().await;
    let workflow = approved_workflow(&h, &[("P3", 2, None)]).await;

    let err = h.engine.skip_workflow_stage(&workflow.id, "E01", "").await.unwrap_err();
    assert!(matches!(err, TradeflowError::Validation(_)));

    let skipped = h.engine.skip_workflow_stage(&workflow.id, "E01", "service only, nothing to buy").await.unwrap();
    assert_eq!(skipped.outcome.closed_as, StageStatus::Skipped);
    assert!(!skipped.planned_effects);
    assert_single_active_stage(&skipped.workflow);
    assert!(h.engine.list_purchase_orders(None).await.unwrap().is_empty());
    assert!(h.engine.effects_for(&workflow.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_frees_quotation_for_a_new_workflow() {
    let h = Harness::new().await;
    let workflow = approved_workflow(&h, &[("P1", 1, None)]).await;

    let cancelled = h.engine.cancel_workflow(&workflow.id, "E02", "customer withdrew").await.unwrap();
    assert_eq!(cancelled.status, WorkflowStatus::Cancelled);
    let err = h.engine.advance_workflow(&workflow.id, "E01", None).await.unwrap_err();
    assert!(matches!(err, TradeflowError::StateConflict(_)));

    let found = h.engine.workflow_for_quotation(&workflow.quotation_ref).await.unwrap();
    assert_eq!(found.id, workflow.id, "cancelled workflow is still reported");

    let restarted = h
        .engine
        .start_workflow_without_approval(&workflow.quotation_ref, "E02", "customer came back")
        .await
        .unwrap();
    assert_ne!(restarted.id, workflow.id);
    assert_eq!(restarted.history[0].action, WorkflowAction::StartedWithoutApproval);
}

// ============================================================================
// Start without approval
// ============================================================================

#[tokio::test]
async fn test_start_without_approval_needs_reason_and_blocks_duplicates() {
    let h = Harness::new().await;
    let quotation = h.submit(&[("P1", 1, None)]).await;

    let err = h.engine.start_workflow_without_approval(&quotation.id, "E02", " ").await.unwrap_err();
    assert!(matches!(err, TradeflowError::Validation(_)));

    let workflow = h.engine.start_workflow_without_approval(&quotation.id, "E02", "rush order").await.unwrap();
    assert!(workflow.approval_ref.is_none());
    let events = h.engine.event_history(EntityKind::Workflow, &workflow.id).await.unwrap();
    assert_eq!(events[0].verb, "started_without_approval");
    assert_eq!(events[0].reason.as_deref(), Some("rush order"));

    let err = h.engine.start_workflow_without_approval(&quotation.id, "E02", "again").await.unwrap_err();
    assert!(matches!(err, TradeflowError::DuplicateWorkflow(_)));
}

#[tokio::test]
async fn test_rejected_quotation_cannot_start_workflow() {
    let h = Harness::new().await;
    let quotation = h.submit(&[("P1", 1, None)]).await;
    h.engine.reject_quotation(&quotation.id, "sales_manager", "no budget").await.unwrap();

    let err = h.engine.start_workflow_without_approval(&quotation.id, "E02", "override").await.unwrap_err();
    assert!(matches!(err, TradeflowError::StateConflict(_)));
}

// ============================================================================
// Projections
// ============================================================================

#[tokio::test]
async fn test_stage_buckets_and_completion_stats() {
    let h = Harness::new().await;
    let first = approved_workflow(&h, &[("P3", 1, None)]).await;
    let second = approved_workflow(&h, &[("P3", 2, None)]).await;
    let third = approved_workflow(&h, &[("P3", 3, None)]).await;

    h.engine.advance_workflow(&second.id, "E01", None).await.unwrap();
    h.engine.cancel_workflow(&third.id, "E02", "duplicate order").await.unwrap();

    let buckets = h.engine.workflows_by_stage().await.unwrap();
    assert_eq!(buckets.len(), 5);
    assert_eq!(buckets[0].workflow_ids, vec![first.id.clone()]);
    assert_eq!(buckets[1].workflow_ids, vec![second.id.clone()]);
    assert!(buckets[2..].iter().all(|b| b.count == 0));

    h.clock.advance(Duration::days(2));
    for _ in 0..5 {
        h.engine.advance_workflow(&first.id, "E01", None).await.unwrap();
    }

    let march = Period::month(YearMonth::new(2025, 3).unwrap());
    let stats = h.engine.completion_stats(&march).await.unwrap();
    assert_eq!(stats.created, 3);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.in_progress, 1);
    assert_eq!(stats.average_days_to_complete, Some(dec(2)));
}
