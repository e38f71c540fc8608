//! Integration tests for master data, rates, credentials, catalog codes and
//! quotation identifiers

use rust_decimal::Decimal;
use tradeflow_core::store::{UnitOfWork, Write, WriteBatch};
use tradeflow_domain::{
    ApprovalStatus, ApprovalType, Currency, DeleteMode, Decision, EmployeeRole, EntityKind, ExchangeRate,
    NewApprovalRequest, PriceList, Priority, QuotationFilter, QuotationStatus, RecordStatus, ReferenceFilter,
    ReferenceKind, ReferenceRecord, TradeflowError,
};

mod support;
use support::{customer, date, dec, employee, payload, product, Harness, ADMIN};

fn quotation_request(target: &str) -> NewApprovalRequest {
    NewApprovalRequest {
        request_type: ApprovalType::Quotation,
        target_ref: target.to_string(),
        requester_ref: "E01".to_string(),
        amount: None,
        priority: Priority::Normal,
    }
}

// ============================================================================
// Reference records
// ============================================================================

#[tokio::test]
async fn test_empty_id_gets_next_free_counter_id() {
    let h = Harness::new().await;
    let saved = h.engine.put_reference(customer("", "Da Nang Tooling", None), ADMIN).await.unwrap();
    assert_eq!(saved.id(), "C003", "C001 and C002 are already taken");

    let err = h.engine.put_reference(product("", "SP", Some(5), None, None), ADMIN).await.unwrap_err();
    assert!(matches!(err, TradeflowError::Validation(_)), "products need explicit codes");
}

#[tokio::test]
async fn test_update_is_visible_through_cache() {
    let h = Harness::new().await;
    let before = h.engine.get_reference(ReferenceKind::Customer, "C002").await.unwrap();
    assert_eq!(before.name(), "Saigon Molding");

    h.engine.put_reference(customer("C002", "Saigon Molding JSC", Some(45)), ADMIN).await.unwrap();
    let after = h.engine.get_reference(ReferenceKind::Customer, "C002").await.unwrap();
    assert_eq!(after.name(), "Saigon Molding JSC");

    let events = h.engine.event_history(EntityKind::Customer, "C002").await.unwrap();
    let verbs: Vec<_> = events.iter().map(|e| e.verb.as_str()).collect();
    assert_eq!(verbs, vec!["created", "updated"]);
}

#[tokio::test]
async fn test_soft_delete_deactivates_and_blocks_new_quotations() {
    let h = Harness::new().await;
    h.engine.delete_reference(ReferenceKind::Customer, "C002", DeleteMode::Soft, ADMIN).await.unwrap();

    let record = h.engine.get_reference(ReferenceKind::Customer, "C002").await.unwrap();
    assert!(!record.is_active());
    let active = h.engine.list_reference(ReferenceKind::Customer, &ReferenceFilter::active()).await.unwrap();
    assert_eq!(active.len(), 1);

    let err = h.engine.submit_quotation(payload("C002", &[("P1", 1, None)]), "E01").await.unwrap_err();
    assert!(matches!(err, TradeflowError::Validation(_)));

    h.engine.delete_reference(ReferenceKind::Customer, "C002", DeleteMode::Hard, ADMIN).await.unwrap();
    let err = h.engine.get_reference(ReferenceKind::Customer, "C002").await.unwrap_err();
    assert!(matches!(err, TradeflowError::NotFound(_)));
}

#[tokio::test]
async fn test_customer_price_list_wins_over_list_price() {
    let h = Harness::new().await;
    h.engine
        .put_reference(
            ReferenceRecord::PriceList(PriceList {
                id: "PL-C001-P1".into(),
                product_ref: "P1".into(),
                customer_ref: Some("C001".into()),
                currency: Currency::Usd,
                unit_price: dec(90),
                valid_from: date(2025, 3, 1),
                valid_to: None,
                status: RecordStatus::Active,
            }),
            ADMIN,
        )
        .await
        .unwrap();

    let c001 = h.engine.submit_quotation(payload("C001", &[("P1", 1, None)]), "E01").await.unwrap();
    assert_eq!(c001.lines[0].unit_price, dec(90));
    let c002 = h.engine.submit_quotation(payload("C002", &[("P1", 1, None)]), "E01").await.unwrap();
    assert_eq!(c002.lines[0].unit_price, dec(100));
}

// ============================================================================
// Credentials
// ============================================================================

#[tokio::test]
async fn test_password_survives_profile_edits() {
    let h = Harness::new().await;
    h.engine.set_password("E01", "correct horse battery", ADMIN).await.unwrap();

    let signed_in = h.engine.authenticate("E01", "correct horse battery").await.unwrap();
    assert!(signed_in.password_hash.is_none(), "hash never leaves the engine");

    h.engine
        .put_reference(employee("E01", EmployeeRole::Sales, Some("E02")), ADMIN)
        .await
        .unwrap();
    assert!(h.engine.authenticate("E01", "correct horse battery").await.is_ok());

    let listed = h.engine.list_reference(ReferenceKind::Employee, &ReferenceFilter::default()).await.unwrap();
    assert!(listed.iter().all(|r| matches!(r, ReferenceRecord::Employee(e) if e.password_hash.is_none())));
}

#[tokio::test]
async fn test_bad_credentials_are_unauthorized() {
    let h = Harness::new().await;
    h.engine.set_password("E01", "correct horse battery", ADMIN).await.unwrap();

    for (id, password) in [("E01", "wrong"), ("E02", "anything"), ("E99", "anything")] {
        let err = h.engine.authenticate(id, password).await.unwrap_err();
        assert!(matches!(err, TradeflowError::Unauthorized(_)), "{id}: {err:?}");
    }
}

// ============================================================================
// Rates
// ============================================================================

#[tokio::test]
async fn test_conversion_uses_latest_rate_on_or_before_date() {
    let h = Harness::new().await;
    let converted = h.engine.convert(dec(100), Currency::Usd, Currency::Vnd, date(2025, 3, 2)).await.unwrap();
    assert_eq!(converted, dec(2_450_000));

    let err = h.engine.convert(dec(100), Currency::Usd, Currency::Vnd, date(2025, 2, 1)).await.unwrap_err();
    assert!(matches!(err, TradeflowError::RateUnavailable { currency: Currency::Vnd, .. }));
    assert_eq!(err.exit_code(), 1);

    h.engine
        .record_rate(ExchangeRate { currency: Currency::Vnd, date: date(2025, 3, 4), rate: dec(25_000) }, ADMIN)
        .await
        .unwrap();
    let later = h.engine.convert(dec(1), Currency::Usd, Currency::Vnd, date(2025, 3, 5)).await.unwrap();
    assert_eq!(later, dec(25_000));
}

#[tokio::test]
async fn test_round_trip_conversion_stays_within_tolerance() {
    let h = Harness::new().await;
    let day = date(2025, 3, 3);
    let tolerance = Decimal::new(1, 6);
    let pairs = [(Currency::Usd, Currency::Vnd), (Currency::Krw, Currency::Vnd), (Currency::Vnd, Currency::Krw)];

    for amount in [dec(1), dec(37), Decimal::new(123_456_789, 3), dec(9_999_999)] {
        for (a, b) in pairs {
            let there = h.engine.convert(amount, a, b, day).await.unwrap();
            let back = h.engine.convert(there, b, a, day).await.unwrap();
            let relative = ((back - amount) / amount).abs();
            assert!(relative <= tolerance, "{amount} {a}->{b}->{a} gave {back}");
        }
    }
}

#[tokio::test]
async fn test_invalid_rates_are_rejected() {
    let h = Harness::new().await;
    let bad = [
        ExchangeRate { currency: Currency::Usd, date: date(2025, 3, 1), rate: dec(2) },
        ExchangeRate { currency: Currency::Krw, date: date(2025, 3, 1), rate: dec(0) },
    ];
    for rate in bad {
        let err = h.engine.record_rate(rate, ADMIN).await.unwrap_err();
        assert!(matches!(err, TradeflowError::Validation(_)));
    }
}

// ============================================================================
// Product codes
// ============================================================================

#[tokio::test]
async fn test_register_code_once_and_flag_unknown_segments() {
    let h = Harness::new().await;
    let built = h.engine.build_product_code("HR", &["ST", "VG", "PG", "M"]).unwrap();
    assert_eq!(built.code, "HR-ST-VG-PG-M");

    let first = h.engine.register_product_code("HRC-TC-Z-08", ADMIN).await.unwrap();
    assert_eq!(first.flagged_segments, vec!["model".to_string()]);
    let second = h.engine.register_product_code("HRC-TC-Z-08", "E01").await.unwrap();
    assert_eq!(second.registered_by, ADMIN, "the first registration is kept");

    h.engine.register_product_code("MB-SA-P20-250.300", ADMIN).await.unwrap();
    assert_eq!(h.engine.list_product_codes(Some("HRC")).await.unwrap().len(), 1);
    assert_eq!(h.engine.list_product_codes(None).await.unwrap().len(), 2);

    let err = h.engine.register_product_code("XX-1", ADMIN).await.unwrap_err();
    assert!(matches!(err, TradeflowError::Validation(_)));
}

// ============================================================================
// Quotations and identifiers
// ============================================================================

#[tokio::test]
async fn test_quotation_counters_increase_per_month() {
    let h = Harness::new().await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(h.submit(&[("P3", 1, None)]).await.id);
    }
    let mut april = payload("C001", &[("P3", 1, None)]);
    april.date = date(2025, 4, 1);
    ids.push(h.engine.submit_quotation(april, "E01").await.unwrap().id);
    ids.push(h.submit(&[("P3", 1, None)]).await.id);

    assert_eq!(ids, vec!["Q202503001", "Q202503002", "Q202503003", "Q202504001", "Q202503004"]);
}

#[tokio::test]
async fn test_supersede_retires_old_quotation() {
    let h = Harness::new().await;
    let old = h.submit(&[("P1", 1, None)]).await;

    let err = h.engine.supersede_quotation(&old.id, payload("C002", &[("P1", 2, None)]), "E01").await.unwrap_err();
    assert!(matches!(err, TradeflowError::Validation(_)));

    let successor = h.engine.supersede_quotation(&old.id, payload("C001", &[("P1", 2, None)]), "E01").await.unwrap();
    assert_eq!(successor.supersedes.as_deref(), Some(old.id.as_str()));
    let old = h.engine.get_quotation(&old.id).await.unwrap();
    assert_eq!(old.status, QuotationStatus::Superseded);
    assert_eq!(old.superseded_by.as_deref(), Some(successor.id.as_str()));

    let submitted = h
        .engine
        .list_quotations(&QuotationFilter { status: Some(QuotationStatus::Submitted), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(submitted.len(), 1);
}

#[tokio::test]
async fn test_supersede_withdraws_pending_approval() {
    let h = Harness::new().await;
    let old = h.submit(&[("P1", 1, None)]).await;
    let request = h.engine.submit_approval(quotation_request(&old.id)).await.unwrap();

    let successor = h.engine.supersede_quotation(&old.id, payload("C001", &[("P1", 2, None)]), "E01").await.unwrap();
    let withdrawn = h.engine.get_approval(&request.id).await.unwrap();
    assert_eq!(withdrawn.status, ApprovalStatus::Cancelled);
    assert!(withdrawn.cancel_reason.as_deref().unwrap_or_default().contains(&successor.id));

    let err = h.engine.decide_approval(&request.id, "sales_manager", Decision::Approve, None).await.unwrap_err();
    assert_eq!(err.kind(), "state_conflict");
    assert_eq!(err.exit_code(), 3);
    assert!(h.engine.effects_for(&request.id).await.unwrap().is_empty());
    assert!(h.engine.unfinished_effects().await.unwrap().is_empty());
    assert!(h.engine.workflow_for_quotation(&old.id).await.is_err());

    let verbs: Vec<_> = h
        .engine
        .event_history(EntityKind::Approval, &request.id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.verb)
        .collect();
    assert_eq!(verbs, vec!["submitted", "cancelled"]);

    // The successor can be approved normally.
    let decided = h.engine.approve_quotation(&successor.id, "sales_manager", None).await.unwrap();
    assert_eq!(decided.request.status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn test_final_approval_rechecks_retired_target() {
    let h = Harness::new().await;
    let quotation = h.submit(&[("P1", 1, None)]).await;
    let request = h.engine.submit_approval(quotation_request(&quotation.id)).await.unwrap();

    let mut retired = quotation.clone();
    retired.status = QuotationStatus::Superseded;
    h.store.commit(WriteBatch::new().with(Write::Quotation(retired))).await.unwrap();

    let err = h.engine.decide_approval(&request.id, "sales_manager", Decision::Approve, None).await.unwrap_err();
    assert_eq!(err.kind(), "state_conflict");
    let untouched = h.engine.get_approval(&request.id).await.unwrap();
    assert_eq!(untouched.status, ApprovalStatus::Pending);
    assert!(h.engine.effects_for(&request.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_quotation_input_is_validated() {
    let h = Harness::new().await;
    let cases = [
        payload("C001", &[]),
        payload("C001", &[("P1", 0, None)]),
        payload("C001", &[("P1", 1, Some(-5))]),
        payload(" ", &[("P1", 1, None)]),
    ];
    for input in cases {
        let err = h.engine.submit_quotation(input, "E01").await.unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    let err = h.engine.submit_quotation(payload("C404", &[("P1", 1, None)]), "E01").await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert_eq!(err.exit_code(), 2);
    assert!(h.engine.list_quotations(&QuotationFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_event_log_is_strictly_ordered() {
    let h = Harness::new().await;
    let quotation = h.submit(&[("P1", 1, None)]).await;
    h.engine.approve_quotation(&quotation.id, "sales_manager", None).await.unwrap();

    let events = h.store.events();
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    let recent = h.engine.recent_events(3).await.unwrap();
    assert_eq!(recent.len(), 3);
    assert_eq!(recent.last().unwrap().seq, events.last().unwrap().seq);
}
