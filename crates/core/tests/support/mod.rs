//! Shared test helpers for `tradeflow-core` integration tests.
//!
//! [`Harness`] wires a [`BusinessEngine`] over the in-memory store with a
//! pinned clock and a small seeded master-data set; [`FlakyHandler`] makes
//! a chosen effect fail a fixed number of times.

#![allow(dead_code)]

pub mod memory;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tradeflow_core::store::{Stores, WriteBatch};
use tradeflow_core::{
    BusinessEngine, EffectContext, EffectHandler, EffectHandlerRegistry, FixedClock,
};
use tradeflow_domain::{
    Currency, Customer, EffectKind, EffectRecord, Employee, EmployeeRole, EngineConfig,
    ExchangeRate, PaymentTerms, Product, QuotationLineInput, QuotationPayload, RecordStatus,
    ReferenceRecord, Result, Supplier, TradeflowError,
};

pub use memory::MemoryStore;

pub const ADMIN: &str = "admin";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

/// Fails the first `failures` runs of an effect, then behaves like the
/// built-in handler of that kind.
pub struct FlakyHandler {
    inner: Arc<dyn EffectHandler>,
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl FlakyHandler {
    pub fn new(kind: EffectKind, failures: usize) -> Arc<Self> {
        let inner = EffectHandlerRegistry::builtin().get(kind).unwrap();
        Arc::new(Self { inner, failures: AtomicUsize::new(failures), calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EffectHandler for FlakyHandler {
    fn lock_key(&self, record: &EffectRecord) -> Option<String> {
        self.inner.lock_key(record)
    }

    async fn apply(&self, ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(TradeflowError::storage(format!("injected failure for {}", record.key)));
        }
        self.inner.apply(ctx, record).await
    }
}

pub struct Harness {
    pub engine: BusinessEngine,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    /// Engine on 2025-03-05 with default configuration and seeded data.
    pub async fn new() -> Self {
        Self::with(EngineConfig::default(), Vec::new()).await
    }

    pub async fn with(config: EngineConfig, handlers: Vec<(EffectKind, Arc<dyn EffectHandler>)>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::on(date(2025, 3, 5)));
        let builder = BusinessEngine::builder(Stores::from_single(store.clone()), config).clock(clock.clone());
        let engine = handlers
            .into_iter()
            .fold(builder, |builder, (kind, handler)| builder.effect_handler(kind, handler))
            .build();
        let harness = Self { engine, store, clock };
        harness.seed().await;
        harness
    }

    async fn seed(&self) {
        let engine = &self.engine;
        engine
            .import_rates(
                vec![
                    ExchangeRate { currency: Currency::Vnd, date: date(2025, 3, 1), rate: dec(24_500) },
                    ExchangeRate { currency: Currency::Krw, date: date(2025, 3, 1), rate: dec(1_450) },
                ],
                ADMIN,
            )
            .await
            .unwrap();

        for record in [
            customer("C001", "Hanoi Plastics", Some(30)),
            customer("C002", "Saigon Molding", None),
            supplier("S001", PaymentTerms::Net { days: 30 }),
            supplier("S002", PaymentTerms::OnReceipt),
            employee("E01", EmployeeRole::Sales, Some("E02")),
            employee("E02", EmployeeRole::SalesManager, None),
            product("P1", "HR", Some(100), Some(70), Some("S001")),
            product("P2", "MB", Some(50), None, Some("S002")),
            product("P3", "SV", Some(20), None, None),
        ] {
            engine.put_reference(record, ADMIN).await.unwrap();
        }
    }

    /// A submitted USD quotation for C001 dated 2025-03-05.
    pub async fn submit(&self, lines: &[(&str, i64, Option<i64>)]) -> tradeflow_domain::Quotation {
        self.engine.submit_quotation(payload("C001", lines), "E01").await.unwrap()
    }
}

pub fn payload(customer: &str, lines: &[(&str, i64, Option<i64>)]) -> QuotationPayload {
    QuotationPayload {
        customer_ref: customer.to_string(),
        date: date(2025, 3, 5),
        currency: Currency::Usd,
        lines: lines
            .iter()
            .map(|(product, qty, price)| QuotationLineInput {
                product_ref: (*product).to_string(),
                qty: dec(*qty),
                unit_price: price.map(dec),
                description: None,
            })
            .collect(),
        tax_rate: None,
        note: None,
    }
}

pub fn customer(id: &str, name: &str, terms: Option<u32>) -> ReferenceRecord {
    ReferenceRecord::Customer(Customer {
        id: id.into(),
        name: name.into(),
        country: Some("VN".into()),
        currency: Currency::Usd,
        payment_terms_days: terms,
        contact_email: None,
        status: RecordStatus::Active,
    })
}

pub fn supplier(id: &str, terms: PaymentTerms) -> ReferenceRecord {
    ReferenceRecord::Supplier(Supplier {
        id: id.into(),
        name: format!("Supplier {id}"),
        country: Some("KR".into()),
        currency: Currency::Usd,
        payment_terms: terms,
        status: RecordStatus::Active,
    })
}

pub fn employee(id: &str, role: EmployeeRole, supervisor: Option<&str>) -> ReferenceRecord {
    ReferenceRecord::Employee(Employee {
        id: id.into(),
        name: format!("Employee {id}"),
        role,
        supervisor_ref: supervisor.map(str::to_string),
        annual_leave_days: None,
        password_hash: None,
        status: RecordStatus::Active,
    })
}

pub fn product(
    id: &str,
    category: &str,
    list_price: Option<i64>,
    cost_price: Option<i64>,
    supplier: Option<&str>,
) -> ReferenceRecord {
    ReferenceRecord::Product(Product {
        id: id.into(),
        name: format!("Product {id}"),
        category: category.into(),
        unit: "ea".into(),
        list_price: list_price.map(dec),
        cost_price: cost_price.map(dec),
        currency: Currency::Usd,
        supplier_ref: supplier.map(str::to_string),
        reorder_level: dec(5),
        status: RecordStatus::Active,
    })
}
