//! Shared fixtures for api integration tests.
//!
//! [`TestApp`] opens an [`AppContext`] over a fresh SQLite file with the
//! clock pinned to 2025-03-05, then seeds rates and master data through the
//! command handlers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tempfile::TempDir;
use tradeflow_api::commands::{rates, reference};
use tradeflow_api::{AppContext, CommandEnvelope};
use tradeflow_core::store::WriteBatch;
use tradeflow_core::{EffectContext, EffectHandler, EffectHandlerRegistry, EngineBuilder, FixedClock};
use tradeflow_domain::{
    Config, Currency, Customer, DatabaseConfig, EffectKind, EffectRecord, Employee, EmployeeRole,
    PaymentTerms, Product, QuotationLineInput, QuotationPayload, RecordStatus, ReferenceRecord,
    Result, Supplier, TradeflowError,
};

pub const ADMIN: &str = "admin";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

/// Decode a successful envelope's result.
pub fn decode<T: DeserializeOwned>(envelope: &CommandEnvelope) -> T {
    assert!(envelope.ok, "command failed: {}", envelope.to_json());
    let value = envelope.result.clone().expect("successful envelope carries a result");
    serde_json::from_value(value).expect("result should decode")
}

/// Fails the first `failures` runs of an effect, then defers to the
/// built-in handler of the same kind.
pub struct FlakyHandler {
    inner: Arc<dyn EffectHandler>,
    failures: AtomicUsize,
}

impl FlakyHandler {
    pub fn new(kind: EffectKind, failures: usize) -> Arc<Self> {
        let inner = EffectHandlerRegistry::builtin().get(kind).expect("built-in handler");
        Arc::new(Self { inner, failures: AtomicUsize::new(failures) })
    }
}

#[async_trait]
impl EffectHandler for FlakyHandler {
    fn lock_key(&self, record: &EffectRecord) -> Option<String> {
        self.inner.lock_key(record)
    }

    async fn apply(&self, ctx: &EffectContext, record: &EffectRecord) -> Result<WriteBatch> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(TradeflowError::storage(format!("injected failure for {}", record.key)));
        }
        self.inner.apply(ctx, record).await
    }
}

pub struct TestApp {
    pub ctx: AppContext,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with(|builder| builder).await
    }

    /// App whose engine is adjusted by `customize` after the clock is pinned.
    pub async fn with<F>(customize: F) -> Self
    where
        F: FnOnce(EngineBuilder) -> EngineBuilder,
    {
        let dir = TempDir::new().expect("temporary directory should be created");
        let config = Config {
            database: DatabaseConfig {
                path: dir.path().join("tradeflow.db").display().to_string(),
                pool_size: 4,
                ..DatabaseConfig::default()
            },
            ..Config::default()
        };
        let clock = Arc::new(FixedClock::on(date(2025, 3, 5)));
        let ctx = AppContext::open_with(config, |builder| customize(builder.clock(clock)))
            .await
            .expect("application context should open");
        let app = Self { ctx, dir };
        app.seed().await;
        app
    }

    async fn seed(&self) {
        let rates_file = self.dir.path().join("rates.json");
        std::fs::write(
            &rates_file,
            r#"[{"currency":"VND","date":"2025-03-01","rate":"24500"},
                {"currency":"KRW","date":"2025-03-01","rate":"1450"}]"#,
        )
        .expect("rate file written");
        let imported = rates::import_rates(&self.ctx, &rates_file, ADMIN).await;
        assert!(imported.ok, "{}", imported.to_json());

        for record in [
            customer("C001", "Hanoi Plastics", Some(30)),
            ReferenceRecord::Supplier(Supplier {
                id: "S001".into(),
                name: "Busan Hot Runner".into(),
                country: Some("KR".into()),
                currency: Currency::Usd,
                payment_terms: PaymentTerms::Net { days: 30 },
                status: RecordStatus::Active,
            }),
            employee("E01", EmployeeRole::Sales, Some("E02")),
            employee("E02", EmployeeRole::SalesManager, None),
            product("P1", Some("S001")),
            product("P3", None),
        ] {
            let stored = reference::put_reference(&self.ctx, record, ADMIN).await;
            assert!(stored.ok, "{}", stored.to_json());
        }
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

pub fn product(id: &str, supplier: Option<&str>) -> ReferenceRecord {
    ReferenceRecord::Product(Product {
        id: id.into(),
        name: format!("Product {id}"),
        category: "HR".into(),
        unit: "ea".into(),
        list_price: Some(dec(100)),
        cost_price: Some(dec(70)),
        currency: Currency::Usd,
        supplier_ref: supplier.map(str::to_string),
        reorder_level: dec(5),
        status: RecordStatus::Active,
    })
}

/// USD quotation for C001 dated 2025-03-05.
pub fn payload(lines: &[(&str, i64, i64)]) -> QuotationPayload {
    QuotationPayload {
        customer_ref: "C001".into(),
        date: date(2025, 3, 5),
        currency: Currency::Usd,
        lines: lines
            .iter()
            .map(|(product, qty, price)| QuotationLineInput {
                product_ref: (*product).to_string(),
                qty: dec(*qty),
                unit_price: Some(dec(*price)),
                description: None,
            })
            .collect(),
        tax_rate: None,
        note: None,
    }
}
