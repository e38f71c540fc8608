//! Reference data store
//!
//! Keyed reads and last-writer-wins writes of master data. Every mutation
//! commits together with its audit event and then invalidates the cache.

pub mod cache;

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};
use tradeflow_domain::{
    Currency, Customer, DeleteMode, Employee, IdFamily, PriceList, Product, RecordStatus,
    ReferenceFilter, ReferenceKind, ReferenceRecord, Result, Supplier, TradeflowError,
};

pub use cache::{CacheResult, ReferenceCache, ReferenceCacheConfig};

use crate::audit::{AuditLog, EventDraft};
use crate::clock::Clock;
use crate::ids::IdService;
use crate::locks::{keys, AggregateLocks};
use crate::store::{ReferenceRepository, UnitOfWork, Write, WriteBatch};

/// A resolved unit price and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrice {
    pub unit_price: Decimal,
    pub currency: Currency,
    pub price_list: Option<String>,
}

pub struct ReferenceService {
    repo: Arc<dyn ReferenceRepository>,
    uow: Arc<dyn UnitOfWork>,
    cache: ReferenceCache,
    ids: Arc<IdService>,
    audit: Arc<AuditLog>,
    locks: Arc<AggregateLocks>,
    clock: Arc<dyn Clock>,
}

impl ReferenceService {
    pub fn new(
        repo: Arc<dyn ReferenceRepository>,
        uow: Arc<dyn UnitOfWork>,
        cache: ReferenceCache,
        ids: Arc<IdService>,
        audit: Arc<AuditLog>,
        locks: Arc<AggregateLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { repo, uow, cache, ids, audit, locks, clock }
    }

    pub async fn find(&self, kind: ReferenceKind, id: &str) -> Result<Option<ReferenceRecord>> {
        self.cache.get_or_fetch(kind, id, || self.repo.get_reference(kind, id)).await
    }

    pub async fn get(&self, kind: ReferenceKind, id: &str) -> Result<ReferenceRecord> {
        self.find(kind, id)
            .await?
            .ok_or_else(|| TradeflowError::not_found(kind.entity_kind(), id))
    }

    pub async fn list(&self, kind: ReferenceKind, filter: &ReferenceFilter) -> Result<Vec<ReferenceRecord>> {
        self.repo.list_reference(kind, filter).await
    }

    pub async fn customer(&self, id: &str) -> Result<Customer> {
        match self.get(ReferenceKind::Customer, id).await? {
            ReferenceRecord::Customer(customer) => Ok(customer),
            other => Err(mismatch(ReferenceKind::Customer, &other)),
        }
    }

    pub async fn supplier(&self, id: &str) -> Result<Supplier> {
        match self.get(ReferenceKind::Supplier, id).await? {
            ReferenceRecord::Supplier(supplier) => Ok(supplier),
            other => Err(mismatch(ReferenceKind::Supplier, &other)),
        }
    }

    pub async fn employee(&self, id: &str) -> Result<Employee> {
        match self.get(ReferenceKind::Employee, id).await? {
            ReferenceRecord::Employee(employee) => Ok(employee),
            other => Err(mismatch(ReferenceKind::Employee, &other)),
        }
    }

    pub async fn product(&self, id: &str) -> Result<Product> {
        match self.get(ReferenceKind::Product, id).await? {
            ReferenceRecord::Product(product) => Ok(product),
            other => Err(mismatch(ReferenceKind::Product, &other)),
        }
    }

    /// Unit price of `product` for `customer` on `date`: a customer-specific
    /// price list first, then a general one, then the product list price.
    pub async fn resolve_price(
        &self,
        product: &Product,
        customer_ref: &str,
        date: NaiveDate,
    ) -> Result<Option<ResolvedPrice>> {
        let lists: Vec<PriceList> = self
            .repo
            .list_reference(ReferenceKind::PriceList, &ReferenceFilter::active())
            .await?
            .into_iter()
            .filter_map(|record| match record {
                ReferenceRecord::PriceList(list) => Some(list),
                _ => None,
            })
            .filter(|list| list.product_ref == product.id && list.is_valid_on(date))
            .collect();

        let latest = |customer: Option<&str>| {
            lists
                .iter()
                .filter(|l| l.customer_ref.as_deref() == customer)
                .max_by_key(|l| l.valid_from)
        };
        if let Some(list) = latest(Some(customer_ref)).or_else(|| latest(None)) {
            return Ok(Some(ResolvedPrice {
                unit_price: list.unit_price,
                currency: list.currency,
                price_list: Some(list.id.clone()),
            }));
        }
        Ok(product.list_price.map(|unit_price| ResolvedPrice {
            unit_price,
            currency: product.currency,
            price_list: None,
        }))
    }

    /// Create or replace a record. Customers, suppliers and employees with
    /// an empty id get the next counter id of their family.
    pub async fn put(&self, mut record: ReferenceRecord, actor: &str) -> Result<ReferenceRecord> {
        validate(&record)?;
        if record.id().trim().is_empty() {
            let family = match record.kind() {
                ReferenceKind::Customer => IdFamily::Customer,
                ReferenceKind::Supplier => IdFamily::Supplier,
                ReferenceKind::Employee => IdFamily::Employee,
                kind => return Err(TradeflowError::validation(format!("{kind} id is required"))),
            };
            // Hand-entered ids may already occupy counter values.
            let id = loop {
                let candidate = self.ids.next_id(family, self.clock.today()).await?;
                if self.repo.get_reference(record.kind(), &candidate).await?.is_none() {
                    break candidate;
                }
                debug!(id = %candidate, "generated id already taken");
            };
            set_id(&mut record, id);
        }

        let kind = record.kind();
        let id = record.id().to_string();
        let _guard = self.locks.lock(&keys::reference(kind.as_str(), &id)).await;
        let existing = self.repo.get_reference(kind, &id).await?;

        // Profile edits never carry the credential; keep the stored one.
        if let (ReferenceRecord::Employee(next), Some(ReferenceRecord::Employee(prev))) =
            (&mut record, &existing)
        {
            if next.password_hash.is_none() {
                next.password_hash.clone_from(&prev.password_hash);
            }
        }

        let verb = if existing.is_some() { "updated" } else { "created" };
        let mut draft = EventDraft::new(actor, kind.entity_kind(), &id, verb).after(&record.redacted())?;
        if let Some(prev) = &existing {
            draft = draft.before(&prev.redacted())?;
        }
        let mut batch = WriteBatch::new().with(Write::Reference(record.clone()));
        self.audit.record(&mut batch, draft).await?;
        self.uow.commit(batch).await?;
        self.cache.invalidate(kind, &id);

        info!(kind = %kind, id = %id, verb, "reference record saved");
        Ok(record.redacted())
    }

    pub async fn delete(&self, kind: ReferenceKind, id: &str, mode: DeleteMode, actor: &str) -> Result<()> {
        let _guard = self.locks.lock(&keys::reference(kind.as_str(), id)).await;
        let existing = self
            .repo
            .get_reference(kind, id)
            .await?
            .ok_or_else(|| TradeflowError::not_found(kind.entity_kind(), id))?;

        let mut batch = WriteBatch::new();
        let draft = EventDraft::new(actor, kind.entity_kind(), id, "deleted").before(&existing.redacted())?;
        let draft = match mode {
            DeleteMode::Soft => {
                if !existing.is_active() {
                    return Ok(());
                }
                let mut inactive = existing.clone();
                inactive.set_status(RecordStatus::Inactive);
                let draft = EventDraft { verb: "deactivated".into(), ..draft }.after(&inactive.redacted())?;
                batch.push(Write::Reference(inactive));
                draft
            }
            DeleteMode::Hard => {
                batch.push(Write::DeleteReference { kind, id: id.to_string() });
                draft
            }
        };
        self.audit.record(&mut batch, draft).await?;
        self.uow.commit(batch).await?;
        self.cache.invalidate(kind, id);

        info!(kind = %kind, id, mode = ?mode, "reference record deleted");
        Ok(())
    }

    /// Store a new argon2 hash for an employee.
    pub async fn set_password(&self, employee_id: &str, password: &str, actor: &str) -> Result<()> {
        let hash = tradeflow_common::hash_password(password)
            .map_err(|e| TradeflowError::validation(e.to_string()))?;
        let _guard = self.locks.lock(&keys::reference(ReferenceKind::Employee.as_str(), employee_id)).await;
        let mut employee = match self.repo.get_reference(ReferenceKind::Employee, employee_id).await? {
            Some(ReferenceRecord::Employee(employee)) => employee,
            _ => return Err(TradeflowError::not_found(ReferenceKind::Employee.entity_kind(), employee_id)),
        };
        employee.password_hash = Some(hash);

        let mut batch = WriteBatch::new().with(Write::Reference(ReferenceRecord::Employee(employee)));
        let draft = EventDraft::new(actor, ReferenceKind::Employee.entity_kind(), employee_id, "password_changed");
        self.audit.record(&mut batch, draft).await?;
        self.uow.commit(batch).await?;
        self.cache.invalidate(ReferenceKind::Employee, employee_id);
        info!(employee = employee_id, "employee password changed");
        Ok(())
    }
}

fn mismatch(expected: ReferenceKind, found: &ReferenceRecord) -> TradeflowError {
    TradeflowError::internal(format!("expected {expected} record, store returned {}", found.kind()))
}

fn set_id(record: &mut ReferenceRecord, id: String) {
    match record {
        ReferenceRecord::Customer(c) => c.id = id,
        ReferenceRecord::Supplier(s) => s.id = id,
        ReferenceRecord::Employee(e) => e.id = id,
        ReferenceRecord::Product(p) => p.id = id,
        ReferenceRecord::PriceList(p) => p.id = id,
    }
}

fn validate(record: &ReferenceRecord) -> Result<()> {
    if record.name().trim().is_empty() {
        return Err(TradeflowError::validation(format!("{} name is required", record.kind())));
    }
    match record {
        ReferenceRecord::Product(p) => {
            if p.cost_price.is_some_and(|c| c < Decimal::ZERO)
                || p.list_price.is_some_and(|c| c < Decimal::ZERO)
            {
                return Err(TradeflowError::validation("product prices must not be negative"));
            }
        }
        ReferenceRecord::PriceList(p) => {
            if p.unit_price < Decimal::ZERO {
                return Err(TradeflowError::validation("unit_price must not be negative"));
            }
            if p.valid_to.is_some_and(|to| to < p.valid_from) {
                return Err(TradeflowError::validation("valid_to is before valid_from"));
            }
        }
        ReferenceRecord::Employee(e) => {
            if e.supervisor_ref.as_deref() == Some(e.id.as_str()) && !e.id.is_empty() {
                return Err(TradeflowError::validation("an employee cannot supervise themselves"));
            }
        }
        ReferenceRecord::Customer(_) | ReferenceRecord::Supplier(_) => {}
    }
    Ok(())
}
