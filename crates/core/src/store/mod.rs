//! Persistence ports
//!
//! Core never touches SQL. Reads go through one repository trait per
//! aggregate family; every write of a command (its aggregate, its event and
//! its effect bookkeeping) is collected into a [`WriteBatch`] and handed to
//! [`UnitOfWork::commit`], which applies it atomically.

pub mod batch;
pub mod ports;

use std::sync::Arc;

pub use batch::{Write, WriteBatch};
pub use ports::{
    ApprovalRepository, CashLedgerRepository, EffectRepository, EventRepository,
    InventoryRepository, InvoiceRepository, ProductCodeRepository, PurchaseOrderRepository,
    QuotationRepository, RateRepository, ReferenceRepository, SalesRepository,
    SequenceRepository, UnitOfWork, WorkflowRepository,
};

/// Every port the engine needs, bundled so services can be wired from one
/// value.
#[derive(Clone)]
pub struct Stores {
    pub uow: Arc<dyn UnitOfWork>,
    pub quotations: Arc<dyn QuotationRepository>,
    pub purchase_orders: Arc<dyn PurchaseOrderRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub workflows: Arc<dyn WorkflowRepository>,
    pub approvals: Arc<dyn ApprovalRepository>,
    pub reference: Arc<dyn ReferenceRepository>,
    pub inventory: Arc<dyn InventoryRepository>,
    pub cash: Arc<dyn CashLedgerRepository>,
    pub sales: Arc<dyn SalesRepository>,
    pub effects: Arc<dyn EffectRepository>,
    pub events: Arc<dyn EventRepository>,
    pub sequences: Arc<dyn SequenceRepository>,
    pub rates: Arc<dyn RateRepository>,
    pub product_codes: Arc<dyn ProductCodeRepository>,
}

impl Stores {
    /// Wire every port to one adapter implementing all of them.
    pub fn from_single<S>(store: Arc<S>) -> Self
    where
        S: UnitOfWork
            + QuotationRepository
            + PurchaseOrderRepository
            + InvoiceRepository
            + WorkflowRepository
            + ApprovalRepository
            + ReferenceRepository
            + InventoryRepository
            + CashLedgerRepository
            + SalesRepository
            + EffectRepository
            + EventRepository
            + SequenceRepository
            + RateRepository
            + ProductCodeRepository
            + 'static,
    {
        Self {
            uow: store.clone(),
            quotations: store.clone(),
            purchase_orders: store.clone(),
            invoices: store.clone(),
            workflows: store.clone(),
            approvals: store.clone(),
            reference: store.clone(),
            inventory: store.clone(),
            cash: store.clone(),
            sales: store.clone(),
            effects: store.clone(),
            events: store.clone(),
            sequences: store.clone(),
            rates: store.clone(),
            product_codes: store,
        }
    }
}
