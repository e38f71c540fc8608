//! # Tradeflow Core
//!
//! Business logic of the workflow and approval engine, with no
//! infrastructure dependencies.
//!
//! This crate contains:
//! - The services behind every command (quotations, approvals, workflows,
//!   invoices, purchasing, inventory, cash and sales ledgers)
//! - The effect dispatcher that applies the side effects of transitions
//! - Port traits the infrastructure layer implements
//! - [`BusinessEngine`], the command/query facade
//!
//! ## Architecture Principles
//! - Only depends on `tradeflow-domain` and `tradeflow-common`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Time comes from [`Clock`] so tests can pin it

pub mod approval;
pub mod audit;
pub mod auth;
pub mod cashflow;
pub mod catalog;
pub mod clock;
pub mod currency;
pub mod effects;
pub mod engine;
pub mod ids;
pub mod inventory;
pub mod invoice;
pub mod locks;
pub mod procurement;
pub mod projections;
pub mod quotation;
pub mod reference;
pub mod sales;
pub mod store;
pub mod workflow;

pub use approval::{ApprovalService, Decided, DefaultRoutingPolicy, RoutingPolicy};
pub use audit::{AuditLog, EventDraft};
pub use clock::{Clock, FixedClock, SystemClock};
pub use effects::{EffectContext, EffectDispatcher, EffectHandler, EffectHandlerRegistry};
pub use engine::{BusinessEngine, EngineBuilder};
pub use invoice::PaymentRecorded;
pub use locks::AggregateLocks;
pub use sales::SalesSource;
pub use store::{
    ApprovalRepository, CashLedgerRepository, EffectRepository, EventRepository,
    InventoryRepository, InvoiceRepository, ProductCodeRepository, PurchaseOrderRepository,
    QuotationRepository, RateRepository, ReferenceRepository, SalesRepository,
    SequenceRepository, Stores, UnitOfWork, WorkflowRepository, Write, WriteBatch,
};
pub use workflow::Transitioned;
