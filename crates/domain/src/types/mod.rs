//! Domain types and models

pub mod approval;
pub mod cash;
pub mod effects;
pub mod event;
pub mod ids;
pub mod invoice;
pub mod money;
pub mod period;
pub mod product_code;
pub mod projections;
pub mod purchase_order;
pub mod quotation;
pub mod rates;
pub mod reference;
pub mod sales;
pub mod workflow;

pub use approval::{
    ApprovalFilter, ApprovalRequest, ApprovalStatus, ApprovalStep, ApprovalType, Decision,
    DecisionOutcome, NewApprovalRequest, Priority,
};
pub use cash::{
    CashEntryType, CashFilter, CashKind, CashPosting, CashSource, CashSummary, CashTransaction,
    MonthlyCashPoint,
};
pub use effects::{
    EffectFailure, EffectFailureReport, EffectKey, EffectKind, EffectRecord, EffectReport,
    EffectStatus, EffectTrigger,
};
pub use event::Event;
pub use ids::{EntityKind, IdFamily, IdScheme};
pub use invoice::{Invoice, InvoiceFilter, Payment, PaymentMethod, PaymentStatus};
pub use money::{Currency, Money};
pub use period::{Period, YearMonth};
pub use product_code::{CategoryRegistry, CodeSegment, ProductCode, RegisteredProductCode};
pub use projections::{CompletionStats, StageBucket, StockLevel, ThresholdSource};
pub use purchase_order::{PurchaseOrder, PurchaseOrderStatus};
pub use quotation::{
    LineItem, Quotation, QuotationFilter, QuotationLineInput, QuotationPayload, QuotationStatus,
    Totals,
};
pub use rates::ExchangeRate;
pub use reference::{
    Customer, DeleteMode, Employee, EmployeeRole, InventoryLevel, PaymentTerms, PriceList, Product,
    RecordStatus, ReferenceFilter, ReferenceKind, ReferenceRecord, Supplier,
};
pub use sales::{
    SalesFilter, SalesForecast, SalesRecord, SalesRollup, SalesSourceKind, SalesTarget,
    TargetDimension, TargetRow,
};
pub use workflow::{
    Stage, StageName, StageOutcome, StageStatus, StageTransition, Workflow, WorkflowAction,
    WorkflowFilter, WorkflowStatus,
};
