//! Read-only views derived from stored aggregates on demand.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tradeflow_domain::{
    ApprovalFilter, ApprovalRequest, ApprovalStatus, CompletionStats, Invoice, InvoiceFilter,
    Period, Product, ReferenceFilter, ReferenceKind, ReferenceRecord, Result, StageBucket,
    StageName, StockLevel, ThresholdSource, TradeflowError, WorkflowFilter, WorkflowStatus,
};

use crate::store::Stores;

pub struct Projections {
    stores: Stores,
    stale_approval_days: u32,
}

impl Projections {
    pub fn new(stores: Stores, stale_approval_days: u32) -> Self {
        Self { stores, stale_approval_days }
    }

    /// In-progress workflows grouped by current stage, in pipeline order.
    /// Every stage is listed, empty ones with a zero count.
    pub async fn workflows_by_stage(&self) -> Result<Vec<StageBucket>> {
        let filter = WorkflowFilter { status: Some(WorkflowStatus::InProgress), ..WorkflowFilter::default() };
        let workflows = self.stores.workflows.list_workflows(&filter).await?;
        let mut by_stage: HashMap<StageName, Vec<String>> = HashMap::new();
        for workflow in workflows {
            if let Some(stage) = workflow.current_stage() {
                by_stage.entry(stage.name).or_default().push(workflow.id.clone());
            }
        }
        Ok(StageName::PIPELINE
            .into_iter()
            .map(|stage| {
                let mut workflow_ids = by_stage.remove(&stage).unwrap_or_default();
                workflow_ids.sort();
                StageBucket { stage, count: workflow_ids.len(), workflow_ids }
            })
            .collect())
    }

    /// Pending requests whose current step belongs to `approver_ref`.
    pub async fn pending_approvals_for(&self, approver_ref: &str) -> Result<Vec<ApprovalRequest>> {
        let mut requests: Vec<ApprovalRequest> = self
            .pending()
            .await?
            .into_iter()
            .filter(|r| r.current_approver() == Some(approver_ref))
            .collect();
        requests.sort_by(|a, b| (b.priority, a.created_at).cmp(&(a.priority, b.created_at)));
        Ok(requests)
    }

    /// Pending requests created more than `stale_approval_days` before `as_of`.
    pub async fn stale_approvals(&self, as_of: NaiveDate) -> Result<Vec<ApprovalRequest>> {
        let limit = i64::from(self.stale_approval_days);
        let mut requests: Vec<ApprovalRequest> = self
            .pending()
            .await?
            .into_iter()
            .filter(|r| (as_of - r.created_at.date_naive()).num_days() > limit)
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn pending(&self) -> Result<Vec<ApprovalRequest>> {
        let filter = ApprovalFilter { status: Some(ApprovalStatus::Pending), ..ApprovalFilter::default() };
        self.stores.approvals.list_approvals(&filter).await
    }

    /// Unpaid invoices past due on `as_of`, whether or not a sweep marked them.
    pub async fn overdue_invoices(&self, as_of: NaiveDate) -> Result<Vec<Invoice>> {
        let filter = InvoiceFilter { unpaid_only: true, ..InvoiceFilter::default() };
        let mut invoices: Vec<Invoice> = self
            .stores
            .invoices
            .list_invoices(&filter)
            .await?
            .into_iter()
            .filter(|i| i.is_overdue(as_of))
            .collect();
        invoices.sort_by(|a, b| (a.due_date, &a.id).cmp(&(b.due_date, &b.id)));
        Ok(invoices)
    }

    /// Active products whose stock is below their threshold, largest
    /// shortfall first.
    pub async fn low_stock(&self, source: ThresholdSource) -> Result<Vec<StockLevel>> {
        if let ThresholdSource::Fixed { qty } = source {
            if qty < Decimal::ZERO {
                return Err(TradeflowError::validation("a fixed stock threshold must not be negative"));
            }
        }
        let products: Vec<Product> = self
            .stores
            .reference
            .list_reference(ReferenceKind::Product, &ReferenceFilter::active())
            .await?
            .into_iter()
            .filter_map(|record| match record {
                ReferenceRecord::Product(product) => Some(product),
                _ => None,
            })
            .collect();
        let on_hand: HashMap<String, Decimal> = self
            .stores
            .inventory
            .stock_levels()
            .await?
            .into_iter()
            .map(|level| (level.product_ref, level.on_hand))
            .collect();

        let mut low: Vec<StockLevel> = products
            .into_iter()
            .filter_map(|product| {
                let threshold = match source {
                    ThresholdSource::ProductReorderLevel => product.reorder_level,
                    ThresholdSource::Fixed { qty } => qty,
                };
                let stock = on_hand.get(&product.id).copied().unwrap_or(Decimal::ZERO);
                (stock < threshold).then(|| StockLevel {
                    product_ref: product.id,
                    product_name: product.name,
                    on_hand: stock,
                    threshold,
                    shortfall: threshold - stock,
                })
            })
            .collect();
        low.sort_by(|a, b| b.shortfall.cmp(&a.shortfall).then_with(|| a.product_ref.cmp(&b.product_ref)));
        Ok(low)
    }

    /// Outcomes of the workflows created in `period`.
    pub async fn completion_stats(&self, period: &Period) -> Result<CompletionStats> {
        if period.bounds().is_none() {
            return Err(TradeflowError::validation(format!("invalid period {period}")));
        }
        let workflows: Vec<_> = self
            .stores
            .workflows
            .list_workflows(&WorkflowFilter::default())
            .await?
            .into_iter()
            .filter(|w| period.contains(w.created_at.date_naive()))
            .collect();

        let count = |status| workflows.iter().filter(|w| w.status == status).count();
        let created = workflows.len();
        let completed = count(WorkflowStatus::Completed);
        let hundred = Decimal::ONE_HUNDRED;
        let completion_rate_pct = (created > 0)
            .then(|| (Decimal::from(completed) / Decimal::from(created) * hundred).round_dp(2));

        let seconds_per_day = Decimal::from(86_400);
        let durations: Vec<Decimal> = workflows
            .iter()
            .filter(|w| w.status == WorkflowStatus::Completed)
            .filter_map(|w| w.completed_at.map(|done| done - w.created_at))
            .map(|elapsed| Decimal::from(elapsed.num_seconds()) / seconds_per_day)
            .collect();
        let average_days_to_complete = (!durations.is_empty()).then(|| {
            (durations.iter().sum::<Decimal>() / Decimal::from(durations.len())).round_dp(2)
        });

        Ok(CompletionStats {
            period: *period,
            created,
            completed,
            cancelled: count(WorkflowStatus::Cancelled),
            in_progress: count(WorkflowStatus::InProgress),
            completion_rate_pct,
            average_days_to_complete,
        })
    }
}
