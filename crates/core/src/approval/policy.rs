//! Approval routing policies

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tradeflow_domain::{
    ApprovalPolicyConfig, ApprovalStep, ApprovalType, NewApprovalRequest, Result, TradeflowError,
};

use crate::reference::ReferenceService;

/// Builds the ordered approver chain of a new request.
#[async_trait]
pub trait RoutingPolicy: Send + Sync {
    async fn route(&self, request: &NewApprovalRequest, amount_usd: Option<Decimal>) -> Result<Vec<ApprovalStep>>;
}

/// Quotations go to the sales manager, purchase orders to the operations
/// manager, each adding the CEO at or above its USD threshold. Leave and
/// expense requests go to the requester's supervisor, then HR.
pub struct DefaultRoutingPolicy {
    config: ApprovalPolicyConfig,
    reference: Arc<ReferenceService>,
}

impl DefaultRoutingPolicy {
    pub fn new(config: ApprovalPolicyConfig, reference: Arc<ReferenceService>) -> Self {
        Self { config, reference }
    }

    fn with_ceo_over(&self, first: &str, amount_usd: Option<Decimal>, threshold: Decimal) -> Vec<ApprovalStep> {
        let mut chain = vec![ApprovalStep::required(first)];
        if amount_usd.is_some_and(|amount| amount >= threshold) {
            chain.push(ApprovalStep::required(&self.config.ceo));
        }
        chain
    }
}

#[async_trait]
impl RoutingPolicy for DefaultRoutingPolicy {
    async fn route(&self, request: &NewApprovalRequest, amount_usd: Option<Decimal>) -> Result<Vec<ApprovalStep>> {
        let chain = match request.request_type {
            ApprovalType::Quotation => self.with_ceo_over(
                &self.config.sales_manager,
                amount_usd,
                self.config.quotation_ceo_threshold_usd,
            ),
            ApprovalType::PurchaseOrder => self.with_ceo_over(
                &self.config.operations_manager,
                amount_usd,
                self.config.purchase_order_ceo_threshold_usd,
            ),
            ApprovalType::Vacation | ApprovalType::Expense => {
                let requester = self.reference.employee(&request.requester_ref).await?;
                let supervisor = requester.supervisor_ref.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
                    TradeflowError::validation(format!(
                        "employee {} has no supervisor to approve the request",
                        request.requester_ref
                    ))
                })?;
                vec![ApprovalStep::required(supervisor), ApprovalStep::required(&self.config.hr)]
            }
            ApprovalType::Other => vec![ApprovalStep::required(&self.config.other_approver)],
        };
        Ok(chain)
    }
}
