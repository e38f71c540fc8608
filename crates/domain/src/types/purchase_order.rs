//! Purchase orders raised against suppliers

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::{Currency, Money};
use super::quotation::LineItem;
use super::reference::PaymentTerms;
use crate::errors::{Result, TradeflowError};
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PurchaseOrderStatus {
    Draft,
    Approved,
    Received,
    Closed,
    Cancelled,
}

impl_domain_status_conversions!(PurchaseOrderStatus {
    Draft => "draft" | "작성중",
    Approved => "approved" | "승인",
    Received => "received" | "입고" | "입고완료",
    Closed => "closed" | "종료" | "완료",
    Cancelled => "cancelled" | "canceled" | "취소",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: String,
    pub number: String,
    pub quotation_ref: Option<String>,
    pub workflow_ref: Option<String>,
    pub supplier_ref: String,
    pub date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub lines: Vec<LineItem>,
    pub total: Decimal,
    pub currency: Currency,
    pub payment_terms: PaymentTerms,
    pub status: PurchaseOrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn total_money(&self) -> Money {
        Money::new(self.total, self.currency)
    }

    fn transition(
        &mut self,
        allowed: &[PurchaseOrderStatus],
        next: PurchaseOrderStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if !allowed.contains(&self.status) {
            return Err(TradeflowError::state_conflict(format!(
                "purchase order {} is {}; cannot become {next}",
                self.id, self.status
            )));
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    pub fn approve(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(&[PurchaseOrderStatus::Draft], PurchaseOrderStatus::Approved, at)
    }

    pub fn receive(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(&[PurchaseOrderStatus::Approved], PurchaseOrderStatus::Received, at)
    }

    pub fn close(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(&[PurchaseOrderStatus::Received], PurchaseOrderStatus::Closed, at)
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(
            &[PurchaseOrderStatus::Draft, PurchaseOrderStatus::Approved],
            PurchaseOrderStatus::Cancelled,
            at,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> PurchaseOrder {
        let lines = vec![LineItem::priced("P1", Decimal::from(10), Decimal::from(80), Currency::Usd)];
        PurchaseOrder {
            id: "PO202503001".into(),
            number: "PO202503001".into(),
            quotation_ref: Some("Q202503001".into()),
            workflow_ref: Some("WF202503001".into()),
            supplier_ref: "S001".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 6).unwrap(),
            delivery_date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
            total: Decimal::from(800),
            lines,
            currency: Currency::Usd,
            payment_terms: PaymentTerms::OnReceipt,
            status: PurchaseOrderStatus::Draft,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn lifecycle_runs_forward_only() {
        let mut po = order();
        po.approve(Utc::now()).unwrap();
        po.receive(Utc::now()).unwrap();
        assert!(po.cancel(Utc::now()).is_err());
        po.close(Utc::now()).unwrap();
        assert_eq!(po.status, PurchaseOrderStatus::Closed);
    }

    #[test]
    fn cannot_receive_a_draft() {
        let mut po = order();
        let err = po.receive(Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "state_conflict");
    }
}
