//! Reference (master) data: customers, suppliers, employees, products and
//! price lists.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::EntityKind;
use super::money::Currency;
use crate::impl_domain_status_conversions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

impl_domain_status_conversions!(RecordStatus {
    Active => "active" | "활성" | "사용",
    Inactive => "inactive" | "비활성" | "미사용",
});

/// When a supplier expects to be paid for delivered goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentTerms {
    /// Expense is recorded when the goods are received.
    OnReceipt,
    /// Settled later; nothing is posted at receipt.
    Net { days: u32 },
}

impl Default for PaymentTerms {
    fn default() -> Self {
        Self::Net { days: 30 }
    }
}

impl PaymentTerms {
    pub const fn requires_payment_on_receipt(self) -> bool {
        matches!(self, Self::OnReceipt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EmployeeRole {
    #[default]
    Staff,
    Sales,
    SalesManager,
    OperationsManager,
    Ceo,
    Hr,
}

impl_domain_status_conversions!(EmployeeRole {
    Staff => "staff" | "사원",
    Sales => "sales" | "영업",
    SalesManager => "sales_manager" | "영업관리자",
    OperationsManager => "operations_manager" | "운영관리자",
    Ceo => "ceo" | "대표",
    Hr => "hr" | "인사",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    pub currency: Currency,
    #[serde(default)]
    pub payment_terms_days: Option<u32>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    pub currency: Currency,
    #[serde(default)]
    pub payment_terms: PaymentTerms,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: EmployeeRole,
    /// Employee id of the direct supervisor, first approver for leave and
    /// expense requests.
    #[serde(default)]
    pub supervisor_ref: Option<String>,
    /// `None` means the configured default applies.
    #[serde(default)]
    pub annual_leave_days: Option<u32>,
    /// Argon2 PHC string; employees without one cannot sign in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog product code, e.g. `HR-ST-VG-PG-M`.
    pub id: String,
    pub name: String,
    /// Category used for default margins, e.g. `HR`.
    pub category: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub list_price: Option<Decimal>,
    #[serde(default)]
    pub cost_price: Option<Decimal>,
    pub currency: Currency,
    #[serde(default)]
    pub supplier_ref: Option<String>,
    #[serde(default)]
    pub reorder_level: Decimal,
    #[serde(default)]
    pub status: RecordStatus,
}

fn default_unit() -> String {
    "ea".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceList {
    pub id: String,
    pub product_ref: String,
    /// Customer-specific price when set; otherwise applies to everyone.
    #[serde(default)]
    pub customer_ref: Option<String>,
    pub currency: Currency,
    pub unit_price: Decimal,
    pub valid_from: NaiveDate,
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
    #[serde(default)]
    pub status: RecordStatus,
}

impl PriceList {
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.status == RecordStatus::Active
            && self.valid_from <= date
            && self.valid_to.map_or(true, |to| date <= to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReferenceKind {
    Customer,
    Supplier,
    Employee,
    Product,
    PriceList,
}

impl_domain_status_conversions!(ReferenceKind {
    Customer => "customer",
    Supplier => "supplier",
    Employee => "employee",
    Product => "product",
    PriceList => "price_list",
});

impl ReferenceKind {
    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::Customer => EntityKind::Customer,
            Self::Supplier => EntityKind::Supplier,
            Self::Employee => EntityKind::Employee,
            Self::Product => EntityKind::Product,
            Self::PriceList => EntityKind::PriceList,
        }
    }
}

/// One reference entity of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceRecord {
    Customer(Customer),
    Supplier(Supplier),
    Employee(Employee),
    Product(Product),
    PriceList(PriceList),
}

impl ReferenceRecord {
    pub const fn kind(&self) -> ReferenceKind {
        match self {
            Self::Customer(_) => ReferenceKind::Customer,
            Self::Supplier(_) => ReferenceKind::Supplier,
            Self::Employee(_) => ReferenceKind::Employee,
            Self::Product(_) => ReferenceKind::Product,
            Self::PriceList(_) => ReferenceKind::PriceList,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Customer(c) => &c.id,
            Self::Supplier(s) => &s.id,
            Self::Employee(e) => &e.id,
            Self::Product(p) => &p.id,
            Self::PriceList(p) => &p.id,
        }
    }

    /// Display name used by list filters.
    pub fn name(&self) -> &str {
        match self {
            Self::Customer(c) => &c.name,
            Self::Supplier(s) => &s.name,
            Self::Employee(e) => &e.name,
            Self::Product(p) => &p.name,
            Self::PriceList(p) => &p.product_ref,
        }
    }

    pub const fn status(&self) -> RecordStatus {
        match self {
            Self::Customer(c) => c.status,
            Self::Supplier(s) => s.status,
            Self::Employee(e) => e.status,
            Self::Product(p) => p.status,
            Self::PriceList(p) => p.status,
        }
    }

    pub fn set_status(&mut self, status: RecordStatus) {
        match self {
            Self::Customer(c) => c.status = status,
            Self::Supplier(s) => s.status = status,
            Self::Employee(e) => e.status = status,
            Self::Product(p) => p.status = status,
            Self::PriceList(p) => p.status = status,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == RecordStatus::Active
    }

    /// Copy safe to put in the event log (credentials removed).
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Self::Employee(e) = &mut copy {
            e.password_hash = None;
        }
        copy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Flip status to inactive, keep the row.
    Soft,
    /// Remove the row.
    Hard,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFilter {
    #[serde(default)]
    pub status: Option<RecordStatus>,
    /// Case-insensitive substring of id or name.
    #[serde(default)]
    pub text: Option<String>,
}

impl ReferenceFilter {
    pub fn active() -> Self {
        Self { status: Some(RecordStatus::Active), text: None }
    }

    pub fn matches(&self, record: &ReferenceRecord) -> bool {
        if self.status.is_some_and(|s| s != record.status()) {
            return false;
        }
        match &self.text {
            Some(text) => {
                let needle = text.to_lowercase();
                record.id().to_lowercase().contains(&needle)
                    || record.name().to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

/// On-hand quantity for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub product_ref: String,
    pub on_hand: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> ReferenceRecord {
        ReferenceRecord::Customer(Customer {
            id: "C001".into(),
            name: "Saigon Plastics".into(),
            country: Some("VN".into()),
            currency: Currency::Usd,
            payment_terms_days: None,
            contact_email: None,
            status: RecordStatus::Active,
        })
    }

    #[test]
    fn filter_matches_name_and_status() {
        let record = customer();
        let by_text = ReferenceFilter { status: None, text: Some("saigon".into()) };
        assert!(by_text.matches(&record));
        let inactive = ReferenceFilter { status: Some(RecordStatus::Inactive), text: None };
        assert!(!inactive.matches(&record));
    }

    #[test]
    fn record_serializes_with_kind_tag() {
        let json = serde_json::to_value(customer()).unwrap();
        assert_eq!(json["kind"], "customer");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn legacy_status_labels_are_accepted() {
        let json = serde_json::json!({
            "kind": "customer", "id": "C002", "name": "Hanoi Mold",
            "currency": "VND", "status": "비활성"
        });
        let record: ReferenceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.status(), RecordStatus::Inactive);
    }

    #[test]
    fn redaction_strips_password_hash() {
        let record = ReferenceRecord::Employee(Employee {
            id: "E01".into(),
            name: "Kim".into(),
            role: EmployeeRole::Sales,
            supervisor_ref: None,
            annual_leave_days: None,
            password_hash: Some("$argon2id$...".into()),
            status: RecordStatus::Active,
        });
        match record.redacted() {
            ReferenceRecord::Employee(e) => assert!(e.password_hash.is_none()),
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn price_list_validity_window() {
        let price = PriceList {
            id: "PL1".into(),
            product_ref: "P1".into(),
            customer_ref: None,
            currency: Currency::Usd,
            unit_price: Decimal::from(100),
            valid_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            valid_to: Some(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()),
            status: RecordStatus::Active,
        };
        assert!(price.is_valid_on(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()));
        assert!(!price.is_valid_on(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()));
    }
}
