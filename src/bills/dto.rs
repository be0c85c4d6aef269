use serde::{Deserialize, Serialize};
use time::Date;

use crate::bills::repo_types::{Bill, BillCategory, PaymentDetails};

/// Request body for creating or replacing a bill.
#[derive(Debug, Clone, Deserialize)]
pub struct BillInput {
    pub name: String,
    #[serde(default)]
    pub category: BillCategory,
    pub total_amount: f64,
    #[serde(default)]
    pub min_due_amount: f64,
    #[serde(with = "crate::time_fmt::iso_date")]
    pub due_date: Date,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(flatten)]
    pub payment: PaymentDetails,
    #[serde(default)]
    pub document_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Overdue,
    Paid,
}

#[derive(Debug, Default, Deserialize)]
pub struct BillListQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub status: StatusFilter,
}

/// Result of flipping a bill's paid flag.
#[derive(Debug, Serialize)]
pub struct TogglePaidResponse {
    pub bill: Bill,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_bill: Option<Bill>,
}
