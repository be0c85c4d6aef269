use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Closed set of bill categories, serialized with their display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillCategory {
    #[serde(rename = "Credit Card")]
    CreditCard,
    Electricity,
    Gas,
    Water,
    Internet,
    Telephone,
    Insurance,
    Rent,
    Subscription,
    Loan,
    Other,
}

impl BillCategory {
    pub const ALL: [BillCategory; 11] = [
        BillCategory::CreditCard,
        BillCategory::Electricity,
        BillCategory::Gas,
        BillCategory::Water,
        BillCategory::Internet,
        BillCategory::Telephone,
        BillCategory::Insurance,
        BillCategory::Rent,
        BillCategory::Subscription,
        BillCategory::Loan,
        BillCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BillCategory::CreditCard => "Credit Card",
            BillCategory::Electricity => "Electricity",
            BillCategory::Gas => "Gas",
            BillCategory::Water => "Water",
            BillCategory::Internet => "Internet",
            BillCategory::Telephone => "Telephone",
            BillCategory::Insurance => "Insurance",
            BillCategory::Rent => "Rent",
            BillCategory::Subscription => "Subscription",
            BillCategory::Loan => "Loan",
            BillCategory::Other => "Other",
        }
    }

    /// Case-insensitive lookup; anything unrecognised lands in `Other`.
    pub fn parse_lenient(raw: &str) -> Self {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(raw))
            .unwrap_or(BillCategory::Other)
    }
}

impl Default for BillCategory {
    fn default() -> Self {
        BillCategory::CreditCard
    }
}

impl fmt::Display for BillCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row as stored in `bills`.
#[derive(Debug, Clone, FromRow)]
pub struct BillRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: String,
    pub total_amount: f64,
    pub min_due_amount: f64,
    pub due_date: Date,
    pub is_paid: bool,
    pub is_recurring: bool,
    pub upi_id: Option<String>,
    pub payment_url: Option<String>,
    pub consumer_number: Option<String>,
    pub biller_id: Option<String>,
    pub document_key: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Optional payment hints kept alongside a bill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biller_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category: BillCategory,
    pub total_amount: f64,
    pub min_due_amount: f64,
    #[serde(with = "crate::time_fmt::iso_date")]
    pub due_date: Date,
    pub is_paid: bool,
    pub is_recurring: bool,
    #[serde(flatten)]
    pub payment: PaymentDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_key: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<BillRow> for Bill {
    fn from(r: BillRow) -> Self {
        let name = if r.name.trim().is_empty() {
            "Unnamed Bill".to_string()
        } else {
            r.name
        };
        Self {
            id: r.id,
            user_id: r.user_id,
            name,
            category: BillCategory::parse_lenient(&r.category),
            total_amount: r.total_amount,
            min_due_amount: r.min_due_amount,
            due_date: r.due_date,
            is_paid: r.is_paid,
            is_recurring: r.is_recurring,
            payment: PaymentDetails {
                upi_id: r.upi_id,
                payment_url: r.payment_url,
                consumer_number: r.consumer_number,
                biller_id: r.biller_id,
            },
            document_key: r.document_key,
            created_at: r.created_at,
        }
    }
}
