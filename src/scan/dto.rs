use serde::Serialize;
use time::Date;

use crate::bills::repo_types::BillCategory;

/// Bill fields read off a scanned document, ready to prefill a bill form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedBill {
    pub name: String,
    pub total_amount: f64,
    pub min_due_amount: f64,
    #[serde(with = "crate::time_fmt::iso_date_option")]
    pub due_date: Option<Date>,
    pub category: BillCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    /// Object key of the stored document; pass it back as the bill's `document_key`.
    pub document_key: Option<String>,
    pub extracted: Option<ExtractedBill>,
}

#[derive(Debug, Serialize)]
pub struct AdviceResponse {
    pub advice: String,
}
