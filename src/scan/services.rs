use anyhow::Context;
use bytes::Bytes;
use serde::Deserialize;
use time::Date;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    bills::repo_types::{Bill, BillCategory},
    reminders::engine::format_amount,
    scan::{
        dto::ExtractedBill,
        gemini::{Extractor, InlineDocument},
    },
    storage::StorageClient,
    time_fmt::{format_date, ISO_DATE},
};

pub const NO_BILLS_ADVICE: &str = "You have no bills to analyze. Great job keeping debt-free!";
pub const ALL_PAID_ADVICE: &str = "All your bills are paid. Excellent financial health!";
pub const EMPTY_ADVICE: &str = "Could not generate advice at this time.";
pub const ADVICE_FALLBACK: &str =
    "Sorry, I'm having trouble connecting to the financial brain right now. Please try again later.";

const EXTRACTION_PROMPT: &str = r#"
Analyze this bill/invoice data carefully. Extract the following details in JSON format.

CRITICAL FIELDS TO FIND:
1. 'name': The biller name, bank name, or merchant.
2. 'totalAmount': The "Total Amount Due", "Closing Balance", or "Amount Payable". Return ONLY the number.
3. 'minDueAmount': Look for "Minimum Due", "Min Amount", or "MAD". If NOT found, return 0.
4. 'dueDate': The due date in EXACT 'YYYY-MM-DD' format. If not found, estimate based on statement date + 20 days.
5. 'category': Choose the EXACT best fit from: 'Credit Card', 'Electricity', 'Gas', 'Water', 'Internet', 'Telephone', 'Insurance', 'Rent', 'Subscription', 'Loan', 'Other'.
6. 'paymentUrl': Any direct website link found for bill payment (starts with http/https). If none, leave empty.

Return ONLY the JSON object. Do not wrap in markdown code blocks.
"#;

/// Document types the model accepts inline.
pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}

pub fn document_key(user_id: Uuid, ext: &str) -> String {
    format!("bills/{}/{}.{}", user_id, Uuid::new_v4(), ext)
}

/// Uploads the scanned document and returns its object key.
pub async fn store_document(
    storage: &dyn StorageClient,
    user_id: Uuid,
    body: Bytes,
    content_type: &str,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    let key = document_key(user_id, ext);
    storage
        .put_object(&key, body, content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    debug!(user_id = %user_id, key = %key, "bill document stored");
    Ok(key)
}

pub enum ScanSource<'a> {
    Document(InlineDocument<'a>),
    Text(&'a str),
}

/// Asks the model for bill fields. Any failure yields `None`.
pub async fn extract_bill(extractor: &dyn Extractor, source: ScanSource<'_>) -> Option<ExtractedBill> {
    let result = match source {
        ScanSource::Document(doc) => extractor.generate(EXTRACTION_PROMPT, Some(doc), true).await,
        ScanSource::Text(text) => {
            let prompt = format!(
                "Here is the text content extracted from a bill:\n\n{}\n\n{}",
                text, EXTRACTION_PROMPT
            );
            extractor.generate(&prompt, None, true).await
        }
    };

    match result {
        Ok(text) => {
            let parsed = parse_extraction(&text);
            if parsed.is_none() {
                warn!("model reply was not a bill object");
            }
            parsed
        }
        Err(e) => {
            warn!(error = %e, "bill extraction failed");
            None
        }
    }
}

/// Removes a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExtraction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    total_amount: Option<f64>,
    #[serde(default)]
    min_due_amount: Option<f64>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    payment_url: Option<String>,
}

pub fn parse_extraction(text: &str) -> Option<ExtractedBill> {
    let raw: RawExtraction = serde_json::from_str(strip_code_fence(text)).ok()?;
    let due_date = raw
        .due_date
        .as_deref()
        .and_then(|d| Date::parse(d.trim(), ISO_DATE).ok());
    let payment_url = raw
        .payment_url
        .map(|u| u.trim().to_string())
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"));

    Some(ExtractedBill {
        name: raw.name.trim().to_string(),
        total_amount: raw.total_amount.filter(|a| a.is_finite() && *a >= 0.0).unwrap_or(0.0),
        min_due_amount: raw.min_due_amount.filter(|a| a.is_finite() && *a >= 0.0).unwrap_or(0.0),
        due_date,
        category: raw
            .category
            .as_deref()
            .map(BillCategory::parse_lenient)
            .unwrap_or_default(),
        payment_url,
    })
}

pub fn advice_prompt(unpaid: &[&Bill]) -> String {
    let lines: Vec<String> = unpaid
        .iter()
        .map(|b| {
            format!(
                "- [{}] {}: Total ₹{}, Min Due ₹{}, Due Date: {}",
                b.category,
                b.name,
                format_amount(b.total_amount),
                format_amount(b.min_due_amount),
                format_date(b.due_date)
            )
        })
        .collect();
    format!(
        "I have the following bills due soon (Amounts in INR):\n{}\n\n\
         Please provide a brief, strategic plan on how to prioritize these payments to minimize interest or penalties.\n\
         Keep it under 3 paragraphs. Be encouraging but direct about risks.",
        lines.join("\n")
    )
}

/// Short prioritisation plan for the user's unpaid bills.
pub async fn financial_advice(extractor: &dyn Extractor, bills: &[Bill]) -> String {
    if bills.is_empty() {
        return NO_BILLS_ADVICE.into();
    }
    let unpaid: Vec<&Bill> = bills.iter().filter(|b| !b.is_paid).collect();
    if unpaid.is_empty() {
        return ALL_PAID_ADVICE.into();
    }

    match extractor.generate(&advice_prompt(&unpaid), None, false).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => EMPTY_ADVICE.into(),
        Err(e) => {
            warn!(error = %e, "advice request failed");
            ADVICE_FALLBACK.into()
        }
    }
}
