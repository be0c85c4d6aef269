use serde::Serialize;

use crate::bills::repo_types::BillCategory;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStat {
    pub category: BillCategory,
    pub count: usize,
    pub amount: f64,
}

/// Home screen numbers. Unpaid totals only, except the paid-this-month pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_due: f64,
    pub overdue_count: usize,
    pub upcoming_count: usize,
    pub paid_this_month_count: usize,
    pub paid_this_month_amount: f64,
    pub categories: Vec<CategoryStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: BillCategory,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTotal {
    pub label: String,
    pub year: i32,
    pub month: u8,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingReport {
    pub total_paid: f64,
    pub total_pending: f64,
    pub grand_total: f64,
    pub top_categories: Vec<CategoryShare>,
    pub monthly_trend: Vec<MonthTotal>,
}
