use std::cmp::Ordering;

use time::{Date, Month};

use crate::{
    bills::repo_types::{Bill, BillCategory},
    reports::dto::{CategoryShare, CategoryStat, DashboardSummary, MonthTotal, SpendingReport},
};

/// Categories shown as tiles on the dashboard.
pub const DASHBOARD_CATEGORIES: [BillCategory; 9] = [
    BillCategory::CreditCard,
    BillCategory::Electricity,
    BillCategory::Gas,
    BillCategory::Telephone,
    BillCategory::Water,
    BillCategory::Internet,
    BillCategory::Insurance,
    BillCategory::Rent,
    BillCategory::Subscription,
];

pub const TOP_CATEGORIES: usize = 5;
pub const TREND_MONTHS: usize = 6;

pub fn dashboard_summary(bills: &[Bill], today: Date) -> DashboardSummary {
    let unpaid: Vec<&Bill> = bills.iter().filter(|b| !b.is_paid).collect();
    let paid_this_month: Vec<&Bill> = bills
        .iter()
        .filter(|b| b.is_paid && same_month(b.due_date, today))
        .collect();

    DashboardSummary {
        total_due: unpaid.iter().map(|b| b.total_amount).sum(),
        overdue_count: unpaid.iter().filter(|b| b.due_date < today).count(),
        upcoming_count: unpaid.iter().filter(|b| b.due_date >= today).count(),
        paid_this_month_count: paid_this_month.len(),
        paid_this_month_amount: paid_this_month.iter().map(|b| b.total_amount).sum(),
        categories: DASHBOARD_CATEGORIES
            .into_iter()
            .map(|category| {
                let in_cat = unpaid.iter().filter(|b| b.category == category);
                CategoryStat {
                    category,
                    count: in_cat.clone().count(),
                    amount: in_cat.map(|b| b.total_amount).sum(),
                }
            })
            .collect(),
    }
}

pub fn spending_report(bills: &[Bill], today: Date) -> SpendingReport {
    let total_paid: f64 = bills.iter().filter(|b| b.is_paid).map(|b| b.total_amount).sum();
    let total_pending: f64 = bills.iter().filter(|b| !b.is_paid).map(|b| b.total_amount).sum();
    let grand_total = total_paid + total_pending;

    let mut shares: Vec<CategoryShare> = BillCategory::ALL
        .into_iter()
        .filter(|c| bills.iter().any(|b| b.category == *c))
        .map(|category| {
            let amount: f64 = bills
                .iter()
                .filter(|b| b.category == category)
                .map(|b| b.total_amount)
                .sum();
            CategoryShare {
                category,
                amount,
                percentage: if grand_total > 0.0 {
                    amount / grand_total * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();
    shares.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(Ordering::Equal));
    shares.truncate(TOP_CATEGORIES);

    SpendingReport {
        total_paid,
        total_pending,
        grand_total,
        top_categories: shares,
        monthly_trend: monthly_trend(bills, today),
    }
}

/// Totals by due-date month for the last six months, oldest first.
fn monthly_trend(bills: &[Bill], today: Date) -> Vec<MonthTotal> {
    let mut months = Vec::with_capacity(TREND_MONTHS);
    let (mut year, mut month) = (today.year(), today.month());
    for _ in 0..TREND_MONTHS {
        months.push((year, month));
        if month == Month::January {
            year -= 1;
        }
        month = month.previous();
    }
    months.reverse();

    months
        .into_iter()
        .map(|(year, month)| MonthTotal {
            label: short_month(month).to_string(),
            year,
            month: month as u8,
            amount: bills
                .iter()
                .filter(|b| b.due_date.year() == year && b.due_date.month() == month)
                .map(|b| b.total_amount)
                .sum(),
        })
        .collect()
}

fn same_month(a: Date, b: Date) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

fn short_month(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bills::repo_types::PaymentDetails;
    use time::macros::{date, datetime};
    use uuid::Uuid;

    fn bill(category: BillCategory, amount: f64, due: Date, paid: bool) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: format!("{category} bill"),
            category,
            total_amount: amount,
            min_due_amount: 0.0,
            due_date: due,
            is_paid: paid,
            is_recurring: false,
            payment: PaymentDetails::default(),
            document_key: None,
            created_at: datetime!(2026-01-01 00:00 UTC),
        }
    }

    const TODAY: Date = date!(2026 - 10 - 19);

    #[test]
    fn dashboard_counts_and_sums() {
        let bills = vec![
            bill(BillCategory::Rent, 25000.0, date!(2026 - 10 - 05), false),
            bill(BillCategory::Electricity, 1800.0, date!(2026 - 10 - 19), false),
            bill(BillCategory::Electricity, 200.0, date!(2026 - 10 - 25), false),
            bill(BillCategory::Internet, 999.0, date!(2026 - 10 - 02), true),
            bill(BillCategory::Internet, 999.0, date!(2026 - 09 - 02), true),
            bill(BillCategory::Loan, 5000.0, date!(2026 - 11 - 01), false),
        ];
        let s = dashboard_summary(&bills, TODAY);
        assert_eq!(s.total_due, 32000.0);
        assert_eq!(s.overdue_count, 1);
        assert_eq!(s.upcoming_count, 3);
        assert_eq!(s.paid_this_month_count, 1);
        assert_eq!(s.paid_this_month_amount, 999.0);

        assert_eq!(s.categories.len(), 9);
        let elec = s
            .categories
            .iter()
            .find(|c| c.category == BillCategory::Electricity)
            .unwrap();
        assert_eq!((elec.count, elec.amount), (2, 2000.0));
        // loans are not a dashboard tile
        assert!(s.categories.iter().all(|c| c.category != BillCategory::Loan));
    }

    #[test]
    fn report_top_categories_and_percentages() {
        let bills = vec![
            bill(BillCategory::Rent, 600.0, date!(2026 - 10 - 05), true),
            bill(BillCategory::Gas, 100.0, date!(2026 - 10 - 05), false),
            bill(BillCategory::Water, 50.0, date!(2026 - 10 - 05), false),
            bill(BillCategory::Loan, 150.0, date!(2026 - 10 - 05), false),
            bill(BillCategory::Internet, 40.0, date!(2026 - 10 - 05), true),
            bill(BillCategory::Other, 60.0, date!(2026 - 10 - 05), false),
        ];
        let r = spending_report(&bills, TODAY);
        assert_eq!(r.total_paid, 640.0);
        assert_eq!(r.total_pending, 360.0);
        assert_eq!(r.grand_total, 1000.0);

        let cats: Vec<BillCategory> = r.top_categories.iter().map(|c| c.category).collect();
        assert_eq!(
            cats,
            vec![
                BillCategory::Rent,
                BillCategory::Loan,
                BillCategory::Gas,
                BillCategory::Other,
                BillCategory::Water
            ]
        );
        assert_eq!(r.top_categories[0].percentage, 60.0);
    }

    #[test]
    fn trend_spans_six_months_across_year_end() {
        let bills = vec![
            bill(BillCategory::Rent, 100.0, date!(2025 - 09 - 30), false),
            bill(BillCategory::Rent, 100.0, date!(2025 - 10 - 01), false),
            bill(BillCategory::Rent, 250.0, date!(2026 - 01 - 15), true),
            bill(BillCategory::Rent, 300.0, date!(2026 - 03 - 01), false),
        ];
        let r = spending_report(&bills, date!(2026 - 03 - 10));
        let labels: Vec<&str> = r.monthly_trend.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["Oct", "Nov", "Dec", "Jan", "Feb", "Mar"]);
        assert_eq!(r.monthly_trend[0].year, 2025);
        assert_eq!(r.monthly_trend[0].amount, 100.0);
        assert_eq!(r.monthly_trend[3].amount, 250.0);
        assert_eq!(r.monthly_trend[5].amount, 300.0);
    }

    #[test]
    fn empty_report_has_zero_percentages() {
        let r = spending_report(&[], TODAY);
        assert_eq!(r.grand_total, 0.0);
        assert!(r.top_categories.is_empty());
        assert!(r.monthly_trend.iter().all(|m| m.amount == 0.0));
    }
}
