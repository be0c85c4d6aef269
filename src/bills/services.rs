use anyhow::Context;
use sqlx::PgPool;
use time::{util::days_in_year_month, Date, Month};
use tracing::debug;
use uuid::Uuid;

use crate::bills::{
    dto::{BillInput, StatusFilter},
    repo,
    repo_types::Bill,
};

/// Advances a date by one calendar month, keeping the day-of-month.
///
/// Days that do not exist in the target month clamp to its last day, so
/// Jan 31 becomes Feb 28 (or 29) instead of spilling into March.
pub fn add_one_month(date: Date) -> Date {
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        m => (date.year(), m.next()),
    };
    let day = date.day().min(days_in_year_month(year, month));
    // day is within the month's length, so this cannot fail
    Date::from_calendar_date(year, month, day).unwrap_or(date)
}

/// Successor created when a recurring bill is paid.
pub fn next_occurrence(bill: &Bill) -> Bill {
    Bill {
        id: Uuid::new_v4(),
        due_date: add_one_month(bill.due_date),
        is_paid: false,
        document_key: None,
        ..bill.clone()
    }
}

/// Successor to book when a toggle moves `before` into `now_paid`.
/// Only an unpaid recurring bill becoming paid rolls over.
pub fn successor_after_toggle(before: &Bill, now_paid: bool) -> Option<Bill> {
    (!before.is_paid && now_paid && before.is_recurring).then(|| next_occurrence(before))
}

/// Uploaded documents live under `bills/{user_id}/`; a bill may only point
/// into its owner's prefix.
pub fn owns_document_key(user_id: Uuid, key: &str) -> bool {
    let prefix = format!("bills/{user_id}/");
    key.strip_prefix(&prefix)
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/') && !rest.starts_with('.'))
}

pub fn validate(input: &BillInput, user_id: Uuid) -> Result<(), String> {
    if let Some(key) = input.document_key.as_deref() {
        if !owns_document_key(user_id, key) {
            return Err("document_key does not belong to this user".into());
        }
    }
    if input.name.trim().is_empty() {
        return Err("Bill name is required".into());
    }
    for (label, amount) in [
        ("total_amount", input.total_amount),
        ("min_due_amount", input.min_due_amount),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(format!("{label} must be a non-negative number"));
        }
    }
    if let Some(url) = input.payment.payment_url.as_deref() {
        if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err("payment_url must start with http:// or https://".into());
        }
    }
    Ok(())
}

/// Flips the paid flag. Paying a recurring bill also books next month's
/// instance in the same transaction. `None` when the bill is not the user's.
pub async fn toggle_paid(
    db: &PgPool,
    user_id: Uuid,
    bill_id: Uuid,
) -> anyhow::Result<Option<(Bill, Option<Bill>)>> {
    let mut tx = db.begin().await.context("begin tx")?;
    // row lock: concurrent toggles of one bill apply one after the other
    let Some(current) = repo::get_for_update_tx(&mut tx, user_id, bill_id).await? else {
        return Ok(None);
    };
    let updated = repo::set_paid_tx(&mut tx, user_id, bill_id, !current.is_paid).await?;
    let next = match successor_after_toggle(&current, updated.is_paid) {
        Some(successor) => Some(repo::insert_bill_tx(&mut tx, &successor).await?),
        None => None,
    };
    tx.commit().await.context("commit tx")?;

    if let Some(next) = &next {
        debug!(bill_id = %bill_id, next_id = %next.id, due_date = %next.due_date, "recurring bill rolled over");
    }
    Ok(Some((updated, next)))
}

/// Search + status filter used by the bill list.
pub fn matches(bill: &Bill, query: Option<&str>, status: StatusFilter, today: Date) -> bool {
    let matches_search = match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => {
            let q = q.to_lowercase();
            bill.name.to_lowercase().contains(&q)
                || bill.category.as_str().to_lowercase().contains(&q)
        }
        None => true,
    };
    let matches_status = match status {
        StatusFilter::All => true,
        StatusFilter::Pending => !bill.is_paid,
        StatusFilter::Paid => bill.is_paid,
        StatusFilter::Overdue => !bill.is_paid && bill.due_date < today,
    };
    matches_search && matches_status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bills::repo_types::{BillCategory, PaymentDetails};
    use time::macros::{date, datetime};

    fn bill(name: &str, due: Date, paid: bool) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.into(),
            category: BillCategory::Electricity,
            total_amount: 1500.0,
            min_due_amount: 0.0,
            due_date: due,
            is_paid: paid,
            is_recurring: true,
            payment: PaymentDetails::default(),
            document_key: Some("bills/u/doc.pdf".into()),
            created_at: datetime!(2026-01-01 00:00 UTC),
        }
    }

    #[test]
    fn one_month_keeps_day_of_month() {
        assert_eq!(add_one_month(date!(2026 - 03 - 15)), date!(2026 - 04 - 15));
        assert_eq!(add_one_month(date!(2026 - 12 - 05)), date!(2027 - 01 - 05));
    }

    #[test]
    fn month_end_clamps() {
        assert_eq!(add_one_month(date!(2026 - 01 - 31)), date!(2026 - 02 - 28));
        assert_eq!(add_one_month(date!(2028 - 01 - 31)), date!(2028 - 02 - 29));
        assert_eq!(add_one_month(date!(2026 - 03 - 31)), date!(2026 - 04 - 30));
    }

    #[test]
    fn successor_is_unpaid_with_fresh_id() {
        let paid = bill("BESCOM", date!(2026 - 10 - 19), true);
        let next = next_occurrence(&paid);
        assert_ne!(next.id, paid.id);
        assert_eq!(next.due_date, date!(2026 - 11 - 19));
        assert!(!next.is_paid);
        assert!(next.is_recurring);
        assert_eq!(next.name, paid.name);
        assert_eq!(next.total_amount, paid.total_amount);
        assert!(next.document_key.is_none());
    }

    #[test]
    fn validation_rejects_negative_and_bad_urls() {
        let mut input = BillInput {
            name: "Rent".into(),
            category: BillCategory::Rent,
            total_amount: 25000.0,
            min_due_amount: 0.0,
            due_date: date!(2026 - 11 - 01),
            is_paid: false,
            is_recurring: true,
            payment: PaymentDetails::default(),
            document_key: None,
        };
        let owner = Uuid::new_v4();
        assert!(validate(&input, owner).is_ok());

        input.min_due_amount = -1.0;
        assert!(validate(&input, owner).is_err());

        input.min_due_amount = 0.0;
        input.payment.payment_url = Some("ftp://nope".into());
        assert!(validate(&input, owner).is_err());

        input.payment.payment_url = None;
        input.name = "   ".into();
        assert!(validate(&input, owner).is_err());
    }

    #[test]
    fn document_key_must_sit_under_the_owner() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut input = BillInput {
            name: "BESCOM".into(),
            category: BillCategory::Electricity,
            total_amount: 1840.5,
            min_due_amount: 0.0,
            due_date: date!(2026 - 11 - 05),
            is_paid: false,
            is_recurring: false,
            payment: PaymentDetails::default(),
            document_key: Some(crate::scan::services::document_key(owner, "pdf")),
        };
        assert!(validate(&input, owner).is_ok());

        input.document_key = Some(format!("bills/{other}/statement.pdf"));
        assert!(validate(&input, owner).is_err());

        input.document_key = Some(format!("bills/{owner}/../{other}/statement.pdf"));
        assert!(validate(&input, owner).is_err());

        input.document_key = Some(format!("bills/{owner}/"));
        assert!(validate(&input, owner).is_err());
    }

    #[test]
    fn only_paying_a_recurring_bill_books_a_successor() {
        let unpaid = bill("Jio Fiber", date!(2026 - 10 - 25), false);
        let next = successor_after_toggle(&unpaid, true).unwrap();
        assert_eq!(next.due_date, date!(2026 - 11 - 25));
        assert!(!next.is_paid);

        // paid -> unpaid creates nothing
        let paid = bill("Jio Fiber", date!(2026 - 10 - 25), true);
        assert!(successor_after_toggle(&paid, false).is_none());

        let mut one_off = bill("Dentist", date!(2026 - 10 - 25), false);
        one_off.is_recurring = false;
        assert!(successor_after_toggle(&one_off, true).is_none());
    }

    #[test]
    fn filters_by_search_and_status() {
        let today = date!(2026 - 10 - 19);
        let overdue = bill("Netflix", date!(2026 - 10 - 10), false);
        let upcoming = bill("Jio Fiber", date!(2026 - 10 - 25), false);
        let paid = bill("LIC", date!(2026 - 10 - 01), true);

        assert!(matches(&overdue, Some("net"), StatusFilter::All, today));
        assert!(!matches(&upcoming, Some("net"), StatusFilter::All, today));
        // category text is searchable too
        assert!(matches(&paid, Some("electric"), StatusFilter::All, today));

        assert!(matches(&overdue, None, StatusFilter::Overdue, today));
        assert!(!matches(&upcoming, None, StatusFilter::Overdue, today));
        assert!(!matches(&paid, None, StatusFilter::Overdue, today));
        assert!(matches(&paid, None, StatusFilter::Paid, today));
        assert!(matches(&upcoming, Some("  "), StatusFilter::Pending, today));
    }
}
