//! Decision stage of the reminder engine.
//!
//! Everything here is a pure function of the current time, the user's
//! bills and tasks, and the persisted [`AlertState`]. Delivery lives in
//! [`super::dispatch`].

use time::{macros::format_description, Date, Duration, OffsetDateTime};

use crate::{
    bills::repo_types::Bill,
    reminders::types::{
        Alert, AlertKind, AlertState, BillAlertLedger, TaskAlertKind, TaskAlertMarkers,
    },
    tasks::repo_types::Task,
    time_fmt::format_date,
};

pub const MAX_BILL_ALERTS_PER_DAY: u8 = 2;
pub const BILL_ALERT_COOLDOWN: Duration = Duration::hours(4);
/// Bills further out than this many days stay quiet.
pub const BILL_LOOKAHEAD_DAYS: i64 = 3;

/// Outcome of one evaluation pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PassOutcome {
    pub bill_alert: Option<Alert>,
    pub task_alert: Option<Alert>,
}

impl PassOutcome {
    /// State only needs persisting when something fired.
    pub fn state_changed(&self) -> bool {
        self.bill_alert.is_some() || self.task_alert.is_some()
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.bill_alert.iter().chain(self.task_alert.iter())
    }
}

/// Runs both the bill and the task evaluation, at most one alert each.
pub fn evaluate(
    now: OffsetDateTime,
    bills: &[Bill],
    tasks: &[Task],
    state: &mut AlertState,
) -> PassOutcome {
    PassOutcome {
        bill_alert: evaluate_bills(now, bills, &mut state.bill_ledger),
        task_alert: evaluate_tasks(now, tasks, &mut state.task_markers),
    }
}

/// Whole calendar days from `today` to `due`; negative when overdue.
pub fn days_until(due: Date, today: Date) -> i64 {
    (due - today).whole_days()
}

pub fn classify_bill(due: Date, today: Date) -> Option<AlertKind> {
    match days_until(due, today) {
        d if d < 0 => Some(AlertKind::BillOverdue),
        0 => Some(AlertKind::BillDueToday),
        1 => Some(AlertKind::BillDueTomorrow),
        d if d <= BILL_LOOKAHEAD_DAYS => Some(AlertKind::BillDueSoon { days: d }),
        _ => None,
    }
}

fn bill_message(bill: &Bill, kind: AlertKind) -> String {
    match kind {
        AlertKind::BillOverdue => format!(
            "OVERDUE: {} was due on {}!",
            bill.name,
            format_date(bill.due_date)
        ),
        AlertKind::BillDueToday => format!("URGENT: {} is due TODAY!", bill.name),
        AlertKind::BillDueTomorrow => format!("Reminder: {} is due tomorrow.", bill.name),
        AlertKind::BillDueSoon { days } => {
            format!("Upcoming: {} is due in {} days.", bill.name, days)
        }
        AlertKind::TaskReminder | AlertKind::TaskDue => unreachable!("not a bill alert"),
    }
}

/// Picks the first unpaid bill (earliest due) that is inside the alert
/// window and not rate limited, and books it in the ledger.
pub fn evaluate_bills(
    now: OffsetDateTime,
    bills: &[Bill],
    ledger: &mut BillAlertLedger,
) -> Option<Alert> {
    let today = now.date();
    ledger.roll_to(today);

    let mut unpaid: Vec<&Bill> = bills.iter().filter(|b| !b.is_paid).collect();
    unpaid.sort_by_key(|b| b.due_date);

    for bill in unpaid {
        if let Some(record) = ledger.record(bill.id) {
            if record.count >= MAX_BILL_ALERTS_PER_DAY {
                continue;
            }
            if record.count > 0 && now - record.last_alert_at < BILL_ALERT_COOLDOWN {
                continue;
            }
        }

        let Some(kind) = classify_bill(bill.due_date, today) else {
            continue;
        };

        ledger.bump(bill.id, now);
        return Some(Alert {
            item_id: bill.id,
            kind,
            severity: kind.severity(),
            message: bill_message(bill, kind),
            email_subject: format!("Bill Alert: {}", bill.name),
            amount: format_amount(bill.total_amount),
            due: format_date(bill.due_date),
        });
    }
    None
}

/// Fires at most one task alert: a reminder inside the reminder window, or
/// the due alert once the due time has passed. Each fires once per task.
pub fn evaluate_tasks(
    now: OffsetDateTime,
    tasks: &[Task],
    markers: &mut TaskAlertMarkers,
) -> Option<Alert> {
    let mut open: Vec<&Task> = tasks.iter().filter(|t| !t.is_completed).collect();
    open.sort_by_key(|t| t.due_at);

    for task in open {
        let due_local = task.due_at.to_offset(now.offset());

        if let Some(remind_at) = task.remind_at {
            if now >= remind_at
                && now < task.due_at
                && !markers.contains(task.id, TaskAlertKind::Reminder)
            {
                markers.mark(task.id, TaskAlertKind::Reminder);
                return Some(Alert {
                    item_id: task.id,
                    kind: AlertKind::TaskReminder,
                    severity: AlertKind::TaskReminder.severity(),
                    message: format!(
                        "Reminder: {} is coming up at {}",
                        task.title,
                        format_clock(due_local)
                    ),
                    email_subject: format!("Task Reminder: {}", task.title),
                    amount: "-".into(),
                    due: format_due_at(due_local),
                });
            }
        }

        if now >= task.due_at && !markers.contains(task.id, TaskAlertKind::Due) {
            markers.mark(task.id, TaskAlertKind::Due);
            return Some(Alert {
                item_id: task.id,
                kind: AlertKind::TaskDue,
                severity: AlertKind::TaskDue.severity(),
                message: format!("Task Due Now: {}", task.title),
                email_subject: format!("Task Due: {}", task.title),
                amount: "-".into(),
                due: format_due_at(due_local),
            });
        }
    }
    None
}

/// Shortest form: `4250`, `1840.5`.
pub(crate) fn format_amount(amount: f64) -> String {
    format!("{amount}")
}

fn format_clock(at: OffsetDateTime) -> String {
    at.format(format_description!("[hour]:[minute]"))
        .unwrap_or_else(|_| at.time().to_string())
}

fn format_due_at(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_else(|_| at.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bills::repo_types::{BillCategory, PaymentDetails};
    use crate::reminders::types::{NotificationKind, Severity};
    use time::macros::{date, datetime};
    use uuid::Uuid;

    fn bill(name: &str, due: Date) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.into(),
            category: BillCategory::CreditCard,
            total_amount: 4250.0,
            min_due_amount: 212.5,
            due_date: due,
            is_paid: false,
            is_recurring: false,
            payment: PaymentDetails::default(),
            document_key: None,
            created_at: datetime!(2026-09-01 00:00 UTC),
        }
    }

    fn task(title: &str, due_at: OffsetDateTime, remind_at: Option<OffsetDateTime>) -> Task {
        Task {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            title: title.into(),
            due_at,
            remind_at,
            is_completed: false,
            is_recurring: false,
            created_at: datetime!(2026-09-01 00:00 UTC),
        }
    }

    const NOW: OffsetDateTime = datetime!(2026-10-19 10:00 UTC);

    #[test]
    fn classification_boundaries() {
        let today = date!(2026 - 10 - 19);
        assert_eq!(classify_bill(date!(2026 - 10 - 18), today), Some(AlertKind::BillOverdue));
        assert_eq!(classify_bill(date!(2026 - 09 - 01), today), Some(AlertKind::BillOverdue));
        assert_eq!(classify_bill(today, today), Some(AlertKind::BillDueToday));
        assert_eq!(classify_bill(date!(2026 - 10 - 20), today), Some(AlertKind::BillDueTomorrow));
        assert_eq!(
            classify_bill(date!(2026 - 10 - 21), today),
            Some(AlertKind::BillDueSoon { days: 2 })
        );
        assert_eq!(
            classify_bill(date!(2026 - 10 - 22), today),
            Some(AlertKind::BillDueSoon { days: 3 })
        );
        assert_eq!(classify_bill(date!(2026 - 10 - 23), today), None);
    }

    #[test]
    fn classification_crosses_month_and_year() {
        assert_eq!(
            classify_bill(date!(2027 - 01 - 01), date!(2026 - 12 - 31)),
            Some(AlertKind::BillDueTomorrow)
        );
        assert_eq!(
            classify_bill(date!(2026 - 02 - 28), date!(2026 - 03 - 01)),
            Some(AlertKind::BillOverdue)
        );
    }

    #[test]
    fn due_today_fires_once_then_cools_down() {
        let bills = vec![bill("HDFC Regalia", date!(2026 - 10 - 19))];
        let mut ledger = BillAlertLedger::default();

        let alert = evaluate_bills(NOW, &bills, &mut ledger).expect("alert");
        assert_eq!(alert.kind, AlertKind::BillDueToday);
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.message, "URGENT: HDFC Regalia is due TODAY!");
        assert_eq!(alert.email_subject, "Bill Alert: HDFC Regalia");
        assert_eq!(alert.amount, "4250");
        assert_eq!(ledger.record(bills[0].id).unwrap().count, 1);

        // still inside the 4h window
        let later = NOW + Duration::hours(3) + Duration::minutes(59);
        assert!(evaluate_bills(later, &bills, &mut ledger).is_none());
        assert_eq!(ledger.record(bills[0].id).unwrap().count, 1);

        let after_cooldown = NOW + Duration::hours(4);
        let second = evaluate_bills(after_cooldown, &bills, &mut ledger).expect("second alert");
        assert_eq!(second.kind, AlertKind::BillDueToday);
        assert_eq!(ledger.record(bills[0].id).unwrap().count, 2);

        // daily cap reached
        let evening = NOW + Duration::hours(12);
        assert!(evaluate_bills(evening, &bills, &mut ledger).is_none());

        // next day starts over
        let tomorrow = NOW + Duration::days(1);
        let next_day = evaluate_bills(tomorrow, &bills, &mut ledger).expect("new day");
        assert_eq!(next_day.kind, AlertKind::BillOverdue);
        assert_eq!(next_day.message, "OVERDUE: HDFC Regalia was due on 2026-10-19!");
    }

    #[test]
    fn one_bill_alert_per_pass_earliest_first() {
        let bills = vec![
            bill("Water", date!(2026 - 10 - 21)),
            bill("Rent", date!(2026 - 10 - 15)),
            bill("Gas", date!(2026 - 10 - 19)),
        ];
        let mut ledger = BillAlertLedger::default();

        let first = evaluate_bills(NOW, &bills, &mut ledger).unwrap();
        assert_eq!(first.item_id, bills[1].id);
        assert_eq!(first.kind, AlertKind::BillOverdue);
        assert_eq!(ledger.records.len(), 1);

        // the rest surface on later passes, one per pass
        let second = evaluate_bills(NOW + Duration::minutes(1), &bills, &mut ledger).unwrap();
        assert_eq!(second.item_id, bills[2].id);
        let third = evaluate_bills(NOW + Duration::minutes(2), &bills, &mut ledger).unwrap();
        assert_eq!(third.item_id, bills[0].id);
        assert_eq!(third.message, "Upcoming: Water is due in 2 days.");
        assert!(evaluate_bills(NOW + Duration::minutes(3), &bills, &mut ledger).is_none());
    }

    #[test]
    fn paid_and_distant_bills_are_quiet() {
        let mut paid = bill("Paid", date!(2026 - 10 - 18));
        paid.is_paid = true;
        let far = bill("Insurance", date!(2026 - 11 - 30));
        let mut ledger = BillAlertLedger::default();
        assert!(evaluate_bills(NOW, &[paid, far], &mut ledger).is_none());
        assert!(ledger.records.is_empty());
    }

    #[test]
    fn rate_limited_bill_does_not_block_the_next_one() {
        let bills = vec![
            bill("Card", date!(2026 - 10 - 19)),
            bill("Phone", date!(2026 - 10 - 20)),
        ];
        let mut ledger = BillAlertLedger::default();
        evaluate_bills(NOW, &bills, &mut ledger).unwrap();
        let next = evaluate_bills(NOW + Duration::minutes(1), &bills, &mut ledger).unwrap();
        assert_eq!(next.item_id, bills[1].id);
        assert_eq!(next.message, "Reminder: Phone is due tomorrow.");
        assert_eq!(next.severity, Severity::Info);
    }

    #[test]
    fn stale_ledger_from_yesterday_is_ignored() {
        let bills = vec![bill("Card", date!(2026 - 10 - 19))];
        let mut ledger = BillAlertLedger::default();
        ledger.roll_to(date!(2026 - 10 - 18));
        ledger.bump(bills[0].id, datetime!(2026-10-18 23:00 UTC));
        ledger.bump(bills[0].id, datetime!(2026-10-18 23:30 UTC));
        assert!(evaluate_bills(NOW, &bills, &mut ledger).is_some());
    }

    #[test]
    fn task_reminder_then_due() {
        let now = datetime!(2026-10-19 10:00 UTC);
        let t = task(
            "Call bank",
            now + Duration::minutes(30),
            Some(now - Duration::minutes(1)),
        );
        let tasks = vec![t.clone()];
        let mut markers = TaskAlertMarkers::default();

        let reminder = evaluate_tasks(now, &tasks, &mut markers).expect("reminder");
        assert_eq!(reminder.kind, AlertKind::TaskReminder);
        assert_eq!(reminder.severity, Severity::Info);
        assert_eq!(reminder.message, "Reminder: Call bank is coming up at 10:30");
        assert_eq!(reminder.due, "2026-10-19 10:30");
        assert!(markers.contains(t.id, TaskAlertKind::Reminder));

        // nothing more until the due time
        assert!(evaluate_tasks(now + Duration::minutes(10), &tasks, &mut markers).is_none());

        let due = evaluate_tasks(now + Duration::minutes(31), &tasks, &mut markers).expect("due");
        assert_eq!(due.kind, AlertKind::TaskDue);
        assert_eq!(due.severity, Severity::Warning);
        assert_eq!(due.message, "Task Due Now: Call bank");
        assert_eq!(due.email_subject, "Task Due: Call bank");

        // both keys spent for good
        assert!(evaluate_tasks(now + Duration::days(3), &tasks, &mut markers).is_none());
    }

    #[test]
    fn reminder_window_closed_skips_straight_to_due() {
        let now = datetime!(2026-10-19 10:00 UTC);
        let t = task("Pay maid", now - Duration::minutes(5), Some(now - Duration::hours(1)));
        let mut markers = TaskAlertMarkers::default();
        let alert = evaluate_tasks(now, &[t.clone()], &mut markers).unwrap();
        assert_eq!(alert.kind, AlertKind::TaskDue);
        assert!(!markers.contains(t.id, TaskAlertKind::Reminder));
    }

    #[test]
    fn one_task_alert_per_pass() {
        let now = datetime!(2026-10-19 10:00 UTC);
        let tasks = vec![
            task("Later", now - Duration::minutes(1), None),
            task("Earlier", now - Duration::hours(2), None),
            task("Future", now + Duration::hours(2), None),
        ];
        let mut markers = TaskAlertMarkers::default();
        let first = evaluate_tasks(now, &tasks, &mut markers).unwrap();
        assert_eq!(first.item_id, tasks[1].id);
        assert_eq!(markers.len(), 1);
        let second = evaluate_tasks(now, &tasks, &mut markers).unwrap();
        assert_eq!(second.item_id, tasks[0].id);
        assert!(evaluate_tasks(now, &tasks, &mut markers).is_none());
    }

    #[test]
    fn completed_tasks_never_alert() {
        let now = datetime!(2026-10-19 10:00 UTC);
        let mut t = task("Done", now - Duration::hours(1), None);
        t.is_completed = true;
        let mut markers = TaskAlertMarkers::default();
        assert!(evaluate_tasks(now, &[t], &mut markers).is_none());
        assert!(markers.is_empty());
    }

    #[test]
    fn reminder_time_renders_in_local_offset() {
        let now = datetime!(2026-10-19 10:00 +05:30);
        let t = task(
            "Renew FD",
            datetime!(2026-10-19 05:00 UTC),
            Some(datetime!(2026-10-19 04:20 UTC)),
        );
        let mut markers = TaskAlertMarkers::default();
        let alert = evaluate_tasks(now, &[t], &mut markers).unwrap();
        assert_eq!(alert.message, "Reminder: Renew FD is coming up at 10:30");
    }

    #[test]
    fn full_pass_fires_bill_and_task_independently() {
        let bills = vec![bill("Card", date!(2026 - 10 - 19))];
        let tasks = vec![task("Gym fee", NOW - Duration::minutes(1), None)];
        let mut state = AlertState::default();

        let outcome = evaluate(NOW, &bills, &tasks, &mut state);
        assert!(outcome.state_changed());
        assert_eq!(outcome.alerts().count(), 2);
        assert_eq!(
            NotificationKind::from(outcome.task_alert.as_ref().unwrap().severity),
            NotificationKind::Warning
        );

        let quiet = evaluate(NOW + Duration::minutes(1), &bills, &tasks, &mut state);
        assert!(!quiet.state_changed());
    }

    #[test]
    fn amounts_render_without_trailing_zeros() {
        assert_eq!(format_amount(499.0), "499");
        assert_eq!(format_amount(212.5), "212.5");
        assert_eq!(format_amount(1840.25), "1840.25");
    }
}
