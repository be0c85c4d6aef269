use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// How loud an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Info,
}

/// Kind shown on an in-app notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Warning,
    Info,
    Success,
}

impl From<Severity> for NotificationKind {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Warning => NotificationKind::Warning,
            Severity::Info => NotificationKind::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    BillOverdue,
    BillDueToday,
    BillDueTomorrow,
    BillDueSoon { days: i64 },
    TaskReminder,
    TaskDue,
}

impl AlertKind {
    pub fn severity(self) -> Severity {
        match self {
            AlertKind::BillOverdue | AlertKind::BillDueToday | AlertKind::TaskDue => {
                Severity::Warning
            }
            AlertKind::BillDueTomorrow | AlertKind::BillDueSoon { .. } | AlertKind::TaskReminder => {
                Severity::Info
            }
        }
    }

    /// Title used for the push channel.
    pub fn push_title(self) -> &'static str {
        match self {
            AlertKind::TaskReminder => "Task Reminder",
            AlertKind::TaskDue => "Task Due",
            _ => "Paymate Alert",
        }
    }
}

/// A decided alert, ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub item_id: Uuid,
    #[serde(flatten)]
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub email_subject: String,
    /// Amount line for the email body; `-` for tasks.
    pub amount: String,
    /// Due line for the email body.
    pub due: String,
}

/// Per-bill counter for the current day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAlertRecord {
    pub count: u8,
    #[serde(with = "time::serde::rfc3339")]
    pub last_alert_at: OffsetDateTime,
}

/// Bill alert counters for one calendar day.
///
/// The ledger carries the day it belongs to; once the evaluation date moves
/// past it, every counter starts again from zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillAlertLedger {
    #[serde(default, with = "crate::time_fmt::iso_date_option")]
    pub date: Option<Date>,
    #[serde(default)]
    pub records: HashMap<Uuid, DailyAlertRecord>,
}

impl BillAlertLedger {
    /// Drops yesterday's counters when `today` differs from the ledger day.
    pub fn roll_to(&mut self, today: Date) {
        if self.date != Some(today) {
            self.date = Some(today);
            self.records.clear();
        }
    }

    pub fn record(&self, bill_id: Uuid) -> Option<&DailyAlertRecord> {
        self.records.get(&bill_id)
    }

    pub fn bump(&mut self, bill_id: Uuid, now: OffsetDateTime) {
        let entry = self.records.entry(bill_id).or_insert(DailyAlertRecord {
            count: 0,
            last_alert_at: now,
        });
        entry.count = entry.count.saturating_add(1);
        entry.last_alert_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskAlertKind {
    Reminder,
    Due,
}

impl TaskAlertKind {
    fn suffix(self) -> &'static str {
        match self {
            TaskAlertKind::Reminder => "reminder",
            TaskAlertKind::Due => "due",
        }
    }
}

/// Task alerts that already fired, stored as `{taskId}_reminder` / `{taskId}_due`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct TaskAlertMarkers(BTreeSet<(Uuid, TaskAlertKind)>);

impl TaskAlertMarkers {
    pub fn contains(&self, task_id: Uuid, kind: TaskAlertKind) -> bool {
        self.0.contains(&(task_id, kind))
    }

    /// Returns false if the marker was already present.
    pub fn mark(&mut self, task_id: Uuid, kind: TaskAlertKind) -> bool {
        self.0.insert((task_id, kind))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<TaskAlertMarkers> for Vec<String> {
    fn from(m: TaskAlertMarkers) -> Self {
        m.0.into_iter()
            .map(|(id, kind)| format!("{}_{}", id, kind.suffix()))
            .collect()
    }
}

#[derive(Debug, Error)]
#[error("invalid task alert marker {0:?}")]
pub struct InvalidMarker(String);

impl TryFrom<Vec<String>> for TaskAlertMarkers {
    type Error = InvalidMarker;

    fn try_from(keys: Vec<String>) -> Result<Self, Self::Error> {
        let mut set = BTreeSet::new();
        for key in keys {
            let parsed = key.rsplit_once('_').and_then(|(id, suffix)| {
                let kind = match suffix {
                    "reminder" => TaskAlertKind::Reminder,
                    "due" => TaskAlertKind::Due,
                    _ => return None,
                };
                Uuid::parse_str(id).ok().map(|id| (id, kind))
            });
            match parsed {
                Some(entry) => {
                    set.insert(entry);
                }
                None => return Err(InvalidMarker(key)),
            }
        }
        Ok(Self(set))
    }
}

/// Everything the engine remembers between passes for one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertState {
    pub bill_ledger: BillAlertLedger,
    pub task_markers: TaskAlertMarkers,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPermission {
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl PushPermission {
    pub fn as_str(self) -> &'static str {
        match self {
            PushPermission::Unknown => "unknown",
            PushPermission::Granted => "granted",
            PushPermission::Denied => "denied",
        }
    }

    pub fn parse_lenient(raw: &str) -> Self {
        match raw {
            "granted" => PushPermission::Granted,
            "denied" => PushPermission::Denied,
            _ => PushPermission::Unknown,
        }
    }
}

/// Which relay delivers a user's alert emails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum MailProvider {
    #[default]
    Simple,
    #[serde(rename = "emailjs")]
    EmailJs {
        service_id: String,
        template_id: String,
        public_key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSettings {
    pub email_enabled: bool,
    pub push_permission: PushPermission,
    #[serde(flatten)]
    pub mail: MailProvider,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            email_enabled: true,
            push_permission: PushPermission::Unknown,
            mail: MailProvider::Simple,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Sent,
    Failed,
}

impl EmailStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailLog {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub recipient: String,
    pub subject: String,
    pub status: EmailStatus,
}

pub const EMAIL_LOG_CAP: usize = 50;

/// Inserts newest-first and drops whatever falls past the cap.
pub fn push_email_log(log: &mut Vec<EmailLog>, entry: EmailLog) {
    log.insert(0, entry);
    log.truncate(EMAIL_LOG_CAP);
}

/// The one in-app notification a user sees at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationItem {
    pub id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Whom a pass runs for.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Recipient {
    pub id: Uuid,
    pub email: String,
}
