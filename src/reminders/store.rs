//! Persistence seam for the reminder engine.

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::{
    bills::{self, repo_types::Bill},
    reminders::types::{
        AlertSettings, AlertState, EmailLog, EmailStatus, MailProvider, PushPermission, Recipient,
        EMAIL_LOG_CAP,
    },
    tasks::{self, repo_types::Task},
};

/// Newest first; `seq` separates entries sent within the same pass.
const EMAIL_LOG_ORDER: &str = "sent_at DESC, seq DESC";

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn recipients(&self) -> anyhow::Result<Vec<Recipient>>;
    async fn recipient(&self, user_id: Uuid) -> anyhow::Result<Option<Recipient>>;
    async fn bills(&self, user_id: Uuid) -> anyhow::Result<Vec<Bill>>;
    async fn tasks(&self, user_id: Uuid) -> anyhow::Result<Vec<Task>>;

    async fn alert_state(&self, user_id: Uuid) -> anyhow::Result<AlertState>;
    async fn save_alert_state(&self, user_id: Uuid, state: &AlertState) -> anyhow::Result<()>;

    async fn settings(&self, user_id: Uuid) -> anyhow::Result<AlertSettings>;
    async fn save_settings(&self, user_id: Uuid, settings: &AlertSettings) -> anyhow::Result<()>;

    /// Appends one entry, keeping only the newest [`EMAIL_LOG_CAP`].
    async fn append_email_log(&self, user_id: Uuid, entry: &EmailLog) -> anyhow::Result<()>;
    /// Newest first.
    async fn email_log(&self, user_id: Uuid) -> anyhow::Result<Vec<EmailLog>>;

    /// Forgets fired alerts (ledger and task markers) and the email log.
    async fn clear_history(&self, user_id: Uuid) -> anyhow::Result<()>;
}

pub struct PgReminderStore {
    db: PgPool,
}

impl PgReminderStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(sqlx::FromRow)]
struct AlertStateRow {
    bill_ledger: serde_json::Value,
    task_markers: serde_json::Value,
}

#[derive(sqlx::FromRow)]
struct SettingsRow {
    email_enabled: bool,
    push_permission: String,
    mail_provider: String,
    emailjs_service: Option<String>,
    emailjs_template: Option<String>,
    emailjs_key: Option<String>,
}

impl From<SettingsRow> for AlertSettings {
    fn from(r: SettingsRow) -> Self {
        let mail = match (r.mail_provider.as_str(), r.emailjs_service, r.emailjs_template, r.emailjs_key) {
            ("emailjs", Some(service_id), Some(template_id), Some(public_key)) => MailProvider::EmailJs {
                service_id,
                template_id,
                public_key,
            },
            _ => MailProvider::Simple,
        };
        Self {
            email_enabled: r.email_enabled,
            push_permission: PushPermission::parse_lenient(&r.push_permission),
            mail,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EmailLogRow {
    id: Uuid,
    sent_at: OffsetDateTime,
    recipient: String,
    subject: String,
    status: String,
}

impl From<EmailLogRow> for EmailLog {
    fn from(r: EmailLogRow) -> Self {
        Self {
            id: r.id,
            timestamp: r.sent_at,
            recipient: r.recipient,
            subject: r.subject,
            status: if r.status == "sent" {
                EmailStatus::Sent
            } else {
                EmailStatus::Failed
            },
        }
    }
}

/// Unreadable bookkeeping is treated as empty rather than failing the pass.
fn decode_or_default<T: DeserializeOwned + Default>(user_id: Uuid, what: &str, v: serde_json::Value) -> T {
    serde_json::from_value(v).unwrap_or_else(|e| {
        warn!(user_id = %user_id, field = what, error = %e, "malformed alert state, starting empty");
        T::default()
    })
}

#[async_trait]
impl ReminderStore for PgReminderStore {
    async fn recipients(&self) -> anyhow::Result<Vec<Recipient>> {
        let rows = sqlx::query_as::<_, Recipient>("SELECT id, email FROM users ORDER BY created_at")
            .fetch_all(&self.db)
            .await
            .context("list reminder recipients")?;
        Ok(rows)
    }

    async fn recipient(&self, user_id: Uuid) -> anyhow::Result<Option<Recipient>> {
        let row = sqlx::query_as::<_, Recipient>("SELECT id, email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .context("load reminder recipient")?;
        Ok(row)
    }

    async fn bills(&self, user_id: Uuid) -> anyhow::Result<Vec<Bill>> {
        bills::repo::list_by_user(&self.db, user_id).await
    }

    async fn tasks(&self, user_id: Uuid) -> anyhow::Result<Vec<Task>> {
        tasks::repo::list_by_user(&self.db, user_id).await
    }

    async fn alert_state(&self, user_id: Uuid) -> anyhow::Result<AlertState> {
        let row = sqlx::query_as::<_, AlertStateRow>(
            "SELECT bill_ledger, task_markers FROM alert_state WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("load alert state")?;

        Ok(match row {
            Some(r) => AlertState {
                bill_ledger: decode_or_default(user_id, "bill_ledger", r.bill_ledger),
                task_markers: decode_or_default(user_id, "task_markers", r.task_markers),
            },
            None => AlertState::default(),
        })
    }

    async fn save_alert_state(&self, user_id: Uuid, state: &AlertState) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alert_state (user_id, bill_ledger, task_markers, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (user_id) DO UPDATE
               SET bill_ledger = EXCLUDED.bill_ledger,
                   task_markers = EXCLUDED.task_markers,
                   updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(Json(&state.bill_ledger))
        .bind(Json(&state.task_markers))
        .execute(&self.db)
        .await
        .context("save alert state")?;
        Ok(())
    }

    async fn settings(&self, user_id: Uuid) -> anyhow::Result<AlertSettings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT email_enabled, push_permission, mail_provider,
                   emailjs_service, emailjs_template, emailjs_key
              FROM alert_settings
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("load alert settings")?;
        Ok(row.map(AlertSettings::from).unwrap_or_default())
    }

    async fn save_settings(&self, user_id: Uuid, settings: &AlertSettings) -> anyhow::Result<()> {
        let (provider, service, template, key) = match &settings.mail {
            MailProvider::Simple => ("simple", None, None, None),
            MailProvider::EmailJs {
                service_id,
                template_id,
                public_key,
            } => (
                "emailjs",
                Some(service_id.as_str()),
                Some(template_id.as_str()),
                Some(public_key.as_str()),
            ),
        };
        sqlx::query(
            r#"
            INSERT INTO alert_settings
                (user_id, email_enabled, push_permission, mail_provider,
                 emailjs_service, emailjs_template, emailjs_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE
               SET email_enabled = EXCLUDED.email_enabled,
                   push_permission = EXCLUDED.push_permission,
                   mail_provider = EXCLUDED.mail_provider,
                   emailjs_service = EXCLUDED.emailjs_service,
                   emailjs_template = EXCLUDED.emailjs_template,
                   emailjs_key = EXCLUDED.emailjs_key
            "#,
        )
        .bind(user_id)
        .bind(settings.email_enabled)
        .bind(settings.push_permission.as_str())
        .bind(provider)
        .bind(service)
        .bind(template)
        .bind(key)
        .execute(&self.db)
        .await
        .context("save alert settings")?;
        Ok(())
    }

    async fn append_email_log(&self, user_id: Uuid, entry: &EmailLog) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query(
            r#"
            INSERT INTO email_log (id, user_id, sent_at, recipient, subject, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(user_id)
        .bind(entry.timestamp)
        .bind(&entry.recipient)
        .bind(&entry.subject)
        .bind(entry.status.as_str())
        .execute(&mut *tx)
        .await
        .context("insert email log entry")?;

        sqlx::query(&format!(
            r#"
            DELETE FROM email_log
             WHERE user_id = $1
               AND id NOT IN (
                   SELECT id FROM email_log
                    WHERE user_id = $1
                    ORDER BY {EMAIL_LOG_ORDER}
                    LIMIT $2
               )
            "#
        ))
        .bind(user_id)
        .bind(EMAIL_LOG_CAP as i64)
        .execute(&mut *tx)
        .await
        .context("trim email log")?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn email_log(&self, user_id: Uuid) -> anyhow::Result<Vec<EmailLog>> {
        let rows = sqlx::query_as::<_, EmailLogRow>(&format!(
            r#"
            SELECT id, sent_at, recipient, subject, status
              FROM email_log
             WHERE user_id = $1
             ORDER BY {EMAIL_LOG_ORDER}
             LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(EMAIL_LOG_CAP as i64)
        .fetch_all(&self.db)
        .await
        .context("list email log")?;
        Ok(rows.into_iter().map(EmailLog::from).collect())
    }

    async fn clear_history(&self, user_id: Uuid) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query("DELETE FROM alert_state WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("clear alert state")?;
        sqlx::query("DELETE FROM email_log WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("clear email log")?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }
}
