//! Effects stage: turns decided alerts into email, push and in-app output.
//!
//! No channel failure escapes this module. Relay errors become `failed`
//! email log entries, push errors are logged and dropped.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    notify::{EmailMessage, MailRelay, PushChannel},
    reminders::{
        inbox::NotificationInbox,
        store::ReminderStore,
        types::{
            Alert, AlertSettings, EmailLog, EmailStatus, NotificationKind, PushPermission,
            Recipient,
        },
    },
    time_fmt::format_date,
};

/// What happened on each channel for one alert.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub email: Option<EmailStatus>,
    pub pushed: bool,
}

pub struct Dispatcher {
    store: Arc<dyn ReminderStore>,
    mail: Arc<dyn MailRelay>,
    push: Option<Arc<dyn PushChannel>>,
    inbox: Arc<NotificationInbox>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        mail: Arc<dyn MailRelay>,
        push: Option<Arc<dyn PushChannel>>,
        inbox: Arc<NotificationInbox>,
    ) -> Self {
        Self {
            store,
            mail,
            push,
            inbox,
        }
    }

    pub fn inbox(&self) -> &NotificationInbox {
        &self.inbox
    }

    /// Email, then push, then the in-app notification.
    pub async fn deliver(
        &self,
        recipient: &Recipient,
        settings: &AlertSettings,
        alert: &Alert,
        now: OffsetDateTime,
    ) -> Delivery {
        let mut delivery = Delivery::default();

        if settings.email_enabled {
            let message = EmailMessage {
                recipient: recipient.email.clone(),
                subject: alert.email_subject.clone(),
                details: alert.message.clone(),
                amount: alert.amount.clone(),
                due: alert.due.clone(),
            };
            delivery.email = Some(self.send_email(recipient.id, settings, &message, now).await);
        }

        delivery.pushed = self
            .push(recipient.id, settings, alert.kind.push_title(), &alert.message)
            .await;

        let text = if delivery.email == Some(EmailStatus::Sent) {
            format!("{} (Email sent)", alert.message)
        } else {
            alert.message.clone()
        };
        self.inbox
            .publish(recipient.id, text, alert.severity.into(), now)
            .await;

        debug!(
            user_id = %recipient.id,
            item_id = %alert.item_id,
            email = ?delivery.email,
            pushed = delivery.pushed,
            "alert delivered"
        );
        delivery
    }

    /// Sends through the user's relay and records the outcome in the log.
    pub async fn send_email(
        &self,
        user_id: Uuid,
        settings: &AlertSettings,
        message: &EmailMessage,
        now: OffsetDateTime,
    ) -> EmailStatus {
        let status = match self.mail.send(&settings.mail, message).await {
            Ok(()) => EmailStatus::Sent,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "alert email failed");
                EmailStatus::Failed
            }
        };

        let entry = EmailLog {
            id: Uuid::new_v4(),
            timestamp: now,
            recipient: message.recipient.trim().to_string(),
            subject: message.subject.clone(),
            status,
        };
        if let Err(e) = self.store.append_email_log(user_id, &entry).await {
            warn!(user_id = %user_id, error = %e, "could not record email log entry");
        }
        status
    }

    /// Returns true when the push channel accepted the notification.
    pub async fn push(
        &self,
        user_id: Uuid,
        settings: &AlertSettings,
        title: &str,
        body: &str,
    ) -> bool {
        if settings.push_permission != PushPermission::Granted {
            return false;
        }
        let Some(push) = &self.push else {
            return false;
        };
        match push.show(user_id, title, body).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "push notification failed");
                false
            }
        }
    }

    /// The manual "test alert": push, then a test email if enabled, then an
    /// in-app note describing the outcome.
    pub async fn test_alert(
        &self,
        recipient: &Recipient,
        settings: &AlertSettings,
        now: OffsetDateTime,
    ) -> Delivery {
        let mut delivery = Delivery {
            email: None,
            pushed: self
                .push(
                    recipient.id,
                    settings,
                    "Paymate Test",
                    "This is a test alert from Paymate.",
                )
                .await,
        };

        let (text, kind) = if settings.email_enabled {
            let message = EmailMessage {
                recipient: recipient.email.clone(),
                subject: "Test Alert".into(),
                details: "This is a test email from Paymate to verify your setup.".into(),
                amount: "0.00".into(),
                due: format_date(now.date()),
            };
            let status = self.send_email(recipient.id, settings, &message, now).await;
            delivery.email = Some(status);
            match status {
                EmailStatus::Sent => (
                    "Email Sent! Check your SPAM folder for \"Activate FormSubmit\".",
                    NotificationKind::Success,
                ),
                EmailStatus::Failed => (
                    "Test email failed. Check settings/network.",
                    NotificationKind::Warning,
                ),
            }
        } else {
            ("Test alert sent (Email disabled)", NotificationKind::Info)
        };
        self.inbox.publish(recipient.id, text, kind, now).await;
        delivery
    }
}
