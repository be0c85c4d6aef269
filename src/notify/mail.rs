//! Outbound email through a hosted relay.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{config::MailConfig, reminders::types::MailProvider};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("mail relay unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("mail relay rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// One alert email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub recipient: String,
    pub subject: String,
    pub details: String,
    pub amount: String,
    pub due: String,
}

#[async_trait]
pub trait MailRelay: Send + Sync {
    async fn send(&self, provider: &MailProvider, message: &EmailMessage) -> Result<(), MailError>;
}

/// Talks to FormSubmit-style and EmailJS relays over HTTPS.
#[derive(Clone)]
pub struct HttpMailRelay {
    client: reqwest::Client,
    form_base_url: String,
    emailjs_base_url: String,
    sender_label: String,
}

impl HttpMailRelay {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            form_base_url: config.form_base_url.trim_end_matches('/').to_string(),
            emailjs_base_url: config.emailjs_base_url.trim_end_matches('/').to_string(),
            sender_label: config.sender_label.clone(),
        })
    }

    fn form_payload(&self, message: &EmailMessage) -> serde_json::Value {
        json!({
            "_subject": message.subject,
            "_template": "table",
            "_captcha": "false",
            "_honey": "",
            "Alert Details": message.details,
            "Amount Due": format!("₹{}", message.amount),
            "Due Date": message.due,
            "Sent Via": self.sender_label,
        })
    }

    fn emailjs_payload(
        &self,
        service_id: &str,
        template_id: &str,
        public_key: &str,
        message: &EmailMessage,
    ) -> serde_json::Value {
        json!({
            "service_id": service_id,
            "template_id": template_id,
            "user_id": public_key,
            "template_params": {
                "to_email": message.recipient,
                "subject": message.subject,
                "message": message.details,
                "amount": message.amount,
                "due_date": message.due,
            }
        })
    }
}

#[async_trait]
impl MailRelay for HttpMailRelay {
    async fn send(&self, provider: &MailProvider, message: &EmailMessage) -> Result<(), MailError> {
        let recipient = message.recipient.trim();
        if !recipient.contains('@') {
            return Err(MailError::InvalidRecipient(recipient.to_string()));
        }

        let request = match provider {
            MailProvider::Simple => self
                .client
                .post(format!("{}/{}", self.form_base_url, recipient))
                .header(reqwest::header::ACCEPT, "application/json")
                .json(&self.form_payload(message)),
            MailProvider::EmailJs {
                service_id,
                template_id,
                public_key,
            } => self
                .client
                .post(format!("{}/api/v1.0/email/send", self.emailjs_base_url))
                .json(&self.emailjs_payload(service_id, template_id, public_key, message)),
        };

        debug!(recipient = %recipient, subject = %message.subject, "sending alert email");
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        warn!(%status, body = %body, "mail relay returned an error");
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn relay(base: &str) -> HttpMailRelay {
        HttpMailRelay::new(&MailConfig {
            form_base_url: format!("{base}/ajax/"),
            emailjs_base_url: base.to_string(),
            timeout_secs: 5,
            sender_label: "Paymate App".into(),
        })
        .unwrap()
    }

    fn message(recipient: &str) -> EmailMessage {
        EmailMessage {
            recipient: recipient.into(),
            subject: "Bill Alert: Tata Power".into(),
            details: "URGENT: Tata Power is due TODAY!".into(),
            amount: "1840".into(),
            due: "2026-10-19".into(),
        }
    }

    #[tokio::test]
    async fn form_relay_posts_table_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ajax/asha@example.com"))
            .and(body_partial_json(json!({
                "_subject": "Bill Alert: Tata Power",
                "_captcha": "false",
                "Amount Due": "₹1840",
                "Due Date": "2026-10-19",
                "Sent Via": "Paymate App"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": "true"})))
            .expect(1)
            .mount(&server)
            .await;

        relay(&server.uri())
            .send(&MailProvider::Simple, &message(" asha@example.com "))
            .await
            .expect("relay accepts");
    }

    #[tokio::test]
    async fn emailjs_relay_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1.0/email/send"))
            .and(body_partial_json(json!({
                "service_id": "svc",
                "template_id": "tpl",
                "user_id": "pk",
                "template_params": { "to_email": "asha@example.com" }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let provider = MailProvider::EmailJs {
            service_id: "svc".into(),
            template_id: "tpl".into(),
            public_key: "pk".into(),
        };
        relay(&server.uri())
            .send(&provider, &message("asha@example.com"))
            .await
            .expect("emailjs accepts");
    }

    #[tokio::test]
    async fn relay_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad form"))
            .mount(&server)
            .await;

        let err = relay(&server.uri())
            .send(&MailProvider::Simple, &message("asha@example.com"))
            .await
            .unwrap_err();
        match err {
            MailError::Rejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "bad form");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_recipient_never_hits_the_network() {
        let err = relay("http://127.0.0.1:9")
            .send(&MailProvider::Simple, &message("not-an-email"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::InvalidRecipient(_)));
    }
}
