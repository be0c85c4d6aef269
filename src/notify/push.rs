//! Push channel: the server-side counterpart of an OS notification.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push gateway unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("push gateway returned {0}")]
    Status(u16),
}

#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn show(&self, user_id: Uuid, title: &str, body: &str) -> Result<(), PushError>;
}

#[derive(Debug, Serialize)]
struct PushPayload<'a> {
    user_id: Uuid,
    title: &'a str,
    body: &'a str,
}

/// Forwards notifications to a webhook that fans them out to devices.
#[derive(Clone)]
pub struct WebhookPush {
    client: reqwest::Client,
    url: String,
}

impl WebhookPush {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PushChannel for WebhookPush {
    async fn show(&self, user_id: Uuid, title: &str, body: &str) -> Result<(), PushError> {
        let res = self
            .client
            .post(&self.url)
            .json(&PushPayload {
                user_id,
                title,
                body,
            })
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(PushError::Status(res.status().as_u16()));
        }
        Ok(())
    }
}
