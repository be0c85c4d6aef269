//! The single in-app notification each user currently sees.

use std::collections::HashMap;

use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::reminders::types::{NotificationItem, NotificationKind};

pub struct NotificationInbox {
    display_for: Duration,
    items: RwLock<HashMap<Uuid, NotificationItem>>,
}

impl NotificationInbox {
    pub fn new(display_for: Duration) -> Self {
        Self {
            display_for,
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces whatever the user was looking at.
    pub async fn publish(
        &self,
        user_id: Uuid,
        message: impl Into<String>,
        kind: NotificationKind,
        now: OffsetDateTime,
    ) -> NotificationItem {
        let item = NotificationItem {
            id: Uuid::new_v4(),
            message: message.into(),
            kind,
            created_at: now,
        };
        self.items.write().await.insert(user_id, item.clone());
        item
    }

    /// The live notification, if it has not expired yet.
    pub async fn current(&self, user_id: Uuid, now: OffsetDateTime) -> Option<NotificationItem> {
        let items = self.items.read().await;
        items
            .get(&user_id)
            .filter(|item| now - item.created_at < self.display_for)
            .cloned()
    }

    pub async fn dismiss(&self, user_id: Uuid) -> bool {
        self.items.write().await.remove(&user_id).is_some()
    }

    /// Drops expired entries so the map does not grow with idle users.
    pub async fn prune(&self, now: OffsetDateTime) {
        let display_for = self.display_for;
        self.items
            .write()
            .await
            .retain(|_, item| now - item.created_at < display_for);
    }
}
