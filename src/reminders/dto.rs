use serde::Deserialize;

use crate::reminders::types::{MailProvider, PushPermission};

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAlertSettings {
    pub email_enabled: Option<bool>,
    pub push_permission: Option<PushPermission>,
    pub mail: Option<MailProvider>,
}
