pub mod mail;
pub mod push;

pub use mail::{EmailMessage, HttpMailRelay, MailError, MailRelay};
pub use push::{PushChannel, PushError, WebhookPush};
