use serde::Deserialize;
use time::{macros::format_description, UtcOffset};

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Outbound email relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// FormSubmit-style endpoint; the recipient address is appended as a path segment.
    pub form_base_url: String,
    pub emailjs_base_url: String,
    pub timeout_secs: u64,
    pub sender_label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReminderConfig {
    pub interval_secs: u64,
    /// Offset used to decide what "today" is for due-date arithmetic.
    pub utc_offset: UtcOffset,
    pub toast_secs: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            utc_offset: UtcOffset::UTC,
            toast_secs: 6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub mail: MailConfig,
    pub push_webhook_url: Option<String>,
    pub gemini: GeminiConfig,
    pub reminders: ReminderConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "paymate".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "paymate-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT")?,
            bucket: std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "paymate-documents".into()),
            access_key: std::env::var("MINIO_ACCESS_KEY")?,
            secret_key: std::env::var("MINIO_SECRET_KEY")?,
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let mail = MailConfig {
            form_base_url: std::env::var("MAIL_FORM_BASE_URL")
                .unwrap_or_else(|_| "https://formsubmit.co/ajax".into()),
            emailjs_base_url: std::env::var("MAIL_EMAILJS_BASE_URL")
                .unwrap_or_else(|_| "https://api.emailjs.com".into()),
            timeout_secs: env_parse("MAIL_TIMEOUT_SECS").unwrap_or(15),
            sender_label: std::env::var("MAIL_SENDER_LABEL").unwrap_or_else(|_| "Paymate App".into()),
        };
        let gemini = GeminiConfig {
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into()),
        };
        let defaults = ReminderConfig::default();
        let reminders = ReminderConfig {
            interval_secs: env_parse("REMINDER_INTERVAL_SECS").unwrap_or(defaults.interval_secs),
            utc_offset: match std::env::var("REMINDER_UTC_OFFSET") {
                Ok(raw) => parse_utc_offset(&raw)?,
                Err(_) => defaults.utc_offset,
            },
            toast_secs: env_parse("REMINDER_TOAST_SECS").unwrap_or(defaults.toast_secs),
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            mail,
            push_webhook_url: std::env::var("PUSH_WEBHOOK_URL").ok().filter(|u| !u.is_empty()),
            gemini,
            reminders,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Parses offsets written as `+05:30` / `-08:00`; `Z` and `UTC` mean zero.
pub fn parse_utc_offset(raw: &str) -> anyhow::Result<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        raw,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|e| anyhow::anyhow!("invalid REMINDER_UTC_OFFSET {raw:?}: {e}"))
}
