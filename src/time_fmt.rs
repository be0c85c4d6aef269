//! Serde formats for the calendar values exchanged with clients.

use time::{format_description::FormatItem, macros::format_description, Date};

pub const ISO_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");

pub mod iso_date_option {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    use super::ISO_DATE;

    pub fn serialize<S: Serializer>(value: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => {
                let text = d.format(ISO_DATE).map_err(serde::ser::Error::custom)?;
                s.serialize_some(&text)
            }
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Date>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => Date::parse(text, ISO_DATE)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Formats a date the way it is stored and shown (`YYYY-MM-DD`).
pub fn format_date(date: Date) -> String {
    date.format(ISO_DATE).unwrap_or_else(|_| date.to_string())
}
