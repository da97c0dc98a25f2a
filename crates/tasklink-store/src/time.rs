//! Timestamp encoding. Values are stored as fixed-width RFC-3339 text in UTC
//! so lexical order in SQL matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

pub(crate) fn to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse column `idx` of a row as a timestamp.
pub(crate) fn parse(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn parse_opt(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse(idx, &s)).transpose()
}
