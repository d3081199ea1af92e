use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::errors::{SnowflakeError, SnowflakeResult};

/// The declared type of a result column.
///
/// Whatever the declared type, every cell arrives as a string (or null);
/// the declared type only tells us how that string was rendered.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Fixed,
    Real,
    Text,
    Binary,
    Boolean,
    Date,
    Time,
    TimestampLtz,
    TimestampNtz,
    TimestampTz,
    #[serde(other)]
    Other,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Fixed => "fixed",
            ColumnKind::Real => "real",
            ColumnKind::Text => "text",
            ColumnKind::Binary => "binary",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Date => "date",
            ColumnKind::Time => "time",
            ColumnKind::TimestampLtz => "timestamp_ltz",
            ColumnKind::TimestampNtz => "timestamp_ntz",
            ColumnKind::TimestampTz => "timestamp_tz",
            ColumnKind::Other => "other",
        }
    }
}

fn expect_kind(
    column: &str,
    actual: &ColumnKind,
    expected: ColumnKind,
) -> SnowflakeResult<()> {
    if *actual == expected {
        Ok(())
    } else {
        Err(SnowflakeError::ColumnType {
            column: column.to_owned(),
            expected: expected.as_str(),
            actual: actual.as_str().to_owned(),
        })
    }
}

/// A `text` column, taken verbatim
pub fn text(column: &str, kind: &ColumnKind, value: &str) -> SnowflakeResult<String> {
    expect_kind(column, kind, ColumnKind::Text)?;
    Ok(value.to_owned())
}

/// A `text` column holding `"true"` / `"false"`; empty is how NULL is rendered
pub fn boolean(column: &str, kind: &ColumnKind, value: &str) -> SnowflakeResult<bool> {
    expect_kind(column, kind, ColumnKind::Text)?;
    parse_bool(column, value)
}

pub(crate) fn parse_bool(column: &str, value: &str) -> SnowflakeResult<bool> {
    match value {
        "true" => Ok(true),
        "" | "false" => Ok(false),
        _ => Err(SnowflakeError::InvalidBool {
            column: column.to_owned(),
            value: value.to_owned(),
        }),
    }
}

/// A `timestamp_ltz` column, rendered as fractional seconds since the epoch
pub fn timestamp_ltz(
    column: &str,
    kind: &ColumnKind,
    value: &str,
) -> SnowflakeResult<Option<DateTime<Utc>>> {
    expect_kind(column, kind, ColumnKind::TimestampLtz)?;
    if value.is_empty() {
        return Ok(None);
    }
    parse_epoch(value)
        .map(Some)
        .ok_or_else(|| SnowflakeError::InvalidTimestamp {
            column: column.to_owned(),
            value: value.to_owned(),
        })
}

/// Parse `"1700000000.500000000"` into a UTC instant.
///
/// Whole seconds and the fraction are split textually so nanoseconds are exact.
pub(crate) fn parse_epoch(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let negative = whole.starts_with('-');
    let mut seconds: i64 = whole.parse().ok()?;
    let mut nanos: u32 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<9}").parse().ok()?
    };
    if negative && nanos > 0 {
        seconds -= 1;
        nanos = 1_000_000_000 - nanos;
    }
    Utc.timestamp_opt(seconds, nanos).single()
}

/// Timestamps as DESCRIBE USER prints them.
///
/// `null` and empty are absent; epoch seconds, `YYYY-MM-DD HH:MM:SS[.fff] [+zzzz]`
/// and RFC 3339 are all seen depending on the session's output format.
pub(crate) fn parse_display_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return None;
    }
    if let Some(instant) = parse_epoch(value) {
        return Some(instant);
    }
    if let Ok(instant) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(instant.with_timezone(&Utc));
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// A display timestamp where one is expected; absent is `None`, anything
/// unparseable is an error
pub(crate) fn display_timestamp(
    column: &str,
    value: &str,
) -> SnowflakeResult<Option<DateTime<Utc>>> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    parse_display_timestamp(trimmed)
        .map(Some)
        .ok_or_else(|| SnowflakeError::InvalidTimestamp {
            column: column.to_owned(),
            value: value.to_owned(),
        })
}
