//! 📅 Dates — the permissive parser for whatever a date field decided to look like today.
//!
//! Elasticsearch will happily store `2020-06-01`, `2020-05-31T16:00:00Z`,
//! `2020-06-01 08:00:00` and `1590969600000` in the same date field.
//! We read all of them. Strings with no offset are wall-clock time in the
//! configured zone; strings with an offset mean exactly what they say.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

/// 🕰️ Naive date-time layouts, tried in order.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

/// 📆 Date-only layouts. Midnight in the configured zone.
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// 🌐 Layouts that carry their own offset.
const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// 🔎 Parse a date-field value from a document.
///
/// Numbers (and all-digit strings) are epoch timestamps: ten digits or fewer
/// are seconds, more are milliseconds. Returns `None` if nothing fits.
pub fn parse_date_value(value: &Value, zone: Tz) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date_str(s, zone),
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        _ => None,
    }
}

/// 🔎 Parse a date string, permissively.
pub fn parse_date_str(raw: &str, zone: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) && raw.len() != 8 {
        return raw.parse::<i64>().ok().and_then(from_epoch);
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Utc));
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(with_offset) = DateTime::parse_from_str(raw, format) {
            return Some(with_offset.with_timezone(&Utc));
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return localize(naive, zone);
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).and_then(|naive| localize(naive, zone));
        }
    }
    None
}

/// 🌏 Pin a wall-clock time to a zone. DST overlaps pick the earlier instant;
/// DST gaps have no such wall-clock time and yield `None`.
fn localize(naive: NaiveDateTime, zone: Tz) -> Option<DateTime<Utc>> {
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    if n.unsigned_abs() < 10_000_000_000 {
        DateTime::from_timestamp(n, 0)
    } else {
        DateTime::from_timestamp_millis(n)
    }
}

/// 🕰️ The wire format for range bounds: RFC 3339, UTC, millisecond precision.
pub fn format_bound(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
