//! 🗓️ Time Window Planner — decides which slice of history gets migrated.
//!
//! 🎬 *[two bounds walk into a bar. one of them is missing. the bartender asks the data.]*
//!
//! 🧠 Knowledge graph:
//! - User bounds win. Missing bounds are discovered by the [`range_scanner`].
//! - A discovered maximum is nudged forward by one second so the newest document
//!   survives the half-open `[start, end)` interval.
//! - Every instant is a `DateTime<Utc>`: UTC is the single reference zone the
//!   range queries speak, whatever zone the field values were written in.
//! - An empty source during discovery means "nothing to migrate", not an error.

pub mod dates;
pub mod range_scanner;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use std::fmt;
use tracing::{info, warn};

use crate::backends::Source;
use crate::error::{DumpError, Result};
use range_scanner::RangeScanner;

/// 📏 The run's half-open `[start, end)` interval. `start < end`, always.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// 🔒 The only door in. Refuses empty or inverted ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(DumpError::EmptyRange(format!(
                "start {start} is not before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// 🪟 The whole range as one window, for `count`.
    pub fn as_window(&self) -> Window {
        Window {
            start: self.start,
            end: self.end,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            dates::format_bound(&self.start),
            dates::format_bound(&self.end)
        )
    }
}

/// 🪟 One sub-interval of a [`TimeRange`], processed as a single read/write unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start <= *instant && *instant < self.end
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            dates::format_bound(&self.start),
            dates::format_bound(&self.end)
        )
    }
}

/// 📋 What the planner needs to know.
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub date_field: &'a str,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub zone: Tz,
}

/// 🗓️ Produce the run's [`TimeRange`], or `None` when there is nothing to migrate.
///
/// 💀 `EmptyRange` when a user bound and a discovered bound cross each other.
pub async fn plan_time_range<S>(request: &PlanRequest<'_>, source: &mut S) -> Result<Option<TimeRange>>
where
    S: Source + ?Sized,
{
    let (start, end) = match (request.start, request.end) {
        (Some(start), Some(end)) => (start, end),
        (user_start, user_end) => {
            let discovered = RangeScanner::new(request.date_field, request.zone)
                .scan(source)
                .await?;
            let start = match user_start.or(discovered.min) {
                Some(start) => start,
                None => {
                    warn!("⚠️ no minimum '{}' found in the source; nothing to migrate", request.date_field);
                    return Ok(None);
                }
            };
            let end = match user_end {
                Some(end) => end,
                None => match discovered.max {
                    // -- ⏱️ +1s so the newest doc is inside [start, end)
                    Some(max) => max.checked_add_signed(TimeDelta::seconds(1)).ok_or_else(|| {
                        DumpError::EmptyRange(format!(
                            "the newest '{}' value {max} leaves no room for an exclusive end",
                            request.date_field
                        ))
                    })?,
                    None => {
                        warn!("⚠️ no maximum '{}' found in the source; nothing to migrate", request.date_field);
                        return Ok(None);
                    }
                },
            };
            (start, end)
        }
    };

    let range = TimeRange::new(start, end)?;
    info!("🗓️ planned time range {range}");
    Ok(Some(range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::in_mem::InMemorySource;
    use crate::common::Hit;
    use serde_json::json;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("💀 rfc3339 literal")
            .with_timezone(&Utc)
    }

    fn three_docs_source() -> InMemorySource {
        let docs = [
            ("1", "2020-06-01T00:00:00Z"),
            ("2", "2020-06-20T00:00:00Z"),
            ("3", "2020-07-10T00:00:00Z"),
        ]
        .into_iter()
        .map(|(id, at)| {
            Hit::new(
                id,
                json!({"createAt": at}).as_object().cloned().expect("💀 object"),
            )
        })
        .collect();
        InMemorySource::new(docs, json!({}), chrono_tz::UTC)
    }

    fn request(start: Option<&str>, end: Option<&str>) -> PlanRequest<'static> {
        PlanRequest {
            date_field: "createAt",
            start: start.map(utc),
            end: end.map(utc),
            zone: chrono_tz::UTC,
        }
    }

    #[tokio::test]
    async fn the_one_where_the_end_is_discovered_one_second_late() -> Result<()> {
        let mut source = three_docs_source();
        let range = plan_time_range(&request(Some("2020-06-01T00:00:00Z"), None), &mut source)
            .await?
            .expect("💀 range expected");
        assert_eq!(range.start(), utc("2020-06-01T00:00:00Z"));
        assert_eq!(range.end(), utc("2020-07-10T00:00:01Z"));
        assert!(range.as_window().contains(&utc("2020-07-10T00:00:00Z")));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_both_bounds_are_discovered() -> Result<()> {
        let mut source = three_docs_source();
        let range = plan_time_range(&request(None, None), &mut source)
            .await?
            .expect("💀 range expected");
        assert_eq!(range.start(), utc("2020-06-01T00:00:00Z"));
        assert_eq!(range.end(), utc("2020-07-10T00:00:01Z"));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_user_bounds_skip_the_scan_entirely() -> Result<()> {
        let mut source = InMemorySource::new(vec![], json!({}), chrono_tz::UTC);
        let range = plan_time_range(
            &request(Some("2020-06-01T00:00:00Z"), Some("2020-07-01T00:00:00Z")),
            &mut source,
        )
        .await?
        .expect("💀 range expected");
        assert_eq!(range.end(), utc("2020-07-01T00:00:00Z"));
        assert_eq!(source.sorted_queries(), 0, "no scan when both bounds are known");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_empty_source_means_nothing_to_do() -> Result<()> {
        let mut source = InMemorySource::new(vec![], json!({}), chrono_tz::UTC);
        assert_eq!(plan_time_range(&request(None, None), &mut source).await?, None);
        assert_eq!(
            plan_time_range(&request(Some("2020-06-01T00:00:00Z"), None), &mut source).await?,
            None
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_late_start_crosses_the_discovered_end() {
        let mut source = three_docs_source();
        let err = plan_time_range(&request(Some("2021-01-01T00:00:00Z"), None), &mut source)
            .await
            .expect_err("💀 crossing bounds should fail");
        assert!(matches!(err, DumpError::EmptyRange(_)));
    }

    #[tokio::test]
    async fn the_one_where_the_end_of_time_has_no_second_after_it() {
        let last_millis = DateTime::<Utc>::MAX_UTC.timestamp_millis();
        let docs = vec![Hit::new(
            "omega",
            json!({"createAt": last_millis}).as_object().cloned().expect("💀 object"),
        )];
        let mut source = InMemorySource::new(docs, json!({}), chrono_tz::UTC);
        let err = plan_time_range(&request(Some("2020-06-01T00:00:00Z"), None), &mut source)
            .await
            .expect_err("💀 no exclusive end past the calendar");
        assert!(matches!(err, DumpError::EmptyRange(ref msg) if msg.contains("createAt")));
    }

    #[test]
    fn the_one_where_time_ranges_refuse_to_be_empty() {
        let t = utc("2020-06-01T00:00:00Z");
        assert!(matches!(TimeRange::new(t, t), Err(DumpError::EmptyRange(_))));
        assert!(TimeRange::new(t, t + TimeDelta::seconds(1)).is_ok());
    }
}
