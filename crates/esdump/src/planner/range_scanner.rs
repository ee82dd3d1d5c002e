//! 🔭 Range Scanner — asks the source for its oldest and newest document.
//!
//! Two single-document sorted queries, one ascending, one descending. The sort
//! value of each answer (epoch millis, straight from the cluster) becomes the
//! discovered min and max; only when there is none is the `_source` value parsed.
//! An empty index answers with silence, and silence is reported as `None`. 🦆

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};
use tracing::debug;

use crate::backends::{SortOrder, Source};
use crate::error::{DumpError, Result};
use crate::planner::dates::parse_date_value;

/// 📊 What the scan found. Either side may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveredBounds {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct RangeScanner<'a> {
    date_field: &'a str,
    zone: Tz,
}

impl<'a> RangeScanner<'a> {
    pub fn new(date_field: &'a str, zone: Tz) -> Self {
        Self { date_field, zone }
    }

    /// 🔭 Query min and max of the date field.
    ///
    /// 💀 `DateParse` when a returned value is present but unreadable.
    pub async fn scan<S>(&self, source: &mut S) -> Result<DiscoveredBounds>
    where
        S: Source + ?Sized,
    {
        let min = self.bound(source, SortOrder::Ascending).await?;
        let max = self.bound(source, SortOrder::Descending).await?;
        debug!("🔭 discovered '{}' bounds: min={:?} max={:?}", self.date_field, min, max);
        Ok(DiscoveredBounds { min, max })
    }

    async fn bound<S>(&self, source: &mut S, order: SortOrder) -> Result<Option<DateTime<Utc>>>
    where
        S: Source + ?Sized,
    {
        let Some(hit) = source.sorted_first(self.date_field, order).await? else {
            return Ok(None);
        };
        match hit.sort_key {
            Some(millis) => DateTime::from_timestamp_millis(millis)
                .map(Some)
                .ok_or_else(|| DumpError::DateParse {
                    field: self.date_field.to_string(),
                    value: millis.to_string(),
                }),
            None => self.date_of(&hit.source),
        }
    }

    /// 📅 Read the date field (dotted paths allowed) out of a document.
    pub(crate) fn date_of(&self, source: &Map<String, Value>) -> Result<Option<DateTime<Utc>>> {
        let Some(value) = field_value(source, self.date_field) else {
            return Ok(None);
        };
        parse_date_value(value, self.zone)
            .map(Some)
            .ok_or_else(|| DumpError::DateParse {
                field: self.date_field.to_string(),
                value: value.to_string(),
            })
    }
}

/// 🔎 Walk a dotted path like `meta.createdAt` through nested objects.
pub(crate) fn field_value<'v>(source: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    // -- 📎 a literal "a.b" key wins over the nested walk
    if let Some(literal) = source.get(path) {
        return Some(literal);
    }
    let mut segments = path.split('.');
    let mut current = source.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
