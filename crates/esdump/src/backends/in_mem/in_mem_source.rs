use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::backends::{PageCursor, PageRequest, Pages, SortOrder, Source};
use crate::common::Hit;
use crate::error::Result;
use crate::planner::Window;
use crate::planner::dates::parse_date_value;
use crate::planner::range_scanner::field_value;

/// 📦 A whole index that fits in a `Vec`. Ambitious? No. Honest? Yes.
///
/// Documents whose date field is missing or unreadable are invisible to range
/// queries and sorted lookups, the same way a real cluster ignores them for
/// `range` and `exists` queries.
///
/// 🔢 `sorted_queries` counts how many times somebody asked for the oldest or
/// newest doc. Tests use it to prove the planner didn't scan when it shouldn't.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    docs: Vec<Hit>,
    mapping: Value,
    zone: Tz,
    sorted_queries: usize,
}

impl InMemorySource {
    /// 🚀 `mapping` is the raw get-mapping response this source pretends to return.
    pub fn new(docs: Vec<Hit>, mapping: Value, zone: Tz) -> Self {
        Self {
            docs,
            mapping,
            zone,
            sorted_queries: 0,
        }
    }

    pub fn sorted_queries(&self) -> usize {
        self.sorted_queries
    }

    fn date_of(&self, hit: &Hit, date_field: &str) -> Option<DateTime<Utc>> {
        field_value(&hit.source, date_field).and_then(|v| parse_date_value(v, self.zone))
    }

    /// 🔎 Every doc inside `window`, oldest first. Ties keep insertion order.
    fn in_window<'s>(&'s self, date_field: &str, window: &Window) -> Vec<(DateTime<Utc>, &'s Hit)> {
        let mut matching: Vec<_> = self
            .docs
            .iter()
            .filter_map(|hit| self.date_of(hit, date_field).map(|at| (at, hit)))
            .filter(|(at, _)| window.contains(at))
            .collect();
        matching.sort_by_key(|(at, _)| *at);
        matching
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn count(&mut self, date_field: &str, window: &Window) -> Result<u64> {
        Ok(self.in_window(date_field, window).len() as u64)
    }

    async fn sorted_first(&mut self, date_field: &str, order: SortOrder) -> Result<Option<Hit>> {
        self.sorted_queries += 1;
        let dated = self
            .docs
            .iter()
            .filter_map(|hit| self.date_of(hit, date_field).map(|at| (at, hit)));
        // -- 🎯 min_by_key keeps the first of equals, max_by_key the last. Close enough to a cluster.
        let best = match order {
            SortOrder::Ascending => dated.min_by_key(|(at, _)| *at),
            SortOrder::Descending => dated.max_by_key(|(at, _)| *at),
        };
        Ok(best.map(|(at, hit)| Hit {
            sort_key: Some(at.timestamp_millis()),
            ..hit.clone()
        }))
    }

    async fn paginate(&mut self, request: &PageRequest<'_>) -> Result<PageCursor> {
        let page_size = request.page_size.max(1);
        let projected: Vec<Hit> = self
            .in_window(request.date_field, &request.window)
            .into_iter()
            .map(|(_, hit)| Hit {
                id: hit.id.clone(),
                routing: hit.routing.clone(),
                source: request.projection.apply(hit.source.clone()),
                sort_key: None,
            })
            .collect();
        let pages = projected
            .chunks(page_size)
            .map(<[Hit]>::to_vec)
            .collect::<VecDeque<_>>();
        Ok(PageCursor::InMemory(InMemoryPages { pages }))
    }

    async fn get_mapping(&mut self) -> Result<Value> {
        Ok(self.mapping.clone())
    }
}

/// 📄 Pre-chunked pages, handed out front to back. No server, no scroll id, no drama.
#[derive(Debug, Default)]
pub struct InMemoryPages {
    pages: VecDeque<Vec<Hit>>,
}

#[async_trait]
impl Pages for InMemoryPages {
    async fn next_page(&mut self) -> Result<Option<Vec<Hit>>> {
        Ok(self.pages.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        self.pages.clear();
        Ok(())
    }
}
