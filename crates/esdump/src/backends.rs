//! 🔌 Backends — where the real I/O happens.
//!
//! 🚰 Source backends answer questions about the old index and pour its documents out.
//! 🕳️ Sink backends build the new index and swallow documents by `_id`.
//!
//! 🎭 This module is the casting agency. Need to read from a real cluster? Done.
//! Need a cluster that lives entirely in RAM so the tests don't need Docker? Also done.
//!
//! # Knowledge Graph 🧠
//! - Pattern: trait → concrete impls → `SourceBackend` / `SinkBackend` / `PageCursor` enums
//! - `Source`: count, sorted_first, paginate, get_mapping
//! - `Pages`: the lazy one-pass page sequence `paginate` hands back. `None` = done.
//! - `Sink`: create_index_if_absent, put_mapping, bulk_upsert, refresh
//! - Callers hold the enums and never care which cluster is real. 🦆

use async_trait::async_trait;
use serde_json::Value;

use crate::common::Hit;
use crate::error::Result;
use crate::planner::Window;
use crate::transforms::Projection;

pub mod common_config;
pub mod elasticsearch;
pub mod in_mem;

pub use common_config::{CommonSinkConfig, CommonSourceConfig};
pub use elasticsearch::{ElasticsearchScroll, ElasticsearchSink, ElasticsearchSource};
pub use in_mem::{InMemoryPages, InMemorySink, InMemorySource};

/// 🔃 Which end of the date field to look at first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// 📋 Everything a paginated read of one window needs.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub date_field: &'a str,
    pub window: Window,
    pub page_size: usize,
    pub projection: &'a Projection,
}

// ===== Source =====

/// 🚰 The read side of the migration.
///
/// # Contract 📜
/// - Ranges are half-open: `window.start <= date < window.end`.
/// - `sorted_first` returns `Ok(None)` when no document has the field.
/// - `paginate` returns a fresh one-pass cursor. Drain it, then close it.
/// - Pages come back with the request's projection already applied.
#[async_trait]
pub trait Source: std::fmt::Debug + Send {
    /// 🔢 How many documents have the date field inside `window`.
    async fn count(&mut self, date_field: &str, window: &Window) -> Result<u64>;
    /// 🔭 The single best (asc) or worst (desc) document by date field.
    async fn sorted_first(&mut self, date_field: &str, order: SortOrder) -> Result<Option<Hit>>;
    /// 📄 Open a paginated read over one window.
    async fn paginate(&mut self, request: &PageRequest<'_>) -> Result<PageCursor>;
    /// 🗺️ The raw "get mapping" response document.
    async fn get_mapping(&mut self) -> Result<Value>;
}

/// 📄 A lazy, finite, one-pass sequence of pages.
#[async_trait]
pub trait Pages: std::fmt::Debug + Send {
    /// `Ok(Some(page))` while data flows, `Ok(None)` once the well is dry.
    async fn next_page(&mut self) -> Result<Option<Vec<Hit>>>;
    /// 🗑️ Release whatever server-side state the cursor held.
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Source.
#[derive(Debug)]
pub enum SourceBackend {
    InMemory(InMemorySource),
    Elasticsearch(ElasticsearchSource),
}

#[async_trait]
impl Source for SourceBackend {
    async fn count(&mut self, date_field: &str, window: &Window) -> Result<u64> {
        match self {
            SourceBackend::InMemory(s) => s.count(date_field, window).await,
            SourceBackend::Elasticsearch(s) => s.count(date_field, window).await,
        }
    }

    async fn sorted_first(&mut self, date_field: &str, order: SortOrder) -> Result<Option<Hit>> {
        match self {
            SourceBackend::InMemory(s) => s.sorted_first(date_field, order).await,
            SourceBackend::Elasticsearch(s) => s.sorted_first(date_field, order).await,
        }
    }

    async fn paginate(&mut self, request: &PageRequest<'_>) -> Result<PageCursor> {
        match self {
            SourceBackend::InMemory(s) => s.paginate(request).await,
            SourceBackend::Elasticsearch(s) => s.paginate(request).await,
        }
    }

    async fn get_mapping(&mut self) -> Result<Value> {
        match self {
            SourceBackend::InMemory(s) => s.get_mapping().await,
            SourceBackend::Elasticsearch(s) => s.get_mapping().await,
        }
    }
}

/// 🎭 The many faces of a page cursor. Mirrors `SourceBackend`.
#[derive(Debug)]
pub enum PageCursor {
    InMemory(InMemoryPages),
    Elasticsearch(ElasticsearchScroll),
}

#[async_trait]
impl Pages for PageCursor {
    async fn next_page(&mut self) -> Result<Option<Vec<Hit>>> {
        match self {
            PageCursor::InMemory(p) => p.next_page().await,
            PageCursor::Elasticsearch(p) => p.next_page().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            PageCursor::InMemory(p) => p.close().await,
            PageCursor::Elasticsearch(p) => p.close().await,
        }
    }
}

// ===== Sink =====

/// 🕳️ The write side of the migration.
///
/// # Contract 📜
/// - `bulk_upsert` is create-or-replace by `_id`. Running it twice is running it once.
/// - `create_index_if_absent` returns whether it actually created anything.
#[async_trait]
pub trait Sink: std::fmt::Debug + Send {
    async fn create_index_if_absent(&mut self) -> Result<bool>;
    /// 🗺️ Apply an already-extracted mapping object to the destination.
    async fn put_mapping(&mut self, mapping: Value) -> Result<()>;
    async fn bulk_upsert(&mut self, hits: &[Hit]) -> Result<()>;
    /// 🔄 Make everything written so far visible to search.
    async fn refresh(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Sink.
#[derive(Debug)]
pub enum SinkBackend {
    InMemory(InMemorySink),
    Elasticsearch(ElasticsearchSink),
}

#[async_trait]
impl Sink for SinkBackend {
    async fn create_index_if_absent(&mut self) -> Result<bool> {
        match self {
            SinkBackend::InMemory(s) => s.create_index_if_absent().await,
            SinkBackend::Elasticsearch(s) => s.create_index_if_absent().await,
        }
    }

    async fn put_mapping(&mut self, mapping: Value) -> Result<()> {
        match self {
            SinkBackend::InMemory(s) => s.put_mapping(mapping).await,
            SinkBackend::Elasticsearch(s) => s.put_mapping(mapping).await,
        }
    }

    async fn bulk_upsert(&mut self, hits: &[Hit]) -> Result<()> {
        match self {
            SinkBackend::InMemory(s) => s.bulk_upsert(hits).await,
            SinkBackend::Elasticsearch(s) => s.bulk_upsert(hits).await,
        }
    }

    async fn refresh(&mut self) -> Result<()> {
        match self {
            SinkBackend::InMemory(s) => s.refresh().await,
            SinkBackend::Elasticsearch(s) => s.refresh().await,
        }
    }
}
