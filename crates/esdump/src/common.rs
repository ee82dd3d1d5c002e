//! 📦 Common data structures — the humble carriers of documents between two clusters.
//!
//! A [`Hit`] is one document pulled out of the source, with its `_id` still attached.
//! A [`HitBatch`] is everything one time window produced. It lives exactly as long
//! as that window does, then it is dropped and forgotten, like a sprint goal. 🦆

use serde_json::{Map, Value};

/// 🎯 One document, one destiny.
///
/// `id` is the source `_id`, which becomes the destination `_id` so reruns upsert
/// instead of duplicating. `source` is the `_source` object after projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    /// 🔧 carried over when the source hit had a custom `_routing`
    pub routing: Option<String>,
    pub source: Map<String, Value>,
    /// 🔢 the first `sort` value the source reported, when it sorted by a date:
    /// epoch milliseconds, already normalized by the cluster
    pub sort_key: Option<i64>,
}

impl Hit {
    pub fn new(id: impl Into<String>, source: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            routing: None,
            source,
            sort_key: None,
        }
    }

    /// 🔎 Pull a `Hit` out of a raw search-response hit (`{_id, _source, _routing?}`).
    ///
    /// Returns `None` when the hit has no `_id`, which a real cluster never does.
    /// A missing `_source` (e.g. `_source: false`) yields an empty document.
    pub(crate) fn from_search_hit(raw: &Value) -> Option<Self> {
        let id = match raw.get("_id")? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let source = match raw.get("_source") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let routing = raw
            .get("_routing")
            .and_then(Value::as_str)
            .map(str::to_string);
        let sort_key = raw
            .get("sort")
            .and_then(|sort| sort.get(0))
            .and_then(Value::as_i64);
        Some(Self {
            id,
            routing,
            source,
            sort_key,
        })
    }
}

/// 📦 The documents of one window. Transient by contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitBatch {
    pub hits: Vec<Hit>,
}

impl HitBatch {
    pub fn new(hits: Vec<Hit>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub(crate) fn extend(&mut self, more: Vec<Hit>) {
        self.hits.extend(more);
    }
}
