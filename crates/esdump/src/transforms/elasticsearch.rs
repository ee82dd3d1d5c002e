//! 📡 Elasticsearch Bulk Transform — formatting documents for the bulk API's peculiar tastes 🚀
//!
//! Rule 1: Two lines per document. Action metadata, then document source. Always.
//! Rule 2: Newline-delimited. Not comma-separated. Not XML. NEWLINES.
//! Rule 3: The trailing newline on the whole body matters. It MATTERS.
//!
//! ## Knowledge Graph 🧠
//! - Action: `index`, create-or-replace by `_id`, which is exactly upsert.
//!   Rerun the migration and the destination ends up the same. Idempotence, baby.
//! - `_type` only shows up for typed destinations (an explicit type, or a pre-7.x cluster).
//! - Trailing newline: NOT included per document; the sink terminates the body.

use serde_json::{Map, Value, json};

use crate::common::Hit;
use crate::error::{DumpError, Result};

/// 🎯 Where the bulk actions point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BulkTarget {
    pub index: String,
    /// 🏷️ `Some` only for typed (pre-7.x style) destinations
    pub doc_type: Option<String>,
}

/// 📡 The format whisperer for `_bulk` upserts.
pub(crate) struct ElasticsearchBulk;

impl ElasticsearchBulk {
    /// 🔄 `{"index":{"_index":..,"_id":..}}\n{...source...}`
    pub(crate) fn transform_hit(hit: &Hit, target: &BulkTarget) -> Result<String> {
        let mut the_action_metadata = Map::new();
        the_action_metadata.insert("_index".to_string(), Value::String(target.index.clone()));
        if let Some(ref doc_type) = target.doc_type {
            the_action_metadata.insert("_type".to_string(), Value::String(doc_type.clone()));
        }
        the_action_metadata.insert("_id".to_string(), Value::String(hit.id.clone()));
        // -- 🔧 routing rides along so the doc lands on the same shard story it came from
        if let Some(ref routing) = hit.routing {
            the_action_metadata.insert("routing".to_string(), Value::String(routing.clone()));
        }

        let the_action_line = json!({ "index": the_action_metadata });
        let the_action_serialized = serde_json::to_string(&the_action_line).map_err(|e| {
            DumpError::Schema(format!("could not serialize bulk action for '{}': {e}", hit.id))
        })?;
        let the_source_serialized = serde_json::to_string(&hit.source).map_err(|e| {
            DumpError::Schema(format!("could not serialize document '{}': {e}", hit.id))
        })?;

        Ok(format!("{the_action_serialized}\n{the_source_serialized}"))
    }

    /// 📦 Render many hits into request bodies, none larger than `max_bytes`
    /// (unless one document alone is larger, in which case it travels solo).
    pub(crate) fn render_bodies(
        hits: &[Hit],
        target: &BulkTarget,
        max_bytes: usize,
    ) -> Result<Vec<String>> {
        let mut bodies = Vec::new();
        let mut current = String::new();
        for hit in hits {
            let pair = Self::transform_hit(hit, target)?;
            // -- 📏 +1 for the newline that terminates the pair
            if !current.is_empty() && current.len() + pair.len() + 1 > max_bytes {
                bodies.push(std::mem::take(&mut current));
            }
            current.push_str(&pair);
            current.push('\n');
        }
        if !current.is_empty() {
            bodies.push(current);
        }
        Ok(bodies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, text: &str) -> Hit {
        Hit::new(
            id,
            json!({ "text": text }).as_object().cloned().expect("💀 object"),
        )
    }

    fn typeless(index: &str) -> BulkTarget {
        BulkTarget {
            index: index.to_string(),
            doc_type: None,
        }
    }

    #[test]
    fn the_one_where_a_hit_becomes_the_sacred_two_lines() -> Result<()> {
        let mut the_hit = hit("doc-42", "towel");
        the_hit.routing = Some("route-66".to_string());
        let out = ElasticsearchBulk::transform_hit(&the_hit, &typeless("dest"))?;
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines.len(), 2, "ES bulk format = exactly two lines. Always.");

        let action: Value = serde_json::from_str(lines[0]).expect("💀 action json");
        assert_eq!(action["index"]["_index"], "dest");
        assert_eq!(action["index"]["_id"], "doc-42");
        assert_eq!(action["index"]["routing"], "route-66");
        assert!(action["index"].get("_type").is_none());
        assert_eq!(lines[1], r#"{"text":"towel"}"#);
        Ok(())
    }

    #[test]
    fn the_one_where_typed_destinations_get_their_type() -> Result<()> {
        let target = BulkTarget {
            index: "dest".to_string(),
            doc_type: Some("doc".to_string()),
        };
        let out = ElasticsearchBulk::transform_hit(&hit("1", "x"), &target)?;
        let action: Value =
            serde_json::from_str(out.split('\n').next().expect("💀 line")).expect("💀 json");
        assert_eq!(action["index"]["_type"], "doc");
        Ok(())
    }

    #[test]
    fn the_one_where_big_batches_get_sliced_into_polite_requests() -> Result<()> {
        let hits: Vec<Hit> = (0..10).map(|i| hit(&i.to_string(), "some text")).collect();
        let one_pair = ElasticsearchBulk::transform_hit(&hits[0], &typeless("d"))?.len() + 1;

        let bodies = ElasticsearchBulk::render_bodies(&hits, &typeless("d"), one_pair * 3)?;
        assert_eq!(bodies.len(), 4, "10 docs at 3 per body = 4 bodies");
        for body in &bodies {
            assert!(body.ends_with('\n'), "every body ends with the sacred newline");
            assert!(body.len() <= one_pair * 3);
        }
        let total_lines: usize = bodies.iter().map(|b| b.lines().count()).sum();
        assert_eq!(total_lines, 20);
        Ok(())
    }

    #[test]
    fn the_one_where_an_oversized_doc_travels_alone() -> Result<()> {
        let hits = vec![hit("a", "x"), hit("b", "y")];
        let bodies = ElasticsearchBulk::render_bodies(&hits, &typeless("d"), 1)?;
        assert_eq!(bodies.len(), 2);
        assert!(ElasticsearchBulk::render_bodies(&[], &typeless("d"), 1)?.is_empty());
        Ok(())
    }
}
