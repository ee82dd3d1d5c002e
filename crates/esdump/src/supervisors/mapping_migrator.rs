//! 🗺️ Mapping Migrator — copies the shape of the old index onto the new one.
//!
//! Read the source mapping, dig the right sub-object out of it, make sure the
//! destination index exists, put the mapping. Any failure along the way is fatal;
//! there is no half-migrated mapping.
//!
//! 🧠 Knowledge graph:
//! - A "get mapping" answer is nested as `{index}.mappings.{type}` (typed clusters)
//!   or `{index}.mappings` (typeless ones). Extraction handles both.
//! - When the source url names an alias, the answer is keyed by the concrete index
//!   behind it. A single-key answer is accepted under whatever name it carries.
//! - The mapping is extracted before the destination is touched, so a bad payload
//!   never leaves an empty index behind.

use serde_json::Value;
use tracing::{debug, info};

use crate::backends::{Sink, Source};
use crate::error::{DumpError, Result};

/// 🗺️ Knows which index and type to look for in the source's mapping document.
#[derive(Debug, Clone)]
pub struct MappingMigrator<'a> {
    index_name: &'a str,
    type_name: &'a str,
}

impl<'a> MappingMigrator<'a> {
    pub fn new(index_name: &'a str, type_name: &'a str) -> Self {
        Self {
            index_name,
            type_name,
        }
    }

    /// 🚀 get mapping → extract → create index if absent → put mapping.
    pub async fn migrate<S, K>(&self, source: &mut S, sink: &mut K) -> Result<()>
    where
        S: Source + ?Sized,
        K: Sink + ?Sized,
    {
        let document = source.get_mapping().await?;
        let mapping = self.extract(&document)?;
        debug!("🗺️ extracted mapping for {}/{}: {}", self.index_name, self.type_name, mapping);

        let created = sink.create_index_if_absent().await?;
        if created {
            info!("🏗️ destination index created");
        }
        sink.put_mapping(mapping).await?;
        info!("✅ mapping of '{}' migrated", self.index_name);
        Ok(())
    }

    /// 🔎 Dig the mapping object out of a get-mapping answer.
    ///
    /// 💀 `Schema` when neither `{index}.mappings.{type}` nor a typeless
    /// `{index}.mappings` with `properties` can be found.
    pub fn extract(&self, document: &Value) -> Result<Value> {
        let per_index = self.index_entry(document)?;
        let mappings = per_index
            .get("mappings")
            .filter(|m| m.is_object())
            .ok_or_else(|| {
                DumpError::Schema(format!("'{}' has no 'mappings' object", self.index_name))
            })?;

        if let Some(typed) = mappings.get(self.type_name).filter(|t| t.is_object()) {
            return Ok(typed.clone());
        }
        // -- 🏷️ typeless cluster: the mappings object *is* the mapping
        if mappings.get("properties").is_some() {
            return Ok(mappings.clone());
        }
        Err(DumpError::Schema(format!(
            "no mapping found at '{}.mappings.{}'",
            self.index_name, self.type_name
        )))
    }

    fn index_entry<'d>(&self, document: &'d Value) -> Result<&'d Value> {
        let Some(by_index) = document.as_object() else {
            return Err(DumpError::Schema("the mapping answer is not a JSON object".to_string()));
        };
        if let Some(entry) = by_index.get(self.index_name) {
            return Ok(entry);
        }
        match by_index.values().collect::<Vec<_>>().as_slice() {
            [only] => Ok(*only),
            _ => Err(DumpError::Schema(format!(
                "index '{}' is missing from the mapping answer",
                self.index_name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{InMemorySink, InMemorySource};
    use serde_json::json;

    fn title_mapping() -> Value {
        json!({"properties": {"title": {"type": "text"}, "createAt": {"type": "date"}}})
    }

    #[test]
    fn the_one_where_typed_mappings_are_found_under_their_type() -> Result<()> {
        let document = json!({"old": {"mappings": {"doc": title_mapping()}}});
        assert_eq!(MappingMigrator::new("old", "doc").extract(&document)?, title_mapping());
        Ok(())
    }

    #[test]
    fn the_one_where_typeless_mappings_are_the_mappings() -> Result<()> {
        let document = json!({"old": {"mappings": title_mapping()}});
        assert_eq!(MappingMigrator::new("old", "old").extract(&document)?, title_mapping());
        Ok(())
    }

    #[test]
    fn the_one_where_an_alias_answers_for_its_index() -> Result<()> {
        let document = json!({"old-2020.06": {"mappings": title_mapping()}});
        assert_eq!(MappingMigrator::new("old", "old").extract(&document)?, title_mapping());
        Ok(())
    }

    #[test]
    fn the_one_where_the_wrong_shape_is_a_schema_error() {
        let migrator = MappingMigrator::new("old", "doc");
        for document in [
            json!([]),
            json!({"old": {}}),
            json!({"old": {"mappings": {"other": title_mapping()}}}),
            json!({"a": {}, "b": {}}),
        ] {
            assert!(
                matches!(migrator.extract(&document), Err(DumpError::Schema(_))),
                "💀 expected schema error for {document}"
            );
        }
    }

    #[tokio::test]
    async fn the_one_where_the_destination_gets_the_shape_and_no_docs() -> Result<()> {
        let mut source = InMemorySource::new(
            vec![],
            json!({"old": {"mappings": {"doc": title_mapping()}}}),
            chrono_tz::UTC,
        );
        let mut sink = InMemorySink::new();
        MappingMigrator::new("old", "doc").migrate(&mut source, &mut sink).await?;

        let state = sink.snapshot().await;
        assert!(state.created);
        assert_eq!(state.mappings, vec![title_mapping()]);
        assert!(state.docs.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_bad_mapping_leaves_the_destination_untouched() {
        let mut source = InMemorySource::new(vec![], json!({"old": {}}), chrono_tz::UTC);
        let mut sink = InMemorySink::new();
        let result = MappingMigrator::new("old", "doc").migrate(&mut source, &mut sink).await;
        assert!(matches!(result, Err(DumpError::Schema(_))));
        assert!(!sink.snapshot().await.created);
    }
}
