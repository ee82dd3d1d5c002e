//! ✂️ Document Projector — keep the fields you asked for, or drop the ones you didn't.
//!
//! 🎬 *[a document walks in with four fields. it walks out with two. nobody asks questions.]*
//!
//! 🧠 Knowledge graph:
//! - Field lists arrive comma-separated (`"id,text"`), get trimmed, and become sets.
//! - Include and exclude are mutually exclusive in effect. When both are supplied,
//!   include wins and excludes are dropped on the floor (with a warning, we're not animals).
//! - Dotted paths (`user.name`) address nested objects, same as `_source` filtering.
//! - The same projection is sent to the source as a `_source` filter, so the cluster
//!   trims bytes before they cross the wire, and applied again locally so every
//!   backend (including the in-memory one) agrees on the result.

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};
use tracing::warn;

/// ✂️ Which fields survive the trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// 🚶 everything passes through untouched
    #[default]
    All,
    /// ✅ exactly these fields, nothing else
    Include(BTreeSet<String>),
    /// 🗑️ everything except these fields
    Exclude(BTreeSet<String>),
}

impl Projection {
    /// 🔧 Split a comma-separated field list. Empty entries vanish; an all-empty list is `None`.
    pub fn parse_field_list(raw: &str) -> Option<BTreeSet<String>> {
        let fields: BTreeSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        if fields.is_empty() { None } else { Some(fields) }
    }

    /// 🎯 Build a projection from optional include/exclude sets. Include wins ties.
    pub fn from_sets(
        includes: Option<BTreeSet<String>>,
        excludes: Option<BTreeSet<String>>,
    ) -> Self {
        match (includes, excludes) {
            (Some(includes), Some(_)) => {
                warn!("⚠️ both includes and excludes were given; includes win, excludes are ignored");
                Projection::Include(includes)
            }
            (Some(includes), None) => Projection::Include(includes),
            (None, Some(excludes)) => Projection::Exclude(excludes),
            (None, None) => Projection::All,
        }
    }

    /// 📡 The `_source` filter to send with the search request, if any.
    pub fn source_filter(&self) -> Option<Value> {
        match self {
            Projection::All => None,
            Projection::Include(fields) => Some(json!({ "includes": fields })),
            Projection::Exclude(fields) => Some(json!({ "excludes": fields })),
        }
    }

    /// ✂️ Apply the projection to one document, the way `_source` filtering does:
    /// patterns match full dotted paths, `*` matches any run of characters, and a
    /// literal `"user.name"` key answers to the same path as a nested `user.name`.
    pub fn apply(&self, source: Map<String, Value>) -> Map<String, Value> {
        match self {
            Projection::All => source,
            Projection::Include(patterns) => include_fields(source, "", patterns),
            Projection::Exclude(patterns) => exclude_fields(source, "", patterns),
        }
    }
}

fn include_fields(map: Map<String, Value>, prefix: &str, patterns: &BTreeSet<String>) -> Map<String, Value> {
    let mut kept = Map::new();
    for (key, value) in map {
        let path = join_path(prefix, &key);
        if matches_any(patterns, &path) {
            kept.insert(key, value);
            continue;
        }
        // -- 🔎 not matched here, but a child might be
        let narrowed = match value {
            Value::Object(child) => {
                let child = include_fields(child, &path, patterns);
                (!child.is_empty()).then_some(Value::Object(child))
            }
            Value::Array(items) => {
                let items: Vec<Value> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(child) => {
                            let child = include_fields(child, &path, patterns);
                            (!child.is_empty()).then_some(Value::Object(child))
                        }
                        _ => None,
                    })
                    .collect();
                (!items.is_empty()).then_some(Value::Array(items))
            }
            _ => None,
        };
        if let Some(value) = narrowed {
            kept.insert(key, value);
        }
    }
    kept
}

fn exclude_fields(map: Map<String, Value>, prefix: &str, patterns: &BTreeSet<String>) -> Map<String, Value> {
    map.into_iter()
        .filter_map(|(key, value)| {
            let path = join_path(prefix, &key);
            if matches_any(patterns, &path) {
                return None;
            }
            let value = match value {
                Value::Object(child) => Value::Object(exclude_fields(child, &path, patterns)),
                Value::Array(items) => Value::Array(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Value::Object(child) => Value::Object(exclude_fields(child, &path, patterns)),
                            other => other,
                        })
                        .collect(),
                ),
                other => other,
            };
            Some((key, value))
        })
        .collect()
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn matches_any(patterns: &BTreeSet<String>, path: &str) -> bool {
    patterns.iter().any(|pattern| wildcard_matches(pattern, path))
}

/// 🃏 `*` matches any run of characters, dots included. Everything else is literal.
fn wildcard_matches(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let &[first, ref middle @ .., last] = parts.as_slice() else {
        return pattern == text;
    };
    if text.len() < first.len() + last.len() || !text.starts_with(first) || !text.ends_with(last) {
        return false;
    }
    let mut rest = &text[first.len()..text.len() - last.len()];
    for &part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn the_usual_suspect() -> Map<String, Value> {
        json!({
            "id": "9seTXHoBNx091WJ2QCh5",
            "createAt": "2020-06-01T00:00:00Z",
            "type": "education",
            "text": "exam day"
        })
        .as_object()
        .cloned()
        .expect("💀 literal is an object")
    }

    fn keys(map: &Map<String, Value>) -> BTreeSet<String> {
        map.keys().cloned().collect()
    }

    fn set(fields: &[&str]) -> BTreeSet<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn the_one_where_include_keeps_exactly_what_was_asked() {
        let projection = Projection::Include(set(&["id", "text"]));
        let projected = projection.apply(the_usual_suspect());
        assert_eq!(keys(&projected), set(&["id", "text"]));
        assert_eq!(projected["text"], json!("exam day"));
    }

    #[test]
    fn the_one_where_exclude_drops_only_the_named() {
        let projection = Projection::Exclude(set(&["text"]));
        let projected = projection.apply(the_usual_suspect());
        assert_eq!(keys(&projected), set(&["id", "createAt", "type"]));
    }

    #[test]
    fn the_one_where_no_projection_is_the_identity() {
        assert_eq!(Projection::All.apply(the_usual_suspect()), the_usual_suspect());
        assert_eq!(Projection::All.source_filter(), None);
    }

    #[test]
    fn the_one_where_include_wins_the_custody_battle() {
        let projection = Projection::from_sets(Some(set(&["id"])), Some(set(&["id", "text"])));
        assert_eq!(projection, Projection::Include(set(&["id"])));
    }

    #[test]
    fn the_one_where_comma_lists_get_tidied() {
        assert_eq!(Projection::parse_field_list(" id , text,,"), Some(set(&["id", "text"])));
        assert_eq!(Projection::parse_field_list(" , "), None);
        assert_eq!(Projection::parse_field_list(""), None);
    }

    #[test]
    fn the_one_where_dotted_paths_reach_into_nested_objects() {
        let doc = json!({"user": {"name": "ada", "email": "a@b"}, "n": 1})
            .as_object()
            .cloned()
            .expect("💀 object");

        let included = Projection::Include(set(&["user.name"])).apply(doc.clone());
        assert_eq!(Value::Object(included), json!({"user": {"name": "ada"}}));

        let excluded = Projection::Exclude(set(&["user.email"])).apply(doc);
        assert_eq!(Value::Object(excluded), json!({"user": {"name": "ada"}, "n": 1}));
    }

    #[test]
    fn the_one_where_wildcards_pick_fields_like_the_cluster_would() {
        let included = Projection::Include(set(&["te*"])).apply(the_usual_suspect());
        assert_eq!(Value::Object(included), json!({"text": "exam day"}));

        let excluded = Projection::Exclude(set(&["*At", "ty*"])).apply(the_usual_suspect());
        assert_eq!(keys(&excluded), set(&["id", "text"]));

        let nested = json!({"user": {"name": "ada", "nick": "a"}, "n": 1})
            .as_object()
            .cloned()
            .expect("💀 object");
        let included = Projection::Include(set(&["user.n*"])).apply(nested);
        assert_eq!(Value::Object(included), json!({"user": {"name": "ada", "nick": "a"}}));
    }

    #[test]
    fn the_one_where_a_dotted_key_is_its_own_path() {
        let doc = json!({"user.name": "ada", "user.email": "a@b", "n": 1})
            .as_object()
            .cloned()
            .expect("💀 object");

        let included = Projection::Include(set(&["user.name"])).apply(doc.clone());
        assert_eq!(Value::Object(included), json!({"user.name": "ada"}));

        let excluded = Projection::Exclude(set(&["user.email"])).apply(doc);
        assert_eq!(keys(&excluded), set(&["n", "user.name"]));
    }

    #[test]
    fn the_one_where_arrays_of_objects_get_filtered_element_by_element() {
        let doc = json!({"tags": [{"k": "a", "v": 1}, {"k": "b", "v": 2}], "n": 1})
            .as_object()
            .cloned()
            .expect("💀 object");
        let included = Projection::Include(set(&["tags.k"])).apply(doc.clone());
        assert_eq!(Value::Object(included), json!({"tags": [{"k": "a"}, {"k": "b"}]}));

        let excluded = Projection::Exclude(set(&["tags.v"])).apply(doc);
        assert_eq!(Value::Object(excluded), json!({"tags": [{"k": "a"}, {"k": "b"}], "n": 1}));
    }

    #[test]
    fn the_one_where_the_star_rules_are_spelled_out() {
        assert!(wildcard_matches("*", "anything.at.all"));
        assert!(wildcard_matches("te*", "text"));
        assert!(wildcard_matches("*at*", "createAt.date"));
        assert!(wildcard_matches("a*b*c", "abc"));
        assert!(!wildcard_matches("a*b*c", "acb"));
        assert!(!wildcard_matches("ab*ab", "ab"));
        assert!(!wildcard_matches("text", "texts"));
    }

    #[test]
    fn the_one_where_the_cluster_gets_the_same_memo() {
        let filter = Projection::Exclude(set(&["text"]))
            .source_filter()
            .expect("💀 filter expected");
        assert_eq!(filter, json!({"excludes": ["text"]}));
    }
}
