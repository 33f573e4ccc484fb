//! Field-level three-way merge of screen documents.
//!
//! Used to offer an automatic resolution when a save hits a stale baseline.
//! This is a last-writer-per-path approximation: objects merge key by key,
//! arrays (including component lists) are atomic.

use crate::model::ScreenDocument;
use crate::tree::check_tree_invariants;
use serde_json::{Map, Value};

/// Merge two JSON values that diverged from `base`.
///
/// A side that left a value untouched yields to the other side. When both
/// sides changed an object, keys are merged recursively; any other
/// disagreement goes to `local`.
pub fn merge_values(base: &Value, local: &Value, server: &Value) -> Value {
    if local == base {
        return server.clone();
    }
    if server == base || local == server {
        return local.clone();
    }
    match (base, local, server) {
        (Value::Object(b), Value::Object(l), Value::Object(s)) => {
            Value::Object(merge_maps(b, l, s))
        }
        _ => local.clone(),
    }
}

fn merge_maps(base: &Map<String, Value>, local: &Map<String, Value>, server: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    let keys = local
        .keys()
        .chain(server.keys().filter(|k| !local.contains_key(*k)));
    for key in keys {
        let merged = match (base.get(key), local.get(key), server.get(key)) {
            (Some(b), Some(l), Some(s)) => Some(merge_values(b, l, s)),
            // Added on one or both sides.
            (None, Some(l), Some(s)) => Some(merge_values(&Value::Null, l, s)),
            (None, Some(l), None) => Some(l.clone()),
            (None, None, Some(s)) => Some(s.clone()),
            // Removed on one side: keep the removal unless the other side edited it.
            (Some(b), Some(l), None) => (l != b).then(|| l.clone()),
            (Some(b), None, Some(s)) => (s != b).then(|| s.clone()),
            (_, None, None) => None,
        };
        if let Some(value) = merged {
            out.insert(key.clone(), value);
        }
    }
    out
}

/// Three-way merge of documents. Returns `None` when the merged JSON is not
/// a valid document (e.g. both sides introduced the same component id).
pub fn three_way_merge(
    base: &ScreenDocument,
    local: &ScreenDocument,
    server: &ScreenDocument,
) -> Option<ScreenDocument> {
    let base = serde_json::to_value(base).ok()?;
    let local = serde_json::to_value(local).ok()?;
    let server = serde_json::to_value(server).ok()?;
    let merged: ScreenDocument = serde_json::from_value(merge_values(&base, &local, &server)).ok()?;
    match check_tree_invariants(&merged) {
        Ok(()) => Some(merged),
        Err(err) => {
            log::debug!("auto-merge rejected: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn untouched_side_yields() {
        let base = json!({ "a": 1, "b": 1 });
        let local = json!({ "a": 2, "b": 1 });
        let server = json!({ "a": 1, "b": 3 });
        assert_eq!(merge_values(&base, &local, &server), json!({ "a": 2, "b": 3 }));
    }

    #[test]
    fn conflicting_scalar_goes_to_local() {
        let base = json!({ "name": "A" });
        let local = json!({ "name": "B" });
        let server = json!({ "name": "C" });
        assert_eq!(merge_values(&base, &local, &server), json!({ "name": "B" }));
    }

    #[test]
    fn arrays_are_atomic() {
        let base = json!({ "items": [1, 2] });
        let local = json!({ "items": [1, 2, 3] });
        let server = json!({ "items": [0, 1, 2] });
        assert_eq!(merge_values(&base, &local, &server), json!({ "items": [1, 2, 3] }));
    }

    #[test]
    fn removals_and_additions() {
        let base = json!({ "keep": 1, "gone": 1 });
        let local = json!({ "keep": 1, "new_local": true });
        let server = json!({ "keep": 1, "gone": 1, "new_server": true });
        assert_eq!(
            merge_values(&base, &local, &server),
            json!({ "keep": 1, "new_local": true, "new_server": true })
        );
    }

    #[test]
    fn documents_merge_field_level() {
        let base = ScreenDocument::from_json(
            r#"{ "id": "d", "screenId": "s", "name": "Orders", "title": "t",
                "components": [ { "id": "a", "type": "text" } ] }"#,
        )
        .unwrap();
        let mut local = base.clone();
        local.name = "Orders v2".into();
        let mut server = base.clone();
        server.extra.insert("title".into(), json!("Server title"));
        let merged = three_way_merge(&base, &local, &server).unwrap();
        assert_eq!(merged.name, "Orders v2");
        assert_eq!(merged.extra.get("title"), Some(&json!("Server title")));
        assert_eq!(merged.components, base.components);
    }
}
