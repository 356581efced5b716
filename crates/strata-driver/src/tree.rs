//! Path operations on a nested JSON tree.
//!
//! Both bundled drivers keep their data as one `serde_json` object tree and
//! address it with a list of segments. Intermediate nodes are objects;
//! writing below a non-object replaces it with an object.

use serde_json::{Map, Value as JsonValue};

/// Borrow the node at `path`, if present.
pub fn get_at<'a>(root: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    path.iter()
        .try_fold(root, |node, segment| node.as_object()?.get(*segment))
}

/// Store `value` at `path`, creating intermediate objects as needed.
pub fn set_at(root: &mut JsonValue, path: &[&str], value: JsonValue) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };
    let mut node = root;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
    }
    ensure_object(node).insert(last.to_string(), value);
}

/// Remove the node at `path`. Returns `true` if something was removed.
///
/// Clearing the empty path empties the whole tree.
pub fn clear_at(root: &mut JsonValue, path: &[&str]) -> bool {
    let Some((last, parents)) = path.split_last() else {
        let had_data = root.as_object().is_some_and(|m| !m.is_empty());
        *root = JsonValue::Object(Map::new());
        return had_data;
    };
    let mut node = root;
    for segment in parents {
        match node.as_object_mut().and_then(|m| m.get_mut(*segment)) {
            Some(next) => node = next,
            None => return false,
        }
    }
    node.as_object_mut()
        .is_some_and(|m| m.remove(*last).is_some())
}

fn ensure_object(node: &mut JsonValue) -> &mut Map<String, JsonValue> {
    if !node.is_object() {
        *node = JsonValue::Object(Map::new());
    }
    match node {
        JsonValue::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}
