//! Default merging.
//!
//! Stored data may predate the schema it is read through. Merging fills in
//! every default the stored record lacks while keeping everything the record
//! does have, so new defaults appear on old records without a migration.

use serde_json::{Map, Value as JsonValue};

/// Merge registered `defaults` into a `stored` value.
///
/// - Keys only in `defaults` are added.
/// - Keys in both where both sides are objects are merged recursively.
/// - Keys in both where either side is not an object keep the stored value.
/// - Keys only in `stored` are kept.
///
/// A stored value that is not an object is returned unchanged.
pub fn merge_defaults(stored: JsonValue, defaults: &Map<String, JsonValue>) -> JsonValue {
    match stored {
        JsonValue::Object(mut current) => {
            merge_into(&mut current, defaults);
            JsonValue::Object(current)
        }
        other => other,
    }
}

fn merge_into(current: &mut Map<String, JsonValue>, defaults: &Map<String, JsonValue>) {
    for (key, default) in defaults {
        match current.get_mut(key) {
            None => {
                current.insert(key.clone(), default.clone());
            }
            Some(JsonValue::Object(nested)) => {
                if let JsonValue::Object(nested_defaults) = default {
                    merge_into(nested, nested_defaults);
                }
            }
            Some(_) => {}
        }
    }
}

/// Walk `path` down a defaults tree.
pub(crate) fn default_at<'a>(
    defaults: &'a Map<String, JsonValue>,
    path: &[&str],
) -> Option<&'a JsonValue> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(defaults.get(*first)?, |node, key| node.as_object()?.get(*key))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn obj(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn stored_flags_merge_with_defaults() {
        let defaults = obj(json!({"threshold": 5, "flags": {"a": true, "b": false}}));
        let stored = json!({"flags": {"b": true, "c": 1}});
        assert_eq!(
            merge_defaults(stored, &defaults),
            json!({"threshold": 5, "flags": {"a": true, "b": true, "c": 1}})
        );
    }

    #[test]
    fn stored_scalar_wins_over_default_mapping() {
        let defaults = obj(json!({"flags": {"a": true}}));
        let merged = merge_defaults(json!({"flags": 3}), &defaults);
        assert_eq!(merged, json!({"flags": 3}));
    }

    #[test]
    fn stored_mapping_wins_over_default_scalar() {
        let defaults = obj(json!({"limit": 10}));
        let merged = merge_defaults(json!({"limit": {"soft": 1}}), &defaults);
        assert_eq!(merged, json!({"limit": {"soft": 1}}));
    }

    #[test]
    fn non_object_stored_value_is_untouched() {
        let defaults = obj(json!({"a": 1}));
        assert_eq!(merge_defaults(json!([1, 2]), &defaults), json!([1, 2]));
        assert_eq!(merge_defaults(json!(null), &defaults), json!(null));
    }

    #[test]
    fn deep_nesting_fills_missing_levels() {
        let defaults = obj(json!({"a": {"b": {"c": 1, "d": 2}}}));
        let merged = merge_defaults(json!({"a": {"b": {"c": 9}}}), &defaults);
        assert_eq!(merged, json!({"a": {"b": {"c": 9, "d": 2}}}));
    }

    #[test]
    fn default_at_walks_subtrees() {
        let defaults = obj(json!({"a": {"b": {"c": 1}}, "x": 2}));
        assert_eq!(default_at(&defaults, &["a", "b", "c"]), Some(&json!(1)));
        assert_eq!(default_at(&defaults, &["x"]), Some(&json!(2)));
        assert_eq!(default_at(&defaults, &["x", "y"]), None);
        assert_eq!(default_at(&defaults, &[]), None);
    }

    fn flat_map() -> impl Strategy<Value = Map<String, JsonValue>> {
        prop::collection::btree_map("[a-f]", any::<i32>(), 0..6)
            .prop_map(|m| m.into_iter().map(|(k, v)| (k, json!(v))).collect())
    }

    proptest! {
        #[test]
        fn stored_keys_win_and_default_keys_appear(defaults in flat_map(), stored in flat_map()) {
            let merged = merge_defaults(JsonValue::Object(stored.clone()), &defaults);
            let merged = merged.as_object().unwrap();
            for (k, v) in &stored {
                prop_assert_eq!(merged.get(k), Some(v));
            }
            for (k, v) in &defaults {
                if !stored.contains_key(k) {
                    prop_assert_eq!(merged.get(k), Some(v));
                }
            }
            prop_assert!(merged.keys().all(|k| stored.contains_key(k) || defaults.contains_key(k)));
        }

        #[test]
        fn merging_twice_is_stable(defaults in flat_map(), stored in flat_map()) {
            let once = merge_defaults(JsonValue::Object(stored), &defaults);
            let twice = merge_defaults(once.clone(), &defaults);
            prop_assert_eq!(once, twice);
        }
    }
}
