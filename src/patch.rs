//! Merge-patch for partial updates of JSON documents.
//!
//! Rules, applied per key of the patch:
//! - a key missing from the original is added, unless the patch value is `null`;
//! - a `null` patch value removes the key;
//! - arrays replace the original array wholesale;
//! - objects merge recursively, and a nested object that ends up empty is
//!   removed from its parent;
//! - scalars overwrite scalars of the same kind;
//! - a value of a different kind than the original is ignored and the
//!   original is kept. Callers are not told that the patch value was dropped.

use serde_json::{Map, Value};
use std::mem::discriminant;

/// Merges `patch` into `original`, returning the merged object.
///
/// Neither input is modified.
pub fn merge(original: &Map<String, Value>, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = original.clone();

    for (key, patch_value) in patch {
        match (patch_value, original.get(key)) {
            (Value::Null, None) => {}
            (value, None) => {
                merged.insert(key.clone(), value.clone());
            }
            (Value::Null, Some(_)) => {
                merged.remove(key);
            }
            (Value::Object(nested_patch), Some(Value::Object(nested_original))) => {
                let nested = merge(nested_original, nested_patch);
                if nested.is_empty() {
                    merged.remove(key);
                } else {
                    merged.insert(key.clone(), Value::Object(nested));
                }
            }
            (value, Some(existing)) if same_kind(value, existing) => {
                merged.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }

    merged
}

fn same_kind(a: &Value, b: &Value) -> bool {
    discriminant(a) == discriminant(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    fn check(original: Value, patch: Value, expected: Value) {
        let result = merge(&object(original), &object(patch));
        assert_eq!(Value::Object(result), expected);
    }

    #[test]
    fn test_update_scalar_and_replace_slice() {
        check(
            json!({"myInt": 0, "mySlice": [1, 2, 3]}),
            json!({"myInt": 1, "mySlice": [1, 2, 3]}),
            json!({"myInt": 1, "mySlice": [1, 2, 3]}),
        );
    }

    #[test]
    fn test_slice_is_replaced_not_merged() {
        check(
            json!({"mySlice": [1, 2, 3]}),
            json!({"mySlice": [4]}),
            json!({"mySlice": [4]}),
        );
    }

    #[test]
    fn test_null_removes_field() {
        check(
            json!({"myInt": 0, "myRemove": 999}),
            json!({"myInt": 0, "myRemove": null}),
            json!({"myInt": 0}),
        );
    }

    #[test]
    fn test_empty_nested_object_is_pruned() {
        check(
            json!({"myInt": 0, "myHash": {"myRemove": 999}}),
            json!({"myInt": 0, "myHash": {"myRemove": null}}),
            json!({"myInt": 0}),
        );
    }

    #[test]
    fn test_pruning_propagates_upward() {
        check(
            json!({"a": {"b": {"c": 1}}, "keep": true}),
            json!({"a": {"b": {"c": null}}}),
            json!({"keep": true}),
        );
    }

    #[test]
    fn test_type_mismatch_keeps_original() {
        check(json!({"myInt": 0}), json!({"myInt": "str"}), json!({"myInt": 0}));
        check(
            json!({"myHash": {"a": 1}}),
            json!({"myHash": 5}),
            json!({"myHash": {"a": 1}}),
        );
        check(json!({"mySlice": [1]}), json!({"mySlice": {"a": 1}}), json!({"mySlice": [1]}));
    }

    #[test]
    fn test_null_original_is_not_overwritten() {
        check(json!({"maybe": null}), json!({"maybe": 3}), json!({"maybe": null}));
    }

    #[test]
    fn test_additions_into_empty_original() {
        check(
            json!({}),
            json!({"myInt": 0, "myHash": {"myHash": 999}}),
            json!({"myInt": 0, "myHash": {"myHash": 999}}),
        );
    }

    #[test]
    fn test_null_for_missing_key_is_noop() {
        check(json!({"a": 1}), json!({"b": null}), json!({"a": 1}));
    }

    #[test]
    fn test_empty_patch_changes_nothing() {
        check(json!({"a": 1, "b": {"c": 2}}), json!({}), json!({"a": 1, "b": {"c": 2}}));
    }

    #[test]
    fn test_nested_merge_keeps_siblings() {
        check(
            json!({"h": {"x": 1, "y": 2}}),
            json!({"h": {"y": 3, "z": 4}}),
            json!({"h": {"x": 1, "y": 3, "z": 4}}),
        );
    }

    #[test]
    fn test_inputs_are_untouched() {
        let original = object(json!({"a": 1, "b": 2}));
        let patch = object(json!({"a": null, "c": 3}));
        let _ = merge(&original, &patch);
        assert_eq!(Value::Object(original), json!({"a": 1, "b": 2}));
        assert_eq!(Value::Object(patch), json!({"a": null, "c": 3}));
    }

    #[test]
    fn test_int_and_float_are_same_kind() {
        check(json!({"n": 1}), json!({"n": 2.5}), json!({"n": 2.5}));
    }
}
