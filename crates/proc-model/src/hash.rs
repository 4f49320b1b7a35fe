//! Stable content fingerprinting for canonical records (spec.md §4.4 step 3).

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Recursively re-encode `value` with object keys sorted, so that two
/// records equal under deep value comparison (ignoring field order)
/// serialize identically. Numbers and strings are left as-is; arrays keep
/// their order since the canonical record never carries arrays at leaf
/// positions (spec.md §4.1).
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            serde_json::to_value(sorted).expect("BTreeMap<String, Value> always serializes")
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// `content_hash` over a canonical record with optional fields normalized
/// (sorted keys, stable primitives). Used for dedup detection (spec.md
/// §4.4 step 6, property 7).
pub fn content_hash(record: &Value) -> String {
    let canonical = canonicalize(record);
    let bytes = serde_json::to_vec(&canonical).expect("canonicalized value always serializes");
    let digest = Sha256::digest(&bytes);
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_hash() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn differing_values_hash_differently() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn nested_object_key_order_is_normalized() {
        let a = json!({"outer": {"y": 1, "x": 2}});
        let b = json!({"outer": {"x": 2, "y": 1}});
        assert_eq!(content_hash(&a), content_hash(&b));
    }
}
