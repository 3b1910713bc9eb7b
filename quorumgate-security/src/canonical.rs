//! Canonical JSON serialization and SHA-256 hashing.
//!
//! Canonical form: object keys sorted lexicographically, no insignificant
//! whitespace. Two JSON-equivalent values that differ only in key order or
//! formatting produce identical canonical bytes and therefore identical
//! hashes.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Recursively sorts object keys and re-serializes with minimal separators.
pub fn canonical_json(value: &Value) -> String {
    let sorted = sort_keys(value);
    serde_json::to_string(&sorted).expect("canonicalized value is always serializable")
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_keys(v)))
                .collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Lowercase hex SHA-256 digest of the canonical JSON encoding of `value`.
pub fn hash_value(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// Lowercase hex SHA-256 digest of arbitrary bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reordered_keys_hash_identically() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn no_whitespace_in_output() {
        let v = json!({"a": [1, 2, 3]});
        let s = canonical_json(&v);
        assert!(!s.contains(' '));
        assert_eq!(s, "{\"a\":[1,2,3]}");
    }

    #[test]
    fn hash_is_deterministic() {
        let v = json!({"operation": "PING", "target": "svc"});
        assert_eq!(hash_value(&v), hash_value(&v));
    }
}
