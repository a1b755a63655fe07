//! Deterministic scene-cache key (§3 invariant 1, §8 invariant 4).
//!
//! `state_hash = H(core_stats ∥ global_flags ∥ story_variables ∥
//! last_choice_index)`, where `H` canonicalises the input (recursively
//! sorted object keys, no insignificant whitespace) before hashing, so the
//! result is stable across restarts, processes and map insertion order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateHash(String);

impl StateHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Computes the hash from the four components named in the invariant.
    /// `core_stats` and `story_variables` are maps; `global_flags` is a set
    /// represented as a sorted vector for canonicalization; `last_choice_index`
    /// is `None` for the initial state (no choice applied yet).
    pub fn compute(
        core_stats: &BTreeMap<String, i64>,
        global_flags: &[String],
        story_variables: &Value,
        last_choice_index: Option<u32>,
    ) -> Self {
        let mut sorted_flags = global_flags.to_vec();
        sorted_flags.sort();

        let composite = serde_json::json!({
            "core_stats": core_stats,
            "global_flags": sorted_flags,
            "story_variables": canonicalize(story_variables),
            "last_choice_index": last_choice_index,
        });

        let canonical_bytes = serde_json::to_vec(&canonicalize(&composite))
            .expect("canonicalized value always serializes");

        let mut hasher = Sha256::new();
        hasher.update(&canonical_bytes);
        Self(hex::encode(hasher.finalize()))
    }
}

impl std::fmt::Display for StateHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StateHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Recursively rewrites a `Value` so that object keys serialize in sorted
/// order. `serde_json::Map` with the `preserve_order` feature disabled
/// already sorts on serialization (`BTreeMap`-backed); we still walk it
/// explicitly so the hash does not depend on which feature set the build
/// happens to enable.
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn stable_across_map_insertion_order() {
        let a = StateHash::compute(
            &stats(&[("courage", 3), ("health", 10)]),
            &["met_wizard".to_string()],
            &json!({"alpha": 1, "beta": 2}),
            Some(4),
        );
        let b = StateHash::compute(
            &stats(&[("health", 10), ("courage", 3)]),
            &["met_wizard".to_string()],
            &json!({"beta": 2, "alpha": 1}),
            Some(4),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn differs_on_choice_index() {
        let a = StateHash::compute(&stats(&[("health", 10)]), &[], &json!({}), Some(1));
        let b = StateHash::compute(&stats(&[("health", 10)]), &[], &json!({}), Some(2));
        assert_ne!(a, b);
    }

    #[test]
    fn flag_set_order_is_insignificant() {
        let a = StateHash::compute(
            &stats(&[]),
            &["zeta".to_string(), "alpha".to_string()],
            &json!({}),
            None,
        );
        let b = StateHash::compute(
            &stats(&[]),
            &["alpha".to_string(), "zeta".to_string()],
            &json!({}),
            None,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn hash_is_hex_sha256_length() {
        let h = StateHash::compute(&stats(&[]), &[], &json!({}), None);
        assert_eq!(h.as_str().len(), 64);
        assert!(h.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
