//! Deterministic cache key derivation.
//!
//! Keys have the shape `{prefix}:{user_id}:{contact_id}:{sha256_hex}` where the
//! hash is taken over the canonical JSON form of the request context. Object
//! keys are sorted at every nesting level, so two contexts holding the same
//! key/value pairs produce the same cache key regardless of insertion order.
//!
//! Identifier segments are percent-encoded when they contain `%`, `:` or a
//! glob metacharacter, so every key splits back into exactly one
//! `(user, contact)` pair and invalidation patterns match literally.

use std::borrow::Cow;
use std::fmt::Write as _;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Prefix used for generated email template responses.
pub const DEFAULT_KEY_PREFIX: &str = "email:template";

/// Derives the cache key for a `(user, contact, context)` triple.
///
/// Pure and side-effect free.
#[must_use]
pub fn cache_key(prefix: &str, user_id: &str, contact_id: &str, context: &Value) -> String {
    let digest = Sha256::digest(canonical_json(context).as_bytes());
    format!("{}{digest:x}", pair_prefix(prefix, user_id, contact_id))
}

/// Returns the glob pattern matching every key of a `(user, contact)` pair.
#[must_use]
pub fn invalidation_pattern(prefix: &str, user_id: &str, contact_id: &str) -> String {
    format!("{}*", pair_prefix(prefix, user_id, contact_id))
}

/// Returns true if `key` was derived by [`cache_key`] for exactly this pair.
#[must_use]
pub fn belongs_to(key: &str, prefix: &str, user_id: &str, contact_id: &str) -> bool {
    key.strip_prefix(pair_prefix(prefix, user_id, contact_id).as_str())
        .is_some_and(|hash| {
            hash.len() == 64 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        })
}

fn pair_prefix(prefix: &str, user_id: &str, contact_id: &str) -> String {
    format!(
        "{prefix}:{}:{}:",
        encode_segment(user_id),
        encode_segment(contact_id)
    )
}

fn encode_segment(segment: &str) -> Cow<'_, str> {
    const RESERVED: &[u8] = b"%:*?[]";
    if !segment.bytes().any(|b| RESERVED.contains(&b)) {
        return Cow::Borrowed(segment);
    }

    let mut encoded = String::with_capacity(segment.len() + 8);
    for ch in segment.chars() {
        match u8::try_from(ch) {
            Ok(byte) if RESERVED.contains(&byte) => {
                let _ = write!(encoded, "%{byte:02X}");
            }
            _ => encoded.push(ch),
        }
    }
    Cow::Owned(encoded)
}

/// Serializes a JSON value with object keys sorted recursively.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn object_from(pairs: &[(String, i64)]) -> Value {
        let mut map = Map::new();
        for (k, v) in pairs {
            map.insert(k.clone(), json!(v));
        }
        Value::Object(map)
    }

    #[test]
    fn test_key_shape() {
        let key = cache_key(DEFAULT_KEY_PREFIX, "user-1", "contact-9", &json!({"tone": "warm"}));
        let parts: Vec<&str> = key.split(':').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "email");
        assert_eq!(parts[1], "template");
        assert_eq!(parts[2], "user-1");
        assert_eq!(parts[3], "contact-9");
        assert_eq!(parts[4].len(), 64);
        assert!(parts[4].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_nested_objects_are_sorted() {
        let a = json!({"outer": {"b": 1, "a": [ {"y": 2, "x": 1} ]}, "first": true});
        assert_eq!(
            canonical_json(&a),
            r#"{"first":true,"outer":{"a":[{"x":1,"y":2}],"b":1}}"#
        );
    }

    #[test]
    fn test_key_depends_on_user_and_contact() {
        let ctx = json!({"purpose": "follow-up"});
        let base = cache_key(DEFAULT_KEY_PREFIX, "u1", "c1", &ctx);
        assert_ne!(base, cache_key(DEFAULT_KEY_PREFIX, "u2", "c1", &ctx));
        assert_ne!(base, cache_key(DEFAULT_KEY_PREFIX, "u1", "c2", &ctx));
    }

    #[test]
    fn test_invalidation_pattern_matches_keys() {
        let key = cache_key(DEFAULT_KEY_PREFIX, "u1", "c1", &json!({}));
        let pattern = invalidation_pattern(DEFAULT_KEY_PREFIX, "u1", "c1");
        assert!(crate::glob_match(&pattern, &key));
        assert!(!crate::glob_match(
            &invalidation_pattern(DEFAULT_KEY_PREFIX, "u1", "c10"),
            &key
        ));
    }

    #[test]
    fn test_colons_in_ids_do_not_alias_pairs() {
        let ctx = json!({"v": 1});
        let a = cache_key(DEFAULT_KEY_PREFIX, "u1:c1", "x", &ctx);
        let b = cache_key(DEFAULT_KEY_PREFIX, "u1", "c1:x", &ctx);
        assert_ne!(a, b);
        assert!(a.starts_with("email:template:u1%3Ac1:x:"));

        let pattern = invalidation_pattern(DEFAULT_KEY_PREFIX, "u1", "c1");
        assert!(!crate::glob_match(&pattern, &a));
        assert!(!crate::glob_match(&pattern, &b));
        assert!(!belongs_to(&a, DEFAULT_KEY_PREFIX, "u1", "c1"));
        assert!(belongs_to(&a, DEFAULT_KEY_PREFIX, "u1:c1", "x"));
    }

    #[test]
    fn test_glob_characters_in_ids_are_literal() {
        let victim = cache_key(DEFAULT_KEY_PREFIX, "u1", "c1", &json!({}));
        let pattern = invalidation_pattern(DEFAULT_KEY_PREFIX, "u?", "c*");
        assert_eq!(pattern, "email:template:u%3F:c%2A:*");
        assert!(!crate::glob_match(&pattern, &victim));

        let own = cache_key(DEFAULT_KEY_PREFIX, "u?", "c*", &json!({}));
        assert!(crate::glob_match(&pattern, &own));
        assert!(belongs_to(&own, DEFAULT_KEY_PREFIX, "u?", "c*"));
    }

    #[test]
    fn test_belongs_to_requires_hash_suffix() {
        let key = cache_key(DEFAULT_KEY_PREFIX, "u1", "c1", &json!({}));
        assert!(belongs_to(&key, DEFAULT_KEY_PREFIX, "u1", "c1"));
        assert!(!belongs_to("email:template:u1:c1:x:abc", DEFAULT_KEY_PREFIX, "u1", "c1"));
        assert!(!belongs_to(&key.to_uppercase(), DEFAULT_KEY_PREFIX, "u1", "c1"));
        assert!(!belongs_to(&key, "other", "u1", "c1"));
    }

    proptest! {
        #[test]
        fn prop_key_ignores_insertion_order(
            pairs in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..8)
        ) {
            let forward: Vec<(String, i64)> = pairs.clone().into_iter().collect();
            let mut reversed = forward.clone();
            reversed.reverse();

            let a = cache_key(DEFAULT_KEY_PREFIX, "u", "c", &object_from(&forward));
            let b = cache_key(DEFAULT_KEY_PREFIX, "u", "c", &object_from(&reversed));
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_key_changes_with_any_value(
            pairs in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 1..8),
            bump in 1i64..1000,
        ) {
            let original: Vec<(String, i64)> = pairs.into_iter().collect();
            let mut changed = original.clone();
            changed[0].1 = changed[0].1.wrapping_add(bump);

            let a = cache_key(DEFAULT_KEY_PREFIX, "u", "c", &object_from(&original));
            let b = cache_key(DEFAULT_KEY_PREFIX, "u", "c", &object_from(&changed));
            prop_assert_ne!(a, b);
        }
    }
}
