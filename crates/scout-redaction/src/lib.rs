// crates/scout-redaction/src/lib.rs
// ============================================================================
// Module: Secret Redactor
// Description: Pure redaction of sensitive fields in nested JSON structures
//              by key-name pattern, run before any write to logs, audit
//              events, or exported bundles.
// Purpose: Give the orchestrator and every client a single place that
//          decides what counts as a secret-shaped key.
// Dependencies: regex, serde_json
// ============================================================================

//! ## Overview
//! [`redact`] walks an arbitrary `serde_json::Value` tree. At each mapping
//! entry it tests the *key name*, case-insensitively, against the fixed set
//! `{token, key, secret, password, authorization}`. If the key matches and
//! the value is a non-empty string, the value is replaced by
//! [`REDACTED_SENTINEL`]. Everything else — non-matching keys, non-string
//! values, sequence elements, primitives, `null` — is either recursed into
//! or passed through unchanged.
//!
//! This is deliberately not a secret-*scanning* tool: it never inspects
//! string contents, only key names. A token sitting under a key named
//! `"value"` passes through untouched. That tradeoff keeps the function
//! pure and its behavior fully determined by the shape of the input, which
//! is what makes replayed audit events byte-identical across runs.

use std::sync::LazyLock;

use regex::Regex;

/// The fixed replacement written in place of a matched secret value.
pub const REDACTED_SENTINEL: &str = "[REDACTED]";

static SENSITIVE_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^.*(token|key|secret|password|authorization).*$")
        .expect("static sensitive-key pattern is valid regex")
});

/// Returns whether `key` should be treated as holding a secret value.
///
/// Matches case-insensitively against any of `token`, `key`, `secret`,
/// `password`, `authorization` appearing anywhere in the key name, so
/// `GITHUB_TOKEN`, `apiKey`, and `Authorization` all match.
#[must_use]
pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEY_PATTERN.is_match(key)
}

/// Redacts sensitive fields from a JSON value, returning a redacted copy.
///
/// Pure and side-effect-free: the input is never mutated in place.
#[must_use]
pub fn redact(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                if is_sensitive_key(k) {
                    out.insert(k.clone(), redact_leaf(v));
                } else {
                    out.insert(k.clone(), redact(v));
                }
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(redact).collect())
        }
        other => other.clone(),
    }
}

/// Redacts the value under a key already known to be sensitive.
///
/// Only non-empty strings are replaced; nested structures under a
/// sensitive key name are still walked (a `"credentials": {...}"` object
/// does not itself get blanked, its string leaves do).
fn redact_leaf(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => {
            serde_json::Value::String(REDACTED_SENTINEL.to_string())
        }
        serde_json::Value::Object(_) | serde_json::Value::Array(_) => redact(value),
        other => other.clone(),
    }
}

/// Redacts a plain string by running [`redact`] through a one-key wrapper.
///
/// Convenience for callers (CLI argument logging, error messages) that hold
/// a bare string under a known sensitive key name rather than a JSON tree.
#[must_use]
pub fn redact_value_for_key(key: &str, value: &str) -> String {
    if is_sensitive_key(key) && !value.is_empty() {
        REDACTED_SENTINEL.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use serde_json::json;

    use super::*;

    #[test]
    fn matches_all_fixed_key_names_case_insensitively() {
        for key in ["token", "TOKEN", "Token", "key", "KEY", "secret", "password", "authorization", "Authorization"] {
            assert!(is_sensitive_key(key), "expected {key} to be sensitive");
        }
        assert!(is_sensitive_key("GITHUB_TOKEN"));
        assert!(is_sensitive_key("apiKey"));
        assert!(is_sensitive_key("x-api-key"));
    }

    #[test]
    fn non_matching_keys_pass_through() {
        for key in ["full_name", "stars", "topics", "pushed_at", "message"] {
            assert!(!is_sensitive_key(key), "expected {key} to be safe");
        }
    }

    #[test]
    fn redacts_top_level_string_value() {
        let input = json!({"github_token": "ghp_abc123", "stars": 42});
        let out = redact(&input);
        assert_eq!(out["github_token"], json!(REDACTED_SENTINEL));
        assert_eq!(out["stars"], json!(42));
    }

    #[test]
    fn recurses_into_nested_maps_and_sequences() {
        let input = json!({
            "meta": {
                "auth": {"password": "hunter2", "note": "ok"},
                "history": [{"secret": "s1"}, {"secret": "s2"}],
            },
            "safe": "visible",
        });
        let out = redact(&input);
        assert_eq!(out["meta"]["auth"]["password"], json!(REDACTED_SENTINEL));
        assert_eq!(out["meta"]["auth"]["note"], json!("ok"));
        assert_eq!(out["meta"]["history"][0]["secret"], json!(REDACTED_SENTINEL));
        assert_eq!(out["meta"]["history"][1]["secret"], json!(REDACTED_SENTINEL));
        assert_eq!(out["safe"], json!("visible"));
    }

    #[test]
    fn empty_string_values_are_left_alone() {
        let input = json!({"token": ""});
        let out = redact(&input);
        assert_eq!(out["token"], json!(""));
    }

    #[test]
    fn non_string_values_under_sensitive_keys_pass_through() {
        let input = json!({"token_count": 3, "key_ids": [1, 2, 3]});
        let out = redact(&input);
        assert_eq!(out["token_count"], json!(3));
        assert_eq!(out["key_ids"], json!([1, 2, 3]));
    }

    #[test]
    fn null_and_primitives_pass_through_unchanged() {
        let input = json!({"a": null, "b": true, "c": 1.5});
        let out = redact(&input);
        assert_eq!(out, input);
    }

    #[test]
    fn no_trace_of_real_secret_value_survives_redaction() {
        let secret = "SENTINEL_TOKEN";
        let input = json!({
            "env": {"GITHUB_TOKEN": secret, "OPENROUTER_API_KEY": "sk-or-v1-deadbeef"},
            "github_token": secret,
        });
        let out = redact(&input);
        let rendered = out.to_string();
        assert!(!rendered.contains(secret));
        assert!(!rendered.contains("sk-or-v1-deadbeef"));
    }

    #[test]
    fn redact_value_for_key_helper_matches_tree_behavior() {
        assert_eq!(redact_value_for_key("password", "hunter2"), REDACTED_SENTINEL);
        assert_eq!(redact_value_for_key("username", "alice"), "alice");
        assert_eq!(redact_value_for_key("password", ""), "");
    }
}
