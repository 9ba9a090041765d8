// crates/scout-core/src/hashing.rs
// ============================================================================
// Module: Canonical Hashing
// Description: Deterministic hashing helpers shared by the store, HTTP cache,
//              and run-configuration fingerprinting.
// Purpose: Guarantee stable digests for cache keys, README content, and
//          config snapshots.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Two hashing needs recur throughout Collaboration Scout: hashing raw bytes
//! (README content, HTTP cache keys) and hashing canonicalized JSON (the
//! run's config fingerprint, the `input_snapshot` stored on an analysis row).
//! Canonicalization uses RFC 8785 (JCS) via `serde_jcs` so that key order
//! never affects the resulting digest.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns the lowercase hex SHA-256 digest of raw bytes.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Returns canonical (RFC 8785) JSON bytes for a serializable value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes canonical JSON for a serializable value, returning the full hex digest.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

/// Hashes canonical JSON and truncates to the first `len_hex_chars` hex
/// characters. Used for the run's short config fingerprint (`spec.md` §4.E:
/// "16-hex-char truncated SHA-256").
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn truncated_config_hash<T: Serialize + ?Sized>(
    value: &T,
    len_hex_chars: usize,
) -> Result<String, HashError> {
    let full = hash_canonical_json(value)?;
    Ok(full.chars().take(len_hex_chars).collect())
}

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Computes the HTTP cache key for a conditional-GET request (`spec.md` §4.C):
/// hex SHA-256 of `"{METHOD} {url} accept={accept}"`.
#[must_use]
pub fn http_cache_key(method: &str, url: &str, accept: &str) -> String {
    sha256_hex(format!("{method} {url} accept={accept}").as_bytes())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use super::*;

    #[test]
    fn sha256_hex_is_64_chars() {
        let digest = sha256_hex(b"hello world");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn canonical_json_is_key_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(hash_canonical_json(&a).expect("hash"), hash_canonical_json(&b).expect("hash"));
    }

    #[test]
    fn truncated_hash_has_requested_length() {
        let value = serde_json::json!({"key": "value"});
        let hash = truncated_config_hash(&value, 16).expect("hash");
        assert_eq!(hash.len(), 16);
    }

    #[test]
    fn cache_key_is_stable_for_identical_inputs() {
        let a = http_cache_key("GET", "https://api.example.com/x", "application/json");
        let b = http_cache_key("GET", "https://api.example.com/x", "application/json");
        assert_eq!(a, b);
        let c = http_cache_key("GET", "https://api.example.com/y", "application/json");
        assert_ne!(a, c);
    }
}
