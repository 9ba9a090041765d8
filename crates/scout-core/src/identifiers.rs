// crates/scout-core/src/identifiers.rs
// ============================================================================
// Module: Collaboration Scout Identifiers
// Description: Canonical opaque identifiers shared across every component.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Identifiers are opaque wrappers over their underlying representation so
//! that a `RunId` can never be passed where a `BriefId` is expected, even
//! though both are UUIDs on the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Macro: opaque UUID identifier
// ============================================================================

macro_rules! uuid_identifier {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID value.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_identifier!(RunId, "Identifier for a single user-initiated invocation.");
uuid_identifier!(StepId, "Identifier for a named phase inside a run.");
uuid_identifier!(QueryId, "Identifier for a GitHub search issued during a run.");
uuid_identifier!(BriefId, "Identifier for a 2-4 repo collaboration brief.");

/// Canonical `owner/name` repository identifier.
///
/// # Invariants
/// - Always contains exactly one `/` separating owner and name.
/// - Case is preserved verbatim as returned by the upstream API; comparisons
///   are case-sensitive because GitHub full names are case-preserving but
///   not normalized by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(String);

impl RepoId {
    /// Builds a repo id from an `owner/name` string.
    ///
    /// Returns `None` when the string does not contain exactly one `/` with
    /// non-empty components on both sides.
    #[must_use]
    pub fn parse(full_name: &str) -> Option<Self> {
        let mut parts = full_name.split('/');
        let owner = parts.next()?;
        let name = parts.next()?;
        if owner.is_empty() || name.is_empty() || parts.next().is_some() {
            return None;
        }
        Some(Self(full_name.to_string()))
    }

    /// Returns the canonical `owner/name` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Keyword row identifier: a deterministic hash of `(run, repo, keyword, kind)`.
///
/// # Invariants
/// - Stable across re-computation given the same inputs (enables idempotent
///   re-insertion without duplicate rows).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordId(String);

impl KeywordId {
    /// Derives a keyword id from its composite key.
    #[must_use]
    pub fn derive(run_id: RunId, repo_id: Option<&RepoId>, kind: &str, term: &str) -> Self {
        use sha2::Digest;
        let mut hasher = sha2::Sha256::new();
        hasher.update(run_id.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(repo_id.map(RepoId::as_str).unwrap_or("").as_bytes());
        hasher.update(b"|");
        hasher.update(kind.as_bytes());
        hasher.update(b"|");
        hasher.update(term.as_bytes());
        let digest = hasher.finalize();
        Self(crate::hashing::hex_encode(&digest))
    }

    /// Returns the hex-encoded identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeywordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use super::*;

    #[test]
    fn repo_id_requires_single_slash() {
        assert!(RepoId::parse("owner/name").is_some());
        assert!(RepoId::parse("owner/name/extra").is_none());
        assert!(RepoId::parse("owner").is_none());
        assert!(RepoId::parse("/name").is_none());
        assert!(RepoId::parse("owner/").is_none());
    }

    #[test]
    fn keyword_id_is_deterministic() {
        let run = RunId::new();
        let repo = RepoId::parse("acme/widgets").expect("valid repo id");
        let a = KeywordId::derive(run, Some(&repo), "primary", "vector");
        let b = KeywordId::derive(run, Some(&repo), "primary", "vector");
        assert_eq!(a, b);
        let c = KeywordId::derive(run, None, "primary", "vector");
        assert_ne!(a, c);
    }

    #[test]
    fn run_id_roundtrips_through_string() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("uuid parses");
        assert_eq!(id, parsed);
    }
}
