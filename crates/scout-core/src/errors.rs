// crates/scout-core/src/errors.rs
// ============================================================================
// Module: Shared Error Kinds
// Description: Error variants shared across component boundaries.
// Purpose: Give every crate the same StoreError shape (per spec.md §7) without
//          each crate re-declaring it.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Per the "polymorphism over error kinds" design note (`spec.md` §9), each
//! component defines its own error enum tagged by kind rather than sharing a
//! single catch-all. [`StoreError`] is the one exception: every component
//! that touches the store needs to distinguish the same handful of failure
//! modes, so it lives here instead of being duplicated five times.

use thiserror::Error;

/// Store-layer errors, always fatal to the current step per `spec.md` §7
/// ("StoreError — always fatal to the current step").
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// Underlying I/O or SQLite engine error.
    #[error("store error: {0}")]
    Backend(String),
    /// A foreign-key or uniqueness constraint was violated.
    #[error("store constraint violation: {0}")]
    Constraint(String),
    /// Stored data failed an integrity check (e.g. hash mismatch).
    #[error("store data corrupt: {0}")]
    Corrupt(String),
    /// The store's schema version is not one this binary understands.
    #[error("store schema version mismatch: {0}")]
    VersionMismatch(String),
    /// Caller-supplied data was invalid for the operation requested.
    #[error("store invalid input: {0}")]
    Invalid(String),
}
