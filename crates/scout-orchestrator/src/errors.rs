// crates/scout-orchestrator/src/errors.rs
// ============================================================================
// Module: Orchestrator Errors
// Description: Error taxonomy for run bootstrap, step lifecycle, and audit
//              logging.
// Dependencies: scout-core, thiserror
// ============================================================================

use scout_core::StoreError;
use scout_core::hashing::HashError;
use thiserror::Error;

/// Errors raised by [`crate::orchestrator::RunOrchestrator`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The store rejected a run/step/audit write or read.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Computing the run's config fingerprint failed.
    #[error("config hash: {0}")]
    Hash(#[from] HashError),
    /// The blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Join(String),
}
