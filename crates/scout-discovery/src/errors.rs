// crates/scout-discovery/src/errors.rs
// ============================================================================
// Module: Discovery Pipeline Errors
// Description: Error taxonomy for pass 1, analysis, keyword aggregation, and
//              pass 2.
// Dependencies: scout-core, scout-http, scout-llm, scout-orchestrator
// ============================================================================

use scout_core::StoreError;
use scout_core::hashing::HashError;
use scout_http::HttpClientError;
use scout_llm::LlmClientError;
use scout_orchestrator::OrchestratorError;
use thiserror::Error;

/// Errors raised by [`crate::pipeline::DiscoveryPipeline`].
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The GitHub client failed in a way the pipeline cannot recover from
    /// inline (a single repo hydration failure is handled as an audit event
    /// instead; this variant is for failures the pipeline itself cannot
    /// attribute to one repo, such as the rate-limit snapshot call).
    #[error(transparent)]
    Http(#[from] HttpClientError),
    /// The LLM client failed in a way the pipeline cannot recover from
    /// inline.
    #[error(transparent)]
    Llm(#[from] LlmClientError),
    /// A step or audit write through the orchestrator failed.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    /// Hashing a value for a deterministic id or fingerprint failed.
    #[error("hash: {0}")]
    Hash(#[from] HashError),
    /// A blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Join(String),
    /// An upstream payload (search result, README envelope) was shaped in a
    /// way the pipeline cannot interpret.
    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),
}
