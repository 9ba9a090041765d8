// crates/scout-briefs/src/errors.rs
// ============================================================================
// Module: Brief Engine Errors
// Description: Error taxonomy for candidate generation, synthesis, and
//              replay.
// Dependencies: scout-core, scout-config, scout-llm, scout-orchestrator
// ============================================================================

use scout_config::ConfigError;
use scout_core::StoreError;
use scout_llm::LlmClientError;
use scout_orchestrator::OrchestratorError;
use thiserror::Error;

/// Errors raised by [`crate::pipeline::BriefEnginePipeline`].
#[derive(Debug, Error)]
pub enum BriefError {
    /// The store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The LLM client failed in a way the pipeline cannot recover from
    /// inline (a single candidate group's synthesis failure is instead
    /// recorded as a failed-counter increment and an audit event).
    #[error(transparent)]
    Llm(#[from] LlmClientError),
    /// A step or audit write through the orchestrator failed.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    /// The scoring policy file failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Join(String),
}
