// crates/scout-llm/src/errors.rs
// ============================================================================
// Module: LLM Client Errors
// Description: Error taxonomy for the chat-completion caller.
// Purpose: Distinguish retriable failures (handled internally) from the
//          terminal errors callers must react to.
// Dependencies: scout-core, thiserror
// ============================================================================

use scout_core::TransportError;
use thiserror::Error;

/// Errors raised by [`crate::client::LlmClient`].
#[derive(Debug, Error)]
pub enum LlmClientError {
    /// The transport itself failed on every retry.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// A non-2xx response other than `429` (`spec.md` §4.D: "Non-retriable:
    /// any non-2xx other than 429 → fail with an error carrying status and
    /// body.").
    #[error("upstream returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body, for diagnostics.
        body: String,
    },
    /// Every retry was consumed without a valid response (network failure,
    /// `429`, unparseable transport JSON, missing content field, or content
    /// not itself valid JSON).
    #[error("llm call failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// The last retriable failure's description.
        reason: String,
    },
    /// The response content did not validate against the requested schema.
    #[error("invalid output for schema {schema_id}: {reason}")]
    InvalidOutput {
        /// Which schema validation was attempted against.
        schema_id: &'static str,
        /// Why validation failed.
        reason: String,
    },
    /// Prompt loading or header validation failed.
    #[error("prompt error: {0}")]
    Prompt(String),
}
