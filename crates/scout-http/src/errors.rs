// crates/scout-http/src/errors.rs
// ============================================================================
// Module: HTTP Client Errors
// Description: Error taxonomy for the GitHub client.
// Purpose: Give callers a typed way to distinguish transport failure, rate
//          limit exhaustion, and upstream status failures.
// Dependencies: scout-core, thiserror
// ============================================================================

use scout_core::StoreError;
use scout_core::TransportError;
use thiserror::Error;

/// Errors raised by [`crate::client::GithubClient`].
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The transport itself failed (DNS, connect, TLS, I/O).
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// Retries against a rate-limited or secondary-rate-limited response were
    /// exhausted (`spec.md` §4.C: "Limit retries to three per request; exhaust
    /// → fail with a distinct rate-limit error kind.").
    #[error("rate limit exhausted after {attempts} attempts on the {bucket} bucket")]
    RateLimited {
        /// The bucket that was exhausted.
        bucket: &'static str,
        /// Number of attempts made before giving up.
        attempts: u32,
    },
    /// A non-2xx response: either immediate (anything other than
    /// 429/403/5xx) or the last observed status once `5xx` retries were
    /// exhausted.
    #[error("upstream returned status {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The raw response body, for diagnostics.
        body: String,
    },
    /// A `2xx` response body could not be parsed as JSON when JSON was
    /// expected.
    #[error("response body was not valid json: {0}")]
    Json(String),
    /// The store returned an error while reading or writing the cache.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Join(String),
}
