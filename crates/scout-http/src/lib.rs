// crates/scout-http/src/lib.rs
// ============================================================================
// Module: Collaboration Scout HTTP Client
// Description: GitHub REST client with conditional-GET caching, token-bucket
//              rate limiting, and upstream backoff.
// Purpose: The only crate that speaks HTTP to GitHub on behalf of the
//          discovery pipeline.
// Dependencies: scout-core, scout-store-sqlite, tokio, tracing
// ============================================================================

//! # Collaboration Scout HTTP Client
//!
//! [`GithubClient`] is constructed once per run with an injected
//! [`scout_core::Transport`], a [`scout_store_sqlite::Store`] handle, and
//! injected [`scout_core::Clock`]/[`scout_core::Sleeper`] implementations so
//! that every suspension point — rate-limit waits, backoff sleeps — is
//! deterministic under test.

mod cache;
pub mod client;
pub mod errors;
mod rate_limit;
mod util;

pub use client::ApiResponse;
pub use client::GithubClient;
pub use client::GithubClientConfig;
pub use client::RequestSpec;
pub use client::ResponseBody;
pub use client::ThrottleEvent;
pub use client::ThrottleReason;
pub use errors::HttpClientError;
pub use rate_limit::TokenBucket;
