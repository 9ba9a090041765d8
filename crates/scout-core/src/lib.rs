// crates/scout-core/src/lib.rs
// ============================================================================
// Module: Collaboration Scout Core
// Description: Shared identifiers, domain model, time/clock abstractions, and
//              canonical hashing used by every other Collaboration Scout crate.
// Purpose: Give the store, HTTP/LLM clients, orchestrator, discovery pipeline,
//          and brief engine one common vocabulary.
// Dependencies: serde, serde_json, sha2, thiserror, uuid, chrono, tokio, async-trait
// ============================================================================

//! # Collaboration Scout Core
//!
//! This crate has no knowledge of GitHub, LLMs, or SQLite. It defines the
//! entities from `spec.md` §3, the identifiers that key them, the
//! `Clock`/`Sleeper`/`Transport` traits used for dependency injection
//! (`spec.md` §9), and the canonical hashing helpers used for cache keys,
//! README content hashes, and config fingerprints.

pub mod errors;
pub mod hashing;
pub mod identifiers;
pub mod model;
pub mod rounding;
pub mod time;
pub mod transport;

pub use errors::StoreError;
pub use identifiers::BriefId;
pub use identifiers::KeywordId;
pub use identifiers::QueryId;
pub use identifiers::RepoId;
pub use identifiers::RunId;
pub use identifiers::StepId;
pub use model::Analysis;
pub use model::AnalysisSignals;
pub use model::AuditEvent;
pub use model::AuditLevel;
pub use model::Brief;
pub use model::BriefStatus;
pub use model::GithubQuery;
pub use model::HttpCacheEntry;
pub use model::Keyword;
pub use model::KeywordKind;
pub use model::LlmScores;
pub use model::Pass;
pub use model::RateLimitBucket;
pub use model::RateLimitSnapshot;
pub use model::Readme;
pub use model::ReasonSet;
pub use model::RepoAnalysisOutput;
pub use model::RepoQueryLink;
pub use model::Repository;
pub use model::Run;
pub use model::Step;
pub use model::StepName;
pub use model::StepStatus;
pub use time::Clock;
pub use time::Sleeper;
pub use time::SystemClock;
pub use time::Timestamp;
pub use time::TokioSleeper;
pub use transport::HttpMethod;
pub use transport::HttpRequest;
pub use transport::HttpResponse;
pub use transport::Transport;
pub use transport::TransportError;
