// crates/scout-core/src/model.rs
// ============================================================================
// Module: Shared Domain Model
// Description: Entity value types shared by the store, discovery pipeline,
//              and brief engine.
// Purpose: Give every component the same in-memory shape for the entities
//          defined in spec.md §3, independent of how the store rows are laid out.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! These types are plain data: no component-specific behavior lives here.
//! `scout-store-sqlite` maps rows to and from these shapes; `scout-discovery`
//! and `scout-briefs` operate on them without depending on the store crate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::BriefId;
use crate::identifiers::QueryId;
use crate::identifiers::RepoId;
use crate::identifiers::RunId;
use crate::identifiers::StepId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Run
// ============================================================================

/// A single user-initiated invocation; owns all step/audit/query/analysis/
/// brief records created while it was active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Run identifier.
    pub id: RunId,
    /// Creation time.
    pub created_at: Timestamp,
    /// Normalized (redacted) argument snapshot.
    pub args: serde_json::Value,
    /// 16-hex-char truncated SHA-256 of the normalized config JSON.
    pub config_hash: String,
}

// ============================================================================
// SECTION: Step
// ============================================================================

/// Canonical step names (closed set per `spec.md` §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    /// Run bootstrap: creates the run row and records the config fingerprint.
    InitRun,
    /// Records the upstream rate-limit snapshot at run start.
    GithubRateLimitSnapshot,
    /// Pass 1 search.
    GithubSearchPass1,
    /// Repository metadata upsert.
    HydrateRepoMetadata,
    /// README fetch and storage.
    HydrateReadme,
    /// Per-repo LLM analysis.
    LlmRepoAnalysis,
    /// Keyword aggregation across top-K analyses.
    KeywordAggregate,
    /// Pass 2 search.
    GithubSearchPass2,
    /// Brief synthesis via LLM.
    LlmBriefGenerate,
    /// Markdown export.
    ExportMarkdown,
}

impl StepName {
    /// Returns the canonical snake_case name, matching the audit/step columns.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitRun => "init_run",
            Self::GithubRateLimitSnapshot => "github_rate_limit_snapshot",
            Self::GithubSearchPass1 => "github_search_pass1",
            Self::HydrateRepoMetadata => "hydrate_repo_metadata",
            Self::HydrateReadme => "hydrate_readme",
            Self::LlmRepoAnalysis => "llm_repo_analysis",
            Self::KeywordAggregate => "keyword_aggregate",
            Self::GithubSearchPass2 => "github_search_pass2",
            Self::LlmBriefGenerate => "llm_brief_generate",
            Self::ExportMarkdown => "export_markdown",
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a finished step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step completed without failing every unit of work.
    Success,
    /// Every unit of work in the step failed.
    Failed,
    /// Step was skipped (e.g. caller bypassed pass 2).
    Skipped,
}

impl StepStatus {
    /// Returns the canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// A named, timed phase inside a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step identifier.
    pub id: StepId,
    /// Parent run.
    pub run_id: RunId,
    /// Canonical step name.
    pub name: StepName,
    /// Start time.
    pub started_at: Timestamp,
    /// Finish time, set once the step completes.
    pub finished_at: Option<Timestamp>,
    /// Terminal status, set once the step completes.
    pub status: Option<StepStatus>,
    /// Free-form statistics, including `duration_ms` once finished.
    pub stats: serde_json::Value,
}

// ============================================================================
// SECTION: Audit Event
// ============================================================================

/// Audit event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    /// Diagnostic detail not needed in normal operation.
    Trace,
    /// Development-time detail.
    Debug,
    /// Normal operational event.
    Info,
    /// Recoverable anomaly.
    Warn,
    /// Unrecoverable failure.
    Error,
}

/// An immutable structured log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event timestamp.
    pub timestamp: Timestamp,
    /// Severity.
    pub level: AuditLevel,
    /// Parent run.
    pub run_id: RunId,
    /// Scope, usually a step name.
    pub scope: String,
    /// Machine-readable event name (e.g. `repo.readme.missing`).
    pub event: String,
    /// Human-readable message.
    pub message: String,
    /// Redacted structured data.
    pub data: serde_json::Value,
}

// ============================================================================
// SECTION: GitHub Query
// ============================================================================

/// Which discovery pass a query belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    /// Initial topic search.
    One,
    /// Keyword-driven re-search.
    Two,
}

impl Pass {
    /// Returns the numeric pass value stored in the database.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// A search issued during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubQuery {
    /// Query identifier.
    pub id: QueryId,
    /// Parent run.
    pub run_id: RunId,
    /// Discovery pass.
    pub pass: Pass,
    /// Verbatim query string sent to the search endpoint.
    pub query_string: String,
    /// Normalized parameter snapshot.
    pub params: serde_json::Value,
}

// ============================================================================
// SECTION: Repository / README
// ============================================================================

/// A discovered repository, keyed by canonical `owner/name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// Canonical full name.
    pub id: RepoId,
    /// Star count.
    pub stars: i64,
    /// Fork count.
    pub forks: i64,
    /// Topic set (unordered; stored sorted for determinism).
    pub topics: Vec<String>,
    /// Primary language, if reported.
    pub primary_language: Option<String>,
    /// SPDX license identifier, if known.
    pub license: Option<String>,
    /// Last push timestamp.
    pub pushed_at: Timestamp,
    /// Archived flag.
    pub archived: bool,
    /// Fork flag.
    pub is_fork: bool,
    /// Most recent run that observed this repository.
    pub last_seen_run_id: RunId,
}

/// The latest fetched README for a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readme {
    /// Owning repository.
    pub repo_id: RepoId,
    /// Raw content bytes.
    pub content: Vec<u8>,
    /// SHA-256 of `content`, hex-encoded.
    pub content_hash: String,
    /// Fetch time.
    pub fetched_at: Timestamp,
    /// HTTP entity-tag, if the response carried one.
    pub etag: Option<String>,
    /// Source URL used to fetch the content.
    pub source_url: String,
}

/// A repo-query linkage recording rank within a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoQueryLink {
    /// Query that returned the repository.
    pub query_id: QueryId,
    /// Repository returned.
    pub repo_id: RepoId,
    /// Rank within the query's result page (1-based).
    pub rank: i64,
}

// ============================================================================
// SECTION: Analysis
// ============================================================================

/// The raw [0,1] scores returned directly by the LLM for a repo analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LlmScores {
    /// Interestingness score.
    pub interestingness: f64,
    /// Novelty score.
    pub novelty: f64,
    /// Collaboration-potential score.
    pub collaboration_potential: f64,
}

/// Structured signals extracted from the LLM analysis output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSignals {
    /// One-line problem summary, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_summary: Option<String>,
    /// Target audience description, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub who_is_it_for: Option<String>,
    /// Integration surface tokens (e.g. `["API", "SDK"]`).
    #[serde(default)]
    pub integration_surface: Vec<String>,
    /// Risk flags.
    ///
    /// # Invariants
    /// - `None` means the LLM did not emit the field at all.
    /// - `Some(vec![])` means the LLM explicitly reported no risks.
    /// - This absent-vs-empty distinction is load-bearing for the scoring
    ///   policy's `no_risk_flags` bonus (`spec.md` §4.G, §9).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_flags: Option<Vec<String>>,
}

/// Per-repo keyword kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordKind {
    /// A primary keyword surfaced by the LLM.
    Primary,
    /// A secondary keyword surfaced by the LLM.
    Secondary,
    /// A suggested search query surfaced by the LLM.
    SearchQuery,
}

impl KeywordKind {
    /// Returns the canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::SearchQuery => "search_query",
        }
    }

    /// Parses the canonical snake_case name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            "search_query" => Some(Self::SearchQuery),
            _ => None,
        }
    }
}

/// The validated LLM output for a repo analysis (`RepoAnalysisOutput`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoAnalysisOutput {
    /// Raw scores as returned by the LLM.
    pub scores: LlmScores,
    /// Reasons keyed by score dimension (each list capped at 8 items by the
    /// schema validator).
    pub reasons: ReasonSet,
    /// Structured signals.
    pub signals: AnalysisSignals,
    /// Primary keywords (schema cap: 12).
    pub primary_keywords: Vec<String>,
    /// Secondary keywords (schema cap: 24).
    pub secondary_keywords: Vec<String>,
    /// Suggested search queries (schema cap: 10).
    pub search_queries: Vec<String>,
}

/// Reason strings keyed by score dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasonSet {
    /// Reasons supporting the interestingness score.
    #[serde(default)]
    pub interestingness: Vec<String>,
    /// Reasons supporting the novelty score.
    #[serde(default)]
    pub novelty: Vec<String>,
    /// Reasons supporting the collaboration-potential score.
    #[serde(default)]
    pub collaboration_potential: Vec<String>,
}

/// The outcome of running the LLM on a (repo, run) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Parent run.
    pub run_id: RunId,
    /// Analyzed repository.
    pub repo_id: RepoId,
    /// Model identifier used for the call.
    pub model: String,
    /// Prompt identifier.
    pub prompt_id: String,
    /// Prompt version.
    pub prompt_version: String,
    /// Input snapshot (README hash + excerpt length, never the full README).
    pub input_snapshot: serde_json::Value,
    /// Validated LLM output.
    pub output: RepoAnalysisOutput,
    /// Deterministic final score computed from `output` under the scoring policy.
    pub final_score: f64,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Keyword
// ============================================================================

/// A per-repo or run-aggregate keyword row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    /// Parent run.
    pub run_id: RunId,
    /// Owning repository, `None` for a run-aggregate row.
    pub repo_id: Option<RepoId>,
    /// The term itself (normalized lowercase-trimmed for aggregate rows).
    pub term: String,
    /// Keyword kind.
    pub kind: KeywordKind,
    /// Weight (raw per-repo weight, or aggregated weight for run rows).
    pub weight: f64,
}

// ============================================================================
// SECTION: Brief
// ============================================================================

/// Manual-review lifecycle status of a brief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefStatus {
    /// Newly generated, not yet reviewed.
    Draft,
    /// Crossed the `min_brief_score` threshold.
    Shortlisted,
    /// Manually approved.
    Approved,
    /// Manually rejected.
    Rejected,
    /// Automatically rejected by the score threshold gate.
    RejectedByThreshold,
}

impl BriefStatus {
    /// Returns the canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Shortlisted => "shortlisted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::RejectedByThreshold => "rejected_by_threshold",
        }
    }
}

/// A 2-4 repo collaboration brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brief {
    /// Brief identifier.
    pub id: BriefId,
    /// Parent run.
    pub run_id: RunId,
    /// Deterministic brief score.
    pub score: f64,
    /// Sorted repo-id list (canonical order, 2-4 entries).
    pub repo_ids: Vec<RepoId>,
    /// Structured brief content (validated `BriefOutput`).
    pub content: serde_json::Value,
    /// Rendered Markdown.
    pub markdown: String,
    /// Rendered outreach draft.
    pub outreach_draft: String,
    /// Review status.
    pub status: BriefStatus,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: HTTP Cache / Rate Limit
// ============================================================================

/// A cached response keyed by the hash of `(method, url, accept)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCacheEntry {
    /// Cache key (see `scout_core::hashing::http_cache_key`).
    pub cache_key: String,
    /// Request method.
    pub method: String,
    /// Request URL.
    pub url: String,
    /// Last observed HTTP status.
    pub status: u16,
    /// Entity-tag header, if present.
    pub etag: Option<String>,
    /// Last-Modified header, if present.
    pub last_modified: Option<String>,
    /// Response body bytes.
    pub body: Vec<u8>,
    /// Fetch time.
    pub fetched_at: Timestamp,
    /// Optional expiry time.
    pub expires_at: Option<Timestamp>,
}

/// Which token bucket a request consumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitBucket {
    /// Search endpoint bucket: capacity 30, refill 30/minute.
    Search,
    /// Core API bucket: capacity 5000, refill 5000/hour.
    Core,
}

impl RateLimitBucket {
    /// Returns the canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Core => "core",
        }
    }
}

/// A point-in-time image of the upstream rate-limit state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    /// Parent run.
    pub run_id: RunId,
    /// Bucket this snapshot describes.
    pub bucket: RateLimitBucket,
    /// Remaining requests as reported upstream.
    pub remaining: i64,
    /// Request limit as reported upstream.
    pub limit: i64,
    /// Reset time as reported upstream.
    pub reset_at: Timestamp,
    /// Time this snapshot was taken.
    pub observed_at: Timestamp,
}
