// crates/scout-briefs/src/params.rs
// ============================================================================
// Module: Brief Engine Parameters
// Description: The CLI-level tuning knobs for `briefs:generate`.
// Purpose: Give `scout-cli` a typed surface to build from parsed arguments
//          and environment, and give the pipeline defaults matching
//          `spec.md` §4.G/§6.
// Dependencies: scout-core
// ============================================================================

use scout_core::RepoId;

/// Default maximum candidate pairs/triples considered (`spec.md` §4.G).
pub const DEFAULT_MAX_COMBOS: u32 = 200;

/// Default cap on briefs generated in one invocation (`spec.md` §4.G,
/// "Brief synthesis"). The CLI surface (`spec.md` §6) defaults its own
/// `--max-briefs` flag to 20; see `DESIGN.md` for why the two defaults are
/// allowed to diverge.
pub const DEFAULT_MAX_BRIEFS: u32 = 50;

/// Default functional-overlap competitor-rejection threshold.
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.70;

/// Default penalty applied when an interop trigger token allows an
/// otherwise-rejected pair through.
pub const DEFAULT_OVERLAP_EXCEPTION_PENALTY: f64 = 0.10;

/// Default number of historical candidates injected before grouping.
pub const DEFAULT_HISTORY_CANDIDATES: u32 = 100;

/// Whether candidate generation also considers triples, in addition to
/// pairs. `spec.md` marks triples as "optionally if configured"; off by
/// default keeps candidate generation's `O(n^2)` pair enumeration from
/// becoming `O(n^3)` for every run.
pub const DEFAULT_INCLUDE_TRIPLES: bool = false;

/// Parameters for one `briefs:generate` invocation (`spec.md` §4.G, §6).
#[derive(Debug, Clone)]
pub struct BriefParams {
    /// Maximum unordered candidate groups considered.
    pub max_combos: u32,
    /// Whether triples are generated in addition to pairs.
    pub include_triples: bool,
    /// Functional-overlap threshold above which a pair is treated as a
    /// competitor (subject to the interop-trigger exception).
    pub overlap_threshold: f64,
    /// Penalty subtracted from the overlap score when an interop trigger
    /// token allows an over-threshold pair through.
    pub overlap_exception_penalty: f64,
    /// Minimum `brief_score` for `shortlisted` status; overrides the loaded
    /// scoring policy's `thresholds.min_brief_score` when set.
    pub min_brief_score: Option<f64>,
    /// Maximum briefs generated before the step stops.
    pub max_briefs: u32,
    /// Historical candidates injected from other runs before grouping.
    /// `0` disables injection entirely.
    pub history_candidates: u32,
    /// A repo exempt from the anchor-dedup rule (the user's own repo, if
    /// one was named).
    pub own_repo: Option<RepoId>,
}

impl BriefParams {
    /// Builds parameters with every optional knob at its `spec.md` §4.G
    /// default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_combos: DEFAULT_MAX_COMBOS,
            include_triples: DEFAULT_INCLUDE_TRIPLES,
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            overlap_exception_penalty: DEFAULT_OVERLAP_EXCEPTION_PENALTY,
            min_brief_score: None,
            max_briefs: DEFAULT_MAX_BRIEFS,
            history_candidates: DEFAULT_HISTORY_CANDIDATES,
            own_repo: None,
        }
    }
}

impl Default for BriefParams {
    fn default() -> Self {
        Self::new()
    }
}
