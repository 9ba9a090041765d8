// crates/scout-discovery/src/params.rs
// ============================================================================
// Module: Discovery Parameters
// Description: The CLI-level tuning knobs for pass 1 and pass 2.
// Purpose: Give `scout-cli` a typed surface to build from parsed arguments,
//          and give the pipeline defaults matching `spec.md` §6.
// Dependencies: none
// ============================================================================

/// Default lookback window in days for pass 1's `pushed:` qualifier.
pub const DEFAULT_DAYS: u32 = 180;

/// Default minimum star count for pass 1.
pub const DEFAULT_STARS: i64 = 50;

/// Default page cap for pass 1's paginated search.
pub const DEFAULT_TOP_N: u32 = 100;

/// Default minimum star count for pass 2 (`spec.md` §6: pass 2 widens the
/// star floor down from pass 1's, since it is searching keyword-derived
/// queries rather than the user's own).
pub const DEFAULT_PASS2_STARS: i64 = 15;

/// Default query cap for pass 2.
pub const DEFAULT_MAX_QUERIES: u32 = 10;

/// Default cap on newly discovered repos across all of pass 2.
pub const DEFAULT_MAX_NEW_REPOS_TOTAL: u32 = 200;

/// Default cap on new LLM analyses across all of pass 2. `spec.md` leaves
/// this unspecified; since every newly discovered repo within the
/// `maxNewReposTotal` cap gets exactly one analysis, the two caps are kept
/// equal by default (see `DESIGN.md`).
pub const DEFAULT_MAX_LLM_ANALYSES_TOTAL: u32 = 200;

/// Default top-K analyses folded into the run-aggregate keyword set.
pub const DEFAULT_KEYWORD_AGGREGATE_TOP_K: u32 = 20;

/// Default bounded README excerpt length, in characters, fed to the
/// analysis prompt.
pub const DEFAULT_README_EXCERPT_CHARS: usize = 8000;

/// Parameters for pass 1: the user-issued search plus upfront hydration and
/// analysis of every matching repo (`spec.md` §4.F, §6 `scout:run`).
#[derive(Debug, Clone)]
pub struct Pass1Params {
    /// Free-text search query, as typed by the caller.
    pub query: String,
    /// How many days back `pushed:` should reach.
    pub days: u32,
    /// Minimum star count.
    pub stars: i64,
    /// Maximum star count, if bounded.
    pub max_stars: Option<i64>,
    /// Maximum repos to collect across all pages.
    pub top_n: u32,
    /// Restrict to a single primary language, if set.
    pub language: Option<String>,
    /// Whether forks are included in the search.
    pub include_forks: bool,
    /// Model identifier passed to the LLM client for this run's analyses.
    pub model: String,
}

impl Pass1Params {
    /// Builds parameters with every optional knob at its `spec.md` §6
    /// default (`--days 180 --stars 50 --top 100`, forks excluded).
    #[must_use]
    pub fn new(query: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            days: DEFAULT_DAYS,
            stars: DEFAULT_STARS,
            max_stars: None,
            top_n: DEFAULT_TOP_N,
            language: None,
            include_forks: false,
            model: model.into(),
        }
    }
}

/// Parameters for pass 2: expansion of an existing run via its aggregated
/// keywords (`spec.md` §4.F, §6 `scout:expand`).
#[derive(Debug, Clone)]
pub struct Pass2Params {
    /// Minimum star count for pass-2 queries.
    pub pass2_stars: i64,
    /// Maximum star count for pass-2 queries, if bounded.
    pub pass2_max_stars: Option<i64>,
    /// Maximum number of pass-2 queries to issue.
    pub max_queries: u32,
    /// Hard cap on newly discovered repos across all pass-2 queries.
    pub max_new_repos_total: u32,
    /// Hard cap on new LLM analyses across all pass-2 queries.
    pub max_llm_analyses_total: u32,
    /// Model identifier passed to the LLM client for this expansion's
    /// analyses.
    pub model: String,
}

impl Pass2Params {
    /// Builds parameters with every optional knob at its `spec.md` §6
    /// default (`--pass2-stars 15 --max-queries 10`).
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            pass2_stars: DEFAULT_PASS2_STARS,
            pass2_max_stars: None,
            max_queries: DEFAULT_MAX_QUERIES,
            max_new_repos_total: DEFAULT_MAX_NEW_REPOS_TOTAL,
            max_llm_analyses_total: DEFAULT_MAX_LLM_ANALYSES_TOTAL,
            model: model.into(),
        }
    }
}
