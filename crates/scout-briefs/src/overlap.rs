// crates/scout-briefs/src/overlap.rs
// ============================================================================
// Module: Candidate Overlap Scoring
// Description: Topic/language/surface overlap score, per-repo functional
//              signatures, and the functional-overlap competitor filter.
// Purpose: Back candidate generation and the pre-LLM competitor filter
//          (`spec.md` §4.G, "Candidate generation", "Functional-overlap
//          competitor filter").
// Dependencies: scout-core
// ============================================================================

//! ## Overview
//! [`overlap_score`] is the topic/language/integration-surface score that
//! ranks candidate groups before any LLM call. [`FunctionSignature`] is the
//! token-set fingerprint `spec.md` derives from a repo's stored analysis
//! output; [`functional_overlap`] computes the three-dimension weighted
//! Jaccard score gating the competitor filter, and [`has_interop_trigger`]
//! checks the fixed trigger-token list that lets an over-threshold pair
//! through anyway.

use std::collections::HashSet;

use scout_core::Repository;

/// Stopwords dropped during tokenization, in addition to the
/// shorter-than-three-characters rule (`spec.md` §4.G).
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "your", "you", "are", "was", "were", "have", "has", "had", "not", "but",
    "can", "will", "all", "any", "its", "our", "their", "them", "they", "use", "used", "using",
];

/// Interop trigger tokens (`spec.md` §4.G, "Functional-overlap competitor
/// filter", step 2).
const INTEROP_TRIGGERS: &[&str] = &[
    "migration",
    "migrate",
    "interop",
    "compat",
    "compatibility",
    "adapter",
    "bridge",
    "benchmark",
    "benchmarks",
    "spec",
    "standard",
    "standards",
    "translator",
    "import",
    "export",
    "convert",
    "conversion",
];

/// Lowercases `text`, splits on runs of non-alphanumeric characters, and
/// drops stopwords and tokens under three characters long (`spec.md` §4.G).
#[must_use]
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() >= 3 && !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of two token sets. Two empty sets are defined as
/// fully dissimilar (`0.0`), since an empty signature carries no functional
/// information to overlap on.
#[must_use]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 { 0.0 } else { intersection as f64 / union as f64 }
}

/// A repo's per-dimension token fingerprint, derived from its stored
/// analysis output (`spec.md` §4.G, "Functional-overlap competitor
/// filter").
#[derive(Debug, Clone, Default)]
pub struct FunctionSignature {
    /// Tokens from `problem_summary`.
    pub problem_summary: HashSet<String>,
    /// Lowercased `integration_surface` items.
    pub integration_surface: HashSet<String>,
    /// Lowercased `keywords.primary`.
    pub primary_keywords: HashSet<String>,
    /// Lowercased `keywords.secondary`.
    pub secondary_keywords: HashSet<String>,
    /// Tokenized `search_queries`.
    pub search_queries: HashSet<String>,
}

impl FunctionSignature {
    /// Builds a signature from the raw analysis fields.
    #[must_use]
    pub fn build(problem_summary: Option<&str>, integration_surface: &[String], primary_keywords: &[String], secondary_keywords: &[String], search_queries: &[String]) -> Self {
        Self {
            problem_summary: problem_summary.map(tokenize).unwrap_or_default(),
            integration_surface: integration_surface.iter().map(|item| item.to_lowercase()).collect(),
            primary_keywords: primary_keywords.iter().map(|item| item.to_lowercase()).collect(),
            secondary_keywords: secondary_keywords.iter().map(|item| item.to_lowercase()).collect(),
            search_queries: search_queries.iter().flat_map(|query| tokenize(query)).collect(),
        }
    }

    /// The union of primary and secondary keyword tokens, used by
    /// [`has_interop_trigger`]'s "either side's keyword ... sets" check.
    fn keyword_tokens(&self) -> HashSet<String> {
        self.primary_keywords.union(&self.secondary_keywords).cloned().collect()
    }
}

/// Computes `functional_overlap = 0.45*sim(problem_summary) +
/// 0.35*sim(integration_surface) + 0.20*sim(keywords.primary)`, rounded to
/// 1e-6 (`spec.md` §4.G).
#[must_use]
pub fn functional_overlap(a: &FunctionSignature, b: &FunctionSignature) -> f64 {
    let raw = 0.45 * jaccard(&a.problem_summary, &b.problem_summary)
        + 0.35 * jaccard(&a.integration_surface, &b.integration_surface)
        + 0.20 * jaccard(&a.primary_keywords, &b.primary_keywords);
    round6(raw)
}

/// Whether either signature's keyword sets (primary ∪ secondary) or
/// integration-surface set contains an interop trigger token (`spec.md`
/// §4.G, step 2).
#[must_use]
pub fn has_interop_trigger(a: &FunctionSignature, b: &FunctionSignature) -> bool {
    let check = |signature: &FunctionSignature| {
        let keywords = signature.keyword_tokens();
        INTEROP_TRIGGERS.iter().any(|trigger| keywords.contains(*trigger) || signature.integration_surface.contains(*trigger))
    };
    check(a) || check(b)
}

/// Outcome of the competitor filter for one candidate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompetitorVerdict {
    /// Allowed with no penalty (`functional_overlap` under threshold).
    Allowed,
    /// Allowed despite exceeding the threshold, because an interop trigger
    /// token was found; carries the penalty to subtract from the overlap
    /// score.
    AllowedWithException { penalty: f64 },
    /// Rejected: over threshold, no interop trigger token found.
    Rejected,
}

/// Applies the three-step competitor decision rule (`spec.md` §4.G).
#[must_use]
pub fn decide_competitor(a: &FunctionSignature, b: &FunctionSignature, threshold: f64, exception_penalty: f64) -> CompetitorVerdict {
    let overlap = functional_overlap(a, b);
    if overlap < threshold {
        return CompetitorVerdict::Allowed;
    }
    if has_interop_trigger(a, b) {
        return CompetitorVerdict::AllowedWithException { penalty: exception_penalty };
    }
    CompetitorVerdict::Rejected
}

/// Computes the four-signal topic/language/surface overlap score in
/// `[0,1]` for one repo pair, rounded to 1e-6 (`spec.md` §4.G, "Candidate
/// generation"):
/// `topicOverlap*0.4 + languageMatch(0.2) + integrationSurfaceOverlap*0.2 +
/// complementBonus(0.2)`. `surface_a`/`surface_b` are each repo's
/// analysis-derived `integration_surface` list.
#[must_use]
pub fn overlap_score(a: &Repository, b: &Repository, surface_a: &[String], surface_b: &[String]) -> f64 {
    let topics_a: HashSet<&String> = a.topics.iter().collect();
    let topics_b: HashSet<&String> = b.topics.iter().collect();
    let topic_overlap = jaccard_ref(&topics_a, &topics_b) * 0.4;

    let language_match = match (&a.primary_language, &b.primary_language) {
        (Some(lang_a), Some(lang_b)) if lang_a.eq_ignore_ascii_case(lang_b) => 0.2,
        _ => 0.0,
    };

    let surface_a_lower: HashSet<String> = surface_a.iter().map(|item| item.to_lowercase()).collect();
    let surface_b_lower: HashSet<String> = surface_b.iter().map(|item| item.to_lowercase()).collect();
    let surface_overlap = jaccard(&surface_a_lower, &surface_b_lower) * 0.2;

    let a_has_api_or_sdk = mentions_api_or_sdk(&surface_a_lower);
    let b_has_api_or_sdk = mentions_api_or_sdk(&surface_b_lower);
    let complement_bonus = if a_has_api_or_sdk != b_has_api_or_sdk { 0.2 } else { 0.0 };

    round6(topic_overlap + language_match + surface_overlap + complement_bonus)
}

/// Whether any entry in `surface` contains the whole word `api` or `sdk`
/// (case-insensitive), matching `scout-config`'s own `\b(api|sdk)\b`
/// equivalent check for the same signal elsewhere in the scoring pipeline.
fn mentions_api_or_sdk(surface: &HashSet<String>) -> bool {
    surface.iter().any(|entry| entry.split(|c: char| !c.is_ascii_alphanumeric()).any(|token| token == "api" || token == "sdk"))
}

fn jaccard_ref(a: &HashSet<&String>, b: &HashSet<&String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 { 0.0 } else { intersection as f64 / union as f64 }
}

/// Rounds `value` to six decimal places, matching `spec.md`'s "rounded to
/// 1e-6" rule. Duplicated locally rather than depending on
/// `scout_core::rounding::round6` so this module's overlap math reads
/// self-contained, matching `scout-config`'s own choice to keep a local
/// `round6` rather than a cross-crate dependency for one helper.
fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use super::*;

    fn repo(topics: &[&str], language: Option<&str>) -> Repository {
        Repository {
            id: scout_core::RepoId::parse("acme/widgets").unwrap(),
            stars: 0,
            forks: 0,
            topics: topics.iter().map(|t| t.to_string()).collect(),
            primary_language: language.map(str::to_string),
            license: None,
            pushed_at: scout_core::Timestamp::from_epoch_millis(0),
            archived: false,
            is_fork: false,
            last_seen_run_id: scout_core::RunId::new(),
        }
    }

    #[test]
    fn identical_topics_and_language_score_highest() {
        let a = repo(&["vector", "database"], Some("Rust"));
        let b = repo(&["vector", "database"], Some("rust"));
        assert!((overlap_score(&a, &b, &[], &[]) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn disjoint_topics_and_different_languages_score_zero() {
        let a = repo(&["vector"], Some("Rust"));
        let b = repo(&["webserver"], Some("Go"));
        assert!((overlap_score(&a, &b, &[], &[]) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn exactly_one_side_with_api_or_sdk_adds_the_complement_bonus() {
        let a = repo(&[], None);
        let b = repo(&[], None);
        let surface_a = vec!["CLI".to_string()];
        let surface_b = vec!["REST API".to_string()];
        assert!((overlap_score(&a, &b, &surface_a, &surface_b) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn both_sides_with_api_or_sdk_does_not_add_the_complement_bonus() {
        let a = repo(&[], None);
        let b = repo(&[], None);
        let surface_a = vec!["SDK".to_string()];
        let surface_b = vec!["REST API".to_string()];
        assert!(overlap_score(&a, &b, &surface_a, &surface_b) < 0.2);
    }

    #[test]
    fn tokenize_drops_stopwords_and_short_tokens() {
        let tokens = tokenize("The API for data sync, and it is fast");
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("it"));
        assert!(!tokens.contains("is"));
        assert!(tokens.contains("api"));
        assert!(tokens.contains("data"));
        assert!(tokens.contains("sync"));
        assert!(tokens.contains("fast"));
    }

    #[test]
    fn high_overlap_without_trigger_token_is_rejected() {
        let a = FunctionSignature::build(Some("sync data between services"), &["API".to_string()], &["sync".to_string(), "data".to_string()], &[], &[]);
        let b = FunctionSignature::build(Some("sync data between services"), &["API".to_string()], &["sync".to_string(), "data".to_string()], &[], &[]);
        assert_eq!(decide_competitor(&a, &b, 0.70, 0.10), CompetitorVerdict::Rejected);
    }

    #[test]
    fn high_overlap_with_trigger_token_is_allowed_with_exception() {
        let a = FunctionSignature::build(Some("sync data between services"), &["API".to_string()], &["migration".to_string(), "data".to_string()], &[], &[]);
        let b = FunctionSignature::build(Some("sync data between services"), &["API".to_string()], &["migration".to_string(), "data".to_string()], &[], &[]);
        assert_eq!(decide_competitor(&a, &b, 0.70, 0.10), CompetitorVerdict::AllowedWithException { penalty: 0.10 });
    }

    #[test]
    fn low_overlap_is_allowed_with_no_penalty() {
        let a = FunctionSignature::build(Some("index vectors for search"), &[], &["vector".to_string()], &[], &[]);
        let b = FunctionSignature::build(Some("render markdown documents"), &[], &["markdown".to_string()], &[], &[]);
        assert_eq!(decide_competitor(&a, &b, 0.70, 0.10), CompetitorVerdict::Allowed);
    }
}
