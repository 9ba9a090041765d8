// crates/scout-discovery/src/query.rs
// ============================================================================
// Module: Search Qualifier Grammar
// Description: Builds a GitHub code-search query string from a free-text
//              query plus structured qualifiers.
// Purpose: The one place both pass 1 and pass 2 construct a `q=` value
//          (`spec.md` §6, "Search-query qualifier grammar").
// Dependencies: scout-core
// ============================================================================

//! ## Overview
//! `spec.md` §6 fixes the qualifier order: user query, stars, pushed,
//! archived, then the optional `fork:false` / `language:` / `in:readme`
//! tail. [`build_search_string`] is generic over all three optional
//! toggles even though the current CLI surface (`scout:run`/`scout:expand`)
//! only ever exposes `include_forks` — `include_archived` and `in_readme`
//! are hardcoded at the pipeline level (see `DESIGN.md`), but the grammar
//! itself stays exercisable and testable independent of that call site.

use scout_core::Clock;
use scout_core::time::date_days_ago;

/// Structured qualifiers layered onto a free-text query.
#[derive(Debug, Clone)]
pub struct QualifierParams<'a> {
    /// Lower bound on days since last push.
    pub days: u32,
    /// Minimum star count.
    pub stars_low: i64,
    /// Maximum star count, if bounded.
    pub stars_high: Option<i64>,
    /// Restrict to one primary language, if set.
    pub language: Option<&'a str>,
    /// Whether forks are included (`false` appends `fork:false`).
    pub include_forks: bool,
    /// Whether archived repos are included.
    pub include_archived: bool,
    /// Whether to additionally search README bodies (`in:readme`).
    pub in_readme: bool,
}

/// Builds a GitHub search-qualifier string: `{user_query}
/// stars:{low..high|>=low} pushed:>=YYYY-MM-DD archived:{true|false}`,
/// followed by `fork:false` (when forks are excluded), `language:{L}` (when
/// set), and `in:readme` (when requested), in that fixed order (`spec.md`
/// §6).
#[must_use]
pub fn build_search_string(user_query: &str, params: &QualifierParams<'_>, clock: &dyn Clock) -> String {
    let stars_clause = match params.stars_high {
        Some(high) => format!("stars:{}..{high}", params.stars_low),
        None => format!("stars:>={}", params.stars_low),
    };
    let pushed_clause = format!("pushed:>={}", date_days_ago(clock, params.days));
    let archived_clause = format!("archived:{}", params.include_archived);

    let mut segments = vec![user_query.to_string(), stars_clause, pushed_clause, archived_clause];
    if !params.include_forks {
        segments.push("fork:false".to_string());
    }
    if let Some(language) = params.language {
        segments.push(format!("language:{language}"));
    }
    if params.in_readme {
        segments.push("in:readme".to_string());
    }
    segments.join(" ")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use scout_core::Timestamp;

    use super::*;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_epoch_millis(self.0)
        }
    }

    fn clock() -> FixedClock {
        // 2024-01-10T00:00:00Z
        FixedClock(1_704_844_800_000)
    }

    #[test]
    fn default_qualifiers_exclude_forks_and_archived() {
        let params = QualifierParams {
            days: 180,
            stars_low: 50,
            stars_high: None,
            language: None,
            include_forks: false,
            include_archived: false,
            in_readme: false,
        };
        let query = build_search_string("vector database", &params, &clock());
        assert_eq!(query, "vector database stars:>=50 pushed:>=2023-07-14 archived:false fork:false");
    }

    #[test]
    fn a_bounded_star_range_uses_the_range_form() {
        let params = QualifierParams {
            days: 0,
            stars_low: 15,
            stars_high: Some(200),
            language: None,
            include_forks: false,
            include_archived: false,
            in_readme: false,
        };
        let query = build_search_string("graph db", &params, &clock());
        assert_eq!(query, "graph db stars:15..200 pushed:>=2024-01-10 archived:false fork:false");
    }

    #[test]
    fn language_and_in_readme_append_in_order() {
        let params = QualifierParams {
            days: 10,
            stars_low: 50,
            stars_high: None,
            language: Some("rust"),
            include_forks: true,
            include_archived: true,
            in_readme: true,
        };
        let query = build_search_string("vector database", &params, &clock());
        assert_eq!(query, "vector database stars:>=50 pushed:>=2023-12-31 archived:true language:rust in:readme");
    }

    #[test]
    fn including_forks_omits_the_fork_clause() {
        let params = QualifierParams {
            days: 0,
            stars_low: 1,
            stars_high: None,
            language: None,
            include_forks: true,
            include_archived: false,
            in_readme: false,
        };
        let query = build_search_string("q", &params, &clock());
        assert!(!query.contains("fork:false"));
    }
}
