// crates/scout-discovery/src/keywords.rs
// ============================================================================
// Module: Keyword Aggregation
// Description: Folds the top-K analyses' per-repo keywords into a run-level
//              aggregate, weighted by each repo's final score.
// Purpose: Back the pass-2 preamble (`spec.md` §4.F, "Keyword aggregation").
// Dependencies: scout-core, scout-store-sqlite
// ============================================================================

//! ## Overview
//! [`fold_keywords`] is the pure part: given each top-K repo's final score
//! and its own keyword rows, it normalizes terms (lowercase, trimmed),
//! buckets by `(kind, normalized term)`, accumulates `weight * final_score`
//! per occurrence, rounds every aggregated weight to 1e-6, and sorts by
//! weight descending then term ascending. [`aggregate_keywords`] is the
//! impure wrapper: it reads the top-K analyses and their keyword rows from
//! the store, folds them, persists the result as run-aggregate (`repo_id =
//! NULL`) keyword rows, and returns the sorted list.

use std::collections::HashMap;

use rusqlite::Transaction;
use scout_core::Keyword;
use scout_core::KeywordKind;
use scout_core::RunId;
use scout_core::StoreError;
use scout_core::rounding::round6;
use scout_store_sqlite::AnalysisDao;

/// Folds each top-K repo's `(final_score, keywords)` pair into a sorted
/// run-aggregate keyword list.
///
/// Contribution per occurrence is `keyword.weight * final_score`; repeated
/// `(kind, normalized term)` pairs across repos accumulate. Output is
/// sorted by weight descending, then term ascending.
#[must_use]
pub fn fold_keywords(run_id: RunId, per_repo: &[(f64, Vec<Keyword>)]) -> Vec<Keyword> {
    let mut totals: HashMap<(KeywordKind, String), f64> = HashMap::new();
    for (final_score, keywords) in per_repo {
        for keyword in keywords {
            let normalized = keyword.term.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            let entry = totals.entry((keyword.kind, normalized)).or_insert(0.0);
            *entry += keyword.weight * final_score;
        }
    }

    let mut aggregated: Vec<Keyword> = totals
        .into_iter()
        .map(|((kind, term), weight)| Keyword { run_id, repo_id: None, term, kind, weight: round6(weight) })
        .collect();
    aggregated.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.term.cmp(&b.term)));
    aggregated
}

/// Reads the top-`top_k` analyses for `run_id` by final score, folds their
/// per-repo keywords via [`fold_keywords`], persists the result as
/// run-aggregate keyword rows, and returns the sorted list.
///
/// # Errors
///
/// Returns [`StoreError`] if any read or write fails.
pub fn aggregate_keywords(tx: &Transaction<'_>, run_id: RunId, top_k: u32) -> Result<Vec<Keyword>, StoreError> {
    let top_analyses = AnalysisDao::top_by_final_score(tx, run_id, top_k)?;
    let mut per_repo = Vec::with_capacity(top_analyses.len());
    for analysis in &top_analyses {
        let keywords = AnalysisDao::list_keywords_for_repo(tx, run_id, &analysis.repo_id)?;
        per_repo.push((analysis.final_score, keywords));
    }
    let aggregated = fold_keywords(run_id, &per_repo);
    for keyword in &aggregated {
        AnalysisDao::upsert_keyword(tx, keyword)?;
    }
    Ok(aggregated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use scout_core::RepoId;

    use super::*;

    fn keyword(run_id: RunId, repo_id: &RepoId, term: &str, kind: KeywordKind, weight: f64) -> Keyword {
        Keyword { run_id, repo_id: Some(repo_id.clone()), term: term.to_string(), kind, weight }
    }

    #[test]
    fn contributions_accumulate_across_repos_by_normalized_term() {
        let run_id = RunId::new();
        let repo_a = RepoId::parse("acme/widgets").unwrap();
        let repo_b = RepoId::parse("acme/gadgets").unwrap();
        let per_repo = vec![
            (0.8, vec![keyword(run_id, &repo_a, "Vector-Search", KeywordKind::Primary, 1.0)]),
            (0.5, vec![keyword(run_id, &repo_b, " vector-search ", KeywordKind::Primary, 1.0)]),
        ];
        let aggregated = fold_keywords(run_id, &per_repo);
        assert_eq!(aggregated.len(), 1);
        assert_eq!(aggregated[0].term, "vector-search");
        assert!((aggregated[0].weight - 1.3).abs() < 1e-9);
    }

    #[test]
    fn different_kinds_with_the_same_term_stay_separate() {
        let run_id = RunId::new();
        let repo = RepoId::parse("acme/widgets").unwrap();
        let per_repo = vec![(
            1.0,
            vec![
                keyword(run_id, &repo, "embeddings", KeywordKind::Primary, 1.0),
                keyword(run_id, &repo, "embeddings", KeywordKind::Secondary, 0.5),
            ],
        )];
        let aggregated = fold_keywords(run_id, &per_repo);
        assert_eq!(aggregated.len(), 2);
    }

    #[test]
    fn output_is_sorted_by_weight_desc_then_term_asc() {
        let run_id = RunId::new();
        let repo = RepoId::parse("acme/widgets").unwrap();
        let per_repo = vec![(
            1.0,
            vec![
                keyword(run_id, &repo, "zeta", KeywordKind::Primary, 0.5),
                keyword(run_id, &repo, "alpha", KeywordKind::Primary, 0.9),
                keyword(run_id, &repo, "beta", KeywordKind::Primary, 0.9),
            ],
        )];
        let aggregated = fold_keywords(run_id, &per_repo);
        let terms: Vec<&str> = aggregated.iter().map(|keyword| keyword.term.as_str()).collect();
        assert_eq!(terms, vec!["alpha", "beta", "zeta"]);
    }

    #[test]
    fn blank_terms_are_skipped() {
        let run_id = RunId::new();
        let repo = RepoId::parse("acme/widgets").unwrap();
        let per_repo = vec![(1.0, vec![keyword(run_id, &repo, "   ", KeywordKind::Primary, 1.0)])];
        assert!(fold_keywords(run_id, &per_repo).is_empty());
    }
}
