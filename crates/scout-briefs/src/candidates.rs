// crates/scout-briefs/src/candidates.rs
// ============================================================================
// Module: Candidate Generation
// Description: Builds and ranks 2-4 repo candidate groups from a run's
//              qualifying analyses, then applies the functional-overlap
//              competitor filter.
// Purpose: Back `spec.md` §4.G's "Candidate generation" and
//          "Functional-overlap competitor filter".
// Dependencies: scout-core
// ============================================================================

//! ## Overview
//! [`qualifying_analyses`] filters and sorts the input pool by `spec.md`'s
//! determinism rule (lexicographic repo id). [`generate_candidates`]
//! enumerates pairs (and triples, if configured) up to `maxCombos`,
//! computes each group's overlap score, and sorts the result. [`filter_competitors`]
//! applies the functional-overlap decision rule to every surviving group,
//! dropping any group with a rejected internal pair.

use std::collections::HashMap;

use scout_core::Analysis;
use scout_core::RepoId;
use scout_core::Repository;

use crate::overlap::CompetitorVerdict;
use crate::overlap::FunctionSignature;
use crate::overlap::decide_competitor;
use crate::overlap::overlap_score;

/// One unordered candidate group (2-4 repos), with its overlap score and
/// any competitor-filter penalty.
#[derive(Debug, Clone)]
pub struct CandidateGroup {
    /// Repo ids, sorted lexicographically.
    pub repo_ids: Vec<RepoId>,
    /// `spec.md`'s overlap score: the pair score itself, or the average of
    /// the three internal pair scores for a triple.
    pub overlap_score: f64,
    /// Sum of exception penalties across internal pairs allowed through
    /// despite exceeding the competitor threshold (`0.0` if none applied).
    pub penalty: f64,
}

impl CandidateGroup {
    /// The canonical comma-joined sorted repo-id string used as the
    /// deterministic tiebreaker (`spec.md` §4.G).
    #[must_use]
    pub fn sort_key(&self) -> String {
        self.repo_ids.iter().map(RepoId::as_str).collect::<Vec<_>>().join(",")
    }
}

/// Filters `analyses` to those qualifying for candidate generation
/// (`final_score >= min_repo_score` and `collaboration_potential >=
/// min_collab_potential`), sorted by repo id ascending for deterministic
/// enumeration (`spec.md` §4.G).
#[must_use]
pub fn qualifying_analyses(analyses: &[Analysis], min_repo_score: f64, min_collab_potential: f64) -> Vec<Analysis> {
    let mut qualifying: Vec<Analysis> = analyses
        .iter()
        .filter(|analysis| analysis.final_score >= min_repo_score && analysis.output.scores.collaboration_potential >= min_collab_potential)
        .cloned()
        .collect();
    qualifying.sort_by(|a, b| a.repo_id.cmp(&b.repo_id));
    qualifying
}

/// Enumerates unordered pairs (and triples, if `include_triples`) from
/// `qualifying`, up to `max_combos`, computing each group's overlap score
/// from `repos` (keyed by id). Groups referencing a repo id missing from
/// `repos` are skipped. Output is sorted by overlap score descending, then
/// by [`CandidateGroup::sort_key`] ascending (`spec.md` §4.G).
#[must_use]
pub fn generate_candidates(qualifying: &[Analysis], repos: &HashMap<RepoId, Repository>, max_combos: u32, include_triples: bool) -> Vec<CandidateGroup> {
    let mut groups = Vec::new();
    let n = qualifying.len();

    'pairs: for i in 0..n {
        for j in (i + 1)..n {
            if groups.len() >= max_combos as usize {
                break 'pairs;
            }
            if let Some(group) = pair_group(&qualifying[i], &qualifying[j], repos) {
                groups.push(group);
            }
        }
    }

    if include_triples {
        'triples: for i in 0..n {
            for j in (i + 1)..n {
                for k in (j + 1)..n {
                    if groups.len() >= max_combos as usize {
                        break 'triples;
                    }
                    if let Some(group) = triple_group(&qualifying[i], &qualifying[j], &qualifying[k], repos) {
                        groups.push(group);
                    }
                }
            }
        }
    }

    groups.sort_by(|a, b| b.overlap_score.partial_cmp(&a.overlap_score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.sort_key().cmp(&b.sort_key())));
    groups.truncate(max_combos as usize);
    groups
}

fn pair_group(a: &Analysis, b: &Analysis, repos: &HashMap<RepoId, Repository>) -> Option<CandidateGroup> {
    let score = pair_overlap_score(a, b, repos)?;
    let mut repo_ids = vec![a.repo_id.clone(), b.repo_id.clone()];
    repo_ids.sort();
    Some(CandidateGroup { repo_ids, overlap_score: score, penalty: 0.0 })
}

fn triple_group(a: &Analysis, b: &Analysis, c: &Analysis, repos: &HashMap<RepoId, Repository>) -> Option<CandidateGroup> {
    let ab = pair_overlap_score(a, b, repos)?;
    let ac = pair_overlap_score(a, c, repos)?;
    let bc = pair_overlap_score(b, c, repos)?;
    let average = round6((ab + ac + bc) / 3.0);
    let mut repo_ids = vec![a.repo_id.clone(), b.repo_id.clone(), c.repo_id.clone()];
    repo_ids.sort();
    Some(CandidateGroup { repo_ids, overlap_score: average, penalty: 0.0 })
}

fn pair_overlap_score(a: &Analysis, b: &Analysis, repos: &HashMap<RepoId, Repository>) -> Option<f64> {
    let repo_a = repos.get(&a.repo_id)?;
    let repo_b = repos.get(&b.repo_id)?;
    Some(overlap_score(repo_a, repo_b, &a.output.signals.integration_surface, &b.output.signals.integration_surface))
}

/// The outcome of running one candidate group through the functional-overlap
/// competitor filter.
#[derive(Debug, Clone)]
pub enum GroupVerdict {
    /// No internal pair exceeded the threshold; `penalty` is always `0.0`.
    Allowed(CandidateGroup),
    /// At least one internal pair exceeded the threshold, but every such
    /// pair carried an interop trigger token; the group's `penalty` is the
    /// sum of the exceptions granted.
    AllowedWithException(CandidateGroup),
    /// At least one internal pair exceeded the threshold with no interop
    /// trigger token to excuse it. Carries the rejected group's
    /// [`CandidateGroup::sort_key`] for audit logging.
    Rejected(String),
}

/// Applies the functional-overlap competitor filter to every group's
/// internal pairs. A group survives only if every internal pair is
/// `Allowed` or `AllowedWithException`; a single `Rejected` internal pair
/// rejects the whole group (`spec.md` §4.G, step 3, "For triples, any
/// rejected internal pair rejects the whole group"). A group missing an
/// analysis for one of its repo ids is treated as rejected.
#[must_use]
pub fn filter_competitors(groups: Vec<CandidateGroup>, analyses_by_repo: &HashMap<RepoId, Analysis>, threshold: f64, exception_penalty: f64) -> Vec<GroupVerdict> {
    let mut verdicts = Vec::with_capacity(groups.len());

    for mut group in groups {
        let per_repo_signatures: Vec<Option<FunctionSignature>> = group
            .repo_ids
            .iter()
            .map(|repo_id| {
                analyses_by_repo.get(repo_id).map(|analysis| {
                    FunctionSignature::build(
                        analysis.output.signals.problem_summary.as_deref(),
                        &analysis.output.signals.integration_surface,
                        &analysis.output.primary_keywords,
                        &analysis.output.secondary_keywords,
                        &analysis.output.search_queries,
                    )
                })
            })
            .collect();

        let expected = per_repo_signatures.len();
        let signatures: Vec<FunctionSignature> = per_repo_signatures.into_iter().flatten().collect();
        if signatures.len() != expected {
            verdicts.push(GroupVerdict::Rejected(group.sort_key()));
            continue;
        }

        let mut total_penalty = 0.0;
        let mut any_exception = false;
        let mut any_rejected = false;
        for i in 0..signatures.len() {
            for j in (i + 1)..signatures.len() {
                match decide_competitor(&signatures[i], &signatures[j], threshold, exception_penalty) {
                    CompetitorVerdict::Allowed => {}
                    CompetitorVerdict::AllowedWithException { penalty } => {
                        total_penalty += penalty;
                        any_exception = true;
                    }
                    CompetitorVerdict::Rejected => any_rejected = true,
                }
            }
        }

        if any_rejected {
            verdicts.push(GroupVerdict::Rejected(group.sort_key()));
            continue;
        }
        group.penalty = round6(total_penalty);
        if any_exception {
            verdicts.push(GroupVerdict::AllowedWithException(group));
        } else {
            verdicts.push(GroupVerdict::Allowed(group));
        }
    }

    verdicts
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use scout_core::AnalysisSignals;
    use scout_core::LlmScores;
    use scout_core::ReasonSet;
    use scout_core::RepoAnalysisOutput;
    use scout_core::RunId;
    use scout_core::Timestamp;

    use super::*;

    fn analysis(run_id: RunId, repo_id: &str, final_score: f64, collab: f64) -> Analysis {
        Analysis {
            run_id,
            repo_id: RepoId::parse(repo_id).unwrap(),
            model: "test-model".to_string(),
            prompt_id: "repo_analysis".to_string(),
            prompt_version: "1".to_string(),
            input_snapshot: serde_json::json!({}),
            output: RepoAnalysisOutput {
                scores: LlmScores { interestingness: 0.8, novelty: 0.7, collaboration_potential: collab },
                reasons: ReasonSet::default(),
                signals: AnalysisSignals { integration_surface: vec!["API".to_string()], ..AnalysisSignals::default() },
                primary_keywords: vec!["vector".to_string()],
                secondary_keywords: vec![],
                search_queries: vec![],
            },
            final_score,
            created_at: Timestamp::from_epoch_millis(0),
        }
    }

    fn repo(id: &str) -> Repository {
        Repository {
            id: RepoId::parse(id).unwrap(),
            stars: 10,
            forks: 0,
            topics: vec!["vector".to_string()],
            primary_language: Some("Rust".to_string()),
            license: None,
            pushed_at: Timestamp::from_epoch_millis(0),
            archived: false,
            is_fork: false,
            last_seen_run_id: RunId::new(),
        }
    }

    #[test]
    fn qualifying_analyses_filters_and_sorts_by_repo_id() {
        let run_id = RunId::new();
        let analyses = vec![analysis(run_id, "acme/zeta", 0.9, 0.9), analysis(run_id, "acme/alpha", 0.1, 0.9), analysis(run_id, "acme/beta", 0.65, 0.7)];
        let qualifying = qualifying_analyses(&analyses, 0.60, 0.65);
        let ids: Vec<&str> = qualifying.iter().map(|a| a.repo_id.as_str()).collect();
        assert_eq!(ids, vec!["acme/beta", "acme/zeta"]);
    }

    #[test]
    fn generate_candidates_respects_max_combos() {
        let run_id = RunId::new();
        let analyses: Vec<Analysis> = (0..5).map(|i| analysis(run_id, &format!("acme/repo{i}"), 0.9, 0.9)).collect();
        let repos: HashMap<RepoId, Repository> = analyses.iter().map(|a| (a.repo_id.clone(), repo(a.repo_id.as_str()))).collect();
        let groups = generate_candidates(&analyses, &repos, 3, false);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn generate_candidates_is_sorted_by_overlap_desc_then_key_asc() {
        let run_id = RunId::new();
        let analyses = vec![analysis(run_id, "acme/a", 0.9, 0.9), analysis(run_id, "acme/b", 0.9, 0.9), analysis(run_id, "acme/c", 0.9, 0.9)];
        let mut repos = HashMap::new();
        repos.insert(RepoId::parse("acme/a").unwrap(), repo("acme/a"));
        repos.insert(RepoId::parse("acme/b").unwrap(), repo("acme/b"));
        let mut low_overlap_repo = repo("acme/c");
        low_overlap_repo.topics = vec!["unrelated".to_string()];
        low_overlap_repo.primary_language = Some("Go".to_string());
        repos.insert(RepoId::parse("acme/c").unwrap(), low_overlap_repo);

        let groups = generate_candidates(&analyses, &repos, 200, false);
        assert_eq!(groups[0].overlap_score, 0.6);
        assert!(groups[0].overlap_score >= groups[1].overlap_score);
    }

    #[test]
    fn filter_competitors_rejects_a_group_with_any_rejected_pair() {
        let run_id = RunId::new();
        let mut a = analysis(run_id, "acme/a", 0.9, 0.9);
        a.output.signals.problem_summary = Some("sync data between services quickly".to_string());
        let mut b = analysis(run_id, "acme/b", 0.9, 0.9);
        b.output.signals.problem_summary = Some("sync data between services quickly".to_string());
        let analyses_by_repo: HashMap<RepoId, Analysis> = vec![(a.repo_id.clone(), a.clone()), (b.repo_id.clone(), b.clone())].into_iter().collect();
        let group = CandidateGroup { repo_ids: vec![a.repo_id.clone(), b.repo_id.clone()], overlap_score: 0.5, penalty: 0.0 };

        let verdicts = filter_competitors(vec![group], &analyses_by_repo, 0.70, 0.10);
        assert_eq!(verdicts.len(), 1);
        assert!(matches!(verdicts[0], GroupVerdict::Rejected(_)));
    }

    #[test]
    fn filter_competitors_keeps_low_overlap_groups_with_zero_penalty() {
        let run_id = RunId::new();
        let mut a = analysis(run_id, "acme/a", 0.9, 0.9);
        a.output.signals.problem_summary = Some("index vectors for semantic search".to_string());
        let mut b = analysis(run_id, "acme/b", 0.9, 0.9);
        b.output.signals.problem_summary = Some("render markdown into static sites".to_string());
        let analyses_by_repo: HashMap<RepoId, Analysis> = vec![(a.repo_id.clone(), a.clone()), (b.repo_id.clone(), b.clone())].into_iter().collect();
        let group = CandidateGroup { repo_ids: vec![a.repo_id.clone(), b.repo_id.clone()], overlap_score: 0.5, penalty: 0.0 };

        let verdicts = filter_competitors(vec![group], &analyses_by_repo, 0.70, 0.10);
        assert_eq!(verdicts.len(), 1);
        match &verdicts[0] {
            GroupVerdict::Allowed(group) => assert_eq!(group.penalty, 0.0),
            other => panic!("expected Allowed, got {other:?}"),
        }
    }
}
