// crates/scout-briefs/src/replay.rs
// ============================================================================
// Module: Replay
// Description: Recomputes `final_score` for every analysis in a run under
//              a (possibly updated) scoring policy, with no store mutation
//              and no network I/O.
// Purpose: Back `spec.md` §4.G's "Replay" and the `debug:replay` CLI verb
//          (`spec.md` §6).
// Dependencies: scout-core, scout-config
// ============================================================================

//! ## Overview
//! [`replay`] is pure: it takes the analyses already loaded from the store
//! and a [`ScoringPolicy`], and reports what would change if that policy
//! were applied. It never writes anything back — re-running `briefs:generate`
//! is what actually commits a new scoring pass.

use scout_config::RawScores;
use scout_config::ScoringPolicy;
use scout_config::SignalsInput;
use scout_core::Analysis;
use scout_core::RepoId;

/// One analysis whose recomputed score differs from its stored score.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoreDiff {
    pub repo_id: RepoId,
    pub stored_score: f64,
    pub recomputed_score: f64,
}

/// The outcome of replaying a run's analyses under `policy`
/// (`spec.md` §4.G, "Replay").
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReplayResult {
    /// Total analyses considered.
    pub replayed: usize,
    /// Analyses whose recomputed score differs from the stored score.
    pub changed: usize,
    /// Analyses whose recomputed score matches the stored score exactly.
    pub unchanged: usize,
    /// One entry per changed analysis.
    pub diffs: Vec<ScoreDiff>,
    /// The policy version used for recomputation.
    pub policy_version: String,
}

/// Recomputes `final_score` for each of `analyses` under `policy` and
/// reports what changed. Read-only: does not touch the store.
#[must_use]
pub fn replay(analyses: &[Analysis], policy: &ScoringPolicy) -> ReplayResult {
    let mut diffs = Vec::new();
    let mut changed = 0;
    let mut unchanged = 0;

    for analysis in analyses {
        let scores = RawScores {
            interestingness: analysis.output.scores.interestingness,
            novelty: analysis.output.scores.novelty,
            collaboration_potential: analysis.output.scores.collaboration_potential,
        };
        let signals = SignalsInput { integration_surface: &analysis.output.signals.integration_surface, risk_flags: analysis.output.signals.risk_flags.as_deref() };
        let recomputed = policy.final_score(scores, &signals);

        if (recomputed - analysis.final_score).abs() < f64::EPSILON {
            unchanged += 1;
        } else {
            changed += 1;
            diffs.push(ScoreDiff { repo_id: analysis.repo_id.clone(), stored_score: analysis.final_score, recomputed_score: recomputed });
        }
    }

    ReplayResult { replayed: analyses.len(), changed, unchanged, diffs, policy_version: policy.version.clone() }
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

    fn analysis(final_score: f64, interestingness: f64) -> Analysis {
        Analysis {
            run_id: RunId::new(),
            repo_id: RepoId::parse("acme/alpha").unwrap(),
            model: "test-model".to_string(),
            prompt_id: "repo_analysis".to_string(),
            prompt_version: "1".to_string(),
            input_snapshot: serde_json::json!({}),
            output: RepoAnalysisOutput {
                scores: LlmScores { interestingness, novelty: 0.5, collaboration_potential: 0.5 },
                reasons: ReasonSet::default(),
                signals: AnalysisSignals::default(),
                primary_keywords: vec![],
                secondary_keywords: vec![],
                search_queries: vec![],
            },
            final_score,
            created_at: Timestamp::from_epoch_millis(0),
        }
    }

    #[test]
    fn replay_reports_no_diffs_when_the_stored_score_already_matches() {
        let policy = ScoringPolicy::default_policy();
        let scores = RawScores { interestingness: 0.8, novelty: 0.5, collaboration_potential: 0.5 };
        let signals = SignalsInput { integration_surface: &[], risk_flags: None };
        let stored = policy.final_score(scores, &signals);
        let analyses = vec![analysis(stored, 0.8)];

        let result = replay(&analyses, &policy);
        assert_eq!(result.replayed, 1);
        assert_eq!(result.changed, 0);
        assert_eq!(result.unchanged, 1);
        assert!(result.diffs.is_empty());
    }

    #[test]
    fn replay_reports_a_diff_when_the_stored_score_is_stale() {
        let policy = ScoringPolicy::default_policy();
        let analyses = vec![analysis(0.123_456, 0.8)];

        let result = replay(&analyses, &policy);
        assert_eq!(result.changed, 1);
        assert_eq!(result.unchanged, 0);
        assert_eq!(result.diffs[0].stored_score, 0.123_456);
    }
}
