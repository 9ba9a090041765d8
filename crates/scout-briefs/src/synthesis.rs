// crates/scout-briefs/src/synthesis.rs
// ============================================================================
// Module: Brief Synthesis
// Description: Renders the `brief_generate` prompt for a surviving
//              candidate group, validates the LLM's output, scores it, and
//              renders the brief's Markdown and outreach draft.
// Purpose: Back `spec.md` §4.G's "Brief synthesis".
// Dependencies: scout-core, scout-llm
// ============================================================================

//! ## Overview
//! [`build_candidate_json`] assembles the compact, deterministic JSON
//! description handed to the prompt. [`brief_score`] implements the exact
//! weighted formula from `spec.md` §4.G. [`render_markdown`] and
//! [`render_outreach_draft`] turn a validated [`BriefOutput`] into the two
//! artifacts stored on a [`Brief`] row. None of these functions perform
//! I/O; the LLM call itself lives in
//! [`crate::pipeline::BriefEnginePipeline`].

use scout_core::Analysis;
use scout_core::BriefStatus;
use scout_core::Repository;
use scout_llm::BriefOutput;

/// Mandatory banner prepended to every outreach draft (`spec.md` §4.G:
/// outreach drafts are never sent automatically).
pub const MANUAL_REVIEW_BANNER: &str = "> **Manual review required.** This message was drafted by an LLM and has not been sent. Read it, edit it, and send it yourself.\n\n";

/// One repo's compact, deterministic description handed to the
/// `brief_generate` prompt.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CandidateRepoSummary {
    pub full_name: String,
    pub stars: i64,
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub license: Option<String>,
    pub problem_summary: Option<String>,
    pub who_is_it_for: Option<String>,
    pub integration_surface: Vec<String>,
    pub final_score: f64,
}

/// Builds the compact JSON summary for one repo in a candidate group
/// (`spec.md` §4.G, "assemble compact deterministic JSON").
#[must_use]
pub fn build_candidate_summary(repo: &Repository, analysis: &Analysis) -> CandidateRepoSummary {
    CandidateRepoSummary {
        full_name: repo.id.as_str().to_string(),
        stars: repo.stars,
        language: repo.primary_language.clone(),
        topics: repo.topics.clone(),
        license: repo.license.clone(),
        problem_summary: analysis.output.signals.problem_summary.clone(),
        who_is_it_for: analysis.output.signals.who_is_it_for.clone(),
        integration_surface: analysis.output.signals.integration_surface.clone(),
        final_score: analysis.final_score,
    }
}

/// Computes `spec.md` §4.G's brief score:
/// `0.4*avg(final_scores) + 0.4*avg(collaboration_potential) + 0.2*max(overlap_score - penalty, 0)`,
/// rounded to `1e-6`.
#[must_use]
pub fn brief_score(analyses: &[Analysis], overlap_score: f64, penalty: f64) -> f64 {
    let count = analyses.len() as f64;
    let avg_final = if count == 0.0 { 0.0 } else { analyses.iter().map(|analysis| analysis.final_score).sum::<f64>() / count };
    let avg_collab = if count == 0.0 { 0.0 } else { analyses.iter().map(|analysis| analysis.output.scores.collaboration_potential).sum::<f64>() / count };
    let net_overlap = (overlap_score - penalty).max(0.0);
    round6(0.4 * avg_final + 0.4 * avg_collab + 0.2 * net_overlap)
}

/// Maps a `brief_score` against `min_brief_score` to the resulting
/// [`BriefStatus`] (`spec.md` §4.G).
#[must_use]
pub fn brief_status(score: f64, min_brief_score: f64) -> BriefStatus {
    if score >= min_brief_score { BriefStatus::Shortlisted } else { BriefStatus::RejectedByThreshold }
}

/// Renders the brief's Markdown body, led by a score header
/// (`spec.md` §4.G).
#[must_use]
pub fn render_markdown(output: &BriefOutput, score: f64) -> String {
    let mut markdown = format!("# {}\n\n**Score:** {score:.6}\n\n{}\n\n", output.title, output.concept);
    for section in &output.repos {
        markdown.push_str(&format!("## {}\n\n**Role:** {}\n\n{}\n\n", section.full_name, section.integration_role, section.why_it_fits));
    }
    markdown
}

/// Renders the outreach draft: the mandatory manual-review banner followed
/// by each repo's drafted message (`spec.md` §4.G).
#[must_use]
pub fn render_outreach_draft(output: &BriefOutput) -> String {
    let mut draft = String::from(MANUAL_REVIEW_BANNER);
    for section in &output.repos {
        draft.push_str(&format!("### {}\n\n{}\n\n", section.full_name, section.outreach_message));
    }
    draft
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
    use scout_core::RepoId;
    use scout_core::RunId;
    use scout_core::Timestamp;
    use scout_llm::BriefRepoSection;

    use super::*;

    fn analysis(final_score: f64, collab: f64) -> Analysis {
        Analysis {
            run_id: RunId::new(),
            repo_id: RepoId::parse("acme/alpha").unwrap(),
            model: "test-model".to_string(),
            prompt_id: "repo_analysis".to_string(),
            prompt_version: "1".to_string(),
            input_snapshot: serde_json::json!({}),
            output: RepoAnalysisOutput {
                scores: LlmScores { interestingness: 0.8, novelty: 0.7, collaboration_potential: collab },
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
    fn brief_score_matches_the_weighted_formula() {
        let analyses = vec![analysis(0.80, 0.70), analysis(0.60, 0.90)];
        let score = brief_score(&analyses, 0.5, 0.1);
        assert_eq!(score, 0.4 * 0.70 + 0.4 * 0.80 + 0.2 * 0.4);
    }

    #[test]
    fn brief_score_floors_net_overlap_at_zero() {
        let analyses = vec![analysis(0.80, 0.70)];
        let score = brief_score(&analyses, 0.05, 0.10);
        assert_eq!(score, 0.4 * 0.80 + 0.4 * 0.70);
    }

    #[test]
    fn brief_status_gates_on_min_brief_score() {
        assert_eq!(brief_status(0.75, 0.75), BriefStatus::Shortlisted);
        assert_eq!(brief_status(0.749_999, 0.75), BriefStatus::RejectedByThreshold);
    }

    #[test]
    fn render_outreach_draft_always_leads_with_the_manual_review_banner() {
        let output = BriefOutput {
            title: "Title".to_string(),
            concept: "Concept".to_string(),
            repos: vec![BriefRepoSection {
                full_name: "acme/alpha".to_string(),
                why_it_fits: "Fits".to_string(),
                integration_role: "Core".to_string(),
                outreach_message: "Hello".to_string(),
            }],
        };
        let draft = render_outreach_draft(&output);
        assert!(draft.starts_with(MANUAL_REVIEW_BANNER));
        assert!(draft.contains("Hello"));
    }

    #[test]
    fn render_markdown_leads_with_a_score_header() {
        let output = BriefOutput { title: "Title".to_string(), concept: "Concept".to_string(), repos: vec![] };
        let markdown = render_markdown(&output, 0.812_345);
        assert!(markdown.starts_with("# Title"));
        assert!(markdown.contains("0.812345"));
    }
}
