// crates/scout-briefs/src/pipeline.rs
// ============================================================================
// Module: Brief Engine Pipeline
// Description: Orchestrates candidate generation, the competitor filter,
//              LLM brief synthesis, and Markdown export over a run's
//              analyses.
// Purpose: The orchestrated body of `briefs:generate` and `briefs:export`
//          (spec.md §4.G, §6).
// Dependencies: scout-core, scout-store-sqlite, scout-llm, scout-config,
//               scout-orchestrator
// ============================================================================

//! ## Overview
//! [`BriefEnginePipeline`] is constructed once per invocation with the
//! run's [`LlmClient`], [`PromptRegistry`], and [`ScoringPolicy`].
//! [`BriefEnginePipeline::generate_briefs`] reads a run's analyses
//! (optionally extended with historical top-per-repo analyses from other
//! runs), builds candidate groups, filters them, synthesizes and scores a
//! brief per survivor, and stops at `maxBriefs`.
//! [`BriefEnginePipeline::export_markdown`] writes the top-scoring briefs'
//! Markdown to a directory. [`BriefEnginePipeline::replay_run`] is a
//! read-only re-score, delegating to [`crate::replay::replay`].
//!
//! Every store read/write happens inside a `tokio::task::spawn_blocking`
//! closure, matching `scout-discovery`'s pipeline.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use scout_config::ScoringPolicy;
use scout_core::Analysis;
use scout_core::AuditLevel;
use scout_core::Brief;
use scout_core::BriefId;
use scout_core::BriefStatus;
use scout_core::Clock;
use scout_core::RepoId;
use scout_core::Repository;
use scout_core::RunId;
use scout_core::StepName;
use scout_core::StepStatus;
use scout_core::StoreError;
use scout_llm::CallParams;
use scout_llm::LlmClient;
use scout_llm::PromptRegistry;
use scout_llm::validate_brief_output;
use scout_orchestrator::RunOrchestrator;
use scout_store_sqlite::AnalysisDao;
use scout_store_sqlite::BriefDao;
use scout_store_sqlite::RepoDao;
use scout_store_sqlite::Store;
use serde_json::json;

use crate::candidates::CandidateGroup;
use crate::candidates::GroupVerdict;
use crate::candidates::filter_competitors;
use crate::candidates::generate_candidates;
use crate::candidates::qualifying_analyses;
use crate::errors::BriefError;
use crate::params::BriefParams;
use crate::replay::ReplayResult;
use crate::replay::replay as replay_analyses;
use crate::synthesis::build_candidate_summary;
use crate::synthesis::brief_score;
use crate::synthesis::brief_status;
use crate::synthesis::render_markdown;
use crate::synthesis::render_outreach_draft;

/// Banner prefixed to `out_dir/index.md` by [`BriefEnginePipeline::export_markdown`].
const EXPORT_BANNER: &str = "> Manual review required. This tool does not post automatically.\n\n";

/// Summary returned by [`BriefEnginePipeline::generate_briefs`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BriefGenerateSummary {
    /// Candidate groups considered after the competitor filter.
    pub candidates_considered: usize,
    /// Candidate groups rejected by the functional-overlap competitor filter.
    pub pairs_rejected_overlap: usize,
    /// Candidate groups allowed through on the interop-trigger exception.
    pub pairs_allowed_exception: usize,
    /// Briefs skipped because one of their repos was already shortlisted.
    pub anchor_deduped: usize,
    /// Briefs for which LLM synthesis or validation failed.
    pub briefs_failed: usize,
    /// Briefs generated and stored, regardless of status.
    pub briefs_generated: usize,
    /// Of `briefs_generated`, how many were `shortlisted`.
    pub briefs_shortlisted: usize,
    /// Of `briefs_generated`, how many were `rejected_by_threshold`.
    pub briefs_rejected_by_threshold: usize,
    /// Historical analyses injected from other runs before grouping.
    pub historical_injected: usize,
}

/// Summary returned by [`BriefEnginePipeline::export_markdown`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExportSummary {
    /// Markdown files written.
    pub files_written: usize,
}

/// Orchestrates candidate generation, competitor filtering, brief
/// synthesis, and export over an injected [`LlmClient`] and [`Store`].
pub struct BriefEnginePipeline {
    store: Arc<Store>,
    llm: Arc<LlmClient>,
    prompts: PromptRegistry,
    scoring: ScoringPolicy,
    clock: Arc<dyn Clock>,
}

impl BriefEnginePipeline {
    /// Builds a pipeline from its collaborators.
    #[must_use]
    pub fn new(store: Arc<Store>, llm: Arc<LlmClient>, prompts: PromptRegistry, scoring: ScoringPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { store, llm, prompts, scoring, clock }
    }

    /// Runs `briefs:generate` (`spec.md` §4.G) over `orchestrator.run_id()`'s
    /// analyses.
    ///
    /// # Errors
    ///
    /// Returns [`BriefError`] if the store cannot be read/written or the
    /// orchestrator fails to record a step.
    pub async fn generate_briefs(&self, orchestrator: &RunOrchestrator, params: &BriefParams) -> Result<BriefGenerateSummary, BriefError> {
        let run_id = orchestrator.run_id();
        let step = orchestrator.start_step(StepName::LlmBriefGenerate).await?;
        let mut summary = BriefGenerateSummary::default();

        let pool = self.build_candidate_pool(orchestrator, run_id, params, &mut summary).await?;
        let thresholds = &self.scoring.thresholds;
        let qualifying = qualifying_analyses(&pool, thresholds.min_repo_score_for_brief, thresholds.min_collaboration_potential_for_brief);

        let repo_ids: HashSet<RepoId> = qualifying.iter().map(|analysis| analysis.repo_id.clone()).collect();
        let repos = self.load_repos(repo_ids).await?;

        let analyses_by_repo: HashMap<RepoId, Analysis> = qualifying.iter().map(|analysis| (analysis.repo_id.clone(), analysis.clone())).collect();
        let groups = generate_candidates(&qualifying, &repos, params.max_combos, params.include_triples);
        let verdicts = filter_competitors(groups, &analyses_by_repo, params.overlap_threshold, params.overlap_exception_penalty);

        let min_brief_score = params.min_brief_score.unwrap_or(thresholds.min_brief_score);
        let mut already_shortlisted: HashSet<RepoId> = HashSet::new();

        for verdict in verdicts {
            if summary.briefs_generated >= params.max_briefs {
                break;
            }
            let group = match verdict {
                GroupVerdict::Allowed(group) => group,
                GroupVerdict::AllowedWithException(group) => {
                    summary.pairs_allowed_exception += 1;
                    orchestrator
                        .log_audit(AuditLevel::Info, StepName::LlmBriefGenerate.as_str(), "briefs.pair_allowed_exception", "candidate group allowed past the competitor threshold on an interop trigger", json!({"repo_ids": group.sort_key()}))
                        .await?;
                    group
                }
                GroupVerdict::Rejected(sort_key) => {
                    summary.pairs_rejected_overlap += 1;
                    orchestrator
                        .log_audit(AuditLevel::Info, StepName::LlmBriefGenerate.as_str(), "briefs.pair_rejected_overlap", "candidate group rejected as functional competitors", json!({"repo_ids": sort_key}))
                        .await?;
                    continue;
                }
            };
            summary.candidates_considered += 1;

            let own_exempt = params.own_repo.as_ref();
            if group.repo_ids.iter().any(|repo_id| already_shortlisted.contains(repo_id) && Some(repo_id) != own_exempt) {
                summary.anchor_deduped += 1;
                continue;
            }

            let group_analyses: Vec<Analysis> = group.repo_ids.iter().filter_map(|repo_id| analyses_by_repo.get(repo_id).cloned()).collect();
            if group_analyses.len() != group.repo_ids.len() {
                continue;
            }

            match self.synthesize_brief(orchestrator, run_id, &group, &group_analyses, &repos, min_brief_score).await? {
                Some(status) => {
                    summary.briefs_generated += 1;
                    match status {
                        BriefStatus::Shortlisted => {
                            summary.briefs_shortlisted += 1;
                            for repo_id in &group.repo_ids {
                                if Some(repo_id) != own_exempt {
                                    already_shortlisted.insert(repo_id.clone());
                                }
                            }
                        }
                        BriefStatus::RejectedByThreshold => summary.briefs_rejected_by_threshold += 1,
                        _ => {}
                    }
                }
                None => summary.briefs_failed += 1,
            }
        }

        let status = if summary.briefs_generated > 0 || summary.briefs_failed == 0 { StepStatus::Success } else { StepStatus::Failed };
        step.finish(status, serde_json::to_value(&summary).unwrap_or(serde_json::Value::Null)).await?;
        Ok(summary)
    }

    async fn build_candidate_pool(&self, orchestrator: &RunOrchestrator, run_id: RunId, params: &BriefParams, summary: &mut BriefGenerateSummary) -> Result<Vec<Analysis>, BriefError> {
        let store = Arc::clone(&self.store);
        let mut pool = run_blocking(move || store.with_transaction(|tx| AnalysisDao::list_for_run(tx, run_id))).await?;

        if params.history_candidates > 0 {
            let store = Arc::clone(&self.store);
            let history_candidates = params.history_candidates;
            let historical = run_blocking(move || store.with_transaction(|tx| AnalysisDao::historical_top_per_repo(tx, run_id, history_candidates))).await?;
            let current_repo_ids: HashSet<RepoId> = pool.iter().map(|analysis| analysis.repo_id.clone()).collect();
            let injected: Vec<Analysis> = historical.into_iter().filter(|analysis| !current_repo_ids.contains(&analysis.repo_id)).collect();
            summary.historical_injected = injected.len();
            if summary.historical_injected > 0 {
                orchestrator
                    .log_audit(AuditLevel::Info, StepName::LlmBriefGenerate.as_str(), "briefs.history.injected", "historical top-per-repo analyses injected into the candidate pool", json!({"count": summary.historical_injected}))
                    .await?;
            }
            pool.extend(injected);
        }

        Ok(pool)
    }

    async fn load_repos(&self, repo_ids: HashSet<RepoId>) -> Result<HashMap<RepoId, Repository>, BriefError> {
        let store = Arc::clone(&self.store);
        let ids: Vec<RepoId> = repo_ids.into_iter().collect();
        run_blocking(move || {
            store.with_transaction(|tx| {
                let mut repos = HashMap::with_capacity(ids.len());
                for repo_id in ids {
                    if let Some(repo) = RepoDao::get(tx, &repo_id)? {
                        repos.insert(repo_id, repo);
                    }
                }
                Ok(repos)
            })
        })
        .await
        .map_err(BriefError::from)
    }

    async fn synthesize_brief(
        &self,
        orchestrator: &RunOrchestrator,
        run_id: RunId,
        group: &CandidateGroup,
        group_analyses: &[Analysis],
        repos: &HashMap<RepoId, Repository>,
        min_brief_score: f64,
    ) -> Result<Option<BriefStatus>, BriefError> {
        let summaries: Vec<_> = group
            .repo_ids
            .iter()
            .zip(group_analyses)
            .filter_map(|(repo_id, analysis)| repos.get(repo_id).map(|repo| build_candidate_summary(repo, analysis)))
            .collect();
        if summaries.len() != group.repo_ids.len() {
            return Ok(None);
        }

        let template = self.prompts.load("brief_generate", 1)?;
        let mut values = HashMap::new();
        let candidate_summaries_json = serde_json::to_string_pretty(&summaries).unwrap_or_default();
        values.insert("candidate_summaries", candidate_summaries_json);
        values.insert("anchor_full_name", summaries.first().map(|summary| summary.full_name.clone()).unwrap_or_default());
        let shared_keywords: HashSet<&str> = summaries.iter().flat_map(|summary| summary.integration_surface.iter().map(String::as_str)).collect();
        values.insert("shared_keywords", shared_keywords.into_iter().collect::<Vec<_>>().join(", "));
        let prompt_body = template.render(&values);

        let result = self.llm.chat_completion(&prompt_body, CallParams { temperature: template.temperature, max_tokens: template.max_tokens }).await;
        let raw_output = match result {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(repo_ids = group.sort_key().as_str(), error = %err, "brief synthesis llm call failed");
                orchestrator
                    .log_audit(AuditLevel::Warn, StepName::LlmBriefGenerate.as_str(), "llm.output.invalid_json", "brief synthesis llm call failed before validation", json!({"repo_ids": group.sort_key(), "error": err.to_string()}))
                    .await?;
                return Ok(None);
            }
        };

        let output = match validate_brief_output(&raw_output) {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!(repo_ids = group.sort_key().as_str(), error = %err, "brief synthesis output failed schema validation");
                orchestrator
                    .log_audit(AuditLevel::Warn, StepName::LlmBriefGenerate.as_str(), "llm.output.invalid_json", "brief synthesis output failed schema validation", json!({"repo_ids": group.sort_key(), "error": err.to_string()}))
                    .await?;
                return Ok(None);
            }
        };

        let score = brief_score(group_analyses, group.overlap_score, group.penalty);
        let status = brief_status(score, min_brief_score);
        let markdown = render_markdown(&output, score);
        let outreach_draft = render_outreach_draft(&output);
        let content = serde_json::to_value(&output).map_err(|err| BriefError::Join(err.to_string()))?;

        let brief = Brief {
            id: BriefId::new(),
            run_id,
            score,
            repo_ids: group.repo_ids.clone(),
            content,
            markdown,
            outreach_draft,
            status,
            created_at: self.clock.now(),
        };

        let store = Arc::clone(&self.store);
        let brief_for_store = brief.clone();
        run_blocking(move || store.with_transaction(|tx| BriefDao::insert(tx, &brief_for_store))).await?;

        Ok(Some(status))
    }

    /// Runs `briefs:export` (`spec.md` §6): writes `out_dir/index.md`, one
    /// `out_dir/briefs/{brief_id}.md` and `out_dir/briefs/{brief_id}_outreach.md`
    /// per brief, and `out_dir/TOP_OPPORTUNITY_{1..N}.md` for the top
    /// `top_opportunities` shortlisted briefs (`spec.md` §6, "Export
    /// layout"). Briefs are ordered by score, highest first
    /// ([`BriefDao::list_for_run`]'s order).
    ///
    /// # Errors
    ///
    /// Returns [`BriefError`] if the store cannot be read, the orchestrator
    /// fails to record the step, or a file cannot be written.
    pub async fn export_markdown(&self, orchestrator: &RunOrchestrator, run_id: RunId, out_dir: &Path, top_opportunities: u32) -> Result<ExportSummary, BriefError> {
        let step = orchestrator.start_step(StepName::ExportMarkdown).await?;
        let store = Arc::clone(&self.store);
        let briefs = run_blocking(move || store.with_transaction(|tx| BriefDao::list_for_run(tx, run_id))).await?;

        let briefs_dir = out_dir.join("briefs");
        std::fs::create_dir_all(&briefs_dir).map_err(|err| BriefError::Join(err.to_string()))?;
        let mut files_written = 0;

        let mut index = String::from(EXPORT_BANNER);
        index.push_str("# Brief Index\n\n");
        for brief in &briefs {
            std::fs::write(briefs_dir.join(format!("{}.md", brief.id)), &brief.markdown).map_err(|err| BriefError::Join(err.to_string()))?;
            std::fs::write(briefs_dir.join(format!("{}_outreach.md", brief.id)), &brief.outreach_draft).map_err(|err| BriefError::Join(err.to_string()))?;
            files_written += 2;
            index.push_str(&format!("- [{score:.6}] `{status}` — [briefs/{id}.md](briefs/{id}.md)\n", score = brief.score, status = brief.status.as_str(), id = brief.id));
        }
        std::fs::write(out_dir.join("index.md"), &index).map_err(|err| BriefError::Join(err.to_string()))?;
        files_written += 1;

        let shortlisted = briefs.iter().filter(|brief| brief.status == BriefStatus::Shortlisted);
        for (rank, brief) in shortlisted.take(top_opportunities as usize).enumerate() {
            let path = out_dir.join(format!("TOP_OPPORTUNITY_{}.md", rank + 1));
            std::fs::write(&path, &brief.markdown).map_err(|err| BriefError::Join(err.to_string()))?;
            files_written += 1;
        }

        let summary = ExportSummary { files_written };
        step.finish(StepStatus::Success, json!({"files_written": files_written})).await?;
        Ok(summary)
    }

    /// Runs `debug:replay` (`spec.md` §4.G, §6): recomputes `final_score`
    /// for every analysis in `run_id` under `policy` (falling back to the
    /// pipeline's configured policy when `None`), with no store mutation.
    ///
    /// # Errors
    ///
    /// Returns [`BriefError`] if the analyses cannot be read.
    pub async fn replay_run(&self, run_id: RunId, policy: Option<&ScoringPolicy>) -> Result<ReplayResult, BriefError> {
        let store = Arc::clone(&self.store);
        let analyses = run_blocking(move || store.with_transaction(|tx| AnalysisDao::list_for_run(tx, run_id))).await?;
        Ok(replay_analyses(&analyses, policy.unwrap_or(&self.scoring)))
    }
}

async fn run_blocking<T, F>(body: F) -> Result<T, BriefError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(body).await.map_err(|err| BriefError::Join(err.to_string()))?.map_err(BriefError::from)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use super::*;

    #[test]
    fn export_summary_defaults_to_zero_files() {
        let summary = ExportSummary::default();
        assert_eq!(summary.files_written, 0);
    }

    #[test]
    fn generate_summary_defaults_are_all_zero() {
        let summary = BriefGenerateSummary::default();
        assert_eq!(summary.candidates_considered, 0);
        assert_eq!(summary.briefs_generated, 0);
    }
}
