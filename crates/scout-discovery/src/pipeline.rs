// crates/scout-discovery/src/pipeline.rs
// ============================================================================
// Module: Discovery Pipeline
// Description: Pass 1 (user query → search → hydrate → analyze), keyword
//              aggregation, and pass 2 (aggregate-derived queries → search →
//              hydrate → analyze, under hard caps).
// Purpose: The orchestrated body of `scout:run` and `scout:expand`
//          (spec.md §4.F).
// Dependencies: scout-core, scout-store-sqlite, scout-http, scout-llm,
//               scout-config, scout-orchestrator
// ============================================================================

//! ## Overview
//! [`DiscoveryPipeline`] is constructed once per invocation with the run's
//! [`GithubClient`], [`LlmClient`], [`PromptRegistry`], and
//! [`ScoringPolicy`]. [`DiscoveryPipeline::run_pass1`] and
//! [`DiscoveryPipeline::run_pass2`] each open the `StepName`s relevant to
//! that pass through the caller's [`RunOrchestrator`], in the fixed order
//! `spec.md` §4.F describes. Every store read/write happens inside a
//! `tokio::task::spawn_blocking` closure, following the same pattern
//! `scout-orchestrator` and `scout-http::cache` already use for the
//! synchronous-store-from-an-async-caller boundary.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use scout_config::RawScores;
use scout_config::ScoringPolicy;
use scout_config::SignalsInput;
use scout_core::AuditLevel;
use scout_core::Clock;
use scout_core::GithubQuery;
use scout_core::Keyword;
use scout_core::KeywordKind;
use scout_core::Pass;
use scout_core::QueryId;
use scout_core::Readme;
use scout_core::RepoId;
use scout_core::RepoQueryLink;
use scout_core::Repository;
use scout_core::RunId;
use scout_core::StepName;
use scout_core::StepStatus;
use scout_core::StoreError;
use scout_core::Timestamp;
use scout_core::hashing::sha256_hex;
use scout_http::GithubClient;
use scout_http::HttpClientError;
use scout_http::ResponseBody;
use scout_llm::CallParams;
use scout_llm::LlmClient;
use scout_llm::PromptRegistry;
use scout_llm::validate_repo_analysis;
use scout_orchestrator::RunOrchestrator;
use scout_store_sqlite::AnalysisDao;
use scout_store_sqlite::QueryDao;
use scout_store_sqlite::RateLimitDao;
use scout_store_sqlite::RepoDao;
use scout_store_sqlite::Store;
use serde_json::Value;
use serde_json::json;

use crate::errors::DiscoveryError;
use crate::keywords::aggregate_keywords;
use crate::params::DEFAULT_KEYWORD_AGGREGATE_TOP_K;
use crate::params::DEFAULT_README_EXCERPT_CHARS;
use crate::params::Pass1Params;
use crate::params::Pass2Params;
use crate::query::QualifierParams;
use crate::query::build_search_string;

/// Search results are paginated at 100 per page (`scout-http`'s
/// `search_repositories`).
const SEARCH_PAGE_SIZE: u32 = 100;

/// Summary returned by [`DiscoveryPipeline::run_pass1`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Pass1Summary {
    /// Repos returned by the pass-1 search, in rank order.
    pub repos_found: usize,
    /// READMEs successfully fetched and stored.
    pub readmes_fetched: usize,
    /// Repos for which no README exists upstream (404).
    pub readmes_missing: usize,
    /// Repos for which README hydration failed for a reason other than 404.
    pub readmes_hydrate_failed: usize,
    /// Analyses successfully completed.
    pub analyses_completed: usize,
    /// Analyses that failed LLM-output validation.
    pub analyses_failed: usize,
}

/// Summary returned by [`DiscoveryPipeline::run_pass2`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Pass2Summary {
    /// Aggregate keyword rows written.
    pub aggregate_keywords: usize,
    /// Queries issued.
    pub queries_issued: usize,
    /// Newly discovered repos upserted.
    pub new_repos: usize,
    /// New analyses completed.
    pub new_analyses: usize,
    /// Whether either hard cap (`maxNewReposTotal`/`maxLLMAnalysesTotal`)
    /// stopped the pass early.
    pub capped: bool,
}

/// A repository parsed from a GitHub search result item, plus the
/// description text carried only for analysis-prompt rendering (the
/// `Repository` domain model has no description column; `spec.md` §3 does
/// not name one as a persisted field).
struct ParsedRepo {
    repository: Repository,
    description: String,
}

/// Orchestrates the two-pass discovery pipeline over an injected
/// [`GithubClient`], [`LlmClient`], and [`Store`].
pub struct DiscoveryPipeline {
    store: Arc<Store>,
    github: Arc<GithubClient>,
    llm: Arc<LlmClient>,
    prompts: PromptRegistry,
    scoring: ScoringPolicy,
    clock: Arc<dyn Clock>,
    readme_excerpt_chars: usize,
    keyword_aggregate_top_k: u32,
}

impl DiscoveryPipeline {
    /// Builds a pipeline with the `spec.md` §4.F defaults: an 8000-char
    /// README excerpt and a top-20 keyword-aggregation window.
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        github: Arc<GithubClient>,
        llm: Arc<LlmClient>,
        prompts: PromptRegistry,
        scoring: ScoringPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            github,
            llm,
            prompts,
            scoring,
            clock,
            readme_excerpt_chars: DEFAULT_README_EXCERPT_CHARS,
            keyword_aggregate_top_k: DEFAULT_KEYWORD_AGGREGATE_TOP_K,
        }
    }

    /// Overrides the bounded README excerpt length fed to the analysis
    /// prompt.
    #[must_use]
    pub const fn with_readme_excerpt_chars(mut self, chars: usize) -> Self {
        self.readme_excerpt_chars = chars;
        self
    }

    /// Overrides the keyword-aggregation top-K window.
    #[must_use]
    pub const fn with_keyword_aggregate_top_k(mut self, top_k: u32) -> Self {
        self.keyword_aggregate_top_k = top_k;
        self
    }

    /// Runs pass 1: rate-limit snapshot, paged search, repo/README
    /// hydration, and analysis of every newly hydrated repo (`spec.md`
    /// §4.F "Pass 1").
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if a step that is not individually
    /// recoverable (the rate-limit snapshot call, a store write) fails.
    /// Per-repo README/analysis failures are recorded as audit events and
    /// summary counters instead of aborting the pass.
    pub async fn run_pass1(&self, orchestrator: &RunOrchestrator, params: &Pass1Params) -> Result<Pass1Summary, DiscoveryError> {
        self.snapshot_rate_limits(orchestrator).await?;

        let query_string = build_search_string(
            &params.query,
            &QualifierParams {
                days: params.days,
                stars_low: params.stars,
                stars_high: params.max_stars,
                language: params.language.as_deref(),
                include_forks: params.include_forks,
                include_archived: false,
                in_readme: false,
            },
            self.clock.as_ref(),
        );

        let (parsed_repos, repo_ids) = self.search_and_link(orchestrator, Pass::One, &query_string, params.top_n, json!({
            "days": params.days,
            "stars": params.stars,
            "maxStars": params.max_stars,
            "topN": params.top_n,
            "language": params.language,
            "includeForks": params.include_forks,
        })).await?;

        let descriptions = self.hydrate_repo_metadata(orchestrator, parsed_repos).await?;

        let mut summary = Pass1Summary { repos_found: repo_ids.len(), ..Pass1Summary::default() };
        let pending = self.hydrate_readmes(orchestrator, &repo_ids, &mut summary).await?;
        self.analyze_repos(orchestrator, &pending, &descriptions, &params.model, &mut summary).await?;
        Ok(summary)
    }

    /// Runs pass 2: keyword aggregation over pass 1's top analyses, query
    /// generation from the aggregate, and capped search/hydrate/analyze
    /// over each generated query (`spec.md` §4.F "Keyword aggregation",
    /// "Pass-2 query generation", "Pass 2 execution").
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] on a store or orchestrator failure that
    /// is not individually attributable to one query or repo.
    pub async fn run_pass2(&self, orchestrator: &RunOrchestrator, params: &Pass2Params) -> Result<Pass2Summary, DiscoveryError> {
        let run_id = orchestrator.run_id();
        let handle = orchestrator.start_step(StepName::KeywordAggregate).await?;
        let top_k = self.keyword_aggregate_top_k;
        let store = Arc::clone(&self.store);
        let aggregate = run_blocking(move || store.with_transaction(|tx| aggregate_keywords(tx, run_id, top_k))).await?;
        let queries = generate_pass2_queries(&aggregate, params.max_queries);
        handle
            .finish(StepStatus::Success, json!({"aggregate_keywords": aggregate.len(), "queries_generated": queries.len()}))
            .await?;

        let mut summary = Pass2Summary { aggregate_keywords: aggregate.len(), ..Pass2Summary::default() };
        self.run_pass2_queries(orchestrator, params, &queries, &mut summary).await?;
        Ok(summary)
    }

    async fn run_pass2_queries(
        &self,
        orchestrator: &RunOrchestrator,
        params: &Pass2Params,
        queries: &[String],
        summary: &mut Pass2Summary,
    ) -> Result<(), DiscoveryError> {
        let run_id = orchestrator.run_id();
        let handle = orchestrator.start_step(StepName::GithubSearchPass2).await?;

        'queries: for term in queries {
            if summary.new_repos >= params.max_new_repos_total {
                orchestrator
                    .log_audit(
                        AuditLevel::Warn,
                        StepName::GithubSearchPass2.as_str(),
                        "pass2.repos.capped",
                        "max new repos reached, stopping pass 2",
                        json!({"capped": true, "reason": "max_new_repos_total"}),
                    )
                    .await?;
                summary.capped = true;
                break 'queries;
            }
            if summary.new_analyses >= params.max_llm_analyses_total {
                orchestrator
                    .log_audit(
                        AuditLevel::Warn,
                        StepName::GithubSearchPass2.as_str(),
                        "pass2.analyses.capped",
                        "max new analyses reached, stopping pass 2",
                        json!({"capped": true, "reason": "max_llm_analyses_total"}),
                    )
                    .await?;
                summary.capped = true;
                break 'queries;
            }

            let query_string = build_search_string(
                term,
                &QualifierParams {
                    days: 0,
                    stars_low: params.pass2_stars,
                    stars_high: params.pass2_max_stars,
                    language: None,
                    include_forks: false,
                    include_archived: false,
                    in_readme: false,
                },
                self.clock.as_ref(),
            );

            let query_id = QueryId::new();
            let query_row = GithubQuery {
                id: query_id,
                run_id,
                pass: Pass::Two,
                query_string: query_string.clone(),
                params: json!({"term": term, "pass2Stars": params.pass2_stars, "pass2MaxStars": params.pass2_max_stars}),
            };
            let store = Arc::clone(&self.store);
            run_blocking(move || store.with_transaction(|tx| QueryDao::insert_query(tx, &query_row))).await?;
            summary.queries_issued += 1;

            let mut rank: i64 = 0;
            let mut page = 1;
            loop {
                let response = self.github.search_repositories(&query_string, page).await?;
                let Some(body) = response.body.as_json() else {
                    return Err(DiscoveryError::MalformedPayload("search response was not json".to_string()));
                };
                let items = body.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
                let incomplete = body.get("incomplete_results").and_then(Value::as_bool).unwrap_or(false);
                let page_len = items.len();

                for item in items {
                    rank += 1;
                    let full_name = item.get("full_name").and_then(Value::as_str).unwrap_or_default().to_string();
                    let Some(repo_id) = RepoId::parse(&full_name) else { continue };

                    let store = Arc::clone(&self.store);
                    let query_id_for_link = query_id;
                    let repo_id_for_link = repo_id.clone();
                    let already_analyzed =
                        run_blocking(move || store.with_transaction(|tx| AnalysisDao::exists(tx, run_id, &repo_id_for_link))).await?;

                    if already_analyzed {
                        let link = RepoQueryLink { query_id: query_id_for_link, repo_id: repo_id.clone(), rank };
                        let store = Arc::clone(&self.store);
                        run_blocking(move || store.with_transaction(|tx| QueryDao::link_repo(tx, &link))).await?;
                        continue;
                    }

                    if summary.new_repos >= params.max_new_repos_total {
                        continue;
                    }

                    let parsed = parse_repo_item(&item, run_id)?;
                    let link = RepoQueryLink { query_id: query_id_for_link, repo_id: repo_id.clone(), rank };
                    let repository = parsed.repository.clone();
                    let store = Arc::clone(&self.store);
                    run_blocking(move || {
                        store.with_transaction(|tx| {
                            RepoDao::upsert(tx, &repository)?;
                            QueryDao::link_repo(tx, &link)
                        })
                    })
                    .await?;
                    summary.new_repos += 1;

                    let fetched = self.hydrate_one_readme(orchestrator, &repo_id).await?;
                    if fetched && summary.new_analyses < params.max_llm_analyses_total {
                        let analyzed = self.analyze_one_repo(orchestrator, &repo_id, &parsed.description, &params.model).await?;
                        if analyzed {
                            summary.new_analyses += 1;
                        }
                    }
                }

                if incomplete || page_len < SEARCH_PAGE_SIZE as usize {
                    break;
                }
                page += 1;
            }
        }

        handle
            .finish(
                StepStatus::Success,
                json!({"queries_issued": summary.queries_issued, "new_repos": summary.new_repos, "new_analyses": summary.new_analyses, "capped": summary.capped}),
            )
            .await?;
        Ok(())
    }

    async fn snapshot_rate_limits(&self, orchestrator: &RunOrchestrator) -> Result<(), DiscoveryError> {
        let handle = orchestrator.start_step(StepName::GithubRateLimitSnapshot).await?;
        let response = self.github.rate_limit().await?;
        let Some(body) = response.body.as_json() else {
            return Err(DiscoveryError::MalformedPayload("rate_limit response was not json".to_string()));
        };
        let run_id = orchestrator.run_id();
        let observed_at = self.clock.now();
        let core = parse_rate_limit_resource(body, "core", run_id, scout_core::RateLimitBucket::Core, observed_at);
        let search = parse_rate_limit_resource(body, "search", run_id, scout_core::RateLimitBucket::Search, observed_at);
        let store = Arc::clone(&self.store);
        run_blocking(move || {
            store.with_transaction(|tx| {
                if let Some(snapshot) = &core {
                    RateLimitDao::insert(tx, snapshot)?;
                }
                if let Some(snapshot) = &search {
                    RateLimitDao::insert(tx, snapshot)?;
                }
                Ok(())
            })
        })
        .await?;
        handle.finish(StepStatus::Success, json!({})).await?;
        Ok(())
    }

    async fn search_and_link(
        &self,
        orchestrator: &RunOrchestrator,
        pass: Pass,
        query_string: &str,
        top_n: u32,
        params_snapshot: Value,
    ) -> Result<(Vec<ParsedRepo>, Vec<RepoId>), DiscoveryError> {
        let run_id = orchestrator.run_id();
        let step_name = match pass {
            Pass::One => StepName::GithubSearchPass1,
            Pass::Two => StepName::GithubSearchPass2,
        };
        let handle = orchestrator.start_step(step_name).await?;

        let query_id = QueryId::new();
        let query_row = GithubQuery { id: query_id, run_id, pass, query_string: query_string.to_string(), params: params_snapshot };
        let store = Arc::clone(&self.store);
        run_blocking(move || store.with_transaction(|tx| QueryDao::insert_query(tx, &query_row))).await?;

        let mut parsed_repos = Vec::new();
        let mut repo_ids = Vec::new();
        let mut links = Vec::new();
        let mut rank: i64 = 0;
        let mut page = 1;
        loop {
            let response = self.github.search_repositories(query_string, page).await?;
            let Some(body) = response.body.as_json() else {
                return Err(DiscoveryError::MalformedPayload("search response was not json".to_string()));
            };
            let items = body.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
            let incomplete = body.get("incomplete_results").and_then(Value::as_bool).unwrap_or(false);
            let page_len = items.len();

            for item in items {
                if repo_ids.len() >= top_n as usize {
                    break;
                }
                rank += 1;
                let parsed = parse_repo_item(&item, run_id)?;
                links.push(RepoQueryLink { query_id, repo_id: parsed.repository.id.clone(), rank });
                repo_ids.push(parsed.repository.id.clone());
                parsed_repos.push(parsed);
            }

            if incomplete || page_len < SEARCH_PAGE_SIZE as usize || repo_ids.len() >= top_n as usize {
                break;
            }
            page += 1;
        }

        let store = Arc::clone(&self.store);
        run_blocking(move || {
            store.with_transaction(|tx| {
                for link in &links {
                    QueryDao::link_repo(tx, link)?;
                }
                Ok(())
            })
        })
        .await?;

        handle.finish(StepStatus::Success, json!({"repos_found": repo_ids.len(), "pages_fetched": page})).await?;
        Ok((parsed_repos, repo_ids))
    }

    async fn hydrate_repo_metadata(&self, orchestrator: &RunOrchestrator, parsed_repos: Vec<ParsedRepo>) -> Result<HashMap<RepoId, String>, DiscoveryError> {
        let handle = orchestrator.start_step(StepName::HydrateRepoMetadata).await?;
        let mut descriptions = HashMap::with_capacity(parsed_repos.len());
        let count = parsed_repos.len();
        let store = Arc::clone(&self.store);
        let repos: Vec<Repository> = parsed_repos
            .into_iter()
            .map(|parsed| {
                descriptions.insert(parsed.repository.id.clone(), parsed.description);
                parsed.repository
            })
            .collect();
        run_blocking(move || {
            store.with_transaction(|tx| {
                for repo in &repos {
                    RepoDao::upsert(tx, repo)?;
                }
                Ok(())
            })
        })
        .await?;
        handle.finish(StepStatus::Success, json!({"repos_upserted": count})).await?;
        Ok(descriptions)
    }

    async fn hydrate_readmes(&self, orchestrator: &RunOrchestrator, repo_ids: &[RepoId], summary: &mut Pass1Summary) -> Result<Vec<RepoId>, DiscoveryError> {
        let handle = orchestrator.start_step(StepName::HydrateReadme).await?;
        let mut pending = Vec::new();
        for repo_id in repo_ids {
            let store = Arc::clone(&self.store);
            let repo_id_for_check = repo_id.clone();
            let existing = run_blocking(move || store.with_transaction(|tx| RepoDao::get_readme(tx, &repo_id_for_check))).await?;
            if existing.is_some() {
                pending.push(repo_id.clone());
                continue;
            }
            if self.hydrate_one_readme(orchestrator, repo_id).await? {
                summary.readmes_fetched += 1;
                pending.push(repo_id.clone());
            } else {
                summary.readmes_missing += 1;
            }
        }
        handle
            .finish(
                StepStatus::Success,
                json!({"readmes_fetched": summary.readmes_fetched, "readmes_missing": summary.readmes_missing}),
            )
            .await?;
        Ok(pending)
    }

    /// Fetches and stores one repo's README. Returns `true` when the repo
    /// now has a README on record (fetched now or already present).
    async fn hydrate_one_readme(&self, orchestrator: &RunOrchestrator, repo_id: &RepoId) -> Result<bool, DiscoveryError> {
        match self.github.repo_readme(repo_id).await {
            Ok(response) => {
                let content = match &response.body {
                    ResponseBody::Text(text) => text.clone().into_bytes(),
                    ResponseBody::Json(value) => value.to_string().into_bytes(),
                };
                let readme = Readme {
                    repo_id: repo_id.clone(),
                    content_hash: sha256_hex(&content),
                    content,
                    fetched_at: self.clock.now(),
                    etag: response.etag.clone(),
                    source_url: format!("https://api.github.com/repos/{}/readme", repo_id.as_str()),
                };
                let store = Arc::clone(&self.store);
                run_blocking(move || store.with_transaction(|tx| RepoDao::upsert_readme(tx, &readme))).await?;
                Ok(true)
            }
            Err(HttpClientError::Status { status: 404, .. }) => {
                orchestrator
                    .log_audit(
                        AuditLevel::Warn,
                        StepName::HydrateReadme.as_str(),
                        "repo.readme.missing",
                        "no readme found upstream",
                        json!({"repo": repo_id.as_str()}),
                    )
                    .await?;
                Ok(false)
            }
            Err(other) => {
                orchestrator
                    .log_audit(
                        AuditLevel::Error,
                        StepName::HydrateReadme.as_str(),
                        "repo.hydrate.failed",
                        "readme fetch failed",
                        json!({"repo": repo_id.as_str(), "error": other.to_string()}),
                    )
                    .await?;
                Ok(false)
            }
        }
    }

    async fn analyze_repos(
        &self,
        orchestrator: &RunOrchestrator,
        repo_ids: &[RepoId],
        descriptions: &HashMap<RepoId, String>,
        model: &str,
        summary: &mut Pass1Summary,
    ) -> Result<(), DiscoveryError> {
        let handle = orchestrator.start_step(StepName::LlmRepoAnalysis).await?;
        let empty = String::new();
        for repo_id in repo_ids {
            let description = descriptions.get(repo_id).unwrap_or(&empty);
            match self.analyze_one_repo(orchestrator, repo_id, description, model).await {
                Ok(true) => summary.analyses_completed += 1,
                Ok(false) => {}
                Err(DiscoveryError::Llm(_)) => summary.analyses_failed += 1,
                Err(other) => return Err(other),
            }
        }
        let status = if summary.analyses_completed == 0 && summary.analyses_failed > 0 { StepStatus::Failed } else { StepStatus::Success };
        handle
            .finish(status, json!({"analyses_completed": summary.analyses_completed, "analyses_failed": summary.analyses_failed}))
            .await?;
        Ok(())
    }

    /// Analyzes one repo: builds the prompt, calls the LLM, validates the
    /// output, computes `final_score`, and persists the analysis plus its
    /// keywords. Returns `false` (without error) if the repo has no README
    /// or already has an analysis this run; returns
    /// `Err(DiscoveryError::Llm(LlmClientError::InvalidOutput { .. }))` on a
    /// validation failure, which the caller counts as a failed analysis
    /// rather than aborting the run.
    async fn analyze_one_repo(&self, orchestrator: &RunOrchestrator, repo_id: &RepoId, description: &str, model: &str) -> Result<bool, DiscoveryError> {
        let run_id = orchestrator.run_id();
        let store = Arc::clone(&self.store);
        let repo_id_for_read = repo_id.clone();
        let (repo, readme, already_analyzed) = run_blocking(move || {
            store.with_transaction(|tx| {
                let repo = RepoDao::get(tx, &repo_id_for_read)?;
                let readme = RepoDao::get_readme(tx, &repo_id_for_read)?;
                let exists = AnalysisDao::exists(tx, run_id, &repo_id_for_read)?;
                Ok((repo, readme, exists))
            })
        })
        .await?;

        let (Some(repo), Some(readme)) = (repo, readme) else { return Ok(false) };
        if already_analyzed {
            return Ok(false);
        }

        let excerpt = bounded_readme_excerpt(&readme.content, self.readme_excerpt_chars);
        let template = self.prompts.load("repo_analysis", 1)?;
        let mut values = HashMap::new();
        values.insert("repo_full_name", repo_id.as_str().to_string());
        values.insert("repo_description", description.to_string());
        values.insert("repo_language", repo.primary_language.clone().unwrap_or_else(|| "unknown".to_string()));
        values.insert("repo_stars", repo.stars.to_string());
        values.insert("repo_topics", repo.topics.join(", "));
        values.insert("repo_pushed_at", repo.pushed_at.to_date_string());
        values.insert("readme_excerpt", excerpt);
        let prompt_body = template.render(&values);

        let result = self
            .llm
            .chat_completion(&prompt_body, CallParams { temperature: template.temperature, max_tokens: template.max_tokens })
            .await;
        let raw_output = match result {
            Ok(value) => value,
            Err(err) => {
                orchestrator
                    .log_audit(
                        AuditLevel::Warn,
                        StepName::LlmRepoAnalysis.as_str(),
                        "llm.output.invalid_json",
                        "llm call failed before validation",
                        json!({"repo": repo_id.as_str(), "error": err.to_string()}),
                    )
                    .await?;
                return Err(DiscoveryError::Llm(err));
            }
        };

        let output = match validate_repo_analysis(&raw_output, repo_id.as_str()) {
            Ok(output) => output,
            Err(err) => {
                orchestrator
                    .log_audit(
                        AuditLevel::Warn,
                        StepName::LlmRepoAnalysis.as_str(),
                        "llm.output.invalid_json",
                        "llm output failed schema validation",
                        json!({"repo": repo_id.as_str(), "error": err.to_string()}),
                    )
                    .await?;
                return Err(DiscoveryError::Llm(err));
            }
        };

        let final_score = self.scoring.final_score(
            RawScores {
                interestingness: output.scores.interestingness,
                novelty: output.scores.novelty,
                collaboration_potential: output.scores.collaboration_potential,
            },
            &SignalsInput { integration_surface: &output.signals.integration_surface, risk_flags: output.signals.risk_flags.as_deref() },
        );

        let analysis = scout_core::Analysis {
            run_id,
            repo_id: repo_id.clone(),
            model: model.to_string(),
            prompt_id: template.id.clone(),
            prompt_version: template.version.to_string(),
            input_snapshot: json!({"readme_hash": readme.content_hash, "readme_excerpt_chars": self.readme_excerpt_chars}),
            output: output.clone(),
            final_score,
            created_at: self.clock.now(),
        };
        let keywords = collect_repo_keywords(run_id, repo_id, &output);

        let store = Arc::clone(&self.store);
        run_blocking(move || {
            store.with_transaction(|tx| {
                AnalysisDao::insert(tx, &analysis)?;
                for keyword in &keywords {
                    AnalysisDao::upsert_keyword(tx, keyword)?;
                }
                Ok(())
            })
        })
        .await?;
        Ok(true)
    }
}

/// Runs `body` on a blocking thread, converting join/store failures into
/// [`DiscoveryError`]. Mirrors `scout-orchestrator`'s private helper of the
/// same shape, duplicated here since it cannot be reused across crates.
async fn run_blocking<T, F>(body: F) -> Result<T, DiscoveryError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(body).await.map_err(|err| DiscoveryError::Join(err.to_string()))?.map_err(DiscoveryError::from)
}

fn parse_rate_limit_resource(
    body: &Value,
    key: &str,
    run_id: RunId,
    bucket: scout_core::RateLimitBucket,
    observed_at: Timestamp,
) -> Option<scout_core::RateLimitSnapshot> {
    let resource = body.get("resources")?.get(key)?;
    let remaining = resource.get("remaining")?.as_i64()?;
    let limit = resource.get("limit")?.as_i64()?;
    let reset = resource.get("reset")?.as_i64()?;
    Some(scout_core::RateLimitSnapshot { run_id, bucket, remaining, limit, reset_at: Timestamp::from_epoch_millis(reset.saturating_mul(1000)), observed_at })
}

fn parse_repo_item(item: &Value, run_id: RunId) -> Result<ParsedRepo, DiscoveryError> {
    let full_name = item.get("full_name").and_then(Value::as_str).ok_or_else(|| DiscoveryError::MalformedPayload("search item missing full_name".to_string()))?;
    let repo_id = RepoId::parse(full_name).ok_or_else(|| DiscoveryError::MalformedPayload(format!("malformed repo full_name `{full_name}`")))?;
    let stars = item.get("stargazers_count").and_then(Value::as_i64).unwrap_or(0);
    let forks = item.get("forks_count").and_then(Value::as_i64).unwrap_or(0);
    let mut topics: Vec<String> = item.get("topics").and_then(Value::as_array).into_iter().flatten().filter_map(|value| value.as_str().map(str::to_string)).collect();
    topics.sort();
    let primary_language = item.get("language").and_then(Value::as_str).map(str::to_string);
    let license = item.get("license").and_then(|value| value.get("spdx_id")).and_then(Value::as_str).map(str::to_string);
    let pushed_at_raw = item.get("pushed_at").and_then(Value::as_str).unwrap_or_default();
    let pushed_at = parse_github_timestamp(pushed_at_raw)?;
    let archived = item.get("archived").and_then(Value::as_bool).unwrap_or(false);
    let is_fork = item.get("fork").and_then(Value::as_bool).unwrap_or(false);
    let description = item.get("description").and_then(Value::as_str).unwrap_or_default().to_string();

    Ok(ParsedRepo {
        repository: Repository { id: repo_id, stars, forks, topics, primary_language, license, pushed_at, archived, is_fork, last_seen_run_id: run_id },
        description,
    })
}

/// Parses a GitHub-style RFC 3339 timestamp (`pushed_at`) into a
/// [`Timestamp`].
fn parse_github_timestamp(raw: &str) -> Result<Timestamp, DiscoveryError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| Timestamp::from_epoch_millis(dt.timestamp_millis()))
        .map_err(|err| DiscoveryError::MalformedPayload(format!("invalid timestamp `{raw}`: {err}")))
}

/// Bounds `content` to `max_chars` characters (not bytes), preferring a
/// lossy UTF-8 decode over rejecting non-UTF-8 README bytes outright.
fn bounded_readme_excerpt(content: &[u8], max_chars: usize) -> String {
    let text = String::from_utf8_lossy(content);
    text.chars().take(max_chars).collect()
}

/// Builds the three per-repo keyword rows (one per kind) from a validated
/// analysis output, each weighted `1.0` (`spec.md` §4.F: the LLM output's
/// own keyword lists carry no per-term weight, so every per-repo keyword
/// starts at unit weight; aggregation weights them by the owning repo's
/// `final_score`).
fn collect_repo_keywords(run_id: RunId, repo_id: &RepoId, output: &scout_core::RepoAnalysisOutput) -> Vec<Keyword> {
    let mut keywords = Vec::new();
    for term in &output.primary_keywords {
        keywords.push(Keyword { run_id, repo_id: Some(repo_id.clone()), term: term.clone(), kind: KeywordKind::Primary, weight: 1.0 });
    }
    for term in &output.secondary_keywords {
        keywords.push(Keyword { run_id, repo_id: Some(repo_id.clone()), term: term.clone(), kind: KeywordKind::Secondary, weight: 1.0 });
    }
    for term in &output.search_queries {
        keywords.push(Keyword { run_id, repo_id: Some(repo_id.clone()), term: term.clone(), kind: KeywordKind::SearchQuery, weight: 1.0 });
    }
    keywords
}

/// Builds the pass-2 query list from the sorted run-aggregate: every
/// `search_query`-kind term in order, then `primary`-kind terms not
/// already present, filling to `max_queries`. Order is preserved and
/// duplicates are dropped on first occurrence (`spec.md` §4.F, "Pass-2
/// query generation").
fn generate_pass2_queries(aggregate: &[Keyword], max_queries: u32) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut queries = Vec::new();

    for keyword in aggregate.iter().filter(|keyword| keyword.kind == KeywordKind::SearchQuery) {
        if seen.insert(keyword.term.clone()) {
            queries.push(keyword.term.clone());
        }
    }
    for keyword in aggregate.iter().filter(|keyword| keyword.kind == KeywordKind::Primary) {
        if queries.len() >= max_queries as usize {
            break;
        }
        if seen.insert(keyword.term.clone()) {
            queries.push(keyword.term.clone());
        }
    }
    queries.truncate(max_queries as usize);
    queries
}
