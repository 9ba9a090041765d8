// crates/scout-cli/src/commands.rs
// ============================================================================
// Module: Verb Implementations
// Description: The body of each `cs` verb, built on top of `Wiring` and
//              `RunOrchestrator`.
// Purpose: Keep `main.rs` to argument parsing and dispatch.
// Dependencies: scout-briefs, scout-config, scout-core, scout-discovery,
//               scout-orchestrator, scout-store-sqlite
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::anyhow;
use scout_briefs::BriefEnginePipeline;
use scout_briefs::BriefParams;
use scout_config::Environment;
use scout_core::Clock;
use scout_core::RunId;
use scout_core::StoreError;
use scout_core::SystemClock;
use scout_core::Timestamp;
use scout_discovery::DiscoveryPipeline;
use scout_discovery::Pass1Params;
use scout_discovery::Pass2Params;
use scout_orchestrator::RunOrchestrator;
use scout_store_sqlite::AnalysisDao;
use scout_store_sqlite::AuditDao;
use scout_store_sqlite::BriefDao;
use scout_store_sqlite::HttpCacheDao;
use scout_store_sqlite::QueryDao;
use scout_store_sqlite::RunDao;
use scout_store_sqlite::Store;
use scout_store_sqlite::StoreConfig;
use serde_json::Value;
use serde_json::json;

use crate::output;
use crate::wiring::DEFAULT_MODEL;
use crate::wiring::Wiring;

// ============================================================================
// SECTION: doctor
// ============================================================================

pub struct DoctorArgs {
    pub json: bool,
    pub verbose: bool,
}

/// `doctor` (`spec.md` §6): config/DB health checks only, no network calls.
pub fn doctor(args: DoctorArgs) -> anyhow::Result<()> {
    let mut checks = Vec::new();
    let mut healthy = true;

    match Environment::from_process() {
        Ok(env) => {
            checks.push(json!({"check": "environment", "ok": true}));
            match Store::open(&StoreConfig::new(&env.db_path)) {
                Ok(_) => checks.push(json!({"check": "store", "ok": true, "path": env.db_path})),
                Err(err) => {
                    healthy = false;
                    checks.push(json!({"check": "store", "ok": false, "error": err.to_string()}));
                }
            }
            let prompts_root = std::path::Path::new(crate::wiring::DEFAULT_PROMPTS_ROOT);
            checks.push(json!({"check": "prompts_dir", "ok": prompts_root.is_dir()}));
            healthy = healthy && prompts_root.is_dir();
            checks.push(json!({"check": "github_token_present", "ok": env.github_token.is_some()}));
            checks.push(json!({"check": "openrouter_api_key_present", "ok": env.openrouter_api_key.is_some()}));
            if args.verbose {
                checks.push(json!({"check": "log_level", "value": env.log_level.as_tracing_level()}));
            }
        }
        Err(err) => {
            healthy = false;
            checks.push(json!({"check": "environment", "ok": false, "error": err.to_string()}));
        }
    }

    let payload = json!({"healthy": healthy, "checks": checks});
    output::emit_plain(payload);
    if healthy { Ok(()) } else { Err(anyhow!("doctor: one or more health checks failed")) }
}

// ============================================================================
// SECTION: scout:run
// ============================================================================

pub struct ScoutRunArgs {
    pub query: String,
    pub days: u32,
    pub stars: i64,
    pub max_stars: Option<i64>,
    pub top: u32,
    pub lang: Option<String>,
    pub include_forks: bool,
    pub model: Option<String>,
    pub dry: bool,
}

pub async fn scout_run(args: ScoutRunArgs) -> anyhow::Result<()> {
    let env = Environment::from_process().context("resolving environment")?;
    if !args.dry {
        env.require_live_credentials().context("live run requires GITHUB_TOKEN and OPENROUTER_API_KEY")?;
    }
    let model = args.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let wiring = if args.dry { Wiring::build_dry(&env, &model)? } else { Wiring::build(&env, &model)? };

    let run_args = json!({
        "query": args.query, "days": args.days, "stars": args.stars, "max_stars": args.max_stars,
        "top": args.top, "lang": args.lang, "include_forks": args.include_forks, "model": model, "dry": args.dry,
    });
    let orchestrator = RunOrchestrator::start(Arc::clone(&wiring.store), Arc::clone(&wiring.clock), run_args, &wiring.scoring).await?;

    let pipeline = DiscoveryPipeline::new(
        Arc::clone(&wiring.store),
        Arc::clone(&wiring.github),
        Arc::clone(&wiring.llm),
        wiring.prompts,
        wiring.scoring,
        Arc::clone(&wiring.clock),
    );
    let mut params = Pass1Params::new(args.query, model);
    params.days = args.days;
    params.stars = args.stars;
    params.max_stars = args.max_stars;
    params.top_n = args.top;
    params.language = args.lang;
    params.include_forks = args.include_forks;

    let summary = pipeline.run_pass1(&orchestrator, &params).await?;
    output::emit(orchestrator.run_id(), serde_json::to_value(summary)?);
    Ok(())
}

// ============================================================================
// SECTION: scout:expand
// ============================================================================

pub struct ScoutExpandArgs {
    pub run_id: RunId,
    pub pass2_stars: i64,
    pub pass2_max_stars: Option<i64>,
    pub max_queries: u32,
}

pub async fn scout_expand(args: ScoutExpandArgs) -> anyhow::Result<()> {
    let env = Environment::from_process().context("resolving environment")?;
    env.require_live_credentials().context("scout:expand requires GITHUB_TOKEN and OPENROUTER_API_KEY")?;
    let model = DEFAULT_MODEL.to_string();
    let wiring = Wiring::build(&env, &model)?;
    let orchestrator = RunOrchestrator::resume(Arc::clone(&wiring.store), Arc::clone(&wiring.clock), args.run_id).await?;

    let pipeline = DiscoveryPipeline::new(
        Arc::clone(&wiring.store),
        Arc::clone(&wiring.github),
        Arc::clone(&wiring.llm),
        wiring.prompts,
        wiring.scoring,
        Arc::clone(&wiring.clock),
    );
    let mut params = Pass2Params::new(model);
    params.pass2_stars = args.pass2_stars;
    params.pass2_max_stars = args.pass2_max_stars;
    params.max_queries = args.max_queries;

    let summary = pipeline.run_pass2(&orchestrator, &params).await?;
    output::emit(orchestrator.run_id(), serde_json::to_value(summary)?);
    Ok(())
}

// ============================================================================
// SECTION: briefs:generate
// ============================================================================

pub struct BriefsGenerateArgs {
    pub run_id: RunId,
    pub min_score: Option<f64>,
    pub max_briefs: u32,
    pub overlap_threshold: Option<f64>,
    pub overlap_penalty: Option<f64>,
    pub history_candidates: Option<u32>,
}

pub async fn briefs_generate(args: BriefsGenerateArgs) -> anyhow::Result<()> {
    let env = Environment::from_process().context("resolving environment")?;
    env.require_live_credentials().context("briefs:generate requires GITHUB_TOKEN and OPENROUTER_API_KEY")?;
    let wiring = Wiring::build(&env, DEFAULT_MODEL)?;
    let orchestrator = RunOrchestrator::resume(Arc::clone(&wiring.store), Arc::clone(&wiring.clock), args.run_id).await?;

    let pipeline = BriefEnginePipeline::new(Arc::clone(&wiring.store), Arc::clone(&wiring.llm), wiring.prompts, wiring.scoring, Arc::clone(&wiring.clock));

    // `--overlap-threshold`/`--overlap-penalty`/`--history-candidates` have no
    // CLI-level default (`spec.md` §6); an omitted flag falls back to the
    // matching `CS_*` environment knob.
    let mut params = BriefParams::new();
    params.min_brief_score = args.min_score;
    params.max_briefs = args.max_briefs;
    params.overlap_threshold = args.overlap_threshold.unwrap_or(env.overlap_threshold);
    params.overlap_exception_penalty = args.overlap_penalty.unwrap_or(env.overlap_exception_penalty);
    params.history_candidates = args.history_candidates.unwrap_or(env.history_candidates);

    let summary = pipeline.generate_briefs(&orchestrator, &params).await?;
    output::emit(orchestrator.run_id(), serde_json::to_value(summary)?);
    Ok(())
}

// ============================================================================
// SECTION: briefs:export
// ============================================================================

pub struct BriefsExportArgs {
    pub run_id: RunId,
    pub out: PathBuf,
    pub top_opportunities: Option<u32>,
}

pub async fn briefs_export(args: BriefsExportArgs) -> anyhow::Result<()> {
    let env = Environment::from_process().context("resolving environment")?;
    let wiring = Wiring::build(&env, DEFAULT_MODEL)?;
    let orchestrator = RunOrchestrator::resume(Arc::clone(&wiring.store), Arc::clone(&wiring.clock), args.run_id).await?;
    let pipeline = BriefEnginePipeline::new(Arc::clone(&wiring.store), Arc::clone(&wiring.llm), wiring.prompts, wiring.scoring, Arc::clone(&wiring.clock));

    let top_opportunities = args.top_opportunities.unwrap_or(env.top_opportunities);
    let summary = pipeline.export_markdown(&orchestrator, args.run_id, &args.out, top_opportunities).await?;
    output::emit(args.run_id, serde_json::to_value(summary)?);
    Ok(())
}

// ============================================================================
// SECTION: db:migrate, db:vacuum
// ============================================================================

pub fn db_migrate() -> anyhow::Result<()> {
    let env = Environment::from_process().context("resolving environment")?;
    // `Store::open` runs pending migrations as part of opening the connection.
    Store::open(&StoreConfig::new(&env.db_path)).context("opening store")?;
    output::emit_plain(json!({"migrated": true}));
    Ok(())
}

pub fn db_vacuum() -> anyhow::Result<()> {
    let env = Environment::from_process().context("resolving environment")?;
    let store = Store::open(&StoreConfig::new(&env.db_path)).context("opening store")?;
    store.vacuum().context("running VACUUM")?;
    output::emit_plain(json!({"vacuumed": true}));
    Ok(())
}

// ============================================================================
// SECTION: cache:prune, logs:prune
// ============================================================================

const MILLIS_PER_DAY: i64 = 86_400_000;

pub fn cache_prune(days: u32) -> anyhow::Result<()> {
    let env = Environment::from_process().context("resolving environment")?;
    let store = Store::open(&StoreConfig::new(&env.db_path)).context("opening store")?;
    let cutoff = Timestamp::from_epoch_millis(SystemClock.now().epoch_millis() - i64::from(days) * MILLIS_PER_DAY);
    let pruned = store.with_transaction(|tx| HttpCacheDao::prune_older_than(tx, cutoff)).context("pruning HTTP cache")?;
    output::emit_plain(json!({"pruned": pruned, "cutoff_days": days}));
    Ok(())
}

pub fn logs_prune(days: u32) -> anyhow::Result<()> {
    let env = Environment::from_process().context("resolving environment")?;
    let store = Store::open(&StoreConfig::new(&env.db_path)).context("opening store")?;
    let cutoff = Timestamp::from_epoch_millis(SystemClock.now().epoch_millis() - i64::from(days) * MILLIS_PER_DAY);
    let pruned = store.with_transaction(|tx| AuditDao::prune_older_than(tx, cutoff)).context("pruning audit log")?;
    output::emit_plain(json!({"pruned": pruned, "cutoff_days": days}));
    Ok(())
}

// ============================================================================
// SECTION: debug:replay, debug:dump-run
// ============================================================================

pub async fn debug_replay(run_id: RunId) -> anyhow::Result<()> {
    let env = Environment::from_process().context("resolving environment")?;
    let wiring = Wiring::build(&env, DEFAULT_MODEL)?;
    let pipeline = BriefEnginePipeline::new(Arc::clone(&wiring.store), Arc::clone(&wiring.llm), wiring.prompts, wiring.scoring, Arc::clone(&wiring.clock));
    let result = pipeline.replay_run(run_id, None).await?;
    output::emit(run_id, serde_json::to_value(result)?);
    Ok(())
}

pub fn debug_dump_run(run_id: RunId) -> anyhow::Result<()> {
    let env = Environment::from_process().context("resolving environment")?;
    let store = Store::open(&StoreConfig::new(&env.db_path)).context("opening store")?;

    let dump: Result<Value, StoreError> = store.with_transaction(|tx| {
        let run = RunDao::get_run(tx, run_id)?.ok_or_else(|| StoreError::Invalid(format!("no run with id {run_id}")))?;
        let steps = RunDao::list_steps_for_run(tx, run_id)?;
        let audit_events = AuditDao::list_for_run(tx, run_id)?;
        let queries = QueryDao::list_for_run(tx, run_id)?;
        let analyses = AnalysisDao::list_for_run(tx, run_id)?;
        let briefs = BriefDao::list_for_run(tx, run_id)?;
        Ok(json!({
            "run": run,
            "steps": steps,
            "audit_events": audit_events,
            "queries": queries,
            "analyses": analyses,
            "briefs": briefs,
        }))
    });

    output::emit(run_id, dump.context("reading run state")?);
    Ok(())
}
