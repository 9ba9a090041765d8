// crates/scout-cli/src/main.rs
// ============================================================================
// Module: Collaboration Scout CLI Entry Point
// Description: Command dispatcher for the `cs` binary's eleven verbs.
// Purpose: Parse arguments, initialize diagnostics, and route to the
//          handlers in `commands` (spec.md §6).
// Dependencies: clap, scout-config, thiserror, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! Every verb prints exactly one line of JSON to stdout on success (`spec.md`
//! §6: "CLI output is line-delimited JSON for machine consumers"). Logging
//! goes to stderr via `tracing-subscriber`, driven by `CS_LOG_LEVEL`, so the
//! two streams never mix.

// ============================================================================
// SECTION: Imports
// ============================================================================

mod commands;
mod output;
mod transport;
mod wiring;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use scout_config::Environment;
use scout_core::RunId;
use thiserror::Error;

use commands::BriefsExportArgs;
use commands::BriefsGenerateArgs;
use commands::DoctorArgs;
use commands::ScoutExpandArgs;
use commands::ScoutRunArgs;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "cs", disable_help_subcommand = true, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// The eleven verbs named in `spec.md` §6.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Config/DB health checks only; no network calls.
    #[command(name = "doctor")]
    Doctor {
        #[arg(long)]
        json: bool,
        #[arg(long)]
        verbose: bool,
    },
    /// Creates a run and executes pass 1 plus analysis.
    #[command(name = "scout:run")]
    ScoutRun {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = scout_discovery::params::DEFAULT_DAYS)]
        days: u32,
        #[arg(long, default_value_t = scout_discovery::params::DEFAULT_STARS)]
        stars: i64,
        #[arg(long)]
        max_stars: Option<i64>,
        #[arg(long, default_value_t = scout_discovery::params::DEFAULT_TOP_N)]
        top: u32,
        #[arg(long)]
        lang: Option<String>,
        #[arg(long)]
        include_forks: bool,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        dry: bool,
    },
    /// Runs pass 2 for an existing run.
    #[command(name = "scout:expand")]
    ScoutExpand {
        #[arg(long = "run-id")]
        run_id: RunId,
        #[arg(long, default_value_t = scout_discovery::params::DEFAULT_PASS2_STARS)]
        pass2_stars: i64,
        #[arg(long)]
        pass2_max_stars: Option<i64>,
        #[arg(long, default_value_t = scout_discovery::params::DEFAULT_MAX_QUERIES)]
        max_queries: u32,
    },
    /// Generates collaboration briefs for an existing run.
    #[command(name = "briefs:generate")]
    BriefsGenerate {
        #[arg(long = "run-id")]
        run_id: RunId,
        #[arg(long)]
        min_score: Option<f64>,
        #[arg(long, default_value_t = 20)]
        max_briefs: u32,
        #[arg(long)]
        overlap_threshold: Option<f64>,
        #[arg(long)]
        overlap_penalty: Option<f64>,
        #[arg(long)]
        history_candidates: Option<u32>,
    },
    /// Writes the Markdown export layout for an existing run.
    #[command(name = "briefs:export")]
    BriefsExport {
        #[arg(long = "run-id")]
        run_id: RunId,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        top_opportunities: Option<u32>,
    },
    /// Opens the store, applying any pending migrations.
    #[command(name = "db:migrate")]
    DbMigrate,
    /// Runs `VACUUM` against the store.
    #[command(name = "db:vacuum")]
    DbVacuum,
    /// Deletes HTTP cache rows older than `--days`.
    #[command(name = "cache:prune")]
    CachePrune {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Deletes audit log rows older than `--days`.
    #[command(name = "logs:prune")]
    LogsPrune {
        #[arg(long, default_value_t = 90)]
        days: u32,
    },
    /// Recomputes scores for an existing run without mutating the store.
    #[command(name = "debug:replay")]
    DebugReplay {
        #[arg(long = "run-id")]
        run_id: RunId,
    },
    /// Dumps every stored row for a run as one JSON document.
    #[command(name = "debug:dump-run")]
    DebugDumpRun {
        #[arg(long = "run-id")]
        run_id: RunId,
    },
}

// ============================================================================
// SECTION: Error Boundary
// ============================================================================

/// The single error type `main` reports. Every command handler returns
/// [`anyhow::Result`]; this wraps the final message for a uniform exit path.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    message: String,
}

impl CliError {
    fn new(err: anyhow::Error) -> Self {
        Self { message: err.to_string() }
    }
}

type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: main
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

fn init_tracing() {
    let level = Environment::from_process().map(|env| env.log_level.as_tracing_level()).unwrap_or("info");
    let filter = tracing_subscriber::EnvFilter::try_new(level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Doctor { json, verbose } => commands::doctor(DoctorArgs { json, verbose }).map_err(CliError::new),
        Commands::ScoutRun { query, days, stars, max_stars, top, lang, include_forks, model, dry } => {
            commands::scout_run(ScoutRunArgs { query, days, stars, max_stars, top, lang, include_forks, model, dry })
                .await
                .map_err(CliError::new)
        }
        Commands::ScoutExpand { run_id, pass2_stars, pass2_max_stars, max_queries } => {
            commands::scout_expand(ScoutExpandArgs { run_id, pass2_stars, pass2_max_stars, max_queries }).await.map_err(CliError::new)
        }
        Commands::BriefsGenerate { run_id, min_score, max_briefs, overlap_threshold, overlap_penalty, history_candidates } => {
            commands::briefs_generate(BriefsGenerateArgs {
                run_id,
                min_score,
                max_briefs,
                overlap_threshold,
                overlap_penalty,
                history_candidates,
            })
            .await
            .map_err(CliError::new)
        }
        Commands::BriefsExport { run_id, out, top_opportunities } => {
            commands::briefs_export(BriefsExportArgs { run_id, out, top_opportunities }).await.map_err(CliError::new)
        }
        Commands::DbMigrate => commands::db_migrate().map_err(CliError::new),
        Commands::DbVacuum => commands::db_vacuum().map_err(CliError::new),
        Commands::CachePrune { days } => commands::cache_prune(days).map_err(CliError::new),
        Commands::LogsPrune { days } => commands::logs_prune(days).map_err(CliError::new),
        Commands::DebugReplay { run_id } => commands::debug_replay(run_id).await.map_err(CliError::new),
        Commands::DebugDumpRun { run_id } => commands::debug_dump_run(run_id).map_err(CliError::new),
    };
    result.map(|()| ExitCode::SUCCESS)
}

fn emit_error(message: &str) -> ExitCode {
    eprintln!("error: {message}");
    ExitCode::FAILURE
}
