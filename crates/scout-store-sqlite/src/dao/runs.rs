// crates/scout-store-sqlite/src/dao/runs.rs
// ============================================================================
// Module: Run and Step DAO
// Description: Persistence for runs and the steps inside them.
// Purpose: Back `scout-orchestrator`'s run bootstrap and `StepHandle`
//          lifecycle (`spec.md` §4.E).
// Dependencies: scout-core, rusqlite, serde_json
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use scout_core::Run;
use scout_core::RunId;
use scout_core::Step;
use scout_core::StepId;
use scout_core::StepName;
use scout_core::StepStatus;
use scout_core::StoreError;
use scout_core::Timestamp;

use crate::map_rusqlite_error;

/// DAO for `runs` and `steps`.
pub struct RunDao;

impl RunDao {
    /// Inserts a new run row. Runs are created exactly once and never
    /// mutated (`spec.md` §3, "Lifecycle").
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] if the id already exists.
    pub fn insert_run(tx: &Transaction<'_>, run: &Run) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO runs (id, created_at, args_json, config_hash) VALUES (?1, ?2, ?3, ?4)",
            params![
                run.id.to_string(),
                run.created_at.epoch_millis(),
                serde_json::to_string(&run.args).map_err(|err| StoreError::Invalid(err.to_string()))?,
                run.config_hash,
            ],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Fetches a run by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure or
    /// [`StoreError::Corrupt`] if stored JSON cannot be parsed.
    pub fn get_run(tx: &Transaction<'_>, id: RunId) -> Result<Option<Run>, StoreError> {
        tx.query_row(
            "SELECT id, created_at, args_json, config_hash FROM runs WHERE id = ?1",
            params![id.to_string()],
            |row| {
                let id_str: String = row.get(0)?;
                let created_at: i64 = row.get(1)?;
                let args_json: String = row.get(2)?;
                let config_hash: String = row.get(3)?;
                Ok((id_str, created_at, args_json, config_hash))
            },
        )
        .optional()
        .map_err(map_rusqlite_error)?
        .map(|(id_str, created_at, args_json, config_hash)| {
            Ok(Run {
                id: id_str.parse().map_err(|_| StoreError::Corrupt("run id malformed".to_string()))?,
                created_at: Timestamp::from_epoch_millis(created_at),
                args: serde_json::from_str(&args_json)
                    .map_err(|err| StoreError::Corrupt(format!("run args_json: {err}")))?,
                config_hash,
            })
        })
        .transpose()
    }

    /// Inserts a step row at start time (`finished_at`/`status` null).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] on a foreign-key violation.
    pub fn start_step(tx: &Transaction<'_>, step: &Step) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO steps (id, run_id, name, started_at, finished_at, status, stats_json)
             VALUES (?1, ?2, ?3, ?4, NULL, NULL, '{}')",
            params![step.id.to_string(), step.run_id.to_string(), step.name.as_str(), step.started_at.epoch_millis()],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Records a step's terminal status, finish time, and stats.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if `stats` cannot be serialized.
    pub fn finish_step(
        tx: &Transaction<'_>,
        step_id: StepId,
        finished_at: Timestamp,
        status: StepStatus,
        stats: &serde_json::Value,
    ) -> Result<(), StoreError> {
        tx.execute(
            "UPDATE steps SET finished_at = ?1, status = ?2, stats_json = ?3 WHERE id = ?4",
            params![
                finished_at.epoch_millis(),
                status.as_str(),
                serde_json::to_string(stats).map_err(|err| StoreError::Invalid(err.to_string()))?,
                step_id.to_string(),
            ],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Lists every step recorded for a run, in start order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn list_steps_for_run(tx: &Transaction<'_>, run_id: RunId) -> Result<Vec<Step>, StoreError> {
        let mut stmt = tx
            .prepare(
                "SELECT id, run_id, name, started_at, finished_at, status, stats_json
                 FROM steps WHERE run_id = ?1 ORDER BY started_at ASC",
            )
            .map_err(map_rusqlite_error)?;
        let rows = stmt
            .query_map(params![run_id.to_string()], row_to_step)
            .map_err(map_rusqlite_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_rusqlite_error)
    }
}

fn row_to_step(row: &rusqlite::Row<'_>) -> rusqlite::Result<Step> {
    let id: String = row.get(0)?;
    let run_id: String = row.get(1)?;
    let name: String = row.get(2)?;
    let started_at: i64 = row.get(3)?;
    let finished_at: Option<i64> = row.get(4)?;
    let status: Option<String> = row.get(5)?;
    let stats_json: String = row.get(6)?;
    Ok(Step {
        id: id.parse().unwrap_or_default(),
        run_id: run_id.parse().unwrap_or_default(),
        name: parse_step_name(&name),
        started_at: Timestamp::from_epoch_millis(started_at),
        finished_at: finished_at.map(Timestamp::from_epoch_millis),
        status: status.as_deref().and_then(parse_step_status),
        stats: serde_json::from_str(&stats_json).unwrap_or(serde_json::Value::Null),
    })
}

fn parse_step_name(value: &str) -> StepName {
    match value {
        "init_run" => StepName::InitRun,
        "github_rate_limit_snapshot" => StepName::GithubRateLimitSnapshot,
        "github_search_pass1" => StepName::GithubSearchPass1,
        "hydrate_repo_metadata" => StepName::HydrateRepoMetadata,
        "hydrate_readme" => StepName::HydrateReadme,
        "llm_repo_analysis" => StepName::LlmRepoAnalysis,
        "keyword_aggregate" => StepName::KeywordAggregate,
        "github_search_pass2" => StepName::GithubSearchPass2,
        "llm_brief_generate" => StepName::LlmBriefGenerate,
        _ => StepName::ExportMarkdown,
    }
}

fn parse_step_status(value: &str) -> Option<StepStatus> {
    match value {
        "success" => Some(StepStatus::Success),
        "failed" => Some(StepStatus::Failed),
        "skipped" => Some(StepStatus::Skipped),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use scout_core::RunId;

    use super::*;
    use crate::Store;

    fn sample_run() -> Run {
        Run {
            id: RunId::new(),
            created_at: Timestamp::from_epoch_millis(1_700_000_000_000),
            args: serde_json::json!({"query": "vector database"}),
            config_hash: "abcdef0123456789".to_string(),
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let run = sample_run();
        store.with_transaction(|tx| RunDao::insert_run(tx, &run)).unwrap();
        let fetched = store.with_transaction(|tx| RunDao::get_run(tx, run.id)).unwrap();
        let fetched = fetched.unwrap();
        assert_eq!(fetched.id, run.id);
        assert_eq!(fetched.config_hash, run.config_hash);
    }

    #[test]
    fn missing_run_returns_none() {
        let store = Store::open_in_memory().unwrap();
        let fetched = store.with_transaction(|tx| RunDao::get_run(tx, RunId::new())).unwrap();
        assert!(fetched.is_none());
    }

    #[test]
    fn step_lifecycle_records_status_and_stats() {
        let store = Store::open_in_memory().unwrap();
        let run = sample_run();
        let step = Step {
            id: scout_core::StepId::new(),
            run_id: run.id,
            name: StepName::GithubSearchPass1,
            started_at: Timestamp::from_epoch_millis(1_700_000_000_000),
            finished_at: None,
            status: None,
            stats: serde_json::Value::Null,
        };
        store
            .with_transaction(|tx| {
                RunDao::insert_run(tx, &run)?;
                RunDao::start_step(tx, &step)?;
                RunDao::finish_step(
                    tx,
                    step.id,
                    Timestamp::from_epoch_millis(1_700_000_005_000),
                    StepStatus::Success,
                    &serde_json::json!({"duration_ms": 5000}),
                )
            })
            .unwrap();
        let steps = store.with_transaction(|tx| RunDao::list_steps_for_run(tx, run.id)).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].status, Some(StepStatus::Success));
        assert_eq!(steps[0].stats["duration_ms"], 5000);
    }
}
