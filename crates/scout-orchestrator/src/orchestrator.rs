// crates/scout-orchestrator/src/orchestrator.rs
// ============================================================================
// Module: Run Orchestrator
// Description: Run bootstrap, step lifecycle, and the redacted audit-event
//              sink (spec.md §4.E).
// Purpose: Give every other component a single, explicitly-passed context
//          for "what run am I in, what step am I in, how do I log".
// Dependencies: scout-core, scout-redaction, scout-store-sqlite
// ============================================================================

//! ## Overview
//! A [`RunOrchestrator`] is created once per invocation and passed by
//! reference to every component that needs to record a step or an audit
//! event. There is no ambient or thread-local run context anywhere in this
//! workspace (`spec.md` §9) — a function that needs to log takes an
//! `&RunOrchestrator` argument, full stop.
//!
//! [`RunOrchestrator::start_step`] opens a [`StepHandle`], which the caller
//! must [`StepHandle::finish`] exactly once. Both the step row and a
//! matching `step.started`/`step.finished`/`step.failed` audit event are
//! written; the audit event's `data` always carries `duration_ms` on finish.

use std::sync::Arc;

use scout_core::AuditEvent;
use scout_core::AuditLevel;
use scout_core::Clock;
use scout_core::Run;
use scout_core::RunId;
use scout_core::Step;
use scout_core::StepId;
use scout_core::StepName;
use scout_core::StepStatus;
use scout_core::Timestamp;
use scout_core::hashing::truncated_config_hash;
use scout_store_sqlite::AuditDao;
use scout_store_sqlite::RunDao;
use scout_store_sqlite::Store;
use serde::Serialize;

use crate::errors::OrchestratorError;

/// Length of the truncated config fingerprint (`spec.md` §4.E).
const CONFIG_HASH_HEX_CHARS: usize = 16;

/// Reserved key under which a best-effort git commit hash is folded into
/// the run's redacted argument snapshot. `Run` has no dedicated column for
/// it, and the argument snapshot is the natural place for provenance that
/// is not itself a scoring or lifecycle input.
const GIT_COMMIT_ARGS_KEY: &str = "_git_commit";

/// Per-run context: creates exactly one [`Run`] row and hands out
/// [`StepHandle`]s and audit-logging for the run's lifetime.
pub struct RunOrchestrator {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    run_id: RunId,
}

impl RunOrchestrator {
    /// Creates the run row: a fresh [`RunId`], the redacted `args` snapshot
    /// (with a best-effort git commit hash folded in under
    /// [`GIT_COMMIT_ARGS_KEY`]), and the 16-hex-char truncated SHA-256 of
    /// `config`'s canonical JSON.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Hash`] if `config` cannot be
    /// canonicalized, or [`OrchestratorError::Store`]/[`OrchestratorError::Join`]
    /// if the insert fails.
    pub async fn start<C: Serialize>(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        args: serde_json::Value,
        config: &C,
    ) -> Result<Self, OrchestratorError> {
        let config_hash = truncated_config_hash(config, CONFIG_HASH_HEX_CHARS)?;
        let mut redacted_args = scout_redaction::redact(&args);
        if let Some(commit) = discover_git_commit() {
            if let serde_json::Value::Object(map) = &mut redacted_args {
                map.insert(GIT_COMMIT_ARGS_KEY.to_string(), serde_json::Value::String(commit));
            }
        }
        let run = Run { id: RunId::new(), created_at: clock.now(), args: redacted_args, config_hash };
        let run_id = run.id;
        let store_for_insert = Arc::clone(&store);
        run_blocking(move || store_for_insert.with_transaction(|tx| RunDao::insert_run(tx, &run))).await?;
        Ok(Self { store, clock, run_id })
    }

    /// Attaches to an already-existing run, for commands that extend a
    /// prior invocation instead of starting one (`scout:expand`,
    /// `briefs:generate`, `briefs:export`, `debug:dump-run` — `spec.md`
    /// §6's `--run-id R` commands).
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] if `run_id` does not name an
    /// existing run, or [`OrchestratorError::Join`] on a blocking-task
    /// failure.
    pub async fn resume(store: Arc<Store>, clock: Arc<dyn Clock>, run_id: RunId) -> Result<Self, OrchestratorError> {
        let store_for_read = Arc::clone(&store);
        let run = run_blocking(move || store_for_read.with_transaction(|tx| RunDao::get_run(tx, run_id))).await?;
        run.ok_or_else(|| OrchestratorError::Store(scout_core::StoreError::Invalid(format!("no run with id {run_id}"))))?;
        Ok(Self { store, clock, run_id })
    }

    /// The run this orchestrator was created for.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Opens a step: writes the `steps` row (`started_at` set,
    /// `finished_at`/`status` null) and logs a `step.started` audit event.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`]/[`OrchestratorError::Join`] if
    /// the write fails.
    pub async fn start_step(&self, name: StepName) -> Result<StepHandle, OrchestratorError> {
        let started_at = self.clock.now();
        let step =
            Step { id: StepId::new(), run_id: self.run_id, name, started_at, finished_at: None, status: None, stats: serde_json::Value::Null };
        let step_id = step.id;
        let store = Arc::clone(&self.store);
        run_blocking(move || store.with_transaction(|tx| RunDao::start_step(tx, &step))).await?;
        self.log_audit(AuditLevel::Info, name.as_str(), "step.started", "step started", serde_json::json!({})).await?;
        Ok(StepHandle { store: Arc::clone(&self.store), clock: Arc::clone(&self.clock), run_id: self.run_id, step_id, name, started_at })
    }

    /// Redacts `data`, stamps the run id and current time, and appends an
    /// audit row.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`]/[`OrchestratorError::Join`] if
    /// the write fails.
    pub async fn log_audit(
        &self,
        level: AuditLevel,
        scope: &str,
        event: &str,
        message: &str,
        data: serde_json::Value,
    ) -> Result<(), OrchestratorError> {
        let audit_event = AuditEvent {
            timestamp: self.clock.now(),
            level,
            run_id: self.run_id,
            scope: scope.to_string(),
            event: event.to_string(),
            message: message.to_string(),
            data: scout_redaction::redact(&data),
        };
        let store = Arc::clone(&self.store);
        run_blocking(move || store.with_transaction(|tx| AuditDao::insert(tx, &audit_event))).await
    }
}

/// A handle for one open step, returned by [`RunOrchestrator::start_step`].
/// Must be [`finish`](StepHandle::finish)ed exactly once.
pub struct StepHandle {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    run_id: RunId,
    step_id: StepId,
    name: StepName,
    started_at: Timestamp,
}

impl StepHandle {
    /// Canonical name of the step this handle belongs to.
    #[must_use]
    pub const fn name(&self) -> StepName {
        self.name
    }

    /// Records the step's terminal status: updates the `steps` row with
    /// `finished_at`/`status`/`stats` (with `duration_ms` merged in), and
    /// logs a matching `step.finished` (success/skipped) or `step.failed`
    /// audit event.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`]/[`OrchestratorError::Join`] if
    /// the write fails.
    pub async fn finish(self, status: StepStatus, mut stats: serde_json::Value) -> Result<(), OrchestratorError> {
        let finished_at = self.clock.now();
        let duration_ms = finished_at.epoch_millis().saturating_sub(self.started_at.epoch_millis());
        if let serde_json::Value::Object(map) = &mut stats {
            map.insert("duration_ms".to_string(), serde_json::Value::from(duration_ms));
        } else {
            stats = serde_json::json!({"duration_ms": duration_ms});
        }
        let store = Arc::clone(&self.store);
        let step_id = self.step_id;
        let stats_for_store = stats.clone();
        run_blocking(move || store.with_transaction(|tx| RunDao::finish_step(tx, step_id, finished_at, status, &stats_for_store))).await?;

        let (event, level) = match status {
            StepStatus::Success | StepStatus::Skipped => ("step.finished", AuditLevel::Info),
            StepStatus::Failed => ("step.failed", AuditLevel::Error),
        };
        let audit_event = AuditEvent {
            timestamp: finished_at,
            level,
            run_id: self.run_id,
            scope: self.name.as_str().to_string(),
            event: event.to_string(),
            message: format!("{} {}", self.name.as_str(), status.as_str()),
            data: scout_redaction::redact(&stats),
        };
        let store = Arc::clone(&self.store);
        run_blocking(move || store.with_transaction(|tx| AuditDao::insert(tx, &audit_event))).await
    }
}

async fn run_blocking<T, F>(body: F) -> Result<T, OrchestratorError>
where
    F: FnOnce() -> Result<T, scout_core::StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(body).await.map_err(|err| OrchestratorError::Join(err.to_string()))?.map_err(OrchestratorError::from)
}

/// Best-effort `git rev-parse HEAD`. Returns `None` on any failure — this
/// is a diagnostic nicety, never a reason to fail a run.
fn discover_git_commit() -> Option<String> {
    let output = std::process::Command::new("git").args(["rev-parse", "HEAD"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let commit = String::from_utf8(output.stdout).ok()?;
    let trimmed = commit.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use std::sync::Mutex as StdMutex;

    use scout_core::Timestamp;

    use super::*;

    struct FixedClock(StdMutex<i64>);

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_epoch_millis(*self.0.lock().unwrap())
        }
    }

    fn advance(clock: &FixedClock, delta_ms: i64) {
        let mut guard = clock.0.lock().unwrap();
        *guard += delta_ms;
    }

    async fn new_orchestrator(store: Arc<Store>, clock: Arc<FixedClock>) -> RunOrchestrator {
        RunOrchestrator::start(store, clock, serde_json::json!({"query": "vector database", "github_token": "secret-value"}), &serde_json::json!({"topN": 25}))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn start_creates_a_run_with_redacted_args_and_a_config_hash() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let clock = Arc::new(FixedClock(StdMutex::new(1_700_000_000_000)));
        let orchestrator = new_orchestrator(Arc::clone(&store), Arc::clone(&clock)).await;
        let run = store.with_transaction(|tx| RunDao::get_run(tx, orchestrator.run_id())).unwrap().unwrap();
        assert_eq!(run.config_hash.len(), CONFIG_HASH_HEX_CHARS);
        assert_eq!(run.args["github_token"], "[REDACTED]");
        assert_eq!(run.args["query"], "vector database");
    }

    #[tokio::test]
    async fn step_lifecycle_writes_a_step_row_and_audit_events() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let clock = Arc::new(FixedClock(StdMutex::new(1_700_000_000_000)));
        let orchestrator = new_orchestrator(Arc::clone(&store), Arc::clone(&clock)).await;
        let handle = orchestrator.start_step(StepName::GithubSearchPass1).await.unwrap();
        advance(&clock, 2_500);
        handle.finish(StepStatus::Success, serde_json::json!({"repos_found": 12})).await.unwrap();

        let steps = store.with_transaction(|tx| RunDao::list_steps_for_run(tx, orchestrator.run_id())).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].status, Some(StepStatus::Success));
        assert_eq!(steps[0].stats["duration_ms"], 2500);

        let events = store.with_transaction(|tx| AuditDao::list_for_run(tx, orchestrator.run_id())).unwrap();
        let event_names: Vec<&str> = events.iter().map(|event| event.event.as_str()).collect();
        assert!(event_names.contains(&"step.started"));
        assert!(event_names.contains(&"step.finished"));
    }

    #[tokio::test]
    async fn a_failed_step_logs_step_failed() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let clock = Arc::new(FixedClock(StdMutex::new(1_700_000_000_000)));
        let orchestrator = new_orchestrator(Arc::clone(&store), Arc::clone(&clock)).await;
        let handle = orchestrator.start_step(StepName::LlmRepoAnalysis).await.unwrap();
        handle.finish(StepStatus::Failed, serde_json::json!({"failed": 3})).await.unwrap();
        let events = store.with_transaction(|tx| AuditDao::list_for_run(tx, orchestrator.run_id())).unwrap();
        let failed = events.iter().find(|event| event.event == "step.failed").unwrap();
        assert_eq!(failed.level, AuditLevel::Error);
    }

    #[tokio::test]
    async fn resume_attaches_to_an_existing_run() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let clock = Arc::new(FixedClock(StdMutex::new(1_700_000_000_000)));
        let started = new_orchestrator(Arc::clone(&store), Arc::clone(&clock)).await;
        let resumed = RunOrchestrator::resume(Arc::clone(&store), Arc::clone(&clock) as Arc<dyn Clock>, started.run_id()).await.unwrap();
        assert_eq!(resumed.run_id(), started.run_id());
    }

    #[tokio::test]
    async fn resume_fails_for_an_unknown_run_id() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(StdMutex::new(0)));
        let result = RunOrchestrator::resume(store, clock, RunId::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn log_audit_redacts_secret_shaped_keys() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let clock = Arc::new(FixedClock(StdMutex::new(1_700_000_000_000)));
        let orchestrator = new_orchestrator(Arc::clone(&store), Arc::clone(&clock)).await;
        orchestrator
            .log_audit(AuditLevel::Warn, "hydrate_readme", "repo.readme.missing", "no readme", serde_json::json!({"authorization": "bearer xyz"}))
            .await
            .unwrap();
        let events = store.with_transaction(|tx| AuditDao::list_for_run(tx, orchestrator.run_id())).unwrap();
        let event = events.iter().find(|event| event.event == "repo.readme.missing").unwrap();
        assert_eq!(event.data["authorization"], "[REDACTED]");
    }
}
