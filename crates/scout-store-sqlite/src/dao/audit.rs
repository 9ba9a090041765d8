// crates/scout-store-sqlite/src/dao/audit.rs
// ============================================================================
// Module: Audit Event DAO
// Description: Persistence for the immutable structured log.
// Purpose: Back `scout-orchestrator`'s `log_audit` helper (spec.md §4.E, §9).
// Dependencies: scout-core, rusqlite, serde_json
// ============================================================================

use rusqlite::Transaction;
use rusqlite::params;
use scout_core::AuditEvent;
use scout_core::AuditLevel;
use scout_core::RunId;
use scout_core::StoreError;
use scout_core::Timestamp;

use crate::map_rusqlite_error;

/// DAO for `audit_events`.
pub struct AuditDao;

impl AuditDao {
    /// Appends an audit event. Audit rows are immutable and are only ever
    /// removed in bulk by [`AuditDao::prune_older_than`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if `event.data` cannot be serialized,
    /// or [`StoreError::Constraint`] on a foreign-key violation.
    pub fn insert(tx: &Transaction<'_>, event: &AuditEvent) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO audit_events (run_id, timestamp, level, scope, event, message, data_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.run_id.to_string(),
                event.timestamp.epoch_millis(),
                level_as_str(event.level),
                event.scope,
                event.event,
                event.message,
                serde_json::to_string(&event.data).map_err(|err| StoreError::Invalid(err.to_string()))?,
            ],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Lists every audit event recorded for a run, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure or
    /// [`StoreError::Corrupt`] if a row's `data_json` cannot be parsed.
    pub fn list_for_run(tx: &Transaction<'_>, run_id: RunId) -> Result<Vec<AuditEvent>, StoreError> {
        let mut stmt = tx
            .prepare(
                "SELECT timestamp, level, run_id, scope, event, message, data_json
                 FROM audit_events WHERE run_id = ?1 ORDER BY id ASC",
            )
            .map_err(map_rusqlite_error)?;
        let rows = stmt
            .query_map(params![run_id.to_string()], |row| {
                let timestamp: i64 = row.get(0)?;
                let level: String = row.get(1)?;
                let run_id: String = row.get(2)?;
                let scope: String = row.get(3)?;
                let event: String = row.get(4)?;
                let message: String = row.get(5)?;
                let data_json: String = row.get(6)?;
                Ok((timestamp, level, run_id, scope, event, message, data_json))
            })
            .map_err(map_rusqlite_error)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(map_rusqlite_error)?
            .into_iter()
            .map(|(timestamp, level, run_id, scope, event, message, data_json)| {
                Ok(AuditEvent {
                    timestamp: Timestamp::from_epoch_millis(timestamp),
                    level: parse_level(&level).ok_or_else(|| StoreError::Corrupt(format!("unknown audit level {level}")))?,
                    run_id: run_id.parse().map_err(|_| StoreError::Corrupt("run id malformed".to_string()))?,
                    scope,
                    event,
                    message,
                    data: serde_json::from_str(&data_json)
                        .map_err(|err| StoreError::Corrupt(format!("audit data_json: {err}")))?,
                })
            })
            .collect()
    }

    /// Deletes every audit event whose `timestamp` is strictly older than
    /// `cutoff`. Backs the `logs:prune` CLI verb (`spec.md` §6).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn prune_older_than(tx: &Transaction<'_>, cutoff: Timestamp) -> Result<usize, StoreError> {
        tx.execute("DELETE FROM audit_events WHERE timestamp < ?1", params![cutoff.epoch_millis()]).map_err(map_rusqlite_error)
    }
}

fn level_as_str(level: AuditLevel) -> &'static str {
    match level {
        AuditLevel::Trace => "trace",
        AuditLevel::Debug => "debug",
        AuditLevel::Info => "info",
        AuditLevel::Warn => "warn",
        AuditLevel::Error => "error",
    }
}

fn parse_level(value: &str) -> Option<AuditLevel> {
    match value {
        "trace" => Some(AuditLevel::Trace),
        "debug" => Some(AuditLevel::Debug),
        "info" => Some(AuditLevel::Info),
        "warn" => Some(AuditLevel::Warn),
        "error" => Some(AuditLevel::Error),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use scout_core::RunId;

    use super::*;
    use crate::Store;
    use crate::dao::runs::RunDao;

    fn seed_run(store: &Store) -> RunId {
        let run = scout_core::Run {
            id: RunId::new(),
            created_at: Timestamp::from_epoch_millis(0),
            args: serde_json::json!({}),
            config_hash: "abc".to_string(),
        };
        store.with_transaction(|tx| RunDao::insert_run(tx, &run)).unwrap();
        run.id
    }

    #[test]
    fn events_are_listed_in_insertion_order() {
        let store = Store::open_in_memory().unwrap();
        let run_id = seed_run(&store);
        let first = AuditEvent {
            timestamp: Timestamp::from_epoch_millis(1),
            level: AuditLevel::Info,
            run_id,
            scope: "github_search_pass1".to_string(),
            event: "query.issued".to_string(),
            message: "issued query".to_string(),
            data: serde_json::json!({"query": "topic:vector-database"}),
        };
        let second = AuditEvent {
            timestamp: Timestamp::from_epoch_millis(2),
            level: AuditLevel::Warn,
            run_id,
            scope: "hydrate_readme".to_string(),
            event: "repo.readme.missing".to_string(),
            message: "no readme found".to_string(),
            data: serde_json::json!({}),
        };
        store
            .with_transaction(|tx| {
                AuditDao::insert(tx, &first)?;
                AuditDao::insert(tx, &second)
            })
            .unwrap();
        let events = store.with_transaction(|tx| AuditDao::list_for_run(tx, run_id)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "query.issued");
        assert_eq!(events[1].level, AuditLevel::Warn);
    }

    #[test]
    fn prune_older_than_deletes_only_stale_events() {
        let store = Store::open_in_memory().unwrap();
        let run_id = seed_run(&store);
        let old = AuditEvent {
            timestamp: Timestamp::from_epoch_millis(1),
            level: AuditLevel::Info,
            run_id,
            scope: "github_search_pass1".to_string(),
            event: "query.issued".to_string(),
            message: "issued query".to_string(),
            data: serde_json::json!({}),
        };
        let recent = AuditEvent {
            timestamp: Timestamp::from_epoch_millis(10_000),
            level: AuditLevel::Info,
            run_id,
            scope: "github_search_pass1".to_string(),
            event: "query.issued".to_string(),
            message: "issued query".to_string(),
            data: serde_json::json!({}),
        };
        store
            .with_transaction(|tx| {
                AuditDao::insert(tx, &old)?;
                AuditDao::insert(tx, &recent)
            })
            .unwrap();

        let pruned = store.with_transaction(|tx| AuditDao::prune_older_than(tx, Timestamp::from_epoch_millis(5_000))).unwrap();
        assert_eq!(pruned, 1);
        let remaining = store.with_transaction(|tx| AuditDao::list_for_run(tx, run_id)).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].timestamp.epoch_millis(), 10_000);
    }
}
