// crates/scout-store-sqlite/src/migrations.rs
// ============================================================================
// Module: Migration Runner
// Description: Ordered, append-only, named SQL migration scripts plus the
//              runner that applies pending ones and records them in
//              `_migrations`.
// Purpose: Let the schema evolve without ever rewriting a shipped script,
//          per `spec.md` §4.A.
// Dependencies: rusqlite, scout-core
// ============================================================================

//! ## Overview
//! Each entry in [`MIGRATIONS`] is `(name, sql)`. [`run_pending`] creates
//! `_migrations` if absent, then applies every script whose `name` is not
//! already recorded there, in array order, each inside its own
//! transaction. Re-running against a fully migrated store touches zero
//! rows and is therefore a no-op, satisfying the idempotence requirement.

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use scout_core::StoreError;

use crate::map_rusqlite_error;

/// Ordered migration scripts. Append new entries; never edit or remove an
/// existing one once it has shipped.
const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_init", MIGRATION_0001_INIT),
    ("0002_http_cache_and_rate_limits", MIGRATION_0002_HTTP_CACHE_AND_RATE_LIMITS),
];

const MIGRATION_0001_INIT: &str = "
CREATE TABLE runs (
    id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL,
    args_json TEXT NOT NULL,
    config_hash TEXT NOT NULL
);

CREATE TABLE steps (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id),
    name TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    finished_at INTEGER,
    status TEXT,
    stats_json TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX idx_steps_run_id ON steps(run_id);

CREATE TABLE audit_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL REFERENCES runs(id),
    timestamp INTEGER NOT NULL,
    level TEXT NOT NULL,
    scope TEXT NOT NULL,
    event TEXT NOT NULL,
    message TEXT NOT NULL,
    data_json TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX idx_audit_events_run_id ON audit_events(run_id);

CREATE TABLE github_queries (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id),
    pass INTEGER NOT NULL,
    query_string TEXT NOT NULL,
    params_json TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX idx_github_queries_run_id ON github_queries(run_id);

CREATE TABLE repositories (
    id TEXT PRIMARY KEY,
    stars INTEGER NOT NULL,
    forks INTEGER NOT NULL,
    topics_json TEXT NOT NULL DEFAULT '[]',
    primary_language TEXT,
    license TEXT,
    pushed_at INTEGER,
    archived INTEGER NOT NULL DEFAULT 0,
    is_fork INTEGER NOT NULL DEFAULT 0,
    last_seen_run_id TEXT NOT NULL REFERENCES runs(id)
);

CREATE TABLE readmes (
    repo_id TEXT PRIMARY KEY REFERENCES repositories(id),
    content BLOB NOT NULL,
    content_hash TEXT NOT NULL,
    fetched_at INTEGER NOT NULL,
    etag TEXT,
    source_url TEXT NOT NULL
);

CREATE TABLE repo_query_links (
    query_id TEXT NOT NULL REFERENCES github_queries(id),
    repo_id TEXT NOT NULL REFERENCES repositories(id),
    rank INTEGER NOT NULL,
    PRIMARY KEY (query_id, repo_id)
);

CREATE TABLE analyses (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id),
    repo_id TEXT NOT NULL REFERENCES repositories(id),
    model TEXT NOT NULL,
    prompt_id TEXT NOT NULL,
    prompt_version TEXT NOT NULL,
    input_snapshot_json TEXT NOT NULL,
    output_json TEXT NOT NULL,
    interestingness REAL NOT NULL,
    novelty REAL NOT NULL,
    collaboration_potential REAL NOT NULL,
    final_score REAL NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (run_id, repo_id)
);
CREATE INDEX idx_analyses_run_id ON analyses(run_id);
CREATE INDEX idx_analyses_repo_id ON analyses(repo_id);

CREATE TABLE keywords (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id),
    repo_id TEXT REFERENCES repositories(id),
    term TEXT NOT NULL,
    kind TEXT NOT NULL,
    weight REAL NOT NULL
);
CREATE INDEX idx_keywords_run_id ON keywords(run_id);
CREATE INDEX idx_keywords_run_kind_term ON keywords(run_id, kind, term);

CREATE TABLE briefs (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id),
    score REAL NOT NULL,
    repo_ids_json TEXT NOT NULL,
    content_json TEXT NOT NULL,
    markdown TEXT NOT NULL,
    outreach_draft TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX idx_briefs_run_id ON briefs(run_id);
";

const MIGRATION_0002_HTTP_CACHE_AND_RATE_LIMITS: &str = "
CREATE TABLE http_cache (
    cache_key TEXT PRIMARY KEY,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    etag TEXT,
    last_modified TEXT,
    body BLOB NOT NULL,
    fetched_at INTEGER NOT NULL,
    expires_at INTEGER
);

CREATE TABLE rate_limit_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL REFERENCES runs(id),
    bucket TEXT NOT NULL,
    remaining INTEGER NOT NULL,
    limit_value INTEGER NOT NULL,
    reset_at INTEGER NOT NULL,
    observed_at INTEGER NOT NULL
);
CREATE INDEX idx_rate_limit_snapshots_run_id ON rate_limit_snapshots(run_id);
";

/// Applies every migration in [`MIGRATIONS`] not yet recorded in
/// `_migrations`, each inside its own transaction, in array order.
///
/// # Errors
///
/// Returns [`StoreError::Backend`] on any `SQLite` failure.
pub fn run_pending(connection: &mut Connection) -> Result<(), StoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at INTEGER NOT NULL
            );",
        )
        .map_err(map_rusqlite_error)?;

    for (name, sql) in MIGRATIONS {
        let already_applied: Option<String> = connection
            .query_row("SELECT name FROM _migrations WHERE name = ?1", params![name], |row| row.get(0))
            .optional()
            .map_err(map_rusqlite_error)?;
        if already_applied.is_some() {
            continue;
        }
        let tx = connection.transaction().map_err(map_rusqlite_error)?;
        tx.execute_batch(sql).map_err(map_rusqlite_error)?;
        tx.execute(
            "INSERT INTO _migrations (name, applied_at) VALUES (?1, strftime('%s','now') * 1000)",
            params![name],
        )
        .map_err(map_rusqlite_error)?;
        tx.commit().map_err(map_rusqlite_error)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use super::*;

    #[test]
    fn reapplying_migrations_against_a_migrated_store_is_a_noop() {
        let mut connection = Connection::open_in_memory().unwrap();
        run_pending(&mut connection).unwrap();
        let before: i64 =
            connection.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)).unwrap();
        run_pending(&mut connection).unwrap();
        let after: i64 =
            connection.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0)).unwrap();
        assert_eq!(before, after);
        assert_eq!(before, MIGRATIONS.len() as i64);
    }

    #[test]
    fn all_expected_tables_exist_after_migration() {
        let mut connection = Connection::open_in_memory().unwrap();
        run_pending(&mut connection).unwrap();
        for table in [
            "runs",
            "steps",
            "audit_events",
            "github_queries",
            "repositories",
            "readmes",
            "repo_query_links",
            "analyses",
            "keywords",
            "briefs",
            "http_cache",
            "rate_limit_snapshots",
        ] {
            let exists: i64 = connection
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "expected table {table} to exist");
        }
    }
}
