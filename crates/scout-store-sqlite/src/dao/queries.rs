// crates/scout-store-sqlite/src/dao/queries.rs
// ============================================================================
// Module: GitHub Query DAO
// Description: Persistence for issued searches and their result linkage.
// Purpose: Back `scout-discovery`'s pass 1/pass 2 search recording (spec.md §4.F).
// Dependencies: scout-core, rusqlite, serde_json
// ============================================================================

use rusqlite::Transaction;
use rusqlite::params;
use scout_core::GithubQuery;
use scout_core::Pass;
use scout_core::QueryId;
use scout_core::RepoId;
use scout_core::RepoQueryLink;
use scout_core::RunId;
use scout_core::StoreError;

use crate::map_rusqlite_error;

/// DAO for `github_queries` and `repo_query_links`.
pub struct QueryDao;

impl QueryDao {
    /// Inserts a search record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if `query.params` cannot be
    /// serialized, or [`StoreError::Constraint`] on a foreign-key violation.
    pub fn insert_query(tx: &Transaction<'_>, query: &GithubQuery) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO github_queries (id, run_id, pass, query_string, params_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                query.id.to_string(),
                query.run_id.to_string(),
                query.pass.as_i64(),
                query.query_string,
                serde_json::to_string(&query.params).map_err(|err| StoreError::Invalid(err.to_string()))?,
            ],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Links a repository into a query's result page at the given rank.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] if the (query, repo) pair already
    /// exists or either referenced row is missing.
    pub fn link_repo(tx: &Transaction<'_>, link: &RepoQueryLink) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO repo_query_links (query_id, repo_id, rank) VALUES (?1, ?2, ?3)",
            params![link.query_id.to_string(), link.repo_id.as_str(), link.rank],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Lists every query issued for a run, ordered by pass then insertion.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn list_for_run(tx: &Transaction<'_>, run_id: RunId) -> Result<Vec<GithubQuery>, StoreError> {
        let mut stmt = tx
            .prepare(
                "SELECT id, run_id, pass, query_string, params_json FROM github_queries
                 WHERE run_id = ?1 ORDER BY pass ASC, rowid ASC",
            )
            .map_err(map_rusqlite_error)?;
        let rows = stmt
            .query_map(params![run_id.to_string()], |row| {
                let id: String = row.get(0)?;
                let run_id: String = row.get(1)?;
                let pass: i64 = row.get(2)?;
                let query_string: String = row.get(3)?;
                let params_json: String = row.get(4)?;
                Ok((id, run_id, pass, query_string, params_json))
            })
            .map_err(map_rusqlite_error)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(map_rusqlite_error)?
            .into_iter()
            .map(|(id, run_id, pass, query_string, params_json)| {
                Ok(GithubQuery {
                    id: id.parse().map_err(|_| StoreError::Corrupt("query id malformed".to_string()))?,
                    run_id: run_id.parse().map_err(|_| StoreError::Corrupt("run id malformed".to_string()))?,
                    pass: parse_pass(pass)?,
                    query_string,
                    params: serde_json::from_str(&params_json)
                        .map_err(|err| StoreError::Corrupt(format!("query params_json: {err}")))?,
                })
            })
            .collect()
    }

    /// Lists the repo ids linked to a query, ordered by rank.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn list_linked_repos(tx: &Transaction<'_>, query_id: QueryId) -> Result<Vec<RepoId>, StoreError> {
        let mut stmt = tx
            .prepare("SELECT repo_id FROM repo_query_links WHERE query_id = ?1 ORDER BY rank ASC")
            .map_err(map_rusqlite_error)?;
        let rows = stmt.query_map(params![query_id.to_string()], |row| row.get::<_, String>(0)).map_err(map_rusqlite_error)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(map_rusqlite_error)?
            .into_iter()
            .map(|full_name| RepoId::parse(&full_name).ok_or_else(|| StoreError::Corrupt("repo id malformed".to_string())))
            .collect()
    }
}

fn parse_pass(value: i64) -> Result<Pass, StoreError> {
    match value {
        1 => Ok(Pass::One),
        2 => Ok(Pass::Two),
        other => Err(StoreError::Corrupt(format!("unknown pass value {other}"))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use scout_core::Run;
    use scout_core::Timestamp;

    use super::*;
    use crate::Store;
    use crate::dao::repos::RepoDao;
    use crate::dao::runs::RunDao;

    fn seed_run(store: &Store) -> RunId {
        let run = Run { id: RunId::new(), created_at: Timestamp::from_epoch_millis(0), args: serde_json::json!({}), config_hash: "h".to_string() };
        store.with_transaction(|tx| RunDao::insert_run(tx, &run)).unwrap();
        run.id
    }

    fn sample_repo(run_id: RunId) -> scout_core::Repository {
        scout_core::Repository {
            id: RepoId::parse("acme/widgets").unwrap(),
            stars: 10,
            forks: 2,
            topics: vec!["vector-database".to_string()],
            primary_language: Some("Rust".to_string()),
            license: Some("MIT".to_string()),
            pushed_at: Timestamp::from_epoch_millis(0),
            archived: false,
            is_fork: false,
            last_seen_run_id: run_id,
        }
    }

    #[test]
    fn query_and_link_round_trip_in_rank_order() {
        let store = Store::open_in_memory().unwrap();
        let run_id = seed_run(&store);
        let repo = sample_repo(run_id);
        let query = GithubQuery {
            id: QueryId::new(),
            run_id,
            pass: Pass::One,
            query_string: "topic:vector-database".to_string(),
            params: serde_json::json!({"sort": "stars"}),
        };
        store
            .with_transaction(|tx| {
                RepoDao::upsert(tx, &repo)?;
                QueryDao::insert_query(tx, &query)?;
                QueryDao::link_repo(tx, &RepoQueryLink { query_id: query.id, repo_id: repo.id.clone(), rank: 1 })
            })
            .unwrap();
        let linked = store.with_transaction(|tx| QueryDao::list_linked_repos(tx, query.id)).unwrap();
        assert_eq!(linked, vec![repo.id]);
        let queries = store.with_transaction(|tx| QueryDao::list_for_run(tx, run_id)).unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].pass, Pass::One);
    }
}
