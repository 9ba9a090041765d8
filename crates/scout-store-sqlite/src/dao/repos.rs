// crates/scout-store-sqlite/src/dao/repos.rs
// ============================================================================
// Module: Repository and README DAO
// Description: Persistence for repository metadata and the latest README.
// Purpose: Back `scout-discovery`'s hydration steps (spec.md §4.F).
// Dependencies: scout-core, rusqlite, serde_json
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use scout_core::Readme;
use scout_core::RepoId;
use scout_core::Repository;
use scout_core::StoreError;
use scout_core::Timestamp;

use crate::map_rusqlite_error;

/// DAO for `repositories` and `readmes`.
pub struct RepoDao;

impl RepoDao {
    /// Upserts a repository, replacing metadata in place and bumping
    /// `last_seen_run_id`. Topics are sorted for deterministic storage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if `repo.topics` cannot be serialized.
    pub fn upsert(tx: &Transaction<'_>, repo: &Repository) -> Result<(), StoreError> {
        let mut topics = repo.topics.clone();
        topics.sort();
        let topics_json = serde_json::to_string(&topics).map_err(|err| StoreError::Invalid(err.to_string()))?;
        tx.execute(
            "INSERT INTO repositories
                (id, stars, forks, topics_json, primary_language, license, pushed_at, archived, is_fork, last_seen_run_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (id) DO UPDATE SET
                stars = excluded.stars,
                forks = excluded.forks,
                topics_json = excluded.topics_json,
                primary_language = excluded.primary_language,
                license = excluded.license,
                pushed_at = excluded.pushed_at,
                archived = excluded.archived,
                is_fork = excluded.is_fork,
                last_seen_run_id = excluded.last_seen_run_id",
            params![
                repo.id.as_str(),
                repo.stars,
                repo.forks,
                topics_json,
                repo.primary_language,
                repo.license,
                repo.pushed_at.epoch_millis(),
                i64::from(repo.archived),
                i64::from(repo.is_fork),
                repo.last_seen_run_id.to_string(),
            ],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Fetches a repository by canonical full name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if `topics_json` cannot be parsed.
    pub fn get(tx: &Transaction<'_>, id: &RepoId) -> Result<Option<Repository>, StoreError> {
        tx.query_row(
            "SELECT id, stars, forks, topics_json, primary_language, license, pushed_at, archived, is_fork, last_seen_run_id
             FROM repositories WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, String>(9)?,
                ))
            },
        )
        .optional()
        .map_err(map_rusqlite_error)?
        .map(|(id, stars, forks, topics_json, primary_language, license, pushed_at, archived, is_fork, last_seen_run_id)| {
            Ok(Repository {
                id: RepoId::parse(&id).ok_or_else(|| StoreError::Corrupt("repo id malformed".to_string()))?,
                stars,
                forks,
                topics: serde_json::from_str(&topics_json)
                    .map_err(|err| StoreError::Corrupt(format!("repo topics_json: {err}")))?,
                primary_language,
                license,
                pushed_at: Timestamp::from_epoch_millis(pushed_at),
                archived: archived != 0,
                is_fork: is_fork != 0,
                last_seen_run_id: last_seen_run_id
                    .parse()
                    .map_err(|_| StoreError::Corrupt("run id malformed".to_string()))?,
            })
        })
        .transpose()
    }

    /// Replaces the stored README for a repository. Per-repository READMEs
    /// are overwritten in place rather than versioned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] if `readme.repo_id` has no row.
    pub fn upsert_readme(tx: &Transaction<'_>, readme: &Readme) -> Result<(), StoreError> {
        tx.execute("DELETE FROM readmes WHERE repo_id = ?1", params![readme.repo_id.as_str()])
            .map_err(map_rusqlite_error)?;
        tx.execute(
            "INSERT INTO readmes (repo_id, content, content_hash, fetched_at, etag, source_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                readme.repo_id.as_str(),
                readme.content,
                readme.content_hash,
                readme.fetched_at.epoch_millis(),
                readme.etag,
                readme.source_url,
            ],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Fetches the current README for a repository.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn get_readme(tx: &Transaction<'_>, repo_id: &RepoId) -> Result<Option<Readme>, StoreError> {
        tx.query_row(
            "SELECT repo_id, content, content_hash, fetched_at, etag, source_url FROM readmes WHERE repo_id = ?1",
            params![repo_id.as_str()],
            |row| {
                Ok(Readme {
                    repo_id: repo_id.clone(),
                    content: row.get(1)?,
                    content_hash: row.get(2)?,
                    fetched_at: Timestamp::from_epoch_millis(row.get::<_, i64>(3)?),
                    etag: row.get(4)?,
                    source_url: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(map_rusqlite_error)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use scout_core::RunId;

    use super::*;
    use crate::Store;

    fn sample_repo(run_id: RunId) -> Repository {
        Repository {
            id: RepoId::parse("acme/widgets").unwrap(),
            stars: 10,
            forks: 2,
            topics: vec!["b-topic".to_string(), "a-topic".to_string()],
            primary_language: Some("Rust".to_string()),
            license: None,
            pushed_at: Timestamp::from_epoch_millis(1000),
            archived: false,
            is_fork: false,
            last_seen_run_id: run_id,
        }
    }

    #[test]
    fn upsert_replaces_metadata_and_sorts_topics() {
        let store = Store::open_in_memory().unwrap();
        let run_id = RunId::new();
        let mut repo = sample_repo(run_id);
        store.with_transaction(|tx| RepoDao::upsert(tx, &repo)).unwrap();
        repo.stars = 20;
        store.with_transaction(|tx| RepoDao::upsert(tx, &repo)).unwrap();
        let fetched = store.with_transaction(|tx| RepoDao::get(tx, &repo.id)).unwrap().unwrap();
        assert_eq!(fetched.stars, 20);
        assert_eq!(fetched.topics, vec!["a-topic".to_string(), "b-topic".to_string()]);
    }

    #[test]
    fn readme_upsert_replaces_in_place() {
        let store = Store::open_in_memory().unwrap();
        let run_id = RunId::new();
        let repo = sample_repo(run_id);
        store.with_transaction(|tx| RepoDao::upsert(tx, &repo)).unwrap();
        let first = Readme {
            repo_id: repo.id.clone(),
            content: b"first".to_vec(),
            content_hash: "hash1".to_string(),
            fetched_at: Timestamp::from_epoch_millis(1),
            etag: Some("etag1".to_string()),
            source_url: "https://raw.githubusercontent.com/acme/widgets/HEAD/README.md".to_string(),
        };
        let second = Readme { content: b"second".to_vec(), content_hash: "hash2".to_string(), fetched_at: Timestamp::from_epoch_millis(2), etag: None, ..first.clone() };
        store
            .with_transaction(|tx| {
                RepoDao::upsert_readme(tx, &first)?;
                RepoDao::upsert_readme(tx, &second)
            })
            .unwrap();
        let fetched = store.with_transaction(|tx| RepoDao::get_readme(tx, &repo.id)).unwrap().unwrap();
        assert_eq!(fetched.content, b"second");
        assert_eq!(fetched.etag, None);
    }
}
