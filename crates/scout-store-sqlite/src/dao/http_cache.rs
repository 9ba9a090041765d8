// crates/scout-store-sqlite/src/dao/http_cache.rs
// ============================================================================
// Module: HTTP Cache DAO
// Description: Persistence for the conditional-GET response cache.
// Purpose: Back `scout-http`'s cache-then-revalidate flow (spec.md §8).
// Dependencies: scout-core, rusqlite
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use scout_core::HttpCacheEntry;
use scout_core::StoreError;
use scout_core::Timestamp;

use crate::map_rusqlite_error;

/// DAO for `http_cache`.
pub struct HttpCacheDao;

impl HttpCacheDao {
    /// Fetches a cache entry by its key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn get(tx: &Transaction<'_>, cache_key: &str) -> Result<Option<HttpCacheEntry>, StoreError> {
        tx.query_row(
            "SELECT cache_key, method, url, status, etag, last_modified, body, fetched_at, expires_at
             FROM http_cache WHERE cache_key = ?1",
            params![cache_key],
            row_to_entry,
        )
        .optional()
        .map_err(map_rusqlite_error)
    }

    /// Inserts or fully replaces a cache entry. Used on a `2xx` response,
    /// which carries a new body and therefore overwrites everything.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn upsert(tx: &Transaction<'_>, entry: &HttpCacheEntry) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO http_cache (cache_key, method, url, status, etag, last_modified, body, fetched_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (cache_key) DO UPDATE SET
                method = excluded.method,
                url = excluded.url,
                status = excluded.status,
                etag = excluded.etag,
                last_modified = excluded.last_modified,
                body = excluded.body,
                fetched_at = excluded.fetched_at,
                expires_at = excluded.expires_at",
            params![
                entry.cache_key,
                entry.method,
                entry.url,
                i64::from(entry.status),
                entry.etag,
                entry.last_modified,
                entry.body,
                entry.fetched_at.epoch_millis(),
                entry.expires_at.map(Timestamp::epoch_millis),
            ],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Advances `fetched_at` (and optionally `expires_at`) without touching
    /// `body`/`status`/`etag`/`last_modified`. Used on a `304 Not Modified`
    /// response, which carries no body (`spec.md` §8).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if no entry with `cache_key` exists.
    pub fn touch(tx: &Transaction<'_>, cache_key: &str, fetched_at: Timestamp, expires_at: Option<Timestamp>) -> Result<(), StoreError> {
        let rows = tx
            .execute(
                "UPDATE http_cache SET fetched_at = ?1, expires_at = ?2 WHERE cache_key = ?3",
                params![fetched_at.epoch_millis(), expires_at.map(Timestamp::epoch_millis), cache_key],
            )
            .map_err(map_rusqlite_error)?;
        if rows == 0 {
            return Err(StoreError::Invalid(format!("no cache entry for key {cache_key}")));
        }
        Ok(())
    }

    /// Deletes every entry whose `fetched_at` is strictly older than
    /// `cutoff`. Backs the `cache:prune` CLI verb (`spec.md` §6).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn prune_older_than(tx: &Transaction<'_>, cutoff: Timestamp) -> Result<usize, StoreError> {
        tx.execute("DELETE FROM http_cache WHERE fetched_at < ?1", params![cutoff.epoch_millis()]).map_err(map_rusqlite_error)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<HttpCacheEntry> {
    let status: i64 = row.get(3)?;
    let fetched_at: i64 = row.get(7)?;
    let expires_at: Option<i64> = row.get(8)?;
    Ok(HttpCacheEntry {
        cache_key: row.get(0)?,
        method: row.get(1)?,
        url: row.get(2)?,
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        status: status as u16,
        etag: row.get(4)?,
        last_modified: row.get(5)?,
        body: row.get(6)?,
        fetched_at: Timestamp::from_epoch_millis(fetched_at),
        expires_at: expires_at.map(Timestamp::from_epoch_millis),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use super::*;
    use crate::Store;

    fn sample_entry() -> HttpCacheEntry {
        HttpCacheEntry {
            cache_key: "key1".to_string(),
            method: "GET".to_string(),
            url: "https://api.github.com/search/repositories?q=topic:vector-database".to_string(),
            status: 200,
            etag: Some("\"abc\"".to_string()),
            last_modified: None,
            body: b"{}".to_vec(),
            fetched_at: Timestamp::from_epoch_millis(1000),
            expires_at: None,
        }
    }

    #[test]
    fn touch_advances_fetched_at_without_overwriting_body() {
        let store = Store::open_in_memory().unwrap();
        let entry = sample_entry();
        store.with_transaction(|tx| HttpCacheDao::upsert(tx, &entry)).unwrap();
        store
            .with_transaction(|tx| HttpCacheDao::touch(tx, &entry.cache_key, Timestamp::from_epoch_millis(2000), None))
            .unwrap();
        let fetched = store.with_transaction(|tx| HttpCacheDao::get(tx, &entry.cache_key)).unwrap().unwrap();
        assert_eq!(fetched.fetched_at.epoch_millis(), 2000);
        assert_eq!(fetched.body, b"{}");
        assert_eq!(fetched.etag, entry.etag);
    }

    #[test]
    fn touching_an_unknown_key_is_an_error() {
        let store = Store::open_in_memory().unwrap();
        let result = store.with_transaction(|tx| HttpCacheDao::touch(tx, "missing", Timestamp::from_epoch_millis(0), None));
        assert!(result.is_err());
    }

    #[test]
    fn prune_older_than_deletes_only_stale_entries() {
        let store = Store::open_in_memory().unwrap();
        let mut old_entry = sample_entry();
        old_entry.cache_key = "old".to_string();
        old_entry.fetched_at = Timestamp::from_epoch_millis(1000);
        let mut fresh_entry = sample_entry();
        fresh_entry.cache_key = "fresh".to_string();
        fresh_entry.fetched_at = Timestamp::from_epoch_millis(5000);
        store.with_transaction(|tx| HttpCacheDao::upsert(tx, &old_entry)).unwrap();
        store.with_transaction(|tx| HttpCacheDao::upsert(tx, &fresh_entry)).unwrap();

        let pruned = store.with_transaction(|tx| HttpCacheDao::prune_older_than(tx, Timestamp::from_epoch_millis(3000))).unwrap();
        assert_eq!(pruned, 1);
        assert!(store.with_transaction(|tx| HttpCacheDao::get(tx, "old")).unwrap().is_none());
        assert!(store.with_transaction(|tx| HttpCacheDao::get(tx, "fresh")).unwrap().is_some());
    }

    #[test]
    fn upsert_replaces_body_and_status_on_a_fresh_response() {
        let store = Store::open_in_memory().unwrap();
        let mut entry = sample_entry();
        store.with_transaction(|tx| HttpCacheDao::upsert(tx, &entry)).unwrap();
        entry.body = b"{\"updated\":true}".to_vec();
        entry.status = 200;
        store.with_transaction(|tx| HttpCacheDao::upsert(tx, &entry)).unwrap();
        let fetched = store.with_transaction(|tx| HttpCacheDao::get(tx, &entry.cache_key)).unwrap().unwrap();
        assert_eq!(fetched.body, b"{\"updated\":true}");
    }
}
