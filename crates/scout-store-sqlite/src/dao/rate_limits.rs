// crates/scout-store-sqlite/src/dao/rate_limits.rs
// ============================================================================
// Module: Rate Limit Snapshot DAO
// Description: Persistence for point-in-time upstream rate-limit images.
// Purpose: Back the `github_rate_limit_snapshot` step (spec.md §4.E) and the
//          CLI's `status` verb.
// Dependencies: scout-core, rusqlite
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use scout_core::RateLimitBucket;
use scout_core::RateLimitSnapshot;
use scout_core::RunId;
use scout_core::StoreError;
use scout_core::Timestamp;

use crate::map_rusqlite_error;

/// DAO for `rate_limit_snapshots`.
pub struct RateLimitDao;

impl RateLimitDao {
    /// Inserts a rate-limit snapshot row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] on a foreign-key violation.
    pub fn insert(tx: &Transaction<'_>, snapshot: &RateLimitSnapshot) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO rate_limit_snapshots (run_id, bucket, remaining, limit_value, reset_at, observed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.run_id.to_string(),
                snapshot.bucket.as_str(),
                snapshot.remaining,
                snapshot.limit,
                snapshot.reset_at.epoch_millis(),
                snapshot.observed_at.epoch_millis(),
            ],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Returns the most recently observed snapshot for a bucket within a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn latest_for_bucket(
        tx: &Transaction<'_>,
        run_id: RunId,
        bucket: RateLimitBucket,
    ) -> Result<Option<RateLimitSnapshot>, StoreError> {
        tx.query_row(
            "SELECT run_id, bucket, remaining, limit_value, reset_at, observed_at
             FROM rate_limit_snapshots WHERE run_id = ?1 AND bucket = ?2
             ORDER BY observed_at DESC LIMIT 1",
            params![run_id.to_string(), bucket.as_str()],
            |row| {
                let run_id: String = row.get(0)?;
                let bucket: String = row.get(1)?;
                let remaining: i64 = row.get(2)?;
                let limit: i64 = row.get(3)?;
                let reset_at: i64 = row.get(4)?;
                let observed_at: i64 = row.get(5)?;
                Ok((run_id, bucket, remaining, limit, reset_at, observed_at))
            },
        )
        .optional()
        .map_err(map_rusqlite_error)?
        .map(|(run_id, bucket, remaining, limit, reset_at, observed_at)| {
            Ok(RateLimitSnapshot {
                run_id: run_id.parse().map_err(|_| StoreError::Corrupt("run id malformed".to_string()))?,
                bucket: parse_bucket(&bucket).ok_or_else(|| StoreError::Corrupt(format!("unknown bucket {bucket}")))?,
                remaining,
                limit,
                reset_at: Timestamp::from_epoch_millis(reset_at),
                observed_at: Timestamp::from_epoch_millis(observed_at),
            })
        })
        .transpose()
    }
}

fn parse_bucket(value: &str) -> Option<RateLimitBucket> {
    match value {
        "search" => Some(RateLimitBucket::Search),
        "core" => Some(RateLimitBucket::Core),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use scout_core::Run;

    use super::*;
    use crate::Store;
    use crate::dao::runs::RunDao;

    fn seed_run(store: &Store) -> RunId {
        let run = Run { id: RunId::new(), created_at: Timestamp::from_epoch_millis(0), args: serde_json::json!({}), config_hash: "h".to_string() };
        store.with_transaction(|tx| RunDao::insert_run(tx, &run)).unwrap();
        run.id
    }

    #[test]
    fn latest_for_bucket_picks_most_recently_observed() {
        let store = Store::open_in_memory().unwrap();
        let run_id = seed_run(&store);
        let older = RateLimitSnapshot {
            run_id,
            bucket: RateLimitBucket::Search,
            remaining: 20,
            limit: 30,
            reset_at: Timestamp::from_epoch_millis(60_000),
            observed_at: Timestamp::from_epoch_millis(1_000),
        };
        let newer = RateLimitSnapshot { remaining: 10, observed_at: Timestamp::from_epoch_millis(2_000), ..older.clone() };
        store
            .with_transaction(|tx| {
                RateLimitDao::insert(tx, &older)?;
                RateLimitDao::insert(tx, &newer)
            })
            .unwrap();
        let latest = store
            .with_transaction(|tx| RateLimitDao::latest_for_bucket(tx, run_id, RateLimitBucket::Search))
            .unwrap()
            .unwrap();
        assert_eq!(latest.remaining, 10);
    }

    #[test]
    fn missing_bucket_returns_none() {
        let store = Store::open_in_memory().unwrap();
        let run_id = seed_run(&store);
        let result = store.with_transaction(|tx| RateLimitDao::latest_for_bucket(tx, run_id, RateLimitBucket::Core)).unwrap();
        assert!(result.is_none());
    }
}
