// crates/scout-store-sqlite/src/dao/briefs.rs
// ============================================================================
// Module: Brief DAO
// Description: Persistence for 2-4 repo collaboration briefs.
// Purpose: Back `scout-briefs`'s synthesis step and the CLI's `review`/`list`
//          verbs (spec.md §4.G, §6).
// Dependencies: scout-core, rusqlite, serde_json
// ============================================================================

use rusqlite::Transaction;
use rusqlite::params;
use scout_core::Brief;
use scout_core::BriefId;
use scout_core::BriefStatus;
use scout_core::RepoId;
use scout_core::RunId;
use scout_core::StoreError;
use scout_core::Timestamp;

use crate::map_rusqlite_error;

/// DAO for `briefs`.
pub struct BriefDao;

impl BriefDao {
    /// Inserts a brief row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if `brief.repo_ids` or `brief.content`
    /// cannot be serialized.
    pub fn insert(tx: &Transaction<'_>, brief: &Brief) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO briefs (id, run_id, score, repo_ids_json, content_json, markdown, outreach_draft, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                brief.id.to_string(),
                brief.run_id.to_string(),
                brief.score,
                serde_json::to_string(&brief.repo_ids.iter().map(RepoId::as_str).collect::<Vec<_>>())
                    .map_err(|err| StoreError::Invalid(err.to_string()))?,
                serde_json::to_string(&brief.content).map_err(|err| StoreError::Invalid(err.to_string()))?,
                brief.markdown,
                brief.outreach_draft,
                brief.status.as_str(),
                brief.created_at.epoch_millis(),
            ],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Lists every brief for a run, ordered by descending score.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if stored JSON cannot be parsed.
    pub fn list_for_run(tx: &Transaction<'_>, run_id: RunId) -> Result<Vec<Brief>, StoreError> {
        let mut stmt = tx
            .prepare(
                "SELECT id, run_id, score, repo_ids_json, content_json, markdown, outreach_draft, status, created_at
                 FROM briefs WHERE run_id = ?1 ORDER BY score DESC",
            )
            .map_err(map_rusqlite_error)?;
        let rows = stmt.query_map(params![run_id.to_string()], row_to_parts).map_err(map_rusqlite_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_rusqlite_error)?.into_iter().map(build_brief).collect()
    }

    /// Updates a brief's review status, the only mutable field on a brief
    /// once created (`spec.md` §3 "Lifecycle").
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if no brief with `id` exists.
    pub fn update_status(tx: &Transaction<'_>, id: BriefId, status: BriefStatus) -> Result<(), StoreError> {
        let rows = tx
            .execute("UPDATE briefs SET status = ?1 WHERE id = ?2", params![status.as_str(), id.to_string()])
            .map_err(map_rusqlite_error)?;
        if rows == 0 {
            return Err(StoreError::Invalid(format!("no brief with id {id}")));
        }
        Ok(())
    }
}

type BriefRow = (String, String, f64, String, String, String, String, String, i64);

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<BriefRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?))
}

fn build_brief(parts: BriefRow) -> Result<Brief, StoreError> {
    let (id, run_id, score, repo_ids_json, content_json, markdown, outreach_draft, status, created_at) = parts;
    let repo_id_strings: Vec<String> =
        serde_json::from_str(&repo_ids_json).map_err(|err| StoreError::Corrupt(format!("brief repo_ids_json: {err}")))?;
    let repo_ids = repo_id_strings
        .into_iter()
        .map(|value| RepoId::parse(&value).ok_or_else(|| StoreError::Corrupt("repo id malformed".to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Brief {
        id: id.parse().map_err(|_| StoreError::Corrupt("brief id malformed".to_string()))?,
        run_id: run_id.parse().map_err(|_| StoreError::Corrupt("run id malformed".to_string()))?,
        score,
        repo_ids,
        content: serde_json::from_str(&content_json).map_err(|err| StoreError::Corrupt(format!("brief content_json: {err}")))?,
        markdown,
        outreach_draft,
        status: parse_status(&status).ok_or_else(|| StoreError::Corrupt(format!("unknown brief status {status}")))?,
        created_at: Timestamp::from_epoch_millis(created_at),
    })
}

fn parse_status(value: &str) -> Option<BriefStatus> {
    match value {
        "draft" => Some(BriefStatus::Draft),
        "shortlisted" => Some(BriefStatus::Shortlisted),
        "approved" => Some(BriefStatus::Approved),
        "rejected" => Some(BriefStatus::Rejected),
        "rejected_by_threshold" => Some(BriefStatus::RejectedByThreshold),
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

    fn sample_brief(run_id: RunId) -> Brief {
        Brief {
            id: BriefId::new(),
            run_id,
            score: 0.7675,
            repo_ids: vec![RepoId::parse("acme/alpha").unwrap(), RepoId::parse("acme/beta").unwrap()],
            content: serde_json::json!({"title": "Alpha x Beta"}),
            markdown: "# Alpha x Beta".to_string(),
            outreach_draft: "Hi there,".to_string(),
            status: BriefStatus::Draft,
            created_at: Timestamp::from_epoch_millis(0),
        }
    }

    #[test]
    fn insert_and_list_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let run_id = seed_run(&store);
        let brief = sample_brief(run_id);
        store.with_transaction(|tx| BriefDao::insert(tx, &brief)).unwrap();
        let briefs = store.with_transaction(|tx| BriefDao::list_for_run(tx, run_id)).unwrap();
        assert_eq!(briefs.len(), 1);
        assert_eq!(briefs[0].repo_ids, brief.repo_ids);
        assert!((briefs[0].score - 0.7675).abs() < f64::EPSILON);
    }

    #[test]
    fn status_is_the_only_mutable_field() {
        let store = Store::open_in_memory().unwrap();
        let run_id = seed_run(&store);
        let brief = sample_brief(run_id);
        store.with_transaction(|tx| BriefDao::insert(tx, &brief)).unwrap();
        store.with_transaction(|tx| BriefDao::update_status(tx, brief.id, BriefStatus::Approved)).unwrap();
        let briefs = store.with_transaction(|tx| BriefDao::list_for_run(tx, run_id)).unwrap();
        assert_eq!(briefs[0].status, BriefStatus::Approved);
    }

    #[test]
    fn updating_an_unknown_brief_is_an_error() {
        let store = Store::open_in_memory().unwrap();
        let result = store.with_transaction(|tx| BriefDao::update_status(tx, BriefId::new(), BriefStatus::Approved));
        assert!(result.is_err());
    }
}
