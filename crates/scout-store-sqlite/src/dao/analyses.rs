// crates/scout-store-sqlite/src/dao/analyses.rs
// ============================================================================
// Module: Analysis and Keyword DAO
// Description: Persistence for per-repo LLM analyses and the keywords
//              derived from them.
// Purpose: Back `scout-discovery`'s analyze/aggregate steps and
//          `scout-briefs`'s historical-candidate lookups (spec.md §4.F, §4.G).
// Dependencies: scout-core, rusqlite, serde_json
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use scout_core::Analysis;
use scout_core::Keyword;
use scout_core::KeywordId;
use scout_core::KeywordKind;
use scout_core::RepoAnalysisOutput;
use scout_core::RepoId;
use scout_core::RunId;
use scout_core::StoreError;
use scout_core::Timestamp;

use crate::map_rusqlite_error;

/// DAO for `analyses` and `keywords`.
pub struct AnalysisDao;

impl AnalysisDao {
    /// Inserts an analysis row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] if `(run_id, repo_id)` already has
    /// a row (`spec.md`'s "same run, re-analysis skipped" invariant).
    pub fn insert(tx: &Transaction<'_>, analysis: &Analysis) -> Result<(), StoreError> {
        let id = KeywordId::derive(analysis.run_id, Some(&analysis.repo_id), "analysis", "analysis");
        tx.execute(
            "INSERT INTO analyses
                (id, run_id, repo_id, model, prompt_id, prompt_version, input_snapshot_json, output_json,
                 interestingness, novelty, collaboration_potential, final_score, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                id.as_str(),
                analysis.run_id.to_string(),
                analysis.repo_id.as_str(),
                analysis.model,
                analysis.prompt_id,
                analysis.prompt_version,
                serde_json::to_string(&analysis.input_snapshot).map_err(|err| StoreError::Invalid(err.to_string()))?,
                serde_json::to_string(&analysis.output).map_err(|err| StoreError::Invalid(err.to_string()))?,
                analysis.output.scores.interestingness,
                analysis.output.scores.novelty,
                analysis.output.scores.collaboration_potential,
                analysis.final_score,
                analysis.created_at.epoch_millis(),
            ],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Returns whether `(run_id, repo_id)` already has an analysis.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn exists(tx: &Transaction<'_>, run_id: RunId, repo_id: &RepoId) -> Result<bool, StoreError> {
        let count: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM analyses WHERE run_id = ?1 AND repo_id = ?2",
                params![run_id.to_string(), repo_id.as_str()],
                |row| row.get(0),
            )
            .map_err(map_rusqlite_error)?;
        Ok(count > 0)
    }

    /// Lists every analysis for a run, sorted by repo id for determinism.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if stored JSON cannot be parsed.
    pub fn list_for_run(tx: &Transaction<'_>, run_id: RunId) -> Result<Vec<Analysis>, StoreError> {
        let mut stmt = tx
            .prepare(
                "SELECT run_id, repo_id, model, prompt_id, prompt_version, input_snapshot_json, output_json,
                        final_score, created_at
                 FROM analyses WHERE run_id = ?1 ORDER BY repo_id ASC",
            )
            .map_err(map_rusqlite_error)?;
        let rows = stmt
            .query_map(params![run_id.to_string()], row_to_analysis_parts)
            .map_err(map_rusqlite_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_rusqlite_error)?.into_iter().map(build_analysis).collect()
    }

    /// Returns the top-K analyses for a run by descending final score, ties
    /// broken by ascending repo id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if stored JSON cannot be parsed.
    pub fn top_by_final_score(tx: &Transaction<'_>, run_id: RunId, limit: u32) -> Result<Vec<Analysis>, StoreError> {
        let mut stmt = tx
            .prepare(
                "SELECT run_id, repo_id, model, prompt_id, prompt_version, input_snapshot_json, output_json,
                        final_score, created_at
                 FROM analyses WHERE run_id = ?1
                 ORDER BY final_score DESC, repo_id ASC LIMIT ?2",
            )
            .map_err(map_rusqlite_error)?;
        let rows = stmt
            .query_map(params![run_id.to_string(), i64::from(limit)], row_to_analysis_parts)
            .map_err(map_rusqlite_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_rusqlite_error)?.into_iter().map(build_analysis).collect()
    }

    /// Returns the top-N highest-scoring analyses per repository across
    /// every run except `exclude_run_id`, for the brief engine's historical
    /// candidate injection (`spec.md` §4.G).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if stored JSON cannot be parsed.
    pub fn historical_top_per_repo(
        tx: &Transaction<'_>,
        exclude_run_id: RunId,
        candidates: u32,
    ) -> Result<Vec<Analysis>, StoreError> {
        let mut stmt = tx
            .prepare(
                "SELECT run_id, repo_id, model, prompt_id, prompt_version, input_snapshot_json, output_json,
                        final_score, created_at
                 FROM analyses a
                 WHERE run_id != ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM analyses b
                       WHERE b.repo_id = a.repo_id AND b.run_id != ?1 AND b.final_score > a.final_score
                   )
                 ORDER BY final_score DESC, repo_id ASC
                 LIMIT ?2",
            )
            .map_err(map_rusqlite_error)?;
        let rows = stmt
            .query_map(params![exclude_run_id.to_string(), i64::from(candidates)], row_to_analysis_parts)
            .map_err(map_rusqlite_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_rusqlite_error)?.into_iter().map(build_analysis).collect()
    }

    /// Inserts a per-repo or run-aggregate keyword row. The id is derived
    /// from `(run_id, repo_id, kind, term)` so re-insertion with the same
    /// composite key updates rather than duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] on a foreign-key violation.
    pub fn upsert_keyword(tx: &Transaction<'_>, keyword: &Keyword) -> Result<(), StoreError> {
        let id = KeywordId::derive(keyword.run_id, keyword.repo_id.as_ref(), keyword.kind.as_str(), &keyword.term);
        tx.execute(
            "INSERT INTO keywords (id, run_id, repo_id, term, kind, weight)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (id) DO UPDATE SET weight = excluded.weight",
            params![
                id.as_str(),
                keyword.run_id.to_string(),
                keyword.repo_id.as_ref().map(RepoId::as_str),
                keyword.term,
                keyword.kind.as_str(),
                keyword.weight,
            ],
        )
        .map_err(map_rusqlite_error)?;
        Ok(())
    }

    /// Lists run-aggregate keywords (`repo_id IS NULL`) ordered by
    /// descending weight, for pass-2 query construction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn list_run_aggregate_keywords(tx: &Transaction<'_>, run_id: RunId, kind: KeywordKind) -> Result<Vec<Keyword>, StoreError> {
        let mut stmt = tx
            .prepare(
                "SELECT run_id, repo_id, term, kind, weight FROM keywords
                 WHERE run_id = ?1 AND repo_id IS NULL AND kind = ?2
                 ORDER BY weight DESC, term ASC",
            )
            .map_err(map_rusqlite_error)?;
        let rows = stmt
            .query_map(params![run_id.to_string(), kind.as_str()], row_to_keyword)
            .map_err(map_rusqlite_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_rusqlite_error)
    }

    /// Lists the per-repo keywords derived from a single repo's analysis in
    /// a run, ordered by kind then term for deterministic folding during
    /// keyword aggregation (`spec.md` §4.F).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on engine failure.
    pub fn list_keywords_for_repo(tx: &Transaction<'_>, run_id: RunId, repo_id: &RepoId) -> Result<Vec<Keyword>, StoreError> {
        let mut stmt = tx
            .prepare(
                "SELECT run_id, repo_id, term, kind, weight FROM keywords
                 WHERE run_id = ?1 AND repo_id = ?2
                 ORDER BY kind ASC, term ASC",
            )
            .map_err(map_rusqlite_error)?;
        let rows = stmt
            .query_map(params![run_id.to_string(), repo_id.as_str()], row_to_keyword)
            .map_err(map_rusqlite_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_rusqlite_error)
    }
}

type AnalysisRow = (String, String, String, String, String, String, String, f64, i64);

fn row_to_analysis_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnalysisRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn build_analysis(parts: AnalysisRow) -> Result<Analysis, StoreError> {
    let (run_id, repo_id, model, prompt_id, prompt_version, input_snapshot_json, output_json, final_score, created_at) = parts;
    let output: RepoAnalysisOutput =
        serde_json::from_str(&output_json).map_err(|err| StoreError::Corrupt(format!("analysis output_json: {err}")))?;
    Ok(Analysis {
        run_id: run_id.parse().map_err(|_| StoreError::Corrupt("run id malformed".to_string()))?,
        repo_id: RepoId::parse(&repo_id).ok_or_else(|| StoreError::Corrupt("repo id malformed".to_string()))?,
        model,
        prompt_id,
        prompt_version,
        input_snapshot: serde_json::from_str(&input_snapshot_json)
            .map_err(|err| StoreError::Corrupt(format!("analysis input_snapshot_json: {err}")))?,
        output,
        final_score,
        created_at: Timestamp::from_epoch_millis(created_at),
    })
}

fn row_to_keyword(row: &rusqlite::Row<'_>) -> rusqlite::Result<Keyword> {
    let run_id: String = row.get(0)?;
    let repo_id: Option<String> = row.get(1)?;
    let term: String = row.get(2)?;
    let kind: String = row.get(3)?;
    let weight: f64 = row.get(4)?;
    Ok(Keyword {
        run_id: run_id.parse().unwrap_or_default(),
        repo_id: repo_id.and_then(|value| RepoId::parse(&value)),
        term,
        kind: KeywordKind::parse(&kind).unwrap_or(KeywordKind::Secondary),
        weight,
    })
}
