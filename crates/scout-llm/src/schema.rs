// crates/scout-llm/src/schema.rs
// ============================================================================
// Module: LLM Output Schemas
// Description: Validators for the `RepoAnalysisOutput` and `BriefOutput`
//              schemas named in `spec.md` §4.D.
// Purpose: Turn a raw chat-completion JSON payload into a trusted domain
//          value, rejecting anything that does not meet the field bounds.
// Dependencies: scout-core, serde, serde_json
// ============================================================================

use std::ops::RangeInclusive;

use scout_core::AnalysisSignals;
use scout_core::LlmScores;
use scout_core::ReasonSet;
use scout_core::RepoAnalysisOutput;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::errors::LlmClientError;

const MAX_REASON_ITEMS: usize = 8;
const MAX_PRIMARY_KEYWORDS: usize = 12;
const MAX_SECONDARY_KEYWORDS: usize = 24;
const MAX_SEARCH_QUERIES: usize = 10;
const MAX_BRIEF_TITLE_CHARS: usize = 100;
const MAX_BRIEF_CONCEPT_CHARS: usize = 600;
const MAX_WHY_IT_FITS_CHARS: usize = 300;
const MAX_INTEGRATION_ROLE_CHARS: usize = 100;
const MAX_OUTREACH_MESSAGE_CHARS: usize = 1000;
const BRIEF_REPO_COUNT: RangeInclusive<usize> = 2..=4;

fn invalid(schema_id: &'static str, reason: impl Into<String>) -> LlmClientError {
    LlmClientError::InvalidOutput { schema_id, reason: reason.into() }
}

fn field<'a>(value: &'a Value, schema_id: &'static str, key: &str) -> Result<&'a Value, LlmClientError> {
    value.get(key).ok_or_else(|| invalid(schema_id, format!("missing field `{key}`")))
}

fn as_string(value: &Value, schema_id: &'static str, key: &str) -> Result<String, LlmClientError> {
    field(value, schema_id, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(schema_id, format!("field `{key}` is not a string")))
}

fn as_bounded_string(value: &Value, schema_id: &'static str, key: &str, max_chars: usize) -> Result<String, LlmClientError> {
    let text = as_string(value, schema_id, key)?;
    if text.chars().count() > max_chars {
        return Err(invalid(schema_id, format!("field `{key}` exceeds {max_chars} characters")));
    }
    Ok(text)
}

fn as_unit_score(value: &Value, schema_id: &'static str, key: &str) -> Result<f64, LlmClientError> {
    let score = field(value, schema_id, key)?
        .as_f64()
        .ok_or_else(|| invalid(schema_id, format!("field `{key}` is not a number")))?;
    if !(0.0..=1.0).contains(&score) {
        return Err(invalid(schema_id, format!("field `{key}` = {score} is outside [0, 1]")));
    }
    Ok(score)
}

fn as_capped_string_list(value: &Value, schema_id: &'static str, key: &str, max_items: usize) -> Result<Vec<String>, LlmClientError> {
    let items = field(value, schema_id, key)?
        .as_array()
        .ok_or_else(|| invalid(schema_id, format!("field `{key}` is not an array")))?;
    if items.len() > max_items {
        return Err(invalid(schema_id, format!("field `{key}` has {} items, over the cap of {max_items}", items.len())));
    }
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(|| invalid(schema_id, format!("field `{key}` contains a non-string item"))))
        .collect()
}

fn optional_string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn optional_string_list(value: &Value, key: &str) -> Vec<String> {
    value.get(key).and_then(Value::as_array).map(|items| items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect()).unwrap_or_default()
}

/// Validates a raw LLM chat-completion payload against the
/// `RepoAnalysisOutput` schema (`spec.md` §4.D).
///
/// `expected_full_name` is cross-checked against the payload's
/// `repo.full_name` field; the field itself is not retained on the returned
/// value, since the caller already knows which repo it analyzed.
///
/// # Errors
///
/// Returns [`LlmClientError::InvalidOutput`] for any missing field, wrong
/// type, out-of-range score, over-cap list, or `full_name` mismatch.
pub fn validate_repo_analysis(value: &Value, expected_full_name: &str) -> Result<RepoAnalysisOutput, LlmClientError> {
    const SCHEMA_ID: &str = "RepoAnalysisOutput";

    let repo = field(value, SCHEMA_ID, "repo")?;
    let full_name = as_string(repo, SCHEMA_ID, "full_name")?;
    if full_name != expected_full_name {
        return Err(invalid(SCHEMA_ID, format!("repo.full_name `{full_name}` does not match the requested repo `{expected_full_name}`")));
    }

    let scores = LlmScores {
        interestingness: as_unit_score(value, SCHEMA_ID, "interestingness")?,
        novelty: as_unit_score(value, SCHEMA_ID, "novelty")?,
        collaboration_potential: as_unit_score(value, SCHEMA_ID, "collaboration_potential")?,
    };

    let reasons_value = field(value, SCHEMA_ID, "reasons")?;
    let reasons = ReasonSet {
        interestingness: as_capped_string_list(reasons_value, SCHEMA_ID, "interestingness", MAX_REASON_ITEMS)?,
        novelty: as_capped_string_list(reasons_value, SCHEMA_ID, "novelty", MAX_REASON_ITEMS)?,
        collaboration_potential: as_capped_string_list(reasons_value, SCHEMA_ID, "collaboration_potential", MAX_REASON_ITEMS)?,
    };

    let signals_value = field(value, SCHEMA_ID, "signals")?;
    let signals = AnalysisSignals {
        problem_summary: optional_string(signals_value, "problem_summary"),
        who_is_it_for: optional_string(signals_value, "who_is_it_for"),
        integration_surface: optional_string_list(signals_value, "integration_surface"),
        risk_flags: signals_value.get("risk_flags").map(|_| optional_string_list(signals_value, "risk_flags")),
    };

    Ok(RepoAnalysisOutput {
        scores,
        reasons,
        signals,
        primary_keywords: as_capped_string_list(value, SCHEMA_ID, "primary_keywords", MAX_PRIMARY_KEYWORDS)?,
        secondary_keywords: as_capped_string_list(value, SCHEMA_ID, "secondary_keywords", MAX_SECONDARY_KEYWORDS)?,
        search_queries: as_capped_string_list(value, SCHEMA_ID, "search_queries", MAX_SEARCH_QUERIES)?,
    })
}

/// One repo's section within a validated [`BriefOutput`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefRepoSection {
    /// Canonical `owner/name` of the repo this section covers.
    pub full_name: String,
    /// Why this repo fits the collaboration (schema cap: 300 chars).
    pub why_it_fits: String,
    /// This repo's role in the integration (schema cap: 100 chars).
    pub integration_role: String,
    /// A drafted outreach message (schema cap: 1000 chars).
    pub outreach_message: String,
}

/// A validated 2-4 repo collaboration brief, as returned by the brief
/// synthesis prompt (`spec.md` §4.D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefOutput {
    /// Brief title (schema cap: 100 chars).
    pub title: String,
    /// Brief concept (schema cap: 600 chars).
    pub concept: String,
    /// 2-4 repo sections, one per collaborating repo.
    pub repos: Vec<BriefRepoSection>,
}

/// Validates a raw LLM chat-completion payload against the `BriefOutput`
/// schema (`spec.md` §4.D).
///
/// # Errors
///
/// Returns [`LlmClientError::InvalidOutput`] for any missing field, wrong
/// type, over-cap string, or a `repos` array outside 2-4 entries.
pub fn validate_brief_output(value: &Value) -> Result<BriefOutput, LlmClientError> {
    const SCHEMA_ID: &str = "BriefOutput";

    let title = as_bounded_string(value, SCHEMA_ID, "title", MAX_BRIEF_TITLE_CHARS)?;
    let concept = as_bounded_string(value, SCHEMA_ID, "concept", MAX_BRIEF_CONCEPT_CHARS)?;
    let repos_value = field(value, SCHEMA_ID, "repos")?
        .as_array()
        .ok_or_else(|| invalid(SCHEMA_ID, "field `repos` is not an array"))?;
    if !BRIEF_REPO_COUNT.contains(&repos_value.len()) {
        return Err(invalid(SCHEMA_ID, format!("field `repos` has {} entries, expected 2-4", repos_value.len())));
    }

    let repos = repos_value
        .iter()
        .map(|repo| {
            Ok(BriefRepoSection {
                full_name: as_string(repo, SCHEMA_ID, "full_name")?,
                why_it_fits: as_bounded_string(repo, SCHEMA_ID, "why_it_fits", MAX_WHY_IT_FITS_CHARS)?,
                integration_role: as_bounded_string(repo, SCHEMA_ID, "integration_role", MAX_INTEGRATION_ROLE_CHARS)?,
                outreach_message: as_bounded_string(repo, SCHEMA_ID, "outreach_message", MAX_OUTREACH_MESSAGE_CHARS)?,
            })
        })
        .collect::<Result<Vec<_>, LlmClientError>>()?;

    Ok(BriefOutput { title, concept, repos })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use serde_json::json;

    use super::*;

    fn sample_analysis_payload() -> Value {
        json!({
            "repo": {"full_name": "acme/widgets"},
            "interestingness": 0.8,
            "novelty": 0.6,
            "collaboration_potential": 0.7,
            "reasons": {
                "interestingness": ["well documented"],
                "novelty": ["unusual approach"],
                "collaboration_potential": ["active maintainers"],
            },
            "signals": {
                "problem_summary": "vector search",
                "integration_surface": ["API"],
                "risk_flags": [],
            },
            "primary_keywords": ["vector-database"],
            "secondary_keywords": ["embeddings"],
            "search_queries": ["vector search rust"],
        })
    }

    #[test]
    fn a_well_formed_analysis_payload_validates() {
        let output = validate_repo_analysis(&sample_analysis_payload(), "acme/widgets").unwrap();
        assert!((output.scores.interestingness - 0.8).abs() < f64::EPSILON);
        assert_eq!(output.signals.risk_flags, Some(vec![]));
    }

    #[test]
    fn a_full_name_mismatch_is_rejected() {
        let error = validate_repo_analysis(&sample_analysis_payload(), "someone/else").unwrap_err();
        assert!(matches!(error, LlmClientError::InvalidOutput { .. }));
    }

    #[test]
    fn a_score_outside_unit_range_is_rejected() {
        let mut payload = sample_analysis_payload();
        payload["novelty"] = json!(1.5);
        assert!(validate_repo_analysis(&payload, "acme/widgets").is_err());
    }

    #[test]
    fn an_over_cap_keyword_list_is_rejected() {
        let mut payload = sample_analysis_payload();
        payload["primary_keywords"] = json!((0..13).map(|i| format!("kw{i}")).collect::<Vec<_>>());
        assert!(validate_repo_analysis(&payload, "acme/widgets").is_err());
    }

    #[test]
    fn absent_risk_flags_is_distinct_from_an_empty_list() {
        let mut payload = sample_analysis_payload();
        payload["signals"].as_object_mut().unwrap().remove("risk_flags");
        let output = validate_repo_analysis(&payload, "acme/widgets").unwrap();
        assert_eq!(output.signals.risk_flags, None);
    }

    fn sample_brief_payload() -> Value {
        json!({
            "title": "Vector search meets graph traversal",
            "concept": "Combine embeddings retrieval with a graph layer.",
            "repos": [
                {"full_name": "acme/widgets", "why_it_fits": "fast ANN index", "integration_role": "retrieval", "outreach_message": "hi there"},
                {"full_name": "acme/graphs", "why_it_fits": "traversal engine", "integration_role": "ranking", "outreach_message": "hello"},
            ],
        })
    }

    #[test]
    fn a_well_formed_brief_payload_validates() {
        let output = validate_brief_output(&sample_brief_payload()).unwrap();
        assert_eq!(output.repos.len(), 2);
    }

    #[test]
    fn a_brief_with_one_repo_is_rejected() {
        let mut payload = sample_brief_payload();
        payload["repos"].as_array_mut().unwrap().truncate(1);
        assert!(validate_brief_output(&payload).is_err());
    }

    #[test]
    fn an_overlong_title_is_rejected() {
        let mut payload = sample_brief_payload();
        payload["title"] = json!("x".repeat(MAX_BRIEF_TITLE_CHARS + 1));
        assert!(validate_brief_output(&payload).is_err());
    }
}
