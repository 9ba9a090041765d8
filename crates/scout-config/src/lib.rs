// crates/scout-config/src/lib.rs
// ============================================================================
// Module: Collaboration Scout Configuration
// Description: Environment-derived runtime configuration and the scoring
//              policy file loader.
// Purpose: Give every binary entry point one place to resolve tuning knobs
//          and fail closed on invalid configuration.
// Dependencies: scout-core, serde, serde_json, toml, thiserror
// ============================================================================

//! ## Overview
//! Two independent pieces of configuration:
//!
//! - [`Environment`] — process environment variables (`spec.md` §6): the
//!   store path, log level, upstream credentials, and the overlap/history
//!   tuning knobs that the CLI may also override per invocation.
//! - [`ScoringPolicy`] — the versioned JSON file governing deterministic
//!   analysis scoring (`spec.md` §4.G). Loaded once per run and stamped onto
//!   every analysis row so replay can recover exactly which policy produced
//!   a given `final_score`.
//!
//! Neither type reaches into global state; callers pass an explicit
//! `&HashMap<String, String>` (tests) or call [`Environment::from_process`]
//! (production) to read `std::env`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation failures.
///
/// Always fatal at process start (`spec.md` §7, `ConfigInvalid`).
#[derive(Debug, Error, Clone)]
pub enum ConfigError {
    /// I/O failure while reading a configuration or policy file.
    #[error("config io error: {0}")]
    Io(String),
    /// The file's contents did not parse as the expected format.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A required environment variable was missing for a live run.
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),
    /// Parsed configuration failed a semantic check.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Log level accepted by `CS_LOG_LEVEL`, ordered least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fatal" => Ok(Self::Fatal),
            other => Err(ConfigError::Invalid(format!("CS_LOG_LEVEL: unknown level '{other}'"))),
        }
    }

    /// Maps to the nearest `tracing` level; `Fatal` has no tracing
    /// equivalent and is treated as `Error` for the diagnostics layer.
    #[must_use]
    pub const fn as_tracing_level(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error | Self::Fatal => "error",
        }
    }
}

/// Process environment, resolved once at startup (`spec.md` §6).
#[derive(Debug, Clone)]
pub struct Environment {
    /// `CS_DB_PATH` — path to the local SQLite store file.
    pub db_path: String,
    /// `CS_LOG_LEVEL`, default `info`.
    pub log_level: LogLevel,
    /// `GITHUB_TOKEN` — required for live runs, optional under `--dry`.
    pub github_token: Option<String>,
    /// `OPENROUTER_API_KEY` — required for live runs.
    pub openrouter_api_key: Option<String>,
    /// `CS_OVERLAP_THRESHOLD`, default `0.70`.
    pub overlap_threshold: f64,
    /// `CS_OVERLAP_EXCEPTION_PENALTY`, default `0.10`.
    pub overlap_exception_penalty: f64,
    /// `CS_TOP_OPPORTUNITIES`, default `3`.
    pub top_opportunities: u32,
    /// `CS_HISTORY_CANDIDATES`, default `100`.
    pub history_candidates: u32,
}

const DEFAULT_DB_PATH: &str = "scout.db";
const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.70;
const DEFAULT_OVERLAP_EXCEPTION_PENALTY: f64 = 0.10;
const DEFAULT_TOP_OPPORTUNITIES: u32 = 3;
const DEFAULT_HISTORY_CANDIDATES: u32 = 100;

impl Environment {
    /// Resolves configuration from the live process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a present variable fails to parse.
    pub fn from_process() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&vars)
    }

    /// Resolves configuration from an explicit variable map.
    ///
    /// Used directly in tests so behavior does not depend on the real
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a present variable fails to parse.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let db_path = vars.get("CS_DB_PATH").cloned().unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let log_level = match vars.get("CS_LOG_LEVEL") {
            Some(raw) => LogLevel::parse(raw)?,
            None => LogLevel::Info,
        };
        let overlap_threshold = parse_f64_var(vars, "CS_OVERLAP_THRESHOLD", DEFAULT_OVERLAP_THRESHOLD)?;
        let overlap_exception_penalty =
            parse_f64_var(vars, "CS_OVERLAP_EXCEPTION_PENALTY", DEFAULT_OVERLAP_EXCEPTION_PENALTY)?;
        let top_opportunities = parse_u32_var(vars, "CS_TOP_OPPORTUNITIES", DEFAULT_TOP_OPPORTUNITIES)?;
        let history_candidates = parse_u32_var(vars, "CS_HISTORY_CANDIDATES", DEFAULT_HISTORY_CANDIDATES)?;

        Ok(Self {
            db_path,
            log_level,
            github_token: vars.get("GITHUB_TOKEN").cloned(),
            openrouter_api_key: vars.get("OPENROUTER_API_KEY").cloned(),
            overlap_threshold,
            overlap_exception_penalty,
            top_opportunities,
            history_candidates,
        })
    }

    /// Validates that credentials required for a live (non-`--dry`) run are
    /// present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] naming the first missing variable.
    pub fn require_live_credentials(&self) -> Result<(), ConfigError> {
        if self.github_token.is_none() {
            return Err(ConfigError::MissingEnv("GITHUB_TOKEN".to_string()));
        }
        if self.openrouter_api_key.is_none() {
            return Err(ConfigError::MissingEnv("OPENROUTER_API_KEY".to_string()));
        }
        Ok(())
    }
}

fn parse_f64_var(vars: &HashMap<String, String>, name: &str, default: f64) -> Result<f64, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw.parse::<f64>().map_err(|_| ConfigError::Invalid(format!("{name}: not a number"))),
        None => Ok(default),
    }
}

fn parse_u32_var(vars: &HashMap<String, String>, name: &str, default: u32) -> Result<u32, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw.parse::<u32>().map_err(|_| ConfigError::Invalid(format!("{name}: not a non-negative integer"))),
        None => Ok(default),
    }
}

// ============================================================================
// SECTION: Scoring Policy
// ============================================================================

/// Analysis scoring weights (`spec.md` §4.G).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub w1_interestingness: f64,
    pub w2_novelty: f64,
    pub w3_collaboration_potential: f64,
    pub w4_signals_bonus: f64,
}

/// Signals-bonus contributions (`spec.md` §4.G).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalsBonus {
    pub has_integration_surface: f64,
    pub has_api_or_sdk: f64,
    pub no_risk_flags: f64,
}

/// Brief-shortlisting thresholds (`spec.md` §4.F, §4.G).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringThresholds {
    pub min_repo_score_for_brief: f64,
    pub min_collaboration_potential_for_brief: f64,
    pub min_brief_score: f64,
}

/// The versioned scoring policy file (`spec.md` §4.G, "Scoring policy").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub version: String,
    pub weights: ScoringWeights,
    pub signals_bonus: SignalsBonus,
    pub thresholds: ScoringThresholds,
}

impl ScoringPolicy {
    /// The built-in policy used when no `--policy-file` override is given.
    #[must_use]
    pub fn default_policy() -> Self {
        Self {
            version: "v1".to_string(),
            weights: ScoringWeights {
                w1_interestingness: 0.35,
                w2_novelty: 0.25,
                w3_collaboration_potential: 0.30,
                w4_signals_bonus: 0.10,
            },
            signals_bonus: SignalsBonus {
                has_integration_surface: 0.4,
                has_api_or_sdk: 0.4,
                no_risk_flags: 0.2,
            },
            thresholds: ScoringThresholds {
                min_repo_score_for_brief: 0.60,
                min_collaboration_potential_for_brief: 0.65,
                min_brief_score: 0.75,
            },
        }
    }

    /// Loads and validates a scoring policy from a JSON file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, does not parse as
    /// JSON, or fails [`ScoringPolicy::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        let policy: Self = serde_json::from_str(&raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Checks that weights are non-negative and thresholds lie in `[0,1]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            self.weights.w1_interestingness,
            self.weights.w2_novelty,
            self.weights.w3_collaboration_potential,
            self.weights.w4_signals_bonus,
        ];
        if weights.iter().any(|w| *w < 0.0) {
            return Err(ConfigError::Invalid("scoring weights must be non-negative".to_string()));
        }
        let thresholds = [
            self.thresholds.min_repo_score_for_brief,
            self.thresholds.min_collaboration_potential_for_brief,
            self.thresholds.min_brief_score,
        ];
        if thresholds.iter().any(|t| !(0.0..=1.0).contains(t)) {
            return Err(ConfigError::Invalid("scoring thresholds must lie in [0,1]".to_string()));
        }
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid("scoring policy version must not be empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Final Score
// ============================================================================

/// The three LLM-produced sub-scores that feed `final_score` (`spec.md`
/// §4.G). Kept as plain scalars rather than `scout_core::model::LlmScores` so
/// this crate stays free of a `scout-core` dependency.
#[derive(Debug, Clone, Copy)]
pub struct RawScores {
    pub interestingness: f64,
    pub novelty: f64,
    pub collaboration_potential: f64,
}

/// The signals used to compute the signals bonus (`spec.md` §4.G). Borrowed
/// rather than typed against `scout_core::model::AnalysisSignals` for the
/// same reason as [`RawScores`].
#[derive(Debug, Clone, Copy)]
pub struct SignalsInput<'a> {
    pub integration_surface: &'a [String],
    /// `None` means the field was absent from the LLM output; `Some(&[])`
    /// means it was present and empty. Only `Some(&[])` counts toward
    /// `no_risk_flags` — absence is not evidence of a clean bill.
    pub risk_flags: Option<&'a [String]>,
}

/// Rounds `value` to six decimal places, matching `spec.md`'s "rounded to
/// 1e-6" rule for `final_score`. Duplicated locally rather than depending on
/// `scout_core::rounding::round6` to keep this crate free of a `scout-core`
/// edge.
fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Whether any entry in `surface` contains the whole word `api` or `sdk`
/// (case-insensitive). Equivalent to `spec.md`'s `\b(api|sdk)\b` regex
/// without pulling in a `regex` dependency for one word-boundary check.
fn mentions_api_or_sdk(surface: &[String]) -> bool {
    surface.iter().any(|entry| entry.split(|c: char| !c.is_ascii_alphanumeric()).any(|token| token.eq_ignore_ascii_case("api") || token.eq_ignore_ascii_case("sdk")))
}

impl ScoringPolicy {
    /// Computes the signals bonus in `[0, 1]` from the analysis signals
    /// (`spec.md` §4.G): each qualifying sub-bonus is additive, capped so the
    /// sum of all three configured bonuses never exceeds `1.0` by
    /// construction of the policy file.
    #[must_use]
    pub fn signals_bonus(&self, signals: &SignalsInput<'_>) -> f64 {
        let mut bonus = 0.0;
        if !signals.integration_surface.is_empty() {
            bonus += self.signals_bonus.has_integration_surface;
        }
        if mentions_api_or_sdk(signals.integration_surface) {
            bonus += self.signals_bonus.has_api_or_sdk;
        }
        if matches!(signals.risk_flags, Some(flags) if flags.is_empty()) {
            bonus += self.signals_bonus.no_risk_flags;
        }
        bonus
    }

    /// Computes `final_score = w1*interestingness + w2*novelty +
    /// w3*collaboration_potential + w4*signals_bonus`, rounded to 1e-6
    /// (`spec.md` §4.G). Deterministic and replay-stable for identical
    /// inputs and policy.
    #[must_use]
    pub fn final_score(&self, scores: RawScores, signals: &SignalsInput<'_>) -> f64 {
        let bonus = self.signals_bonus(signals);
        let raw = self.weights.w1_interestingness * scores.interestingness
            + self.weights.w2_novelty * scores.novelty
            + self.weights.w3_collaboration_potential * scores.collaboration_potential
            + self.weights.w4_signals_bonus * bonus;
        round6(raw)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_apply_when_env_absent() {
        let env = Environment::from_map(&HashMap::new()).unwrap();
        assert_eq!(env.db_path, DEFAULT_DB_PATH);
        assert_eq!(env.log_level, LogLevel::Info);
        assert_eq!(env.overlap_threshold, DEFAULT_OVERLAP_THRESHOLD);
        assert_eq!(env.overlap_exception_penalty, DEFAULT_OVERLAP_EXCEPTION_PENALTY);
        assert_eq!(env.top_opportunities, DEFAULT_TOP_OPPORTUNITIES);
        assert_eq!(env.history_candidates, DEFAULT_HISTORY_CANDIDATES);
        assert!(env.github_token.is_none());
    }

    #[test]
    fn overrides_are_read_from_map() {
        let mut vars = HashMap::new();
        vars.insert("CS_DB_PATH".to_string(), "/tmp/scout.db".to_string());
        vars.insert("CS_LOG_LEVEL".to_string(), "DEBUG".to_string());
        vars.insert("CS_OVERLAP_THRESHOLD".to_string(), "0.5".to_string());
        vars.insert("GITHUB_TOKEN".to_string(), "ghp_x".to_string());
        let env = Environment::from_map(&vars).unwrap();
        assert_eq!(env.db_path, "/tmp/scout.db");
        assert_eq!(env.log_level, LogLevel::Debug);
        assert_eq!(env.overlap_threshold, 0.5);
        assert_eq!(env.github_token.as_deref(), Some("ghp_x"));
    }

    #[test]
    fn unknown_log_level_is_invalid() {
        let mut vars = HashMap::new();
        vars.insert("CS_LOG_LEVEL".to_string(), "verbose".to_string());
        assert!(Environment::from_map(&vars).is_err());
    }

    #[test]
    fn live_credentials_required_when_missing() {
        let env = Environment::from_map(&HashMap::new()).unwrap();
        let err = env.require_live_credentials().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(name) if name == "GITHUB_TOKEN"));
    }

    #[test]
    fn live_credentials_ok_when_present() {
        let mut vars = HashMap::new();
        vars.insert("GITHUB_TOKEN".to_string(), "ghp_x".to_string());
        vars.insert("OPENROUTER_API_KEY".to_string(), "sk-or-v1-x".to_string());
        let env = Environment::from_map(&vars).unwrap();
        env.require_live_credentials().unwrap();
    }

    #[test]
    fn default_policy_validates() {
        ScoringPolicy::default_policy().validate().unwrap();
    }

    #[test]
    fn policy_rejects_out_of_range_threshold() {
        let mut policy = ScoringPolicy::default_policy();
        policy.thresholds.min_brief_score = 1.5;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn policy_rejects_negative_weight() {
        let mut policy = ScoringPolicy::default_policy();
        policy.weights.w2_novelty = -0.1;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn load_reads_and_validates_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        let policy = ScoringPolicy::default_policy();
        fs::write(&path, serde_json::to_string(&policy).unwrap()).unwrap();
        let loaded = ScoringPolicy::load(&path).unwrap();
        assert_eq!(loaded.version, policy.version);
    }

    #[test]
    fn load_surfaces_parse_error_for_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(ScoringPolicy::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_surfaces_io_error_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(matches!(ScoringPolicy::load(&path), Err(ConfigError::Io(_))));
    }

    #[test]
    fn final_score_matches_hand_computed_fixture() {
        let policy = ScoringPolicy::default_policy();
        let scores = RawScores { interestingness: 0.8, novelty: 0.6, collaboration_potential: 0.7 };
        let integration_surface = vec!["API".to_string()];
        let risk_flags: Vec<String> = vec![];
        let signals = SignalsInput { integration_surface: &integration_surface, risk_flags: Some(&risk_flags) };
        assert_eq!(policy.final_score(scores, &signals), 0.74);
    }

    #[test]
    fn absent_risk_flags_does_not_earn_no_risk_flags_bonus() {
        let policy = ScoringPolicy::default_policy();
        let integration_surface = vec!["API".to_string()];
        let with_empty = SignalsInput { integration_surface: &integration_surface, risk_flags: Some(&[]) };
        let with_absent = SignalsInput { integration_surface: &integration_surface, risk_flags: None };
        assert!(policy.signals_bonus(&with_empty) > policy.signals_bonus(&with_absent));
    }

    #[test]
    fn signals_bonus_is_zero_with_no_signals() {
        let policy = ScoringPolicy::default_policy();
        let signals = SignalsInput { integration_surface: &[], risk_flags: None };
        assert_eq!(policy.signals_bonus(&signals), 0.0);
    }

    #[test]
    fn mentions_api_or_sdk_requires_whole_word() {
        assert!(mentions_api_or_sdk(&["REST API client".to_string()]));
        assert!(mentions_api_or_sdk(&["rust sdk".to_string()]));
        assert!(!mentions_api_or_sdk(&["rapidly growing".to_string()]));
        assert!(!mentions_api_or_sdk(&["webcam driver".to_string()]));
    }

    #[test]
    fn final_score_is_replay_stable() {
        let policy = ScoringPolicy::default_policy();
        let scores = RawScores { interestingness: 0.123_456_7, novelty: 0.987_654_3, collaboration_potential: 0.5 };
        let surface = vec!["webhook".to_string()];
        let signals = SignalsInput { integration_surface: &surface, risk_flags: None };
        let first = policy.final_score(scores, &signals);
        let second = policy.final_score(scores, &signals);
        assert_eq!(first, second);
    }
}
