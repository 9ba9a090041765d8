// crates/scout-llm/src/prompt.rs
// ============================================================================
// Module: Prompt Registry
// Description: Loads versioned prompt templates from disk and substitutes
//              `{{placeholder}}` tokens.
// Purpose: Keep prompt text out of source code, per `spec.md` §4.D.
// Dependencies: scout-core
// ============================================================================

//! ## Overview
//! Each prompt template file is a header block delimited by `+++` lines,
//! followed by the template body:
//!
//! ```text
//! +++
//! id = "repo_analysis"
//! version = 1
//! schema_id = "RepoAnalysisOutput"
//!
//! [model_defaults]
//! temperature = 0.2
//! max_tokens = 2000
//! +++
//! Analyze the repository {{repo_full_name}}...
//! ```
//!
//! [`PromptRegistry::load`] reads `{root}/{id}/v{version}.md`, parses the
//! header, and checks it against the requested `(id, version)` before
//! returning the template. [`PromptTemplate::render`] substitutes
//! `{{name}}` placeholders; any name not present in the substitution map is
//! left intact — unknown placeholders are documented behavior, not an error
//! (`spec.md` §4.D).

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::LlmClientError;

// ============================================================================
// SECTION: Header
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct ModelDefaults {
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct PromptHeader {
    id: String,
    version: u32,
    schema_id: String,
    model_defaults: ModelDefaults,
}

/// A loaded, header-validated prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Prompt identifier, e.g. `repo_analysis`.
    pub id: String,
    /// Template version.
    pub version: u32,
    /// The schema this prompt's output must validate against.
    pub schema_id: String,
    /// Default sampling temperature.
    pub temperature: f64,
    /// Default max-token cap.
    pub max_tokens: u32,
    /// The raw template body, with `{{placeholder}}` tokens intact.
    pub body: String,
}

impl PromptTemplate {
    /// Parses a template file's full contents (header + body).
    ///
    /// # Errors
    ///
    /// Returns [`LlmClientError::Prompt`] if the `+++`-delimited header is
    /// missing or does not parse as TOML.
    fn parse(raw: &str) -> Result<Self, LlmClientError> {
        let mut sections = raw.splitn(3, "+++\n");
        let leading = sections.next().unwrap_or_default();
        if !leading.trim().is_empty() {
            return Err(LlmClientError::Prompt("template must open with a `+++` header delimiter".to_string()));
        }
        let header_toml = sections
            .next()
            .ok_or_else(|| LlmClientError::Prompt("template is missing a header block".to_string()))?;
        let body = sections.next().ok_or_else(|| LlmClientError::Prompt("template is missing a body".to_string()))?;
        let header: PromptHeader =
            toml_from_str(header_toml).map_err(|err| LlmClientError::Prompt(format!("header: {err}")))?;
        Ok(Self {
            id: header.id,
            version: header.version,
            schema_id: header.schema_id,
            temperature: header.model_defaults.temperature,
            max_tokens: header.model_defaults.max_tokens,
            body: body.trim_start_matches('\n').to_string(),
        })
    }

    /// Substitutes every `{{name}}` occurrence using `values`. Placeholders
    /// with no entry in `values` are left untouched.
    #[must_use]
    pub fn render(&self, values: &HashMap<&str, String>) -> String {
        let mut rendered = self.body.clone();
        for (name, value) in values {
            rendered = rendered.replace(&format!("{{{{{name}}}}}"), value);
        }
        rendered
    }
}

/// Minimal TOML deserialization wrapper, isolated so the rest of this
/// module does not depend directly on which TOML crate is in use.
fn toml_from_str<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, toml::de::Error> {
    toml::from_str(raw)
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Loads prompt templates from a directory tree of `{root}/{id}/v{version}.md`.
#[derive(Debug, Clone)]
pub struct PromptRegistry {
    root: PathBuf,
}

impl PromptRegistry {
    /// Builds a registry rooted at `root` (typically the workspace's
    /// `prompts/` directory).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loads the template for `(id, version)`, verifying the header agrees
    /// with the request.
    ///
    /// # Errors
    ///
    /// Returns [`LlmClientError::Prompt`] if the file is missing, malformed,
    /// or its header's `id`/`version` does not match the request.
    pub fn load(&self, id: &str, version: u32) -> Result<PromptTemplate, LlmClientError> {
        let path = self.path_for(id, version);
        let raw = fs::read_to_string(&path)
            .map_err(|err| LlmClientError::Prompt(format!("reading {}: {err}", path.display())))?;
        let template = PromptTemplate::parse(&raw)?;
        if template.id != id || template.version != version {
            return Err(LlmClientError::Prompt(format!(
                "prompt header ({}, v{}) does not match requested ({id}, v{version})",
                template.id, template.version
            )));
        }
        Ok(template)
    }

    fn path_for(&self, id: &str, version: u32) -> PathBuf {
        self.root.join(id).join(format!("v{version}.md"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use super::*;

    fn write_template(dir: &Path, id: &str, version: u32, body: &str) {
        let folder = dir.join(id);
        fs::create_dir_all(&folder).unwrap();
        let contents = format!(
            "+++\nid = \"{id}\"\nversion = {version}\nschema_id = \"RepoAnalysisOutput\"\n\n[model_defaults]\ntemperature = 0.2\nmax_tokens = 2000\n+++\n{body}"
        );
        fs::write(folder.join(format!("v{version}.md")), contents).unwrap();
    }

    #[test]
    fn load_parses_header_and_body() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "repo_analysis", 1, "Analyze {{repo_full_name}}.");
        let registry = PromptRegistry::new(dir.path());
        let template = registry.load("repo_analysis", 1).unwrap();
        assert_eq!(template.schema_id, "RepoAnalysisOutput");
        assert!((template.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(template.max_tokens, 2000);
        assert_eq!(template.body.trim_end(), "Analyze {{repo_full_name}}.");
    }

    #[test]
    fn render_substitutes_known_placeholders_and_leaves_unknown_intact() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "repo_analysis", 1, "Repo: {{repo_full_name}}, stars: {{stars}}.");
        let registry = PromptRegistry::new(dir.path());
        let template = registry.load("repo_analysis", 1).unwrap();
        let mut values = HashMap::new();
        values.insert("repo_full_name", "acme/widgets".to_string());
        let rendered = template.render(&values);
        assert_eq!(rendered.trim_end(), "Repo: acme/widgets, stars: {{stars}}.");
    }

    #[test]
    fn mismatched_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "repo_analysis", 1, "body");
        let registry = PromptRegistry::new(dir.path());
        assert!(registry.load("repo_analysis", 2).is_err());
    }
}
