// crates/scout-cli/src/wiring.rs
// ============================================================================
// Module: Collaborator Wiring
// Description: Builds the store, GitHub/LLM clients, prompt registry, and
//              scoring policy shared by every live command.
// Purpose: Keep the per-command `main.rs` functions focused on argument
//          handling rather than repeating construction boilerplate.
// Dependencies: scout-config, scout-core, scout-http, scout-llm,
//               scout-store-sqlite
// ============================================================================

use std::sync::Arc;

use scout_config::Environment;
use scout_config::ScoringPolicy;
use scout_core::Clock;
use scout_core::Sleeper;
use scout_core::SystemClock;
use scout_core::Transport;
use scout_core::TokioSleeper;
use scout_http::GithubClient;
use scout_http::GithubClientConfig;
use scout_llm::LlmClient;
use scout_llm::LlmClientConfig;
use scout_llm::PromptRegistry;
use scout_store_sqlite::Store;
use scout_store_sqlite::StoreConfig;

use crate::transport::ReqwestTransport;

/// `User-Agent` sent on every outbound request, to both GitHub and OpenRouter.
pub const USER_AGENT: &str = concat!("collaboration-scout/", env!("CARGO_PKG_VERSION"));

/// Model used when the caller does not override `--model`. OpenRouter
/// accepts this identifier verbatim.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Directory prompt templates are loaded from, relative to the current
/// working directory.
pub const DEFAULT_PROMPTS_ROOT: &str = "prompts";

/// Every collaborator a live command needs, built once per invocation.
pub struct Wiring {
    pub store: Arc<Store>,
    pub clock: Arc<dyn Clock>,
    pub github: Arc<GithubClient>,
    pub llm: Arc<LlmClient>,
    pub prompts: PromptRegistry,
    pub scoring: ScoringPolicy,
}

impl Wiring {
    /// Opens the on-disk store at `env.db_path` and builds every
    /// collaborator on top of a real [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or the HTTP client
    /// cannot be constructed.
    pub fn build(env: &Environment, model: &str) -> anyhow::Result<Self> {
        let store = Arc::new(Store::open(&StoreConfig::new(&env.db_path))?);
        Self::from_store(store, env, model)
    }

    /// Builds every collaborator over an in-memory store, for `--dry` runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or HTTP client cannot be constructed.
    pub fn build_dry(env: &Environment, model: &str) -> anyhow::Result<Self> {
        let store = Arc::new(Store::open_in_memory()?);
        Self::from_store(store, env, model)
    }

    fn from_store(store: Arc<Store>, env: &Environment, model: &str) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new()?);

        let mut github_config = GithubClientConfig::new(USER_AGENT);
        if let Some(token) = &env.github_token {
            github_config = github_config.with_token(token.clone());
        }
        let github = Arc::new(GithubClient::new(
            github_config,
            Arc::clone(&transport),
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&sleeper),
        ));

        let llm_config = LlmClientConfig::new(env.openrouter_api_key.clone().unwrap_or_default(), model, USER_AGENT);
        let llm = Arc::new(LlmClient::new(llm_config, Arc::clone(&transport), Arc::clone(&sleeper)));

        let prompts = PromptRegistry::new(DEFAULT_PROMPTS_ROOT);
        let scoring = ScoringPolicy::default_policy();

        Ok(Self { store, clock, github, llm, prompts, scoring })
    }
}
