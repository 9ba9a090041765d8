// crates/scout-llm/src/lib.rs
// ============================================================================
// Crate: scout-llm
// Description: Strict-JSON LLM chat-completion caller and versioned prompt
//              registry (spec.md §4.D).
// ============================================================================

pub mod client;
pub mod errors;
pub mod prompt;
pub mod schema;

pub use client::CallParams;
pub use client::LlmClient;
pub use client::LlmClientConfig;
pub use client::DEFAULT_TEMPERATURE;
pub use errors::LlmClientError;
pub use prompt::PromptRegistry;
pub use prompt::PromptTemplate;
pub use schema::BriefOutput;
pub use schema::BriefRepoSection;
pub use schema::validate_brief_output;
pub use schema::validate_repo_analysis;
