// crates/scout-briefs/src/lib.rs
// ============================================================================
// Crate: scout-briefs
// Description: Candidate generation, the functional-overlap competitor
//              filter, LLM brief synthesis, scoring, export, and replay
//              (spec.md §4.G).
// ============================================================================

//! ## Overview
//! This crate turns a run's per-repo analyses into 2-4 repo collaboration
//! briefs. [`candidates`] builds and ranks candidate groups; [`overlap`]
//! computes the pairwise overlap score and the functional-overlap
//! competitor verdict each group is filtered through; [`synthesis`]
//! renders the `brief_generate` prompt, scores the result, and writes the
//! brief's Markdown and outreach draft; [`replay`] recomputes scores
//! under a (possibly updated) scoring policy with no store mutation.
//! [`pipeline::BriefEnginePipeline`] orchestrates all of the above through
//! a [`scout_orchestrator::RunOrchestrator`].

pub mod candidates;
pub mod errors;
pub mod overlap;
pub mod params;
pub mod pipeline;
pub mod replay;
pub mod synthesis;

pub use candidates::CandidateGroup;
pub use candidates::GroupVerdict;
pub use errors::BriefError;
pub use params::BriefParams;
pub use pipeline::BriefEnginePipeline;
pub use pipeline::BriefGenerateSummary;
pub use pipeline::ExportSummary;
pub use replay::ReplayResult;
pub use replay::ScoreDiff;
