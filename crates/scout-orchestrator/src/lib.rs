// crates/scout-orchestrator/src/lib.rs
// ============================================================================
// Crate: scout-orchestrator
// Description: Run/step lifecycle and the redacted audit-event sink
//              (spec.md §4.E).
// ============================================================================

pub mod errors;
pub mod orchestrator;

pub use errors::OrchestratorError;
pub use orchestrator::RunOrchestrator;
pub use orchestrator::StepHandle;
