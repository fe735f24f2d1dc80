mod runner;
mod types;

pub use runner::StagingOrchestrator;
pub use types::{OrchestratorError, OrchestratorStatus};
