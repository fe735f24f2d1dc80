pub mod admission;
pub mod alert;
pub mod capacity;
pub mod config;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod reaper;
pub mod remote;
pub mod resolver;
pub mod testing;
pub mod transfer;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use ledger::{DeliveryType, Ledger, LedgerError, Request, RequestStatus, SqliteLedger};
pub use orchestrator::{OrchestratorError, OrchestratorStatus, StagingOrchestrator};
pub use reaper::{RetentionReaper, SweepStats};
