use serde::{Deserialize, Serialize};
use tracing::Level;

/// Operational alert types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertEvent {
    // System events
    ServiceStarted {
        version: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Request lifecycle
    SpaceDeferred {
        dataset_id: String,
        delivery_type: String,
        required_bytes: u64,
        available_bytes: u64,
        host: String,
    },
    QuotaDeferred {
        dataset_id: String,
        delivery_type: String,
        required_bytes: u64,
        used_bytes: u64,
        quota_bytes: u64,
        host: String,
    },
    RequestCompleted {
        dataset_id: String,
        delivery_type: String,
        files: usize,
        bytes: u64,
    },
    RequestFailed {
        dataset_id: String,
        delivery_type: String,
        reason: String,
    },
    ProvisioningFailed {
        dataset_id: String,
        principal: String,
        host: String,
    },

    // Reclamation
    DatasetReaped {
        dataset_id: String,
        delivery_type: String,
        forced: bool,
    },
    RemovalFailed {
        dataset_id: String,
        delivery_type: String,
        host: String,
        detail: String,
    },

    // Infrastructure
    LedgerUnavailable {
        detail: String,
    },
}

impl AlertEvent {
    /// Log level the writer emits this event at.
    pub fn severity(&self) -> Level {
        match self {
            AlertEvent::ServiceStarted { .. }
            | AlertEvent::ServiceStopped { .. }
            | AlertEvent::RequestCompleted { .. }
            | AlertEvent::DatasetReaped { .. } => Level::INFO,
            AlertEvent::SpaceDeferred { .. }
            | AlertEvent::QuotaDeferred { .. }
            | AlertEvent::RemovalFailed { .. } => Level::WARN,
            AlertEvent::RequestFailed { .. }
            | AlertEvent::ProvisioningFailed { .. }
            | AlertEvent::LedgerUnavailable { .. } => Level::ERROR,
        }
    }

    /// Stable name used as the log event label.
    pub fn name(&self) -> &'static str {
        match self {
            AlertEvent::ServiceStarted { .. } => "service_started",
            AlertEvent::ServiceStopped { .. } => "service_stopped",
            AlertEvent::SpaceDeferred { .. } => "space_deferred",
            AlertEvent::QuotaDeferred { .. } => "quota_deferred",
            AlertEvent::RequestCompleted { .. } => "request_completed",
            AlertEvent::RequestFailed { .. } => "request_failed",
            AlertEvent::ProvisioningFailed { .. } => "provisioning_failed",
            AlertEvent::DatasetReaped { .. } => "dataset_reaped",
            AlertEvent::RemovalFailed { .. } => "removal_failed",
            AlertEvent::LedgerUnavailable { .. } => "ledger_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        let completed = AlertEvent::RequestCompleted {
            dataset_id: "ds-1".to_string(),
            delivery_type: "WEB".to_string(),
            files: 3,
            bytes: 100,
        };
        assert_eq!(completed.severity(), Level::INFO);

        let deferred = AlertEvent::SpaceDeferred {
            dataset_id: "ds-1".to_string(),
            delivery_type: "WEB".to_string(),
            required_bytes: 10,
            available_bytes: 1,
            host: "web.internal".to_string(),
        };
        assert_eq!(deferred.severity(), Level::WARN);

        let failed = AlertEvent::RequestFailed {
            dataset_id: "ds-1".to_string(),
            delivery_type: "WEB".to_string(),
            reason: "copy failed".to_string(),
        };
        assert_eq!(failed.severity(), Level::ERROR);
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let event = AlertEvent::ServiceStopped {
            reason: "signal".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "service_stopped");
        assert_eq!(json["reason"], "signal");
    }
}
