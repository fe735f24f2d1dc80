use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::AlertEvent;

/// Envelope wrapping an alert with its emission time
#[derive(Debug, Clone)]
pub struct AlertEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: AlertEvent,
}

/// Handle for emitting operational alerts
///
/// Cheaply cloneable and shared across the orchestrator and reaper tasks.
/// Events flow through an async channel to the AlertWriter; emission never
/// blocks or fails the caller.
#[derive(Clone)]
pub struct AlertHandle {
    tx: mpsc::Sender<AlertEnvelope>,
}

impl AlertHandle {
    pub fn new(tx: mpsc::Sender<AlertEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an alert asynchronously.
    pub async fn emit(&self, event: AlertEvent) {
        let envelope = AlertEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit alert: {}", e);
        }
    }

    /// Try to emit without blocking. Returns false if the channel is full
    /// or closed.
    pub fn try_emit(&self, event: AlertEvent) -> bool {
        let envelope = AlertEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit alert: {}", e);
                false
            }
        }
    }
}
