use tokio::sync::mpsc;
use tracing::Level;

use super::{AlertEnvelope, AlertHandle};

/// Background task that receives alerts and emits them as structured log
/// events at their severity.
pub struct AlertWriter {
    rx: mpsc::Receiver<AlertEnvelope>,
}

impl AlertWriter {
    pub fn new(rx: mpsc::Receiver<AlertEnvelope>) -> Self {
        Self { rx }
    }

    /// Run the writer, consuming events until every handle is dropped.
    ///
    /// Spawn as a background task.
    pub async fn run(mut self) {
        tracing::info!("Alert writer started");

        while let Some(envelope) = self.rx.recv().await {
            let payload = match serde_json::to_string(&envelope.event) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!("Failed to serialize alert: {}", e);
                    continue;
                }
            };
            let name = envelope.event.name();
            let timestamp = envelope.timestamp.to_rfc3339();
            match envelope.event.severity() {
                Level::ERROR => tracing::error!(alert = name, %timestamp, %payload),
                Level::WARN => tracing::warn!(alert = name, %timestamp, %payload),
                _ => tracing::info!(alert = name, %timestamp, %payload),
            }
        }

        tracing::info!("Alert writer shutting down");
    }
}

/// Create a complete alert system
///
/// Returns:
/// - `AlertHandle` - for emitting events (clone this to share across tasks)
/// - `AlertWriter` - spawn with `tokio::spawn(writer.run())`
pub fn create_alert_system(buffer_size: usize) -> (AlertHandle, AlertWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = AlertHandle::new(tx);
    let writer = AlertWriter::new(rx);
    (handle, writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertEvent;

    #[tokio::test]
    async fn test_writer_drains_and_exits_when_handles_drop() {
        let (handle, writer) = create_alert_system(16);
        let task = tokio::spawn(writer.run());

        handle
            .emit(AlertEvent::ServiceStarted {
                version: "0.1.0".to_string(),
            })
            .await;
        handle
            .emit(AlertEvent::ServiceStopped {
                reason: "test".to_string(),
            })
            .await;
        drop(handle);

        // The writer must terminate once the last sender is gone.
        task.await.unwrap();
    }
}
