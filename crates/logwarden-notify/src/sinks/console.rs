use crate::{AlertSink, SinkError};
use async_trait::async_trait;
use logwarden_common::AlertEvent;

/// Sink that writes alert events to the process log. Used when no
/// external sink is configured, and handy for local debugging.
#[derive(Default)]
pub struct ConsoleSink;

#[async_trait]
impl AlertSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<(), SinkError> {
        tracing::warn!(
            alert_type = %event.alert_type,
            service = %event.service,
            count = event.anomaly_count,
            window_seconds = event.window_seconds,
            "{}",
            event.message
        );
        Ok(())
    }
}
