use crate::{AlertSink, SinkError};
use logwarden_common::AlertEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Delivery attempts per sink per alert.
const MAX_ATTEMPTS: u32 = 3;
/// First retry delay; doubles on each subsequent attempt.
const BASE_BACKOFF_MS: u64 = 500;
/// Budget for one sink's whole retry sequence for one alert.
const PER_SINK_TIMEOUT_SECS: u64 = 10;

/// Pops alert events off the aggregator's outbound channel and fans
/// them out to every configured sink.
pub struct AlertDispatcher {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl AlertDispatcher {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self { sinks }
    }

    /// Spawns the dispatch worker. It runs until the sending side of
    /// the channel is dropped.
    pub fn spawn(self, mut events: UnboundedReceiver<AlertEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.dispatch(&event).await;
            }
            tracing::info!("Alert channel closed, dispatcher stopping");
        })
    }

    /// Delivers one event to every sink. Sinks are independent: a
    /// failing or slow sink does not prevent delivery to the others.
    pub async fn dispatch(&self, event: &AlertEvent) {
        for sink in &self.sinks {
            let budget = Duration::from_secs(PER_SINK_TIMEOUT_SECS);
            match tokio::time::timeout(budget, deliver_with_retry(sink.as_ref(), event)).await {
                Ok(Ok(())) => {
                    tracing::info!(
                        sink = sink.name(),
                        service = %event.service,
                        "Alert delivered"
                    );
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        sink = sink.name(),
                        service = %event.service,
                        error = %e,
                        "Alert dropped"
                    );
                }
                Err(_) => {
                    tracing::error!(
                        sink = sink.name(),
                        service = %event.service,
                        "Alert dropped: delivery timed out"
                    );
                }
            }
        }
    }
}

/// Retries transient failures with exponential backoff; permanent
/// failures abort immediately.
pub(crate) async fn deliver_with_retry(
    sink: &dyn AlertSink,
    event: &AlertEvent,
) -> Result<(), SinkError> {
    let mut last_err = None;
    for attempt in 0..MAX_ATTEMPTS {
        match sink.deliver(event).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    sink = sink.name(),
                    attempt = attempt + 1,
                    error = %e,
                    "Transient delivery failure"
                );
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
        if attempt + 1 < MAX_ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt))).await;
        }
    }
    Err(last_err.unwrap_or_else(|| SinkError::Transient("retries exhausted".to_string())))
}
