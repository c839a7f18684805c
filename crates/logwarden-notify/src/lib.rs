//! Alert delivery with pluggable sink support.
//!
//! Rate-alert events are fanned out to every configured
//! [`AlertSink`] by a single dispatch worker. Delivery is best-effort:
//! transient failures are retried with exponential backoff, permanent
//! failures are logged and dropped, and one sink failing never blocks
//! another. Nothing in this crate propagates back to ingestion callers.

pub mod dispatcher;
pub mod error;
pub mod sinks;


use async_trait::async_trait;
use logwarden_common::AlertEvent;

pub use dispatcher::AlertDispatcher;
pub use error::SinkError;

/// An external alert destination (chat webhook, paging service, generic
/// HTTP endpoint).
///
/// Implementations classify their failures: [`SinkError::Transient`]
/// errors are retried by the dispatcher, [`SinkError::Permanent`]
/// errors are not.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Short sink name used in logs (e.g., `"slack"`).
    fn name(&self) -> &str;

    /// Delivers one alert event.
    async fn deliver(&self, event: &AlertEvent) -> Result<(), SinkError>;
}
