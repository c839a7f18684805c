//! Two-layer anomaly decision engine and its stateful surroundings.
//!
//! Each log is checked against deterministic per-service threshold
//! rules first; rule violations dominate. Logs that pass the rules are
//! scored by the outlier model. Anomalies land in a bounded in-memory
//! history and in per-service rolling rate windows; crossing a rate
//! threshold emits a single `high_anomaly_rate` alert event and resets
//! that service's window. Individual anomalies are never alerted on.

pub mod engine;
pub mod history;
pub mod rate;
pub mod rules;
pub mod window;

#[cfg(test)]
mod tests;

pub use engine::DetectionEngine;
pub use history::AnomalyHistory;
pub use rate::{RateAggregator, RateRule, RateRules};
pub use rules::ThresholdRules;

/// Key of the per-service tables that applies when a service has no
/// entry of its own.
pub const FALLBACK_SERVICE: &str = "__default__";
