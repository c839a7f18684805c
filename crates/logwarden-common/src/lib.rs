//! Shared data model for the log anomaly detection pipeline.
//!
//! Raw log records enter the system tagged with a [`types::LogFormat`],
//! become [`types::ParsedLogRecord`]s, and leave as per-log verdicts.
//! Anomalies are captured as [`types::AnomalyRecord`]s and, when a
//! per-service rate threshold is crossed, surface as
//! [`types::AlertEvent`]s.

pub mod types;

pub use types::*;
