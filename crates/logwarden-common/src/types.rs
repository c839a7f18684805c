use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire format of a raw log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    KeyValue,
    Regex,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::KeyValue => write!(f, "key_value"),
            LogFormat::Regex => write!(f, "regex"),
        }
    }
}

/// Parsing configuration for the `regex` format.
///
/// `field_mapping` maps capture-group indices (as decimal strings,
/// `"0"` being the first group) to output field names. By convention
/// group `"0"` is mapped to `timestamp`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomParseConfig {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub field_mapping: HashMap<String, String>,
}

/// A raw log line as submitted by a client, tagged with its origin and
/// declared format. Immutable within a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLogRecord {
    pub raw_log: String,
    pub service: String,
    pub source: String,
    pub format_type: LogFormat,
    #[serde(default)]
    pub custom_config: Option<CustomParseConfig>,
}

/// A single parsed field value. Numeric values feed the feature
/// extractor and the threshold rules; text values are kept for context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Numeric(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }
}

/// A log record after parsing. `fields` is order-independent; duplicate
/// names are resolved last-wins by the parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedLogRecord {
    pub raw_log: String,
    pub service: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub log_level: Option<String>,
    pub message: Option<String>,
    pub fields: HashMap<String, FieldValue>,
}

/// What drove a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictCause {
    Rule,
    Model,
    None,
}

/// Evidence attached to a rule-based verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule_name: String,
    pub threshold: f64,
    pub actual_value: f64,
}

/// Full per-log decision, including provenance. The stream response
/// carries only the [`StreamVerdict`] projection.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub score: f64,
    pub is_anomaly: bool,
    pub cause: VerdictCause,
    pub evidence: Option<RuleViolation>,
}

/// The per-log element of a stream response, aligned with the input
/// batch by index. `is_anomaly` is 1 for anomalies, 0 otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamVerdict {
    pub score: f64,
    pub is_anomaly: u8,
}

/// A detected anomaly, as stored in the bounded history and sampled
/// into rate alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub source: String,
    pub log_level: String,
    pub message: String,
    pub anomaly_score: f64,
    pub rule_violation: bool,
    pub features: HashMap<String, f64>,
    pub raw_log: String,
    pub metadata: serde_json::Value,
    pub context: serde_json::Value,
}

/// A rate-threshold crossing for one service. Individual anomalies are
/// never alerted on; only these events reach the sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub alert_type: String,
    pub message: String,
    pub service: String,
    pub anomaly_count: usize,
    pub window_seconds: u64,
    pub sample_anomalies: Vec<AnomalyRecord>,
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub const HIGH_ANOMALY_RATE: &'static str = "high_anomaly_rate";
}

/// A ground-truth label submitted through the feedback channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub log: RawLogRecord,
    pub is_anomaly: u8,
}

/// A feedback record as retained by the store, stamped at ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub log: RawLogRecord,
    pub is_anomaly: u8,
    pub received_at: DateTime<Utc>,
}

/// High-level service counters exposed on the metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub prediction_count: u64,
    pub anomaly_count: u64,
    pub last_trained: Option<DateTime<Utc>>,
    pub feedback_received: u64,
    pub model_accuracy: Option<f64>,
}
