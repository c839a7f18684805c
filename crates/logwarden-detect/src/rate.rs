use crate::window::RateWindow;
use crate::FALLBACK_SERVICE;
use chrono::{DateTime, Utc};
use logwarden_common::{AlertEvent, AnomalyRecord};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// Most recent anomalies attached to an alert event as evidence.
const ALERT_SAMPLE_LIMIT: usize = 5;

/// Count/window pair for one service's rate alert.
#[derive(Debug, Clone)]
pub struct RateRule {
    pub count: usize,
    pub window_seconds: u64,
}

/// Per-service rate rules with a `__default__` fallback.
#[derive(Debug, Clone, Default)]
pub struct RateRules {
    services: HashMap<String, RateRule>,
}

impl RateRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds rate rules from a `{service: {count, window_seconds}}`
    /// JSON object. Entries with a missing or non-positive count or
    /// window are skipped with a warning.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let mut services = HashMap::new();
        let Some(table) = value.as_object() else {
            if !value.is_null() {
                tracing::warn!("Rate alert rules must be a JSON object, ignoring");
            }
            return Self::default();
        };

        for (service, rule) in table {
            let count = rule.get("count").and_then(|v| v.as_u64());
            let window_seconds = rule.get("window_seconds").and_then(|v| v.as_u64());
            match (count, window_seconds) {
                (Some(count), Some(window_seconds)) if count >= 1 && window_seconds >= 1 => {
                    services.insert(
                        service.clone(),
                        RateRule {
                            count: count as usize,
                            window_seconds,
                        },
                    );
                }
                _ => {
                    tracing::warn!(
                        service = %service,
                        "Rate alert rule needs count >= 1 and window_seconds >= 1, skipping"
                    );
                }
            }
        }
        Self { services }
    }

    pub fn resolve(&self, service: &str) -> Option<&RateRule> {
        self.services
            .get(service)
            .or_else(|| self.services.get(FALLBACK_SERVICE))
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Accumulates anomalies into per-service rolling windows and emits one
/// `high_anomaly_rate` event per threshold crossing.
///
/// After an event fires the window is reset, so the next alert requires
/// a full new accumulation. Emitted events go to an unbounded outbound
/// channel drained by the alert dispatcher; events are rare after
/// aggregation, so the channel stays near-empty in practice.
pub struct RateAggregator {
    rules: RateRules,
    windows: Mutex<HashMap<String, RateWindow>>,
    outbound: UnboundedSender<AlertEvent>,
}

impl RateAggregator {
    pub fn new(rules: RateRules, outbound: UnboundedSender<AlertEvent>) -> Self {
        Self {
            rules,
            windows: Mutex::new(HashMap::new()),
            outbound,
        }
    }

    /// Records an anomaly at the current time, enqueueing an alert
    /// event if this crossing fires.
    pub fn record(&self, anomaly: &AnomalyRecord) {
        if let Some(event) = self.observe(anomaly, Utc::now()) {
            if self.outbound.send(event).is_err() {
                tracing::warn!("Alert dispatcher is gone, dropping alert event");
            }
        }
    }

    /// Window bookkeeping for one anomaly arrival. Returns the alert
    /// event when the service's window crosses its configured count.
    pub fn observe(&self, anomaly: &AnomalyRecord, now: DateTime<Utc>) -> Option<AlertEvent> {
        let rule = self.rules.resolve(&anomaly.service)?;
        let mut windows = self.windows.lock().expect("rate window lock poisoned");
        let window = windows
            .entry(anomaly.service.clone())
            .or_insert_with(|| RateWindow::new(rule.window_seconds));

        window.push(now, anomaly.clone());
        if window.len() < rule.count {
            return None;
        }

        let event = AlertEvent {
            alert_type: AlertEvent::HIGH_ANOMALY_RATE.to_string(),
            message: format!(
                "High anomaly rate detected for service: {}",
                anomaly.service
            ),
            service: anomaly.service.clone(),
            anomaly_count: window.len(),
            window_seconds: rule.window_seconds,
            sample_anomalies: window.samples(ALERT_SAMPLE_LIMIT),
            timestamp: now,
        };
        window.reset();
        tracing::warn!(
            service = %anomaly.service,
            count = event.anomaly_count,
            window_seconds = rule.window_seconds,
            "High anomaly rate alert triggered"
        );
        Some(event)
    }
}
