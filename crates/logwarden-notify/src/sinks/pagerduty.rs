use crate::{AlertSink, SinkError};
use async_trait::async_trait;
use logwarden_common::AlertEvent;
use serde_json::json;

const EVENTS_API_URL: &str = "https://events.pagerduty.com/v2/enqueue";

/// Paging sink posting trigger events to a PagerDuty-style events API.
pub struct PagerDutySink {
    client: reqwest::Client,
    routing_key: String,
    api_url: String,
}

impl PagerDutySink {
    pub fn new(routing_key: String) -> Self {
        Self::with_api_url(routing_key, EVENTS_API_URL.to_string())
    }

    pub fn with_api_url(routing_key: String, api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            routing_key,
            api_url,
        }
    }

    fn payload(&self, event: &AlertEvent) -> serde_json::Value {
        json!({
            "routing_key": self.routing_key,
            "event_action": "trigger",
            "payload": {
                "summary": event.message,
                "source": event.service,
                "severity": "critical",
                "custom_details": {
                    "alert_type": event.alert_type,
                    "anomaly_count": event.anomaly_count,
                    "window_seconds": event.window_seconds,
                    "timestamp": event.timestamp.to_rfc3339(),
                }
            }
        })
    }
}

#[async_trait]
impl AlertSink for PagerDutySink {
    fn name(&self) -> &str {
        "pagerduty"
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.api_url)
            .json(&self.payload(event))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SinkError::from_status(status, &body))
    }
}
