use crate::{AlertSink, SinkError};
use async_trait::async_trait;
use logwarden_common::AlertEvent;
use serde_json::json;

/// Generic HTTP sink posting the full alert event as JSON.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<(), SinkError> {
        let payload = json!({
            "alert_type": event.alert_type,
            "message": event.message,
            "details": event,
        });
        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SinkError::from_status(status, &body))
    }
}
