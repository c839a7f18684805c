use crate::{AlertSink, SinkError};
use async_trait::async_trait;
use logwarden_common::AlertEvent;
use serde_json::json;

/// Incoming-webhook sink posting a block-formatted message to a Slack
/// style chat channel.
pub struct SlackSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackSink {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    fn payload(event: &AlertEvent) -> serde_json::Value {
        json!({
            "attachments": [{
                "color": "#FF0000",
                "blocks": [
                    {
                        "type": "header",
                        "text": {"type": "plain_text", "text": "High Anomaly Rate Detected"}
                    },
                    {"type": "divider"},
                    {
                        "type": "section",
                        "text": {"type": "mrkdwn", "text": format!("Service: *{}*", event.service)}
                    },
                    {
                        "type": "section",
                        "fields": [
                            {
                                "type": "mrkdwn",
                                "text": format!("*Anomaly Count*\n{}", event.anomaly_count)
                            },
                            {
                                "type": "mrkdwn",
                                "text": format!("*Time Window*\n{}s", event.window_seconds)
                            }
                        ]
                    },
                    {
                        "type": "section",
                        "text": {"type": "mrkdwn", "text": format!("*Message*: {}", event.message)}
                    }
                ]
            }]
        })
    }
}

#[async_trait]
impl AlertSink for SlackSink {
    fn name(&self) -> &str {
        "slack"
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&Self::payload(event))
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
