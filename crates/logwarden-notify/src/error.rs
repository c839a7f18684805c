use reqwest::StatusCode;

/// Delivery failure for one sink, classified for retry handling.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Worth retrying: network errors, timeouts, HTTP 5xx and 429.
    #[error("Sink: transient delivery failure: {0}")]
    Transient(String),

    /// Not worth retrying: rejected requests (4xx other than 429).
    #[error("Sink: permanent delivery failure: {0}")]
    Permanent(String),
}

impl SinkError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SinkError::Transient(_))
    }

    /// Classifies a non-success HTTP response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = format!("HTTP {status}: {body}");
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            SinkError::Transient(detail)
        } else {
            SinkError::Permanent(detail)
        }
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        SinkError::Transient(err.to_string())
    }
}
