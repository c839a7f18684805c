use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use logwarden_common::{AnomalyRecord, FeedbackRecord, RawLogRecord, ServiceMetrics, StreamVerdict};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire error envelope: every 4xx/5xx body is `{"detail": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ApiError {
            detail: detail.into(),
        }),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct MultiSourceStreamRequest {
    pub logs: Vec<RawLogRecord>,
    /// Optional request metadata, accepted and currently unused.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub logs: Vec<RawLogRecord>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: Vec<FeedbackRecord>,
}

#[derive(Debug, Deserialize)]
pub struct AnomaliesQuery {
    #[serde(default = "default_anomalies_limit")]
    pub limit: usize,
}

fn default_anomalies_limit() -> usize {
    100
}

/// Liveness probe.
pub async fn read_root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Log anomaly detection service is active.".to_string(),
    })
}

/// High-level service and model counters.
pub async fn metrics(State(state): State<AppState>) -> Json<ServiceMetrics> {
    let stats = state.history.stats();
    Json(ServiceMetrics {
        prediction_count: state.model.prediction_count(),
        anomaly_count: stats.total as u64,
        last_trained: state.model.last_trained(),
        feedback_received: state.feedback.total_received(),
        model_accuracy: stats.mean_score,
    })
}

/// Runs a batch of raw logs through the detection pipeline and returns
/// one `{score, is_anomaly}` verdict per input, in input order.
pub async fn stream_multi_source(
    State(state): State<AppState>,
    payload: Result<Json<MultiSourceStreamRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    if request.logs.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No logs provided in the request.");
    }

    let verdicts: Vec<StreamVerdict> = state.engine.process_batch(&request.logs);
    Json(verdicts).into_response()
}

/// Most recent anomaly records, newest first. `limit` defaults to 100
/// and is clamped into 1..=1000.
pub async fn get_anomalies(
    State(state): State<AppState>,
    query: Result<Query<AnomaliesQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let records: Vec<AnomalyRecord> = state.history.recent(query.limit);
    Json(records).into_response()
}

/// Clears the anomaly history.
pub async fn clear_anomalies(State(state): State<AppState>) -> Json<MessageResponse> {
    state.history.clear();
    tracing::info!("Cleared all anomaly records");
    Json(MessageResponse {
        message: "All anomaly records have been cleared.".to_string(),
    })
}

/// Enqueues a background training job over the given logs. Returns
/// immediately; if a job is already queued the new one replaces it.
pub async fn train(
    State(state): State<AppState>,
    payload: Result<Json<TrainRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    if request.logs.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No logs provided for training.");
    }

    let job = state.model.submit_training(request.logs);
    (
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: format!("Model training started in the background ({job})."),
        }),
    )
        .into_response()
}

/// Accepts ground-truth labels for later retraining.
pub async fn submit_feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    if request.feedback.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No feedback records provided.");
    }

    let count = state.feedback.ingest(request.feedback);
    (
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: format!("Feedback received for {count} records."),
        }),
    )
        .into_response()
}
