#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use logwarden_common::AlertEvent;
use logwarden_detect::{AnomalyHistory, DetectionEngine, RateAggregator, RateRules, ThresholdRules};
use logwarden_model::{FeedbackStore, ModelConfig, ModelService};
use logwarden_server::app;
use logwarden_server::config::Settings;
use logwarden_server::state::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::util::ServiceExt;

pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    pub alerts: mpsc::UnboundedReceiver<AlertEvent>,
    _model_dir: TempDir,
}

/// Settings for a context with one threshold rule each for
/// `web_server` and `database`, a 3-in-60s rate rule for `web_server`,
/// and no `__default__` fallbacks.
pub fn test_settings(model_dir: &TempDir) -> Settings {
    Settings {
        model_path: model_dir.path().join("model.json"),
        alert_conditions: json!({
            "web_server": {"response_time": 2000},
            "database": {"query_time": 4000},
        }),
        complex_alert_rules: json!({
            "web_server": {"count": 3, "window_seconds": 60},
        }),
        ..Settings::default()
    }
}

pub fn build_test_context() -> TestContext {
    let model_dir = TempDir::new().expect("tempdir");
    let settings = test_settings(&model_dir);
    build_test_context_with(settings, model_dir)
}

/// Wires the full application the way `main` does, minus the external
/// sinks: emitted alert events stay on the test's channel.
pub fn build_test_context_with(settings: Settings, model_dir: TempDir) -> TestContext {
    let model = Arc::new(ModelService::new(ModelConfig {
        model_path: settings.model_path.clone(),
        contamination: settings.model_contamination,
        anomaly_threshold: settings.anomaly_threshold,
        random_state: settings.model_random_state,
        min_train_samples: settings.min_train_samples,
    }));
    model.spawn_worker();

    let (alert_tx, alert_rx) = mpsc::unbounded_channel();
    let aggregator = Arc::new(RateAggregator::new(
        RateRules::from_value(&settings.complex_alert_rules),
        alert_tx,
    ));
    let history = Arc::new(AnomalyHistory::new(settings.max_recent_anomalies));
    let feedback = Arc::new(FeedbackStore::new(settings.feedback_capacity));
    let engine = Arc::new(DetectionEngine::new(
        ThresholdRules::from_value(&settings.alert_conditions),
        Arc::clone(&model),
        Arc::clone(&history),
        aggregator,
    ));

    let state = AppState {
        engine,
        model,
        history,
        feedback,
    };
    let app = app::build_router(
        state.clone(),
        Duration::from_secs(settings.request_timeout_secs),
    );

    TestContext {
        app,
        state,
        alerts: alert_rx,
        _model_dir: model_dir,
    }
}

pub async fn request_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request builds");
    send(app, request).await
}

/// Sends a raw body, for malformed-payload cases.
pub async fn request_raw(app: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds");
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// A JSON-format log line for the given service.
pub fn json_log(service: &str, raw_log: &str) -> Value {
    json!({
        "raw_log": raw_log,
        "service": service,
        "source": "test",
        "format_type": "json",
    })
}

/// A key-value training batch with response_time spread over 100..200.
pub fn training_logs(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "raw_log": format!("INFO response_time={} bytes_out={}", 100 + 2 * (i % 50), 1000 + 10 * (i % 50)),
                "service": "database",
                "source": "postgresql",
                "format_type": "key_value",
            })
        })
        .collect()
}
