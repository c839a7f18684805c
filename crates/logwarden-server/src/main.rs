use anyhow::Result;
use logwarden_detect::{AnomalyHistory, DetectionEngine, RateAggregator, RateRules, ThresholdRules};
use logwarden_model::{FeedbackStore, ModelConfig, ModelService};
use logwarden_notify::sinks::console::ConsoleSink;
use logwarden_notify::sinks::pagerduty::PagerDutySink;
use logwarden_notify::sinks::slack::SlackSink;
use logwarden_notify::sinks::webhook::WebhookSink;
use logwarden_notify::{AlertDispatcher, AlertSink};
use logwarden_server::app;
use logwarden_server::config::Settings;
use logwarden_server::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("logwarden=info".parse()?))
        .init();

    let settings = Settings::from_env();
    tracing::info!(
        host = %settings.api_host,
        port = settings.api_port,
        model_path = %settings.model_path.display(),
        "logwarden starting"
    );

    // Model service: load any persisted artifact, then start the single
    // background training worker.
    let model = Arc::new(ModelService::new(ModelConfig {
        model_path: settings.model_path.clone(),
        contamination: settings.model_contamination,
        anomaly_threshold: settings.anomaly_threshold,
        random_state: settings.model_random_state,
        min_train_samples: settings.min_train_samples,
    }));
    match model.load() {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!("No model artifact found, scoring neutrally until first training");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load model artifact, starting untrained");
        }
    }
    let trainer = model.spawn_worker();

    // Alert pipeline: aggregator feeds the dispatch worker through an
    // unbounded channel; events are rare after rate aggregation.
    let (alert_tx, alert_rx) = mpsc::unbounded_channel();
    let aggregator = Arc::new(RateAggregator::new(
        RateRules::from_value(&settings.complex_alert_rules),
        alert_tx,
    ));
    let dispatcher = AlertDispatcher::new(build_sinks(&settings)).spawn(alert_rx);

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
    let router = app::build_router(state, Duration::from_secs(settings.request_timeout_secs));

    let addr: SocketAddr = format!("{}:{}", settings.api_host, settings.api_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server started");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await?;

    trainer.abort();
    dispatcher.abort();
    tracing::info!("Server stopped");
    Ok(())
}

/// Builds the active sink set from the environment. With no external
/// sink configured, alerts go to the console sink so rate crossings are
/// still visible.
fn build_sinks(settings: &Settings) -> Vec<Arc<dyn AlertSink>> {
    let mut sinks: Vec<Arc<dyn AlertSink>> = Vec::new();
    if let Some(url) = &settings.slack_webhook_url {
        sinks.push(Arc::new(SlackSink::new(url.clone())));
    }
    if let Some(key) = &settings.pagerduty_routing_key {
        sinks.push(Arc::new(PagerDutySink::new(key.clone())));
    }
    if let Some(url) = &settings.generic_webhook_url {
        sinks.push(Arc::new(WebhookSink::new(url.clone())));
    }
    if sinks.is_empty() {
        tracing::info!("No alert sink configured, routing alerts to the console");
        sinks.push(Arc::new(ConsoleSink));
    } else {
        let names: Vec<&str> = sinks.iter().map(|sink| sink.name()).collect();
        tracing::info!(sinks = ?names, "Alert sinks configured");
    }
    sinks
}
