use crate::engine::DetectionEngine;
use crate::history::AnomalyHistory;
use crate::rate::{RateAggregator, RateRules};
use crate::rules::ThresholdRules;
use crate::window::RateWindow;
use chrono::{Duration, Utc};
use logwarden_common::{AnomalyRecord, FieldValue, LogFormat, ParsedLogRecord, RawLogRecord};
use logwarden_model::{ModelConfig, ModelService};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

fn parsed(service: &str, fields: &[(&str, f64)]) -> ParsedLogRecord {
    ParsedLogRecord {
        raw_log: String::new(),
        service: service.to_string(),
        source: "test".to_string(),
        timestamp: Utc::now(),
        log_level: None,
        message: None,
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), FieldValue::Numeric(*v)))
            .collect(),
    }
}

fn anomaly(service: &str) -> AnomalyRecord {
    AnomalyRecord {
        timestamp: Utc::now(),
        service: service.to_string(),
        source: "test".to_string(),
        log_level: "ERROR".to_string(),
        message: "boom".to_string(),
        anomaly_score: 1.0,
        rule_violation: true,
        features: HashMap::new(),
        raw_log: "boom".to_string(),
        metadata: json!({}),
        context: json!({}),
    }
}

fn json_log(service: &str, raw_log: &str) -> RawLogRecord {
    RawLogRecord {
        raw_log: raw_log.to_string(),
        service: service.to_string(),
        source: "nginx".to_string(),
        format_type: LogFormat::Json,
        custom_config: None,
    }
}

fn engine_with(
    rules: ThresholdRules,
    rate_rules: RateRules,
) -> (DetectionEngine, Arc<AnomalyHistory>, mpsc::UnboundedReceiver<logwarden_common::AlertEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let history = Arc::new(AnomalyHistory::new(500));
    let engine = DetectionEngine::new(
        rules,
        Arc::new(ModelService::new(ModelConfig::default())),
        Arc::clone(&history),
        Arc::new(RateAggregator::new(rate_rules, tx)),
    );
    (engine, history, rx)
}

// ---- threshold rules ----

#[test]
fn first_configured_bound_wins() {
    let rules = ThresholdRules::from_value(&json!({
        "web_server": {"response_time": 2000, "error_rate": 0.1}
    }));

    let record = parsed("web_server", &[("error_rate", 0.5), ("response_time", 9000.0)]);
    let violation = rules.evaluate(&record).expect("violation");
    assert_eq!(violation.rule_name, "response_time");
    assert_eq!(violation.threshold, 2000.0);
    assert_eq!(violation.actual_value, 9000.0);
}

#[test]
fn violation_requires_strictly_greater() {
    let rules = ThresholdRules::from_value(&json!({"web_server": {"response_time": 2000}}));
    assert!(rules
        .evaluate(&parsed("web_server", &[("response_time", 2000.0)]))
        .is_none());
    assert!(rules
        .evaluate(&parsed("web_server", &[("response_time", 2000.1)]))
        .is_some());
}

#[test]
fn service_table_shadows_default_without_merging() {
    let rules = ThresholdRules::from_value(&json!({
        "web_server": {"response_time": 2000},
        "__default__": {"cpu_usage": 90}
    }));

    // web_server has its own table, so the default cpu bound is not in
    // effect for it.
    assert!(rules
        .evaluate(&parsed("web_server", &[("cpu_usage", 99.0)]))
        .is_none());
    // Unlisted services fall back to the default table.
    assert!(rules
        .evaluate(&parsed("batch_worker", &[("cpu_usage", 99.0)]))
        .is_some());
}

#[test]
fn no_rules_no_violations() {
    let rules = ThresholdRules::empty();
    assert!(rules
        .evaluate(&parsed("web_server", &[("response_time", 1e9)]))
        .is_none());
}

// ---- rate windows & aggregation ----

#[test]
fn window_prunes_entries_outside_span() {
    let mut window = RateWindow::new(60);
    let now = Utc::now();
    window.push(now - Duration::seconds(120), anomaly("web_server"));
    window.push(now - Duration::seconds(30), anomaly("web_server"));
    window.push(now, anomaly("web_server"));

    assert_eq!(window.len(), 2);
    assert!(window.oldest().expect("oldest") >= now - Duration::seconds(60));
}

#[test]
fn rate_alert_fires_once_then_window_resets() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let aggregator = RateAggregator::new(
        RateRules::from_value(&json!({"web_server": {"count": 5, "window_seconds": 60}})),
        tx,
    );
    let now = Utc::now();

    for i in 0..4 {
        assert!(aggregator
            .observe(&anomaly("web_server"), now + Duration::seconds(i))
            .is_none());
    }
    let event = aggregator
        .observe(&anomaly("web_server"), now + Duration::seconds(4))
        .expect("fifth anomaly crosses the threshold");
    assert_eq!(event.alert_type, "high_anomaly_rate");
    assert_eq!(event.service, "web_server");
    assert_eq!(event.anomaly_count, 5);
    assert_eq!(event.window_seconds, 60);
    assert_eq!(event.sample_anomalies.len(), 5);

    // The window was reset, so the next anomaly starts a fresh count.
    assert!(aggregator
        .observe(&anomaly("web_server"), now + Duration::seconds(5))
        .is_none());
    assert!(rx.try_recv().is_err());
}

#[test]
fn rate_rules_fall_back_to_default() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let aggregator = RateAggregator::new(
        RateRules::from_value(&json!({"__default__": {"count": 2, "window_seconds": 60}})),
        tx,
    );
    let now = Utc::now();

    assert!(aggregator.observe(&anomaly("anything"), now).is_none());
    assert!(aggregator
        .observe(&anomaly("anything"), now + Duration::seconds(1))
        .is_some());
}

#[test]
fn services_accumulate_independently() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let aggregator = RateAggregator::new(
        RateRules::from_value(&json!({"__default__": {"count": 2, "window_seconds": 60}})),
        tx,
    );
    let now = Utc::now();

    assert!(aggregator.observe(&anomaly("a"), now).is_none());
    assert!(aggregator.observe(&anomaly("b"), now).is_none());
    assert!(aggregator
        .observe(&anomaly("a"), now + Duration::seconds(1))
        .is_some());
}

#[test]
fn invalid_rate_rules_are_skipped() {
    let rules = RateRules::from_value(&json!({
        "bad": {"count": 0, "window_seconds": 60},
        "missing": {"count": 3},
        "good": {"count": 3, "window_seconds": 60}
    }));
    assert!(rules.resolve("bad").is_none());
    assert!(rules.resolve("missing").is_none());
    assert!(rules.resolve("good").is_some());
}

// ---- history ----

#[test]
fn history_evicts_oldest_and_returns_newest_first() {
    let history = AnomalyHistory::new(3);
    for name in ["a", "b", "c", "d", "e"] {
        let mut record = anomaly("web_server");
        record.message = name.to_string();
        history.append(record);
    }

    let recent = history.recent(10);
    let names: Vec<&str> = recent.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(names, ["e", "d", "c"]);
    assert_eq!(history.len(), 3);
}

#[test]
fn history_clear_is_idempotent() {
    let history = AnomalyHistory::new(3);
    history.append(anomaly("web_server"));
    history.clear();
    history.clear();
    assert!(history.recent(10).is_empty());
    assert!(history.is_empty());
}

#[test]
fn history_stats_average_score() {
    let history = AnomalyHistory::new(10);
    assert!(history.stats().mean_score.is_none());

    let mut low = anomaly("web_server");
    low.anomaly_score = 0.2;
    history.append(low);
    history.append(anomaly("web_server"));

    let stats = history.stats();
    assert_eq!(stats.total, 2);
    assert!((stats.mean_score.expect("mean") - 0.6).abs() < 1e-9);
}

// ---- engine ----

#[test]
fn rule_violation_dominates_and_records_evidence() {
    let (engine, history, mut rx) = engine_with(
        ThresholdRules::from_value(&json!({"web_server": {"response_time": 2000}})),
        RateRules::from_value(&json!({"web_server": {"count": 1, "window_seconds": 60}})),
    );

    let verdicts = engine.process_batch(&[json_log("web_server", r#"{"response_time": 2500}"#)]);
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].score, 1.0);
    assert_eq!(verdicts[0].is_anomaly, 1);

    let recent = history.recent(10);
    assert_eq!(recent.len(), 1);
    let record = &recent[0];
    assert!(record.rule_violation);
    assert_eq!(record.metadata["violated_rule"], "response_time");
    assert_eq!(record.metadata["threshold"], 2000.0);
    assert_eq!(record.metadata["actual_value"], 2500.0);

    // count = 1 fires immediately and the event reaches the channel.
    let event = rx.try_recv().expect("alert event");
    assert_eq!(event.service, "web_server");
}

#[test]
fn untrained_model_yields_no_anomalies() {
    let (engine, history, _rx) = engine_with(ThresholdRules::empty(), RateRules::empty());

    let verdicts = engine.process_batch(&[
        json_log("web_server", r#"{"response_time": 150}"#),
        json_log("web_server", r#"{"response_time": 999999}"#),
    ]);
    assert_eq!(verdicts.len(), 2);
    for verdict in &verdicts {
        assert_eq!(verdict.is_anomaly, 0);
        assert_eq!(verdict.score, 1.0);
    }
    assert!(history.is_empty());
}

#[test]
fn response_preserves_input_order() {
    let (engine, _history, _rx) = engine_with(
        ThresholdRules::from_value(&json!({"web_server": {"response_time": 2000}})),
        RateRules::empty(),
    );

    let verdicts = engine.process_batch(&[
        json_log("web_server", r#"{"response_time": 100}"#),
        json_log("web_server", r#"{"response_time": 9000}"#),
        json_log("web_server", "{broken"),
        json_log("web_server", r#"{"response_time": 8000}"#),
    ]);

    let flags: Vec<u8> = verdicts.iter().map(|v| v.is_anomaly).collect();
    assert_eq!(flags, [0, 1, 0, 1]);
}

#[test]
fn unparseable_log_cannot_violate_rules() {
    let (engine, history, _rx) = engine_with(
        ThresholdRules::from_value(&json!({"__default__": {"response_time": 1}})),
        RateRules::empty(),
    );

    let verdicts = engine.process_batch(&[json_log("web_server", "not json at all")]);
    assert_eq!(verdicts[0].is_anomaly, 0);
    assert!(history.is_empty());
}
