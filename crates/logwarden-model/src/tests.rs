use crate::forest::{ForestConfig, IsolationForest};
use crate::schema::FeatureSchema;
use crate::service::{contamination_cutoff, ModelConfig, ModelService};
use crate::FeedbackStore;
use logwarden_common::{FeedbackRecord, FieldValue, LogFormat, ParsedLogRecord, RawLogRecord};
use std::sync::Arc;
use tempfile::TempDir;

fn parsed_with(fields: &[(&str, FieldValue)]) -> ParsedLogRecord {
    ParsedLogRecord {
        raw_log: String::new(),
        service: "web_server".to_string(),
        source: "nginx".to_string(),
        timestamp: chrono::Utc::now(),
        log_level: None,
        message: None,
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    }
}

fn kv_log(line: &str) -> RawLogRecord {
    RawLogRecord {
        raw_log: line.to_string(),
        service: "web_server".to_string(),
        source: "nginx".to_string(),
        format_type: LogFormat::KeyValue,
        custom_config: None,
    }
}

/// 50 normal key-value logs with response_time spread over 100..200.
fn training_batch() -> Vec<RawLogRecord> {
    (0..50)
        .map(|i| kv_log(&format!("INFO response_time={} bytes_out={}", 100 + 2 * i, 1000 + 10 * i)))
        .collect()
}

fn test_service(dir: &TempDir) -> ModelService {
    ModelService::new(ModelConfig {
        model_path: dir.path().join("model.json"),
        ..ModelConfig::default()
    })
}

#[test]
fn schema_derives_sorted_union_of_numeric_fields() {
    let records = vec![
        parsed_with(&[
            ("zeta", FieldValue::Numeric(1.0)),
            ("alpha", FieldValue::Numeric(2.0)),
            ("note", FieldValue::Text("text only".to_string())),
        ]),
        parsed_with(&[("mid", FieldValue::Numeric(3.0))]),
    ];

    let schema = FeatureSchema::derive(&records);
    assert_eq!(schema.names(), ["alpha", "mid", "zeta"]);
}

#[test]
fn projection_fills_missing_fields_with_zero() {
    let schema = FeatureSchema::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    let record = parsed_with(&[
        ("a", FieldValue::Numeric(1.5)),
        ("c", FieldValue::Text("not numeric".to_string())),
        ("ignored", FieldValue::Numeric(9.0)),
    ]);

    assert_eq!(schema.project(&record), vec![1.5, 0.0, 0.0]);
}

#[test]
fn forest_isolates_outliers() {
    let rows: Vec<Vec<f64>> = (0..100)
        .map(|i| vec![100.0 + (i % 100) as f64, 1000.0 + (i % 50) as f64])
        .collect();
    let forest = IsolationForest::fit(&rows, &ForestConfig::default()).expect("fit");

    let inlier = forest.score(&[150.0, 1020.0]);
    let outlier = forest.score(&[10_000.0, 50_000.0]);
    assert!(
        outlier > inlier,
        "outlier raw score {outlier} should exceed inlier {inlier}"
    );
}

#[test]
fn forest_fit_is_deterministic_for_a_seed() {
    let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64, (i * 3) as f64]).collect();
    let config = ForestConfig::default();

    let a = IsolationForest::fit(&rows, &config).expect("fit");
    let b = IsolationForest::fit(&rows, &config).expect("fit");
    for point in [[5.0, 15.0], [200.0, 9.0], [0.0, 0.0]] {
        assert_eq!(a.score(&point), b.score(&point));
    }
}

#[test]
fn forest_rejects_empty_input() {
    assert!(IsolationForest::fit(&[], &ForestConfig::default()).is_err());
    assert!(IsolationForest::fit(&[vec![]], &ForestConfig::default()).is_err());
}

#[test]
fn cutoff_is_upper_quantile_of_scores() {
    let scores: Vec<f64> = (1..=100).map(|i| i as f64 / 100.0).collect();
    let cutoff = contamination_cutoff(scores, 0.05);
    assert!((cutoff - 0.95).abs() < 1e-9);

    // A single score is its own cutoff.
    assert_eq!(contamination_cutoff(vec![0.4], 0.05), 0.4);
}

#[tokio::test]
async fn training_swaps_model_and_scores_inliers_as_normal() {
    let dir = TempDir::new().expect("tempdir");
    let service = test_service(&dir);
    assert!(!service.is_trained());

    let trained = service.train_batch(training_batch()).await.expect("train");
    assert_eq!(trained, 50);
    assert!(service.is_trained());

    let model = service.snapshot().expect("snapshot");
    assert_eq!(model.schema.names(), ["bytes_out", "response_time"]);

    // A point inside the training range scores at or above the
    // threshold; a far outlier falls below it.
    let inlier = service.score(&model, &model.schema.project(&parsed_with(&[
        ("response_time", FieldValue::Numeric(150.0)),
        ("bytes_out", FieldValue::Numeric(1200.0)),
    ])));
    assert!(!service.is_anomalous_score(inlier), "inlier scored {inlier}");

    let outlier = service.score(&model, &model.schema.project(&parsed_with(&[
        ("response_time", FieldValue::Numeric(50_000.0)),
        ("bytes_out", FieldValue::Numeric(2.0)),
    ])));
    assert!(service.is_anomalous_score(outlier), "outlier scored {outlier}");

    assert_eq!(service.prediction_count(), 2);
    assert!(service.last_trained().is_some());
}

#[tokio::test]
async fn artifact_round_trips_through_disk() {
    let dir = TempDir::new().expect("tempdir");
    let service = test_service(&dir);
    service.train_batch(training_batch()).await.expect("train");
    let before = service.snapshot().expect("snapshot");

    let reloaded = test_service(&dir);
    assert!(reloaded.load().expect("load"));
    let after = reloaded.snapshot().expect("snapshot");

    assert_eq!(before.schema, after.schema);
    assert_eq!(before.cutoff, after.cutoff);
    let probe = vec![150.0, 1200.0];
    assert_eq!(before.forest.score(&probe), after.forest.score(&probe));
}

#[tokio::test]
async fn load_without_artifact_stays_untrained() {
    let dir = TempDir::new().expect("tempdir");
    let service = test_service(&dir);
    assert!(!service.load().expect("load"));
    assert!(!service.is_trained());
    assert_eq!(service.neutral_score(), 1.0);
}

#[tokio::test]
async fn training_requires_minimum_featurizable_records() {
    let dir = TempDir::new().expect("tempdir");
    let service = test_service(&dir);

    let small: Vec<RawLogRecord> = (0..3)
        .map(|i| kv_log(&format!("INFO response_time={}", 100 + i)))
        .collect();
    assert!(service.train_batch(small).await.is_err());
    assert!(!service.is_trained());

    // Unparseable lines contribute nothing and cannot satisfy the floor.
    let junk: Vec<RawLogRecord> = (0..20).map(|_| kv_log("plain text, no pairs")).collect();
    assert!(service.train_batch(junk).await.is_err());
}

#[tokio::test]
async fn queued_training_jobs_coalesce() {
    let dir = TempDir::new().expect("tempdir");
    let service = test_service(&dir);

    let first = service.submit_training(training_batch());
    let second = service.submit_training(training_batch());
    assert_ne!(first, second);
    // No worker is draining the queue, so the second replaced the first.
    assert_eq!(service.pending_job_count(), 1);
}

#[tokio::test]
async fn worker_drains_submitted_jobs() {
    let dir = TempDir::new().expect("tempdir");
    let service = Arc::new(test_service(&dir));
    let worker = service.spawn_worker();

    service.submit_training(training_batch());
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(10);
    while !service.is_trained() {
        assert!(tokio::time::Instant::now() < deadline, "training never finished");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(service.pending_job_count(), 0);
    worker.abort();
}

#[test]
fn feedback_store_drops_oldest_on_overflow() {
    let store = FeedbackStore::new(3);
    let records: Vec<FeedbackRecord> = (0..5)
        .map(|i| FeedbackRecord {
            log: kv_log(&format!("INFO response_time={i}")),
            is_anomaly: u8::from(i % 2 == 0),
        })
        .collect();

    assert_eq!(store.ingest(records), 5);
    assert_eq!(store.len(), 3);
    assert_eq!(store.total_received(), 5);

    let entries = store.drain();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].log.raw_log, "INFO response_time=2");
    assert!(store.is_empty());
}
