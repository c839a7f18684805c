use crate::error::ModelError;
use crate::forest::{ForestConfig, IsolationForest};
use crate::schema::FeatureSchema;
use chrono::{DateTime, Utc};
use logwarden_common::RawLogRecord;
use logwarden_parser::LogParser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Model service configuration, resolved from the environment at
/// startup.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    /// Prior fraction of anomalies assumed during fitting, in (0, 0.5).
    pub contamination: f64,
    /// Published scores below this value are anomalous.
    pub anomaly_threshold: f64,
    /// Seed for the forest RNG.
    pub random_state: u64,
    /// Minimum featurizable records required to fit.
    pub min_train_samples: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/isolation_forest_model.pkl"),
            contamination: 0.05,
            anomaly_threshold: 0.75,
            random_state: 42,
            min_train_samples: 10,
        }
    }
}

/// One consistent (schema, forest) pair plus its calibration, swapped
/// atomically on successful training and persisted as one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub schema: FeatureSchema,
    pub forest: IsolationForest,
    /// Raw-score cutoff: the (1 - contamination) quantile of the
    /// training scores. Raw scores above it are in the anomaly tail.
    pub cutoff: f64,
    pub trained_at: DateTime<Utc>,
}

struct PendingJob {
    id: u64,
    logs: Vec<RawLogRecord>,
}

/// Owns the outlier model: load at startup, score on the request path,
/// train on a dedicated background worker.
///
/// Scoring holds a single read lock long enough to clone an `Arc`; the
/// training worker publishes a whole new [`TrainedModel`] in one write,
/// so an in-flight batch sees either the old pair or the new pair,
/// never a mix.
pub struct ModelService {
    config: ModelConfig,
    parser: LogParser,
    current: RwLock<Option<Arc<TrainedModel>>>,
    pending: Mutex<Option<PendingJob>>,
    wakeup: Notify,
    job_counter: AtomicU64,
    prediction_count: AtomicU64,
}

impl ModelService {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            parser: LogParser::new(),
            current: RwLock::new(None),
            pending: Mutex::new(None),
            wakeup: Notify::new(),
            job_counter: AtomicU64::new(0),
            prediction_count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Loads the persisted artifact if one exists. Returns `Ok(false)`
    /// when there is none, leaving the service untrained.
    pub fn load(&self) -> Result<bool, ModelError> {
        if !self.config.model_path.exists() {
            return Ok(false);
        }
        let bytes = std::fs::read(&self.config.model_path)?;
        let model: TrainedModel = serde_json::from_slice(&bytes)?;
        tracing::info!(
            path = %self.config.model_path.display(),
            features = model.schema.len(),
            trained_at = %model.trained_at,
            "Loaded model artifact"
        );
        *self.current.write().expect("model lock poisoned") = Some(Arc::new(model));
        Ok(true)
    }

    /// The current (schema, model) pair, or `None` while untrained.
    /// Callers score a whole batch against one snapshot.
    pub fn snapshot(&self) -> Option<Arc<TrainedModel>> {
        self.current.read().expect("model lock poisoned").clone()
    }

    pub fn is_trained(&self) -> bool {
        self.current.read().expect("model lock poisoned").is_some()
    }

    /// Scores one feature vector against a snapshot.
    ///
    /// Scoring convention: the forest's raw isolation score is higher
    /// for more isolated points. The published score is a normality
    /// score in [0, 1] (higher = more normal), shifted so that the
    /// contamination cutoff calibrated at fit time lands exactly on the
    /// configured anomaly threshold. `score < anomaly_threshold` holds
    /// iff the forest places the vector in the contamination tail.
    pub fn score(&self, model: &TrainedModel, vector: &[f64]) -> f64 {
        self.prediction_count.fetch_add(1, Ordering::Relaxed);
        let raw = model.forest.score(vector);
        (self.config.anomaly_threshold + model.cutoff - raw).clamp(0.0, 1.0)
    }

    /// Score reported while untrained: fully normal.
    pub fn neutral_score(&self) -> f64 {
        1.0
    }

    pub fn is_anomalous_score(&self, score: f64) -> bool {
        score < self.config.anomaly_threshold
    }

    pub fn prediction_count(&self) -> u64 {
        self.prediction_count.load(Ordering::Relaxed)
    }

    pub fn last_trained(&self) -> Option<DateTime<Utc>> {
        self.snapshot().map(|model| model.trained_at)
    }

    /// Enqueues a training job and returns its id immediately. If a job
    /// is already queued it is replaced: at most one job is pending
    /// while at most one is running.
    pub fn submit_training(&self, logs: Vec<RawLogRecord>) -> String {
        let id = self.job_counter.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut pending = self.pending.lock().expect("pending job lock poisoned");
            if let Some(replaced) = pending.replace(PendingJob { id, logs }) {
                tracing::info!(
                    replaced_job = replaced.id,
                    new_job = id,
                    "Coalesced queued training job"
                );
            }
        }
        self.wakeup.notify_one();
        format!("train-{id}")
    }

    /// Spawns the single training worker. Jobs submitted while one is
    /// running coalesce into the pending slot and are picked up next.
    pub fn spawn_worker(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                service.wakeup.notified().await;
                while let Some(job) = service.take_pending() {
                    let job_id = job.id;
                    tracing::info!(job = job_id, batch = job.logs.len(), "Training job started");
                    match service.train_batch(job.logs).await {
                        Ok(samples) => {
                            tracing::info!(job = job_id, samples, "Training job finished, model swapped");
                        }
                        Err(e) => {
                            tracing::error!(job = job_id, error = %e, "Training job failed, keeping previous model");
                        }
                    }
                }
            }
        })
    }

    fn take_pending(&self) -> Option<PendingJob> {
        self.pending.lock().expect("pending job lock poisoned").take()
    }

    #[cfg(test)]
    pub(crate) fn pending_job_count(&self) -> usize {
        usize::from(self.pending.lock().expect("pending job lock poisoned").is_some())
    }

    /// Parses and featurizes the batch, fits a new forest off the async
    /// runtime, then swaps and persists the new pair. On any failure
    /// the previous state is retained.
    pub(crate) async fn train_batch(&self, logs: Vec<RawLogRecord>) -> Result<usize, ModelError> {
        let mut parsed: Vec<_> = logs.iter().map(|log| self.parser.parse(log)).collect();
        parsed.retain(|record| {
            record
                .fields
                .values()
                .any(|value| value.as_numeric().is_some())
        });

        if parsed.is_empty() {
            return Err(ModelError::EmptyBatch);
        }
        if parsed.len() < self.config.min_train_samples {
            return Err(ModelError::InsufficientData {
                got: parsed.len(),
                need: self.config.min_train_samples,
            });
        }

        let schema = FeatureSchema::derive(&parsed);
        if schema.is_empty() {
            return Err(ModelError::EmptySchema);
        }

        let rows: Vec<Vec<f64>> = parsed.iter().map(|record| schema.project(record)).collect();
        let sample_count = rows.len();
        let forest_config = ForestConfig {
            seed: self.config.random_state,
            ..ForestConfig::default()
        };
        let contamination = self.config.contamination;

        let (forest, cutoff) = tokio::task::spawn_blocking(move || {
            let forest = IsolationForest::fit(&rows, &forest_config)?;
            let scores: Vec<f64> = rows.iter().map(|row| forest.score(row)).collect();
            let cutoff = contamination_cutoff(scores, contamination);
            Ok::<_, ModelError>((forest, cutoff))
        })
        .await
        .map_err(|e| ModelError::Training(e.to_string()))??;

        let model = TrainedModel {
            schema,
            forest,
            cutoff,
            trained_at: Utc::now(),
        };
        self.persist(&model)?;
        *self.current.write().expect("model lock poisoned") = Some(Arc::new(model));
        Ok(sample_count)
    }

    /// Writes the artifact with a temp-file-then-rename so a crash
    /// mid-write never leaves a torn file at the model path.
    fn persist(&self, model: &TrainedModel) -> Result<(), ModelError> {
        if let Some(parent) = self.config.model_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = self.config.model_path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, serde_json::to_vec(model)?)?;
        std::fs::rename(&tmp, &self.config.model_path)?;
        tracing::info!(path = %self.config.model_path.display(), "Persisted model artifact");
        Ok(())
    }
}

/// The (1 - contamination) quantile of the training scores: the raw
/// score above which roughly `contamination` of the batch lies.
pub(crate) fn contamination_cutoff(mut scores: Vec<f64>, contamination: f64) -> f64 {
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = scores.len();
    let rank = ((1.0 - contamination.clamp(0.0, 0.5)) * n as f64).ceil() as usize;
    scores[rank.clamp(1, n) - 1]
}
