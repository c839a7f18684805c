/// Errors that can occur in the model subsystem.
///
/// Training errors are absorbed by the background worker: they are
/// logged and the previous (schema, model) pair is retained. Nothing in
/// this module ever reaches an ingestion caller.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Reading or writing the model artifact failed.
    #[error("Model: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The model artifact could not be serialized or deserialized.
    #[error("Model: serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The training batch was empty after parsing and filtering.
    #[error("Model: empty training batch")]
    EmptyBatch,

    /// Fewer featurizable records than the configured training floor.
    #[error("Model: insufficient training data: {got} featurizable records, need at least {need}")]
    InsufficientData { got: usize, need: usize },

    /// No numeric field names were seen in the batch, so no feature
    /// schema can be derived.
    #[error("Model: training batch has no numeric fields to derive a feature schema from")]
    EmptySchema,

    /// The blocking fit task failed to complete.
    #[error("Model: training task failed: {0}")]
    Training(String),
}
