use logwarden_detect::{AnomalyHistory, DetectionEngine};
use logwarden_model::{FeedbackStore, ModelService};
use std::sync::Arc;

/// Long-lived shared state handed to every request handler. Each
/// sub-state owns its own synchronization; the struct itself is a cheap
/// bundle of `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DetectionEngine>,
    pub model: Arc<ModelService>,
    pub history: Arc<AnomalyHistory>,
    pub feedback: Arc<FeedbackStore>,
}
