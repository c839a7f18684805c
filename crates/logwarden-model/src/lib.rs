//! Outlier model lifecycle: train, load, persist, score, feedback intake.
//!
//! The scorer is an isolation forest fitted on feature vectors projected
//! through a [`FeatureSchema`]. Schema and forest live and are swapped
//! as one immutable [`TrainedModel`] so a scoring call always observes a
//! consistent pair. Training runs on a single background worker with a
//! coalescing one-slot job queue and never blocks the request path.

pub mod error;
pub mod feedback;
pub mod forest;
pub mod schema;
pub mod service;

#[cfg(test)]
mod tests;

pub use error::ModelError;
pub use feedback::FeedbackStore;
pub use forest::{ForestConfig, IsolationForest};
pub use schema::FeatureSchema;
pub use service::{ModelConfig, ModelService, TrainedModel};
