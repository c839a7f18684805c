use crate::state::AppState;
use crate::{api, logging};
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

/// Assembles the HTTP application: all routes under `/api/v1`, plus
/// CORS, an end-to-end request deadline and request logging.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/", get(api::read_root))
        .route("/metrics", get(api::metrics))
        .route("/stream/multi-source", post(api::stream_multi_source))
        .route(
            "/anomalies",
            get(api::get_anomalies).delete(api::clear_anomalies),
        )
        .route("/train", post(api::train))
        .route("/feedback", post(api::submit_feedback));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", api)
        .route("/api/v1/", get(api::read_root))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
