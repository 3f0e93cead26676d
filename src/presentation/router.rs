// Router assembly - Routes and middleware stack
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{ingest_telemetry, liveness, query_telemetry, readiness};
use crate::presentation::middleware::{handle_panic, propagate_correlation_id, rate_limit};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    // Admission runs before the body is read.
    let telemetry = Router::new()
        .route("/api/telemetry", get(query_telemetry).post(ingest_telemetry))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .merge(telemetry)
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(propagate_correlation_id))
}
