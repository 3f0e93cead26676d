// Request middleware - Correlation ids, admission control, panic containment
use crate::application::rate_limiter::Admission;
use crate::infrastructure::http_response::{Problem, too_many_requests};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

pub const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

pub const RATE_LIMIT_REMAINING_HEADER: HeaderName =
    HeaderName::from_static("x-ratelimit-remaining");

/// Partition used when the peer address is not available.
pub const FALLBACK_PARTITION: &str = "unknown";

const MAX_CORRELATION_LEN: usize = 128;

/// Correlation id attached to the request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    fn from_request(request: &Request) -> Self {
        request
            .headers()
            .get(&CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty() && v.len() <= MAX_CORRELATION_LEN)
            .map(|v| CorrelationId(v.to_owned()))
            .unwrap_or_else(|| CorrelationId(Uuid::new_v4().simple().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Read or generate the correlation id, run the request inside a span that
/// carries it, and echo it on the response.
pub async fn propagate_correlation_id(mut request: Request, next: Next) -> Response {
    let correlation = CorrelationId::from_request(&request);
    request.extensions_mut().insert(correlation.clone());

    let span = tracing::info_span!(
        "request",
        correlation_id = %correlation.as_str(),
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(correlation.as_str()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// Fixed-window admission keyed by client IP. Refused requests never reach
/// body parsing, validation or storage.
pub async fn rate_limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let partition = partition_key(&request);

    match state.rate_limiter.check(&partition) {
        Admission::Admitted { remaining } => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        Admission::Rejected { retry_after } => {
            tracing::warn!(partition = %partition, "Request rejected by rate limiter");
            let trace_id = request
                .extensions()
                .get::<CorrelationId>()
                .map(|c| c.0.clone());
            too_many_requests(retry_after, trace_id)
        }
    }
}

fn partition_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| FALLBACK_PARTITION.to_string())
}

/// Handler for `CatchPanicLayer`: log the payload, return the generic 500.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");

    tracing::error!(panic = %detail, "Request handler panicked");
    Problem::server_error().into_response()
}
