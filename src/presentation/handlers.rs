// HTTP request handlers
use crate::application::query_service::QueryParams;
use crate::application::validator::validate_batch;
use crate::domain::health::HealthReport;
use crate::domain::query::QueryPage;
use crate::domain::telemetry::{IngestBatch, parse_timestamp};
use crate::presentation::app_state::AppState;
use crate::presentation::error::ApiError;
use axum::{
    Json,
    extract::{Query, State, rejection::{JsonRejection, QueryRejection}},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryQuery {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none_timestamp")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "empty_as_none_timestamp")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "empty_as_none_int")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none_int")]
    pub page_size: Option<i64>,
}

impl From<TelemetryQuery> for QueryParams {
    fn from(q: TelemetryQuery) -> Self {
        QueryParams {
            source: q.source,
            start_date: q.start_date,
            end_date: q.end_date,
            page: q.page,
            page_size: q.page_size,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub inserted: usize,
}

/// Ingest a batch of telemetry events
pub async fn ingest_telemetry(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestBatch>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(batch) = payload.map_err(malformed_body)?;

    let validated = validate_batch(batch)?;
    let receipt = state.ingestion_service.ingest(validated).await?;
    let inserted = receipt.inserted();

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/telemetry?inserted={inserted}"))],
        Json(IngestResponse { inserted }),
    ))
}

/// Body limit overruns keep their 413; every other body failure is a 400.
fn malformed_body(rejection: JsonRejection) -> ApiError {
    let status = match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    };
    ApiError::Malformed {
        status,
        detail: rejection.body_text(),
    }
}

/// Query telemetry events with filters and pagination
pub async fn query_telemetry(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TelemetryQuery>, QueryRejection>,
) -> Result<Json<QueryPage>, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::Malformed {
        status: StatusCode::BAD_REQUEST,
        detail: rejection.body_text(),
    })?;

    let page = state.query_service.query(query.into()).await?;
    Ok(Json(page))
}

/// Liveness check
pub async fn liveness(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.health_service.liveness())
}

/// Readiness check, 503 when storage is unreachable
pub async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.health_service.readiness().await;
    let status = if report.status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

fn empty_as_none_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {s}"))),
        _ => Ok(None),
    }
}

fn empty_as_none_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid integer: {s}"))),
        _ => Ok(None),
    }
}
