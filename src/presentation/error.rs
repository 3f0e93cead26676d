// API error taxonomy and its mapping onto HTTP problem responses
use crate::application::telemetry_repository::RepositoryError;
use crate::application::validator::ValidationErrors;
use crate::infrastructure::http_response::Problem;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Batch failed validation; never reaches storage.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Body or query string could not be read at all.
    #[error("malformed request: {detail}")]
    Malformed { status: StatusCode, detail: String },

    #[error("storage unavailable: {0}")]
    Storage(#[from] RepositoryError),

    #[error(transparent)]
    Unhandled(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Malformed { status, .. } => *status,
            ApiError::Storage(_) | ApiError::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let problem = match &self {
            ApiError::Validation(errors) => {
                tracing::info!(violations = errors.len(), "Rejected invalid telemetry batch");
                Problem::new(StatusCode::BAD_REQUEST, "One or more validation errors occurred.")
                    .with_errors(errors.to_field_map())
            }
            ApiError::Malformed { status, detail } => {
                tracing::info!(%status, detail = %detail, "Rejected malformed request");
                Problem::new(*status, "Invalid request").with_detail(detail.clone())
            }
            // Internal detail stays in the log.
            ApiError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure while serving request");
                Problem::server_error()
            }
            ApiError::Unhandled(e) => {
                tracing::error!(error = ?e, "Unhandled failure while serving request");
                Problem::server_error()
            }
        };

        problem.into_response()
    }
}
