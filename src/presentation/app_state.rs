// Application state for HTTP handlers
use crate::application::health_service::HealthService;
use crate::application::ingestion_service::IngestionService;
use crate::application::query_service::QueryService;
use crate::application::rate_limiter::RateLimiter;
use crate::application::telemetry_repository::TelemetryRepository;
use crate::infrastructure::config::AppConfig;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ingestion_service: IngestionService,
    pub query_service: QueryService,
    pub health_service: HealthService,
    pub rate_limiter: Arc<RateLimiter>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(repository: Arc<dyn TelemetryRepository>, config: &AppConfig) -> Self {
        Self {
            ingestion_service: IngestionService::new(repository.clone()),
            query_service: QueryService::new(repository.clone()),
            health_service: HealthService::new(repository, config.health.readiness_timeout()),
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit.permit_limit,
                config.rate_limit.window(),
                config.rate_limit.retry_after(),
            )),
            max_body_bytes: config.server.max_body_bytes,
        }
    }
}
