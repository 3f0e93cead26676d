// Health service - Liveness and readiness checks
use crate::application::telemetry_repository::{RepositoryError, TelemetryRepository};
use crate::domain::health::{HealthCheck, HealthReport};
use std::sync::Arc;
use std::time::{Duration, Instant};

const LIVENESS_CHECK: &str = "self";
const STORAGE_CHECK: &str = "storage";

#[derive(Clone)]
pub struct HealthService {
    repository: Arc<dyn TelemetryRepository>,
    readiness_timeout: Duration,
}

impl HealthService {
    pub fn new(repository: Arc<dyn TelemetryRepository>, readiness_timeout: Duration) -> Self {
        Self {
            repository,
            readiness_timeout,
        }
    }

    /// Healthy whenever the process is running.
    pub fn liveness(&self) -> HealthReport {
        let started = Instant::now();
        let check = HealthCheck::pass(LIVENESS_CHECK, started.elapsed());
        HealthReport::from_checks(vec![check], started.elapsed())
    }

    /// Healthy only if a storage round-trip completes within the timeout.
    pub async fn readiness(&self) -> HealthReport {
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.readiness_timeout, self.repository.ping()).await {
            Ok(result) => result,
            Err(_) => Err(RepositoryError::Timeout(self.readiness_timeout)),
        };

        let elapsed = started.elapsed();
        let check = match outcome {
            Ok(()) => HealthCheck::pass(STORAGE_CHECK, elapsed),
            Err(e) => {
                tracing::warn!(error = %e, "Storage readiness check failed");
                HealthCheck::fail(STORAGE_CHECK, e.to_string(), elapsed)
            }
        };

        HealthReport::from_checks(vec![check], started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::telemetry_repository::ScanResult;
    use crate::domain::health::HealthStatus;
    use crate::domain::query::{PageRequest, TelemetryFilter};
    use crate::domain::telemetry::TelemetryEvent;
    use async_trait::async_trait;

    enum Ping {
        Ok,
        Fail,
        Hang,
    }

    struct PingRepository(Ping);

    #[async_trait]
    impl TelemetryRepository for PingRepository {
        async fn insert_many(&self, _events: &[TelemetryEvent]) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn scan(
            &self,
            _filter: &TelemetryFilter,
            _page: &PageRequest,
        ) -> Result<ScanResult, RepositoryError> {
            Ok(ScanResult::default())
        }

        async fn ping(&self) -> Result<(), RepositoryError> {
            match self.0 {
                Ping::Ok => Ok(()),
                Ping::Fail => Err(RepositoryError::Database(sqlx::Error::PoolClosed)),
                Ping::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                }
            }
        }
    }

    fn service(ping: Ping) -> HealthService {
        HealthService::new(Arc::new(PingRepository(ping)), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_liveness_has_no_dependencies() {
        let report = service(Ping::Fail).liveness();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.entries[0].name, "self");
    }

    #[tokio::test]
    async fn test_readiness_reports_storage() {
        let report = service(Ping::Ok).readiness().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.entries[0].name, "storage");

        let report = service(Ping::Fail).readiness().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.entries[0].error.as_deref().unwrap().contains("database error"));
    }

    #[tokio::test]
    async fn test_readiness_times_out_slow_storage() {
        let started = Instant::now();
        let report = service(Ping::Hang).readiness().await;

        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.entries[0].error.as_deref().unwrap().contains("did not respond"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
