// Ingestion service - Use case for persisting validated batches
use crate::application::telemetry_repository::{RepositoryError, TelemetryRepository};
use crate::application::validator::ValidatedBatch;
use crate::domain::telemetry::TelemetryEvent;
use std::sync::Arc;
use uuid::Uuid;

/// Identifiers assigned to a persisted batch, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub ids: Vec<Uuid>,
}

impl IngestReceipt {
    pub fn inserted(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Clone)]
pub struct IngestionService {
    repository: Arc<dyn TelemetryRepository>,
}

impl IngestionService {
    pub fn new(repository: Arc<dyn TelemetryRepository>) -> Self {
        Self { repository }
    }

    /// Assign fresh identifiers and persist the batch atomically.
    ///
    /// Not retried on failure: a retry after an ambiguous commit could
    /// double-insert the batch.
    pub async fn ingest(&self, batch: ValidatedBatch) -> Result<IngestReceipt, RepositoryError> {
        tracing::debug!(events = batch.len(), "Persisting telemetry batch");
        let events: Vec<TelemetryEvent> = batch
            .into_events()
            .into_iter()
            .map(|e| e.with_id(Uuid::new_v4()))
            .collect();

        self.repository.insert_many(&events).await?;

        tracing::info!(inserted = events.len(), "Telemetry batch persisted");
        Ok(IngestReceipt {
            ids: events.into_iter().map(|e| e.id).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::telemetry_repository::ScanResult;
    use crate::application::validator::validate_batch;
    use crate::domain::query::{PageRequest, TelemetryFilter};
    use crate::domain::telemetry::{CandidateEvent, IngestBatch};
    use async_trait::async_trait;
    use crate::application::query_service::{QueryParams, QueryService};
    use crate::infrastructure::config::StorageSettings;
    use crate::infrastructure::sqlite_repository::SqliteRepository;
    use serde_json::json;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingRepository {
        batches: Mutex<Vec<Vec<TelemetryEvent>>>,
        fail: bool,
    }

    #[async_trait]
    impl TelemetryRepository for RecordingRepository {
        async fn insert_many(&self, events: &[TelemetryEvent]) -> Result<(), RepositoryError> {
            if self.fail {
                return Err(RepositoryError::Database(sqlx::Error::PoolClosed));
            }
            self.batches.lock().await.push(events.to_vec());
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
            Ok(())
        }
    }

    fn batch(n: usize) -> ValidatedBatch {
        let events = (0..n)
            .map(|i| CandidateEvent {
                timestamp: Some(json!("2025-11-08T05:00:00Z")),
                source: Some(json!("T-001")),
                metric_name: Some(json!(format!("metric-{i}"))),
                metric_value: Some(json!(i as f64)),
            })
            .collect();
        validate_batch(IngestBatch { events }).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_assigns_unique_ids_in_one_call() {
        let repo = Arc::new(RecordingRepository::default());
        let service = IngestionService::new(repo.clone());

        let receipt = service.ingest(batch(50)).await.unwrap();
        assert_eq!(receipt.inserted(), 50);

        let unique: HashSet<_> = receipt.ids.iter().collect();
        assert_eq!(unique.len(), 50);

        let batches = repo.batches.lock().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 50);
        assert_eq!(batches[0][7].metric_name, "metric-7");
        assert_eq!(batches[0][7].id, receipt.ids[7]);
    }

    #[tokio::test]
    async fn test_ingest_surfaces_storage_failure() {
        let repo = Arc::new(RecordingRepository {
            fail: true,
            ..Default::default()
        });
        let service = IngestionService::new(repo);

        let err = service.ingest(batch(2)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Database(_)));
    }

    #[tokio::test]
    async fn test_ingested_ids_are_queryable_from_sqlite() {
        let settings = StorageSettings {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        let repo: Arc<dyn TelemetryRepository> =
            Arc::new(SqliteRepository::connect(&settings).await.unwrap());
        let service = IngestionService::new(repo.clone());

        let receipt = service.ingest(batch(25)).await.unwrap();

        let page = QueryService::new(repo)
            .query(QueryParams {
                page_size: Some(500),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total_count, receipt.ids.len() as u64);

        let stored: HashSet<_> = page.items.iter().map(|e| e.id).collect();
        assert!(receipt.ids.iter().all(|id| stored.contains(id)));
    }
}
