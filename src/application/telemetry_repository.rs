// Repository trait for telemetry persistence
use crate::domain::query::{PageRequest, TelemetryFilter};
use crate::domain::telemetry::TelemetryEvent;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back into a [`TelemetryEvent`].
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("storage did not respond within {0:?}")]
    Timeout(std::time::Duration),
}

/// Items for one page plus the count of every row matching the filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    pub items: Vec<TelemetryEvent>,
    pub total_count: u64,
}

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Persist all events as one unit: either every event becomes visible or none does.
    async fn insert_many(&self, events: &[TelemetryEvent]) -> Result<(), RepositoryError>;

    /// Filter, order by timestamp descending (id descending on ties) and slice one page.
    /// Count and items are read from the same snapshot.
    async fn scan(
        &self,
        filter: &TelemetryFilter,
        page: &PageRequest,
    ) -> Result<ScanResult, RepositoryError>;

    /// Trivial round-trip to prove the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}
