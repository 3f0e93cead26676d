// Query service - Use case for filtered, paginated reads
use crate::application::telemetry_repository::{RepositoryError, TelemetryRepository};
use crate::domain::query::{PageRequest, QueryPage, TelemetryFilter};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Raw query parameters before normalization.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub source: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Clone)]
pub struct QueryService {
    repository: Arc<dyn TelemetryRepository>,
}

impl QueryService {
    pub fn new(repository: Arc<dyn TelemetryRepository>) -> Self {
        Self { repository }
    }

    pub async fn query(&self, params: QueryParams) -> Result<QueryPage, RepositoryError> {
        let filter = TelemetryFilter::new(params.source, params.start_date, params.end_date);
        let page = PageRequest::normalized(params.page, params.page_size);

        let scan = self.repository.scan(&filter, &page).await?;

        tracing::debug!(
            source = ?filter.source,
            page = page.page(),
            page_size = page.page_size(),
            returned = scan.items.len(),
            total = scan.total_count,
            "Telemetry query served"
        );

        Ok(QueryPage {
            items: scan.items,
            total_count: scan.total_count,
            page: page.page(),
            page_size: page.page_size(),
        })
    }
}
