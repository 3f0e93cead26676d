// SQLite repository implementation
use crate::application::telemetry_repository::{RepositoryError, ScanResult, TelemetryRepository};
use crate::domain::query::{PageRequest, TelemetryFilter};
use crate::domain::telemetry::TelemetryEvent;
use crate::infrastructure::config::StorageSettings;
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use uuid::Uuid;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS telemetry_event (
    id           TEXT PRIMARY KEY NOT NULL,
    timestamp_us INTEGER NOT NULL,
    source       TEXT NOT NULL CHECK (length(source) BETWEEN 1 AND 100),
    metric_name  TEXT NOT NULL CHECK (length(metric_name) BETWEEN 1 AND 100),
    metric_value REAL NOT NULL
)
"#;

const CREATE_SOURCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS ix_telemetry_source_timestamp
ON telemetry_event (source, timestamp_us DESC)
"#;

const CREATE_TIMESTAMP_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS ix_telemetry_timestamp
ON telemetry_event (timestamp_us DESC)
"#;

const INSERT_EVENT: &str = r#"
INSERT INTO telemetry_event (id, timestamp_us, source, metric_name, metric_value)
VALUES (?, ?, ?, ?, ?)
"#;

/// Pooled SQLite store. Timestamps are kept as microseconds since the Unix epoch.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRepository").finish_non_exhaustive()
    }
}

impl SqliteRepository {
    /// Open the pool and create the schema if it does not exist yet.
    ///
    /// In-memory databases live only as long as their connection, so they are
    /// pinned to one connection that is never recycled.
    pub async fn connect(settings: &StorageSettings) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(&settings.url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout());

        if is_in_memory(&settings.url) {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        let repository = Self { pool };
        repository.ensure_schema().await?;

        tracing::info!(url = %settings.url, "Telemetry store ready");
        Ok(repository)
    }

    async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        for ddl in [CREATE_TABLE, CREATE_SOURCE_INDEX, CREATE_TIMESTAMP_INDEX] {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &TelemetryFilter) {
    let mut separator = " WHERE ";

    if let Some(source) = &filter.source {
        builder.push(separator).push("source = ").push_bind(source.clone());
        separator = " AND ";
    }

    if let Some(range) = &filter.range {
        builder
            .push(separator)
            .push("timestamp_us BETWEEN ")
            .push_bind(range.start.timestamp_micros())
            .push(" AND ")
            .push_bind(range.end.timestamp_micros());
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn map_row(row: &SqliteRow) -> Result<TelemetryEvent, RepositoryError> {
    let raw_id: String = row.try_get("id")?;
    let id = Uuid::parse_str(&raw_id)
        .map_err(|e| RepositoryError::Corrupt(format!("id {raw_id}: {e}")))?;

    let micros: i64 = row.try_get("timestamp_us")?;
    let timestamp = DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| RepositoryError::Corrupt(format!("timestamp {micros} out of range")))?;

    Ok(TelemetryEvent {
        id,
        timestamp,
        source: row.try_get("source")?,
        metric_name: row.try_get("metric_name")?,
        metric_value: row.try_get("metric_value")?,
    })
}

#[async_trait]
impl TelemetryRepository for SqliteRepository {
    async fn insert_many(&self, events: &[TelemetryEvent]) -> Result<(), RepositoryError> {
        // Dropping the transaction without commit (error or cancellation) rolls it back.
        let mut tx = self.pool.begin().await?;

        for event in events {
            sqlx::query(INSERT_EVENT)
                .bind(event.id.to_string())
                .bind(event.timestamp.timestamp_micros())
                .bind(&event.source)
                .bind(&event.metric_name)
                .bind(event.metric_value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn scan(
        &self,
        filter: &TelemetryFilter,
        page: &PageRequest,
    ) -> Result<ScanResult, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM telemetry_event");
        push_filter(&mut count_query, filter);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&mut *tx)
            .await?;

        let mut items_query = QueryBuilder::<Sqlite>::new(
            "SELECT id, timestamp_us, source, metric_name, metric_value FROM telemetry_event",
        );
        push_filter(&mut items_query, filter);
        items_query
            .push(" ORDER BY timestamp_us DESC, id DESC LIMIT ")
            .push_bind(to_i64(page.limit()))
            .push(" OFFSET ")
            .push_bind(to_i64(page.offset()));

        let rows = items_query.build().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let items = rows.iter().map(map_row).collect::<Result<Vec<_>, _>>()?;
        Ok(ScanResult {
            items,
            total_count: total.max(0) as u64,
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::NewTelemetryEvent;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashSet;

    async fn repository() -> SqliteRepository {
        let settings = StorageSettings {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        SqliteRepository::connect(&settings).await.unwrap()
    }

    fn event(source: &str, minutes: i64, value: f64) -> TelemetryEvent {
        let base = Utc.with_ymd_and_hms(2025, 11, 8, 0, 0, 0).unwrap();
        NewTelemetryEvent {
            timestamp: base + Duration::minutes(minutes),
            source: source.to_string(),
            metric_name: "RPM".to_string(),
            metric_value: value,
        }
        .with_id(Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_ping() {
        let repo = repository().await;
        repo.ping().await.unwrap();

        repo.close().await;
        assert!(repo.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_round_trip_preserves_fields() {
        let repo = repository().await;
        let original = event("T-001", 3, 1500.25);
        repo.insert_many(std::slice::from_ref(&original)).await.unwrap();

        let scan = repo
            .scan(&TelemetryFilter::default(), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(scan.total_count, 1);
        assert_eq!(scan.items, vec![original]);
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_nothing_behind() {
        let repo = repository().await;
        let first = event("T-001", 1, 1.0);
        let mut duplicate = event("T-001", 2, 2.0);
        duplicate.id = first.id;

        let result = repo.insert_many(&[first, event("T-001", 3, 3.0), duplicate]).await;
        assert!(matches!(result, Err(RepositoryError::Database(_))));

        let scan = repo
            .scan(&TelemetryFilter::default(), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(scan.total_count, 0);
        assert!(scan.items.is_empty());
    }

    #[tokio::test]
    async fn test_scan_orders_descending_and_filters() {
        let repo = repository().await;
        let events = vec![
            event("T-001", 0, 1.0),
            event("T-002", 5, 2.0),
            event("T-001", 10, 3.0),
            event("T-001", 20, 4.0),
        ];
        repo.insert_many(&events).await.unwrap();

        let filter = TelemetryFilter::new(Some("T-001".to_string()), None, None);
        let scan = repo.scan(&filter, &PageRequest::default()).await.unwrap();
        let values: Vec<f64> = scan.items.iter().map(|e| e.metric_value).collect();
        assert_eq!(scan.total_count, 3);
        assert_eq!(values, vec![4.0, 3.0, 1.0]);

        let base = Utc.with_ymd_and_hms(2025, 11, 8, 0, 0, 0).unwrap();
        let filter = TelemetryFilter::new(
            None,
            Some(base + Duration::minutes(5)),
            Some(base + Duration::minutes(10)),
        );
        let scan = repo.scan(&filter, &PageRequest::default()).await.unwrap();
        let values: Vec<f64> = scan.items.iter().map(|e| e.metric_value).collect();
        assert_eq!(values, vec![3.0, 2.0]);
        assert!(scan.items.iter().all(|e| filter.matches(e)));
    }

    #[tokio::test]
    async fn test_pages_cover_every_row_once() {
        let repo = repository().await;
        // Shared timestamps exercise the id tie-break.
        let events: Vec<_> = (0..23).map(|i| event("T-009", i / 4, i as f64)).collect();
        repo.insert_many(&events).await.unwrap();

        let mut seen = HashSet::new();
        let mut total = 0;
        for page in 1..=3 {
            let request = PageRequest::normalized(Some(page), Some(10));
            let scan = repo
                .scan(&TelemetryFilter::default(), &request)
                .await
                .unwrap();
            total = scan.total_count;
            assert!(scan.items.len() <= 10);
            for item in scan.items {
                assert!(seen.insert(item.id));
            }
        }

        assert_eq!(total, 23);
        assert_eq!(seen.len(), 23);

        let beyond = repo
            .scan(
                &TelemetryFilter::default(),
                &PageRequest::normalized(Some(4), Some(10)),
            )
            .await
            .unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_count, 23);
    }

    #[tokio::test]
    async fn test_scan_is_repeatable() {
        let repo = repository().await;
        let events: Vec<_> = (0..5).map(|i| event("T-001", 0, i as f64)).collect();
        repo.insert_many(&events).await.unwrap();

        let request = PageRequest::normalized(Some(1), Some(3));
        let first = repo.scan(&TelemetryFilter::default(), &request).await.unwrap();
        let second = repo.scan(&TelemetryFilter::default(), &request).await.unwrap();
        assert_eq!(first, second);
    }
}
