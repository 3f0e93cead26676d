// Query domain models - Filters, pagination and result pages
use super::telemetry::TelemetryEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 500;

/// Closed interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Filter applied to the event set before ordering and paging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryFilter {
    pub source: Option<String>,
    pub range: Option<TimeRange>,
}

impl TelemetryFilter {
    /// Build a filter from raw request values.
    ///
    /// A blank source is no filter. The date range only applies when both
    /// bounds are present; a single bound is ignored rather than treated as
    /// an open-ended range.
    pub fn new(
        source: Option<String>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        let source = source.filter(|s| !s.trim().is_empty());
        let range = match (start, end) {
            (Some(start), Some(end)) => Some(TimeRange { start, end }),
            (None, None) => None,
            _ => {
                tracing::debug!("Ignoring date filter with a single bound");
                None
            }
        };

        Self { source, range }
    }

    #[cfg(test)]
    pub fn matches(&self, event: &TelemetryEvent) -> bool {
        let source_ok = self.source.as_deref().is_none_or(|s| s == event.source);
        let range_ok = self.range.is_none_or(|r| r.contains(event.timestamp));
        source_ok && range_ok
    }
}

/// Normalized pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    page_size: u32,
}

impl PageRequest {
    /// Pages below 1 become 1; sizes outside `[1, 500]` fall back to 100.
    pub fn normalized(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.map_or(1, |p| p.max(1) as u64);
        let page_size = match page_size {
            Some(size) if (1..=i64::from(MAX_PAGE_SIZE)).contains(&size) => size as u32,
            _ => DEFAULT_PAGE_SIZE,
        };

        Self { page, page_size }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(u64::from(self.page_size))
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::normalized(None, None)
    }
}

/// One page of results plus the total number of matching events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    pub items: Vec<TelemetryEvent>,
    pub total_count: u64,
    pub page: u64,
    pub page_size: u32,
}
