// Telemetry event domain models
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Upper bound, in characters, for `source` and `metricName`.
pub const MAX_LABEL_CHARS: usize = 100;

/// A persisted measurement. Never mutated after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub metric_name: String,
    pub metric_value: f64,
}

/// Ingestion payload as received on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestBatch {
    #[serde(default)]
    pub events: Vec<CandidateEvent>,
}

/// An event that has not been validated yet. Fields are kept as raw JSON so
/// that a missing value or a value of the wrong type surfaces as a
/// field-level validation violation instead of a body rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEvent {
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub source: Option<Value>,
    #[serde(default)]
    pub metric_name: Option<Value>,
    #[serde(default)]
    pub metric_value: Option<Value>,
}

/// A validated event waiting for an identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTelemetryEvent {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub metric_name: String,
    pub metric_value: f64,
}

impl NewTelemetryEvent {
    pub fn with_id(self, id: Uuid) -> TelemetryEvent {
        TelemetryEvent {
            id,
            timestamp: self.timestamp,
            source: self.source,
            metric_name: self.metric_name,
            metric_value: self.metric_value,
        }
    }
}

/// Parse an ISO-8601 timestamp. Values without an offset are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 11, 8, 5, 28, 50).unwrap();
        assert_eq!(parse_timestamp("2025-11-08T05:28:50Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-08T07:28:50+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-08T05:28:50"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_candidate_missing_fields_stay_absent() {
        let batch: IngestBatch = serde_json::from_str(
            r#"{"events":[{"source":"T-001","metricName":"RPM","metricValue":null}]}"#,
        )
        .unwrap();

        let event = &batch.events[0];
        assert!(event.timestamp.is_none());
        assert!(event.metric_value.is_none());
        assert_eq!(event.source, Some(Value::from("T-001")));
    }

    #[test]
    fn test_wrongly_typed_fields_still_deserialize() {
        let batch: IngestBatch = serde_json::from_str(
            r#"{"events":[{"timestamp":"yesterday","source":7,"metricName":"RPM","metricValue":"abc"}]}"#,
        )
        .unwrap();

        let event = &batch.events[0];
        assert_eq!(event.timestamp, Some(Value::from("yesterday")));
        assert_eq!(event.metric_value, Some(Value::from("abc")));
    }

    #[test]
    fn test_missing_events_key_is_empty_batch() {
        let batch: IngestBatch = serde_json::from_str("{}").unwrap();
        assert!(batch.events.is_empty());
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = NewTelemetryEvent {
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            source: "T-001".to_string(),
            metric_name: "RPM".to_string(),
            metric_value: 1500.0,
        }
        .with_id(Uuid::nil());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["metricName"], "RPM");
        assert_eq!(json["metricValue"], 1500.0);
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
    }
}
