// Batch validator - Structural and semantic checks before persistence
use crate::domain::telemetry::{
    CandidateEvent, IngestBatch, MAX_LABEL_CHARS, NewTelemetryEvent, parse_timestamp,
};
use chrono::{DateTime, SubsecRound, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Stored timestamps keep microsecond precision.
const TIMESTAMP_DIGITS: u16 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// Non-empty set of violations for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    #[cfg(test)]
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// Group messages by field path.
    pub fn to_field_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for v in &self.violations {
            map.entry(v.field.clone()).or_default().push(v.message.clone());
        }
        map
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// A batch that passed validation. Only [`validate_batch`] can build one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBatch {
    events: Vec<NewTelemetryEvent>,
}

impl ValidatedBatch {
    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    #[cfg(test)]
    pub fn events(&self) -> &[NewTelemetryEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<NewTelemetryEvent> {
        self.events
    }
}

/// Validate a batch. Pure; reports every violation, not just the first.
pub fn validate_batch(batch: IngestBatch) -> Result<ValidatedBatch, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if batch.events.is_empty() {
        errors.push("events", "At least one event is required.");
        return Err(errors);
    }

    let mut events = Vec::with_capacity(batch.events.len());
    for (index, candidate) in batch.events.into_iter().enumerate() {
        if let Some(event) = validate_event(index, candidate, &mut errors) {
            events.push(event);
        }
    }

    if errors.is_empty() {
        Ok(ValidatedBatch { events })
    } else {
        Err(errors)
    }
}

fn validate_event(
    index: usize,
    candidate: CandidateEvent,
    errors: &mut ValidationErrors,
) -> Option<NewTelemetryEvent> {
    let path = |field: &str| format!("events[{index}].{field}");

    let timestamp = check_timestamp(candidate.timestamp, &path("timestamp"), errors);
    let source = check_label(candidate.source, "Source", &path("source"), errors);
    let metric_name = check_label(candidate.metric_name, "Metric Name", &path("metricName"), errors);
    let metric_value = check_metric_value(candidate.metric_value, &path("metricValue"), errors);

    Some(NewTelemetryEvent {
        timestamp: timestamp?.trunc_subsecs(TIMESTAMP_DIGITS),
        source: source?,
        metric_name: metric_name?,
        metric_value: metric_value?,
    })
}

fn check_timestamp(
    value: Option<Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<DateTime<Utc>> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            let parsed = parse_timestamp(&s);
            if parsed.is_none() {
                errors.push(field, "'Timestamp' must be an ISO-8601 date and time.");
            }
            parsed
        }
        Some(Value::String(_)) | None => {
            errors.push(field, "'Timestamp' must not be empty.");
            None
        }
        Some(_) => {
            errors.push(field, "'Timestamp' must be an ISO-8601 date and time.");
            None
        }
    }
}

fn check_label(
    value: Option<Value>,
    display: &str,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match value {
        Some(Value::String(v)) if !v.trim().is_empty() => {
            let chars = v.chars().count();
            if chars > MAX_LABEL_CHARS {
                errors.push(
                    field,
                    format!(
                        "The length of '{display}' must be {MAX_LABEL_CHARS} characters or fewer. You entered {chars} characters."
                    ),
                );
                None
            } else {
                Some(v)
            }
        }
        Some(Value::String(_)) | None => {
            errors.push(field, format!("'{display}' must not be empty."));
            None
        }
        Some(_) => {
            errors.push(field, format!("'{display}' must be a string."));
            None
        }
    }
}

fn check_metric_value(
    value: Option<Value>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<f64> {
    match value {
        None => {
            errors.push(field, "'Metric Value' must not be empty.");
            None
        }
        Some(Value::Number(n)) => match n.as_f64().filter(|v| v.is_finite()) {
            Some(v) => Some(v),
            None => {
                errors.push(field, "'Metric Value' must be a finite number.");
                None
            }
        },
        Some(_) => {
            errors.push(field, "'Metric Value' must be a number.");
            None
        }
    }
}
