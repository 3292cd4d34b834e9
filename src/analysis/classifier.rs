//! Line classification.
//!
//! Turns NDJSON lines into metric definitions, per-metric point buffers,
//! error records and the run-level counters. A single line may feed more
//! than one of these.

use crate::models::{
    DataPoint, ErrorOrigin, ErrorRecord, ErrorStatus, EventKind, MetricDefinition, RawEvent,
    RootInfo, HTTP_REQ_FAILED_METRIC, ITERATIONS_METRIC, VUS_MAX_METRIC,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

const UNKNOWN_URL: &str = "Unknown URL";
const UNKNOWN_ENDPOINT: &str = "Unknown Endpoint";
const DEFAULT_MESSAGE: &str = "Request failed";

/// What happened to a single input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Parsed and classified.
    Ingested,
    /// Whitespace only.
    Blank,
    /// Valid JSON, but not an object.
    Ignored,
    /// Not valid JSON.
    Malformed,
}

/// Everything the classifier accumulated over one pass.
#[derive(Debug, Clone, Default)]
pub struct Classified {
    pub definitions: HashMap<String, MetricDefinition>,
    pub points: HashMap<String, Vec<DataPoint>>,
    pub explicit_errors: Vec<ErrorRecord>,
    pub failed_requests: Vec<ErrorRecord>,
    pub root_info: RootInfo,
    pub malformed_lines: usize,
}

/// Streaming line classifier.
#[derive(Debug, Default)]
pub struct LineClassifier {
    state: Classified,
    /// URL -> position in `failed_requests`.
    failed_index: HashMap<String, usize>,
}

impl LineClassifier {
    /// Create an empty classifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and classify one line. Never fails; bad lines are logged and skipped.
    pub fn ingest_line(&mut self, line_number: usize, line: &str) -> LineOutcome {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            debug!("Skipping blank line {}", line_number);
            return LineOutcome::Blank;
        }

        match RawEvent::parse(trimmed) {
            Ok(Some(event)) => {
                self.ingest(&event);
                LineOutcome::Ingested
            }
            Ok(None) => {
                debug!("Ignoring non-object JSON on line {}", line_number);
                LineOutcome::Ignored
            }
            Err(e) => {
                warn!("Skipping invalid JSON line {}: {}", line_number, e);
                self.state.malformed_lines += 1;
                LineOutcome::Malformed
            }
        }
    }

    /// Classify an already-parsed event.
    pub fn ingest(&mut self, event: &RawEvent) {
        match event.kind() {
            EventKind::MetricDefinition => self.record_definition(event),
            EventKind::DataPoint => self.record_point(event),
            EventKind::ErrorEvent => self.record_error_event(event),
            EventKind::Unrecognized => {}
        }

        if is_failed_request(event) {
            self.record_failed_request(event);
        }
    }

    /// Consume the classifier and return the accumulated state.
    pub fn finish(self) -> Classified {
        self.state
    }

    fn record_definition(&mut self, event: &RawEvent) {
        let Some(name) = event.metric_name.as_deref() else {
            debug!("Metric definition without a name");
            return;
        };

        let definition = MetricDefinition::from_event(name, event);
        if definition.kind.is_none() {
            debug!("Metric '{}' declares an unrecognized type", name);
        }
        self.state.definitions.insert(name.to_string(), definition);
    }

    fn record_point(&mut self, event: &RawEvent) {
        let Some(name) = event.metric_name.as_deref() else {
            debug!("Dropping point without a metric name");
            return;
        };

        if name == VUS_MAX_METRIC {
            if let Some(vus) = event.field("value").and_then(parse_leading_int) {
                let root = &mut self.state.root_info;
                root.max_virtual_users = root.max_virtual_users.max(vus);
            }
        }
        if name == ITERATIONS_METRIC {
            self.state.root_info.iteration_count += 1;
        }

        self.state
            .points
            .entry(name.to_string())
            .or_default()
            .push(DataPoint::from_event(event));
    }

    fn record_error_event(&mut self, event: &RawEvent) {
        let Some(code) = event.field("error_code") else {
            return;
        };

        let url = event
            .text_field("scenario")
            .or_else(|| event.text_field("request_url"))
            .unwrap_or_else(|| UNKNOWN_URL.to_string());
        let endpoint = event
            .text_field("endpoint")
            .or_else(|| event.metric_name.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        self.state.explicit_errors.push(ErrorRecord {
            url,
            status: ErrorStatus::from(code),
            message: event
                .text_field("error_message")
                .unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            endpoint,
            count: 1,
            origin: ErrorOrigin::ErrorEvent,
        });
    }

    fn record_failed_request(&mut self, event: &RawEvent) {
        let tags = event.field("tags").and_then(Value::as_object);
        let tag = |key: &str| {
            tags.and_then(|t| t.get(key)).and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::String(_) | Value::Null | Value::Bool(false) => None,
                other => Some(other.to_string()),
            })
        };

        let url = tag("url").unwrap_or_else(|| UNKNOWN_URL.to_string());

        if let Some(&index) = self.failed_index.get(&url) {
            self.state.failed_requests[index].count += 1;
            return;
        }

        let status = tags
            .and_then(|t| t.get("status"))
            .filter(|v| is_truthy(v))
            .map(ErrorStatus::from)
            .unwrap_or_else(|| ErrorStatus::Text("Error".to_string()));

        self.failed_index
            .insert(url.clone(), self.state.failed_requests.len());
        self.state.failed_requests.push(ErrorRecord {
            url,
            status,
            message: DEFAULT_MESSAGE.to_string(),
            endpoint: tag("name").unwrap_or_else(|| UNKNOWN_ENDPOINT.to_string()),
            count: 1,
            origin: ErrorOrigin::FailedRequest,
        });
    }
}

/// A tagged `http_req_failed` point whose value is exactly 1.
fn is_failed_request(event: &RawEvent) -> bool {
    event.is_metric(HTTP_REQ_FAILED_METRIC)
        && event.field("tags").is_some_and(is_truthy)
        && event.field("value").and_then(Value::as_f64) == Some(1.0)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

/// Parse the leading integer of a number or numeric string.
///
/// Numbers are truncated toward zero; strings may carry leading whitespace,
/// a sign and trailing garbage (`" 12vus"` -> 12). Anything else is `None`.
pub fn parse_leading_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim_start();
            let (negative, rest) = match s.as_bytes().first() {
                Some(b'-') => (true, &s[1..]),
                Some(b'+') => (false, &s[1..]),
                _ => (false, s),
            };
            let digits_end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            let magnitude: i64 = rest[..digits_end].parse().ok()?;
            Some(if negative { -magnitude } else { magnitude })
        }
        _ => None,
    }
}
