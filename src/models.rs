//! Data models for the load-test aggregator.
//!
//! This module contains the raw event records read from k6 NDJSON output
//! and the aggregated result structure every consumer reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Metric name whose points carry the current maximum of virtual users.
pub const VUS_MAX_METRIC: &str = "vus_max";

/// Metric name whose points each represent one completed iteration.
pub const ITERATIONS_METRIC: &str = "iterations";

/// Rate metric k6 emits for every HTTP request (1 = failed).
pub const HTTP_REQ_FAILED_METRIC: &str = "http_req_failed";

/// Type of a metric as declared by its definition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Running total
    Counter,
    /// Point-in-time level
    Gauge,
    /// Share of non-zero values
    Rate,
    /// Distribution of values
    Trend,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Rate => write!(f, "rate"),
            MetricKind::Trend => write!(f, "trend"),
        }
    }
}

impl MetricKind {
    /// Parse a type tag; unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "counter" => Some(MetricKind::Counter),
            "gauge" => Some(MetricKind::Gauge),
            "rate" => Some(MetricKind::Rate),
            "trend" => Some(MetricKind::Trend),
            _ => None,
        }
    }
}

/// Classification of a raw NDJSON record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    MetricDefinition,
    DataPoint,
    ErrorEvent,
    Unrecognized,
}

/// One parsed NDJSON line.
///
/// Fields mirror the k6 JSON output: `type`, `metric` and `data`.
/// String fields that are empty are treated as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEvent {
    /// Raw `type` value (`"Metric"`, `"Point"`, `"Error"`); `None` when
    /// missing, null or an empty string.
    pub type_tag: Option<Value>,
    /// Name of the metric the record refers to.
    pub metric_name: Option<String>,
    /// The `data` object; empty when missing or not an object.
    pub payload: Map<String, Value>,
}

impl RawEvent {
    /// Parse a single line.
    ///
    /// Returns `Ok(None)` for valid JSON that is not an object.
    pub fn parse(line: &str) -> Result<Option<Self>, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;
        Ok(Self::from_value(value))
    }

    /// Build an event from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut object) = value else {
            return None;
        };

        let payload = match object.remove("data") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        Some(Self {
            type_tag: object.remove("type").filter(|tag| match tag {
                Value::Null => false,
                Value::String(s) => !s.is_empty(),
                _ => true,
            }),
            metric_name: non_empty_string(object.get("metric")),
            payload,
        })
    }

    /// Classify the record.
    ///
    /// Records without a `type` tag but with a metric name are points;
    /// some producers omit the tag for point records. A tag that is
    /// present but not one of the known strings is unrecognized.
    pub fn kind(&self) -> EventKind {
        match &self.type_tag {
            Some(Value::String(tag)) => match tag.as_str() {
                "Metric" => EventKind::MetricDefinition,
                "Point" => EventKind::DataPoint,
                "Error" => EventKind::ErrorEvent,
                _ => EventKind::Unrecognized,
            },
            Some(_) => EventKind::Unrecognized,
            None if self.metric_name.is_some() => EventKind::DataPoint,
            None => EventKind::Unrecognized,
        }
    }

    /// Returns true if the record refers to the given metric.
    pub fn is_metric(&self, name: &str) -> bool {
        self.metric_name.as_deref() == Some(name)
    }

    /// Look up a payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Look up a payload field as display text (empty strings and nulls are absent).
    pub fn text_field(&self, key: &str) -> Option<String> {
        display_text(self.payload.get(key))
    }
}

/// A metric definition record.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    pub name: String,
    /// `None` when the declared type is not one of the four known kinds.
    pub kind: Option<MetricKind>,
    /// Unit hint (`time`, `data`, `default`).
    pub contains: Option<String>,
}

impl MetricDefinition {
    /// Build a definition from a `Metric` record.
    pub fn from_event(name: &str, event: &RawEvent) -> Self {
        Self {
            name: name.to_string(),
            kind: event
                .field("type")
                .and_then(Value::as_str)
                .and_then(MetricKind::parse),
            contains: non_empty_string(event.field("contains")),
        }
    }
}

/// A single observation of a metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataPoint {
    /// Numeric value; `None` when missing or not a number.
    pub value: Option<f64>,
    /// Raw timestamp text.
    pub time: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl DataPoint {
    /// Build a point from a `Point` record payload.
    pub fn from_event(event: &RawEvent) -> Self {
        let tags = match event.field("tags") {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(key, value)| display_text(Some(value)).map(|v| (key.clone(), v)))
                .collect(),
            _ => BTreeMap::new(),
        };

        Self {
            value: event.field("value").and_then(Value::as_f64),
            time: non_empty_string(event.field("time")),
            tags,
        }
    }

    /// Value used by the sum/max/distribution reductions.
    pub fn value_or_zero(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    /// Timestamp in milliseconds since the epoch; 0 when unset or unparsable.
    pub fn timestamp_millis(&self) -> i64 {
        self.time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Status of a failed request: an HTTP code or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorStatus {
    Code(serde_json::Number),
    Text(String),
    /// An explicit `error_code` of `null`; serializes as JSON `null`.
    Missing,
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorStatus::Code(code) => write!(f, "{}", code),
            ErrorStatus::Text(text) => write!(f, "{}", text),
            ErrorStatus::Missing => write!(f, "null"),
        }
    }
}

impl From<&Value> for ErrorStatus {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(n) => ErrorStatus::Code(n.clone()),
            Value::String(s) => ErrorStatus::Text(s.clone()),
            Value::Null => ErrorStatus::Missing,
            other => ErrorStatus::Text(other.to_string()),
        }
    }
}

/// Where an error record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    /// An explicit `Error` record.
    ErrorEvent,
    /// A tagged `http_req_failed` point.
    FailedRequest,
}

/// A failed-request occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub url: String,
    pub status: ErrorStatus,
    pub message: String,
    pub endpoint: String,
    pub count: u64,
    pub origin: ErrorOrigin,
}

/// One element of a trend metric's time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Milliseconds since the epoch (0 when unset).
    pub time: i64,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
}

/// Distribution statistics of a trend metric. All fields are absent when
/// the metric has no points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_series: Option<Vec<TimeSeriesPoint>>,
}

/// Reduced view of one metric's points.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricSummary {
    Counter { count: f64 },
    Gauge { value: f64 },
    Rate { passes: u64, fails: u64, rate: f64 },
    Trend(TrendSummary),
}

impl MetricSummary {
    /// Returns the counter total, if this is a counter.
    pub fn count(&self) -> Option<f64> {
        match self {
            MetricSummary::Counter { count } => Some(*count),
            _ => None,
        }
    }

    /// Returns the trend statistics, if this is a trend.
    pub fn trend(&self) -> Option<&TrendSummary> {
        match self {
            MetricSummary::Trend(trend) => Some(trend),
            _ => None,
        }
    }

    /// Returns `(passes, fails, rate)`, if this is a rate.
    pub fn rate(&self) -> Option<(u64, u64, f64)> {
        match self {
            MetricSummary::Rate {
                passes,
                fails,
                rate,
            } => Some((*passes, *fails, *rate)),
            _ => None,
        }
    }
}

/// A summarized metric as exposed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricEntry {
    #[serde(rename = "type")]
    pub kind: MetricKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    pub values: MetricSummary,
}

impl MetricEntry {
    /// Unit suffix derived from the `contains` hint.
    pub fn unit(&self) -> &'static str {
        match self.contains.as_deref() {
            Some("time") => "ms",
            Some("data") => "B",
            _ => "",
        }
    }
}

/// Run-level information gathered while scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootInfo {
    pub max_virtual_users: i64,
    pub iteration_count: u64,
}

/// The complete result of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub metrics: BTreeMap<String, MetricEntry>,
    /// Explicit error records first, then failed-request records.
    pub errored_urls: Vec<ErrorRecord>,
    pub root_info: RootInfo,
    pub processed_at: DateTime<Utc>,
}

impl AggregatedResult {
    /// Look up the summary of a metric.
    pub fn summary(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.get(name).map(|entry| &entry.values)
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Render a scalar as text; empty strings, `null` and `false` count as absent.
fn display_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Null | Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}
