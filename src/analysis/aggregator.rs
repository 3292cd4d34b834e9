//! Aggregation entry points and result assembly.
//!
//! Every pass starts from scratch: the same input always produces the
//! same result, apart from `processed_at`.

use super::classifier::{Classified, LineClassifier};
use super::reducer::reduce_metrics;
use crate::error::AggregateError;
use crate::models::AggregatedResult;
use chrono::Utc;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// Options shared by the batch and live aggregation paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Emit `timeSeries` for trend metrics.
    pub include_time_series: bool,
}

impl AggregateOptions {
    /// Options with time series enabled or disabled.
    pub fn with_time_series(include_time_series: bool) -> Self {
        Self {
            include_time_series,
        }
    }
}

/// Aggregate NDJSON text held in memory.
pub fn aggregate_str(text: &str, options: AggregateOptions) -> AggregatedResult {
    let mut classifier = LineClassifier::new();
    for (index, line) in text.lines().enumerate() {
        classifier.ingest_line(index + 1, line);
    }
    assemble(classifier.finish(), options)
}

/// Aggregate NDJSON read line by line.
///
/// A read failure aborts the pass; no partial result is returned.
pub fn aggregate_reader<R: BufRead>(
    reader: R,
    options: AggregateOptions,
) -> Result<AggregatedResult, AggregateError> {
    let mut classifier = LineClassifier::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| AggregateError::Read {
            line: index + 1,
            source,
        })?;
        classifier.ingest_line(index + 1, &line);
    }
    Ok(assemble(classifier.finish(), options))
}

/// Aggregate an NDJSON results file.
pub fn aggregate_file(
    path: &Path,
    options: AggregateOptions,
) -> Result<AggregatedResult, AggregateError> {
    let file = File::open(path).map_err(|source| AggregateError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    aggregate_reader(BufReader::new(file), options)
}

/// Build the result from the classifier's state.
pub fn assemble(classified: Classified, options: AggregateOptions) -> AggregatedResult {
    let Classified {
        definitions,
        points,
        explicit_errors,
        failed_requests,
        root_info,
        malformed_lines,
    } = classified;

    let metrics = reduce_metrics(&definitions, &points, options.include_time_series);

    let mut errored_urls = explicit_errors;
    errored_urls.extend(failed_requests);

    if malformed_lines > 0 {
        info!("Skipped {} malformed lines", malformed_lines);
    }
    debug!(
        "Aggregated {} metrics, {} error records",
        metrics.len(),
        errored_urls.len()
    );

    AggregatedResult {
        metrics,
        errored_urls,
        root_info,
        processed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorOrigin, MetricSummary};
    use std::io::{Cursor, Read};

    const SAMPLE: &str = include_str!("../../fixtures/sample_results.ndjson");

    fn normalized(mut result: AggregatedResult) -> AggregatedResult {
        result.processed_at = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
        result
    }

    #[test]
    fn test_sample_fixture() {
        let result = aggregate_str(SAMPLE, AggregateOptions::default());

        assert_eq!(
            result.summary("http_reqs"),
            Some(&MetricSummary::Counter { count: 4.0 })
        );
        assert_eq!(result.summary("vus"), Some(&MetricSummary::Gauge { value: 5.0 }));
        assert_eq!(result.summary("checks").and_then(|s| s.rate()), Some((3, 1, 0.75)));

        let duration = result.summary("http_req_duration").and_then(|s| s.trend()).unwrap();
        assert_eq!(duration.min, Some(10.0));
        assert_eq!(duration.max, Some(40.0));
        assert_eq!(duration.avg, Some(25.0));
        assert_eq!(duration.p95, Some(40.0));
        assert!(duration.time_series.is_none());

        assert_eq!(result.root_info.max_virtual_users, 5);
        assert_eq!(result.root_info.iteration_count, 2);
        assert!(!result.metrics.contains_key("orphan_metric"));
    }

    #[test]
    fn test_error_order_and_provenance() {
        let result = aggregate_str(SAMPLE, AggregateOptions::default());
        let origins: Vec<ErrorOrigin> = result.errored_urls.iter().map(|e| e.origin).collect();

        assert_eq!(
            origins,
            vec![
                ErrorOrigin::ErrorEvent,
                ErrorOrigin::FailedRequest,
                ErrorOrigin::FailedRequest
            ]
        );
        assert_eq!(result.errored_urls[0].url, "https://test.k6.io/login");
        assert_eq!(result.errored_urls[1].url, "https://test.k6.io/login");
        assert_eq!(result.errored_urls[1].count, 2);
        assert_eq!(result.errored_urls[2].count, 1);
    }

    #[test]
    fn test_time_series_option() {
        let result = aggregate_str(SAMPLE, AggregateOptions::with_time_series(true));
        let duration = result.summary("http_req_duration").and_then(|s| s.trend()).unwrap();
        let series = duration.time_series.as_ref().unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series[0].value, 10.0);
        assert_eq!(series[0].tags.get("name").map(String::as_str), Some("login"));
    }

    #[test]
    fn test_deterministic() {
        let first = normalized(aggregate_str(SAMPLE, AggregateOptions::default()));
        let second = normalized(aggregate_str(SAMPLE, AggregateOptions::default()));
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_garbage_lines_do_not_change_result() {
        let clean = normalized(aggregate_str(SAMPLE, AggregateOptions::default()));
        let lines: Vec<&str> = SAMPLE.lines().collect();

        for position in [0, lines.len() / 2, lines.len()] {
            let mut noisy = lines.clone();
            noisy.insert(position, "{\"type\": \"Point\", broken");
            let text = noisy.join("\n");
            let result = normalized(aggregate_str(&text, AggregateOptions::default()));
            assert_eq!(result, clean, "garbage at line {}", position);
        }
    }

    #[test]
    fn test_reader_matches_str() {
        let from_str = normalized(aggregate_str(SAMPLE, AggregateOptions::default()));
        let from_reader = normalized(
            aggregate_reader(Cursor::new(SAMPLE), AggregateOptions::default()).unwrap(),
        );
        assert_eq!(from_str, from_reader);
    }

    #[test]
    fn test_defined_metric_without_points() {
        let text = concat!(
            r#"{"type":"Metric","metric":"vus_peak","data":{"type":"gauge"}}"#,
            "\n",
            r#"{"type":"Metric","metric":"latency","data":{"type":"trend","contains":"time"}}"#,
        );
        let result = aggregate_str(text, AggregateOptions::default());

        assert_eq!(result.summary("vus_peak"), Some(&MetricSummary::Gauge { value: 0.0 }));
        let latency = &result.metrics["latency"];
        assert_eq!(latency.contains.as_deref(), Some("time"));
        assert_eq!(latency.values.trend(), Some(&Default::default()));
    }

    #[test]
    fn test_unknown_metric_type_has_no_summary() {
        let text = concat!(
            r#"{"type":"Metric","metric":"weird","data":{"type":"histogram"}}"#,
            "\n",
            r#"{"type":"Point","metric":"weird","data":{"value":3}}"#,
        );
        let result = aggregate_str(text, AggregateOptions::default());
        assert!(result.metrics.is_empty());
    }

    #[test]
    fn test_only_known_type_tags_feed_buffers() {
        let text = [
            r#"{"type":"Metric","metric":"c","data":{"type":"counter"}}"#,
            r#"{"type":5,"metric":"c","data":{"value":7}}"#,
            r#"{"type":true,"metric":"c","data":{"value":7}}"#,
            r#"{"type":"Error","metric":"c","data":{"error_code":null}}"#,
        ]
        .join("\n");
        let result = aggregate_str(&text, AggregateOptions::default());

        assert_eq!(result.summary("c"), Some(&MetricSummary::Counter { count: 0.0 }));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["erroredUrls"][0]["status"], serde_json::Value::Null);
    }

    #[test]
    fn test_empty_input() {
        let result = aggregate_str("", AggregateOptions::default());
        assert!(result.metrics.is_empty());
        assert!(result.errored_urls.is_empty());
        assert_eq!(result.root_info.max_virtual_users, 0);
        assert_eq!(result.root_info.iteration_count, 0);
    }

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.served {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
            }
            self.served = true;
            let line = b"{\"metric\":\"vus\",\"data\":{\"value\":1}}\n";
            buf[..line.len()].copy_from_slice(line);
            Ok(line.len())
        }
    }

    #[test]
    fn test_read_failure_fails_the_pass() {
        let reader = BufReader::new(FailingReader { served: false });
        let err = aggregate_reader(reader, AggregateOptions::default()).unwrap_err();
        assert!(matches!(err, AggregateError::Read { line: 2, .. }));
    }

    #[test]
    fn test_invalid_utf8_fails_the_pass() {
        let bytes: &[u8] = b"{\"metric\":\"vus\"}\n\xff\xfe\n";
        let err = aggregate_reader(Cursor::new(bytes), AggregateOptions::default()).unwrap_err();
        assert!(matches!(err, AggregateError::Read { line: 2, .. }));
    }

    #[test]
    fn test_aggregate_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let result = aggregate_file(&path, AggregateOptions::default()).unwrap();
        assert_eq!(result.root_info.iteration_count, 2);

        let missing = aggregate_file(&dir.path().join("nope.json"), AggregateOptions::default());
        assert!(matches!(missing, Err(AggregateError::Open { .. })));
    }
}
