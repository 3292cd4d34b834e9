//! HTML report generation.
//!
//! This module renders the static HTML summary page from an
//! aggregated result.

use crate::models::{AggregatedResult, ErrorRecord, MetricEntry, MetricSummary};
use anyhow::{Context, Result};
use chrono::Local;
use std::path::Path;

/// Headline numbers shared by the HTML report and the console summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Headline {
    pub total_requests: f64,
    pub failed_requests: u64,
    pub avg_duration: f64,
    pub p95_duration: f64,
    pub max_duration: f64,
    pub checks_passed: u64,
    pub checks_failed: u64,
    pub checks_rate: f64,
}

impl Headline {
    /// Extract the well-known k6 metrics; missing ones read as zero.
    pub fn from_result(result: &AggregatedResult) -> Self {
        let count = |name: &str| result.summary(name).and_then(MetricSummary::count);
        let rate = |name: &str| result.summary(name).and_then(MetricSummary::rate);
        let duration = result
            .summary("http_req_duration")
            .and_then(MetricSummary::trend);

        let (checks_passed, checks_failed, checks_rate) = rate("checks").unwrap_or_default();

        Self {
            total_requests: count("http_reqs").unwrap_or(0.0),
            // `passes` of http_req_failed counts requests that did fail.
            failed_requests: rate("http_req_failed").map(|(p, _, _)| p).unwrap_or(0),
            avg_duration: duration.and_then(|d| d.avg).unwrap_or(0.0),
            p95_duration: duration.and_then(|d| d.p95).unwrap_or(0.0),
            max_duration: duration.and_then(|d| d.max).unwrap_or(0.0),
            checks_passed,
            checks_failed,
            checks_rate,
        }
    }

    /// CSS class for the checks success rate.
    pub fn checks_class(&self) -> &'static str {
        if self.checks_rate >= 0.95 {
            "success"
        } else if self.checks_rate >= 0.9 {
            "warning"
        } else {
            "danger"
        }
    }
}

/// Generate the complete HTML report.
pub fn generate_html_report(result: &AggregatedResult) -> String {
    let headline = Headline::from_result(result);
    let mut output = String::new();

    output.push_str(&generate_head());
    output.push_str("<body>\n  <h1>K6 Load Test Report</h1>\n");
    output.push_str(&format!(
        "  <p>Report generated: {}</p>\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    output.push_str(&format!(
        "  <p>Data processed: {}</p>\n\n",
        result.processed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output.push_str(&generate_cards_section(&headline));
    output.push_str(&generate_errors_section(&result.errored_urls));
    output.push_str(&generate_checks_section(&headline));
    output.push_str(&generate_http_section(&headline));
    output.push_str(&generate_load_section(result));
    output.push_str(&generate_metrics_section(result));

    output.push_str("</body>\n</html>\n");
    output
}

fn generate_head() -> String {
    let mut head = String::new();

    head.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    head.push_str("  <meta charset=\"UTF-8\">\n");
    head.push_str(
        "  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    head.push_str("  <title>K6 Load Test Report</title>\n");
    head.push_str("  <style>\n");
    head.push_str(STYLE);
    head.push_str("  </style>\n</head>\n");

    head
}

const STYLE: &str = r#"    body { font-family: Arial, sans-serif; line-height: 1.6; max-width: 1200px; margin: 0 auto; padding: 20px; color: #333; }
    h1, h2, h3 { color: #0066cc; }
    .metrics { display: grid; grid-template-columns: repeat(auto-fill, minmax(300px, 1fr)); gap: 20px; margin-bottom: 20px; }
    .metric-card { background-color: #fff; border: 1px solid #ddd; border-radius: 5px; padding: 15px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
    .metric-value { font-size: 24px; font-weight: bold; color: #0066cc; }
    .success { color: #28a745; }
    .warning { color: #ffc107; }
    .danger { color: #dc3545; }
    table { width: 100%; border-collapse: collapse; margin-bottom: 20px; }
    th, td { padding: 12px 15px; border-bottom: 1px solid #ddd; text-align: left; }
    th { background-color: #f8f8f8; }
    tr:hover { background-color: #f5f5f5; }
"#;

fn card(title: &str, value: &str, class: &str) -> String {
    let class = if class.is_empty() {
        "metric-value".to_string()
    } else {
        format!("metric-value {}", class)
    };
    format!(
        "    <div class=\"metric-card\">\n      <h3>{}</h3>\n      <div class=\"{}\">{}</div>\n    </div>\n",
        title, class, value
    )
}

fn generate_cards_section(headline: &Headline) -> String {
    let mut section = String::new();
    let failed_class = if headline.failed_requests > 0 {
        "danger"
    } else {
        "success"
    };

    section.push_str("  <div class=\"metrics\">\n");
    section.push_str(&card(
        "Total Requests",
        &format_number(headline.total_requests),
        "",
    ));
    section.push_str(&card(
        "Failed Requests",
        &headline.failed_requests.to_string(),
        failed_class,
    ));
    section.push_str(&card(
        "Checks Success Rate",
        &format!("{:.2}%", headline.checks_rate * 100.0),
        headline.checks_class(),
    ));
    section.push_str(&card(
        "Average Response Time",
        &format!("{:.2} ms", headline.avg_duration),
        "",
    ));
    section.push_str(&card(
        "95th Percentile",
        &format!("{:.2} ms", headline.p95_duration),
        "",
    ));
    section.push_str(&card(
        "Max Response Time",
        &format!("{:.2} ms", headline.max_duration),
        "",
    ));
    section.push_str("  </div>\n\n");

    section
}

fn generate_errors_section(errors: &[ErrorRecord]) -> String {
    let mut section = String::new();

    section.push_str("  <h2>Failed Request URLs</h2>\n");
    if errors.is_empty() {
        section.push_str("  <p>No failed requests detected.</p>\n\n");
        return section;
    }

    section.push_str("  <table>\n");
    section.push_str(
        "    <tr><th>Endpoint</th><th>URL</th><th>Status</th><th>Message</th><th>Count</th></tr>\n",
    );
    for error in errors {
        section.push_str(&format!(
            "    <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&error.endpoint),
            escape_html(&error.url),
            escape_html(&error.status.to_string()),
            escape_html(&error.message),
            error.count
        ));
    }
    section.push_str("  </table>\n\n");

    section
}

fn two_column_table(title: &str, rows: &[(&str, String)]) -> String {
    let mut section = String::new();

    section.push_str(&format!("  <h2>{}</h2>\n  <table>\n", title));
    section.push_str("    <tr><th>Metric</th><th>Value</th></tr>\n");
    for (label, value) in rows {
        section.push_str(&format!(
            "    <tr><td>{}</td><td>{}</td></tr>\n",
            label, value
        ));
    }
    section.push_str("  </table>\n\n");

    section
}

fn generate_checks_section(headline: &Headline) -> String {
    two_column_table(
        "Checks",
        &[
            ("Passed Checks", headline.checks_passed.to_string()),
            ("Failed Checks", headline.checks_failed.to_string()),
            (
                "Success Rate",
                format!("{:.2}%", headline.checks_rate * 100.0),
            ),
        ],
    )
}

fn generate_http_section(headline: &Headline) -> String {
    two_column_table(
        "HTTP Request Details",
        &[
            ("Total Requests", format_number(headline.total_requests)),
            ("Failed Requests", headline.failed_requests.to_string()),
            ("Average Duration", format!("{:.2} ms", headline.avg_duration)),
            ("95th Percentile", format!("{:.2} ms", headline.p95_duration)),
            ("Maximum Duration", format!("{:.2} ms", headline.max_duration)),
        ],
    )
}

fn generate_load_section(result: &AggregatedResult) -> String {
    two_column_table(
        "Load Profile",
        &[
            (
                "Virtual Users (max)",
                result.root_info.max_virtual_users.to_string(),
            ),
            (
                "Iterations Completed",
                result.root_info.iteration_count.to_string(),
            ),
        ],
    )
}

/// Table of every summarized metric.
fn generate_metrics_section(result: &AggregatedResult) -> String {
    let mut section = String::new();

    section.push_str("  <h2>All Metrics</h2>\n");
    if result.metrics.is_empty() {
        section.push_str("  <p>No metric definitions found.</p>\n");
        return section;
    }

    section.push_str("  <table>\n    <tr><th>Metric</th><th>Type</th><th>Summary</th></tr>\n");
    for (name, entry) in &result.metrics {
        section.push_str(&format!(
            "    <tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(name),
            entry.kind,
            escape_html(&describe_entry(entry))
        ));
    }
    section.push_str("  </table>\n");

    section
}

/// One-line description of a metric summary, with units.
pub fn describe_entry(entry: &MetricEntry) -> String {
    let unit = entry.unit();
    let with_unit = |v: f64| {
        if unit.is_empty() {
            format_number(v)
        } else {
            format!("{} {}", format_number(v), unit)
        }
    };

    match &entry.values {
        MetricSummary::Counter { count } => format!("count={}", with_unit(*count)),
        MetricSummary::Gauge { value } => format!("value={}", with_unit(*value)),
        MetricSummary::Rate {
            passes,
            fails,
            rate,
        } => format!(
            "{:.2}% ({} passes, {} fails)",
            rate * 100.0,
            passes,
            fails
        ),
        MetricSummary::Trend(trend) => match (trend.min, trend.avg, trend.p95, trend.max) {
            (Some(min), Some(avg), Some(p95), Some(max)) => format!(
                "min={} avg={} p95={} max={}",
                with_unit(min),
                with_unit(avg),
                with_unit(p95),
                with_unit(max)
            ),
            _ => "no data".to_string(),
        },
    }
}

/// Integral values print without decimals, others with two.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

/// Escape text for inclusion in HTML.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Write the HTML report to a file.
pub fn write_html_report(result: &AggregatedResult, path: &Path) -> Result<()> {
    let content = generate_html_report(result);
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Generate a JSON snapshot of the result.
pub fn generate_json_report(result: &AggregatedResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}

/// Write a JSON snapshot to a file.
pub fn write_json_report(result: &AggregatedResult, path: &Path) -> Result<()> {
    let content = generate_json_report(result)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write snapshot to {}", path.display()))
}
