//! Console summary of an aggregated result.

use super::generator::{format_number, Headline};
use crate::models::AggregatedResult;
use chrono::Local;

/// Render the plain-text summary block printed after a batch run.
pub fn generate_console_summary(result: &AggregatedResult) -> String {
    let headline = Headline::from_result(result);
    let mut lines = Vec::new();

    lines.push(String::new());
    lines.push("===== K6 LOAD TEST SUMMARY =====".to_string());
    lines.push(format!("Date: {}", Local::now().format("%Y-%m-%d %H:%M:%S")));

    lines.push(String::new());
    lines.push("=== HTTP REQUESTS ===".to_string());
    lines.push(format!(
        "Total requests: {}",
        format_number(headline.total_requests)
    ));
    lines.push(format!("Failed requests: {}", headline.failed_requests));
    lines.push(format!(
        "Average response time: {:.2}ms",
        headline.avg_duration
    ));
    lines.push(format!("95th percentile: {:.2}ms", headline.p95_duration));

    lines.push(String::new());
    lines.push("=== CHECKS ===".to_string());
    lines.push(format!("Passed checks: {}", headline.checks_passed));
    lines.push(format!("Failed checks: {}", headline.checks_failed));
    lines.push(format!(
        "Success rate: {:.2}%",
        headline.checks_rate * 100.0
    ));

    lines.push(String::new());
    lines.push("=== LOAD TESTING ===".to_string());
    lines.push(format!(
        "Virtual users max: {}",
        result.root_info.max_virtual_users
    ));
    lines.push(format!(
        "Iterations completed: {}",
        result.root_info.iteration_count
    ));

    if !result.errored_urls.is_empty() {
        lines.push(String::new());
        lines.push("=== FAILED REQUEST URLS ===".to_string());
        for error in &result.errored_urls {
            lines.push(format!(
                "[{}] {} - Status: {} ({} occurrences)",
                error.endpoint, error.url, error.status, error.count
            ));
        }
    }

    lines.push(String::new());
    lines.push("===============================".to_string());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate_str, AggregateOptions};

    #[test]
    fn test_console_summary() {
        let result = aggregate_str(
            include_str!("../../fixtures/sample_results.ndjson"),
            AggregateOptions::default(),
        );
        let text = generate_console_summary(&result);

        assert!(text.contains("Total requests: 4"));
        assert!(text.contains("Failed requests: 3"));
        assert!(text.contains("Success rate: 75.00%"));
        assert!(text.contains("Virtual users max: 5"));
        assert!(text.contains("Iterations completed: 2"));
        assert!(text.contains(
            "[POST /login] https://test.k6.io/login - Status: 503 (1 occurrences)"
        ));
        assert!(text.contains("[login] https://test.k6.io/login - Status: 503 (2 occurrences)"));
    }

    #[test]
    fn test_console_summary_without_errors() {
        let result = aggregate_str("", AggregateOptions::default());
        let text = generate_console_summary(&result);

        assert!(!text.contains("FAILED REQUEST URLS"));
        assert!(text.contains("Total requests: 0"));
    }
}
