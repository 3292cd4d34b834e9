//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// LoadReport - k6 results aggregator
///
/// Turns the NDJSON output of `k6 run --out json=results.json` into an
/// HTML report, or serves a live feed that updates while the test runs.
///
/// Examples:
///   loadreport
///   loadreport --input out/results.json --output-dir site
///   loadreport --format json --time-series
///   loadreport --watch --port 3000
///   loadreport --init-config
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// NDJSON results file to aggregate
    ///
    /// Defaults to results.json, or the value in .loadreport.toml.
    #[arg(short, long, value_name = "FILE", env = "LOADREPORT_INPUT")]
    pub input: Option<PathBuf>,

    /// Directory the report is written to
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report format (html, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Include trend time series in the batch output
    #[arg(long)]
    pub time_series: bool,

    /// Serve a live feed instead of writing a report
    ///
    /// Re-aggregates the input whenever it changes and pushes each
    /// snapshot to subscribers of /api/events.
    #[arg(short, long)]
    pub watch: bool,

    /// Port for the live feed
    #[arg(long, value_name = "PORT", env = "PORT")]
    pub port: Option<u16>,

    /// Address the live feed binds to
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Quiet period before re-reading a changed file, in milliseconds
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .loadreport.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .loadreport.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the batch report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// HTML page (default)
    #[default]
    Html,
    /// JSON snapshot of the aggregated result
    Json,
}

impl OutputFormat {
    /// File name used when none is configured.
    pub fn default_file_name(&self) -> &'static str {
        match self {
            OutputFormat::Html => "report.html",
            OutputFormat::Json => "results.json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.port == Some(0) {
            return Err("Port must be between 1 and 65535".to_string());
        }

        if self.watch && (self.format.is_some() || self.output_dir.is_some()) {
            return Err("--format and --output-dir do not apply with --watch".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
