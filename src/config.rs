//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.loadreport.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".loadreport.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Static report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Live feed settings.
    #[serde(default)]
    pub live: LiveConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// NDJSON results file.
    #[serde(default = "default_input")]
    pub input: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
        }
    }
}

fn default_input() -> PathBuf {
    PathBuf::from("results.json")
}

/// Static report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory the report is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Report file name; defaults depend on the format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Include trend time series in the batch output.
    #[serde(default)]
    pub include_time_series: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_name: None,
            format: OutputFormat::default(),
            include_time_series: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl ReportConfig {
    /// Full path of the report file.
    pub fn output_path(&self) -> PathBuf {
        let file_name = self
            .file_name
            .clone()
            .unwrap_or_else(|| self.format.default_file_name().to_string());
        self.output_dir.join(file_name)
    }
}

/// Live feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Quiet period before re-reading a changed file.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Include trend time series in live snapshots.
    #[serde(default = "default_true")]
    pub include_time_series: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            debounce_ms: default_debounce_ms(),
            include_time_series: true,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

impl LiveConfig {
    /// Socket address to listen on.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr> {
        let addr = format!("{}:{}", self.bind, self.port);
        addr.parse()
            .with_context(|| format!("Invalid bind address: {}", addr))
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.loadreport.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref input) = args.input {
            self.general.input = input.clone();
        }

        if let Some(ref output_dir) = args.output_dir {
            self.report.output_dir = output_dir.clone();
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }
        if args.time_series {
            self.report.include_time_series = true;
        }

        if let Some(ref bind) = args.bind {
            self.live.bind = bind.clone();
        }
        if let Some(port) = args.port {
            self.live.port = port;
        }
        if let Some(debounce) = args.debounce_ms {
            self.live.debounce_ms = debounce;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.input, PathBuf::from("results.json"));
        assert_eq!(config.live.port, 3000);
        assert!(config.live.include_time_series);
        assert!(!config.report.include_time_series);
        assert_eq!(
            config.report.output_path(),
            PathBuf::from("reports/report.html")
        );
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
input = "out/k6.ndjson"

[report]
output_dir = "site"
format = "json"

[live]
port = 8080
debounce_ms = 50
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.input, PathBuf::from("out/k6.ndjson"));
        assert_eq!(config.report.format, OutputFormat::Json);
        assert_eq!(config.report.output_path(), PathBuf::from("site/results.json"));
        assert_eq!(config.live.port, 8080);
        assert_eq!(config.live.debounce_ms, 50);
        assert_eq!(config.live.bind, "127.0.0.1");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[report]"));
        assert!(toml_str.contains("[live]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.live.port, 3000);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join(CONFIG_FILE), "[live]\nport = 9000\n").unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.live.port, 9000);

        std::fs::write(dir.path().join(CONFIG_FILE), "[live\n").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_socket_addr() {
        let live = LiveConfig::default();
        assert_eq!(live.socket_addr().unwrap().port(), 3000);

        let bad = LiveConfig {
            bind: "not an address".to_string(),
            ..LiveConfig::default()
        };
        assert!(bad.socket_addr().is_err());
    }
}
