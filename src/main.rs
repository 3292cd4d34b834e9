//! LoadReport - k6 results aggregator
//!
//! A CLI tool that aggregates the NDJSON output of a k6 run into an
//! HTML report, or serves a live feed that follows the results file.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing input, unreadable input, write or bind failure)

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use loadreport::analysis::{self, AggregateOptions};
use loadreport::cli::{Args, OutputFormat};
use loadreport::config::{Config, CONFIG_FILE};
use loadreport::live::{self, ResultsWatcher, SnapshotCache};
use loadreport::models::AggregatedResult;
use loadreport::report;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("LoadReport v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let outcome = if args.watch {
        run_live(args).await
    } else {
        run_report(args)
    };

    if let Err(e) = outcome {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .loadreport.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the input file, report output and live feed.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Aggregate the results file once and write the report.
fn run_report(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let input = &config.general.input;
    if !input.exists() {
        bail!(
            "Results file not found: {} (run k6 with --out json={})",
            input.display(),
            input.display()
        );
    }

    let options = AggregateOptions::with_time_series(config.report.include_time_series);

    if !args.quiet {
        println!("📥 Reading results: {}", input.display());
    }
    let result = aggregate_with_progress(input, options, !args.quiet)?;

    let output_path = config.report.output_path();
    std::fs::create_dir_all(&config.report.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.report.output_dir.display()
        )
    })?;

    match config.report.format {
        OutputFormat::Html => report::write_html_report(&result, &output_path)?,
        OutputFormat::Json => report::write_json_report(&result, &output_path)?,
    }

    if !args.quiet {
        println!("{}", report::generate_console_summary(&result));
        println!(
            "\n✅ Report saved to: {} ({:.1}s)",
            output_path.display(),
            start_time.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

/// Aggregate a file, showing byte progress on stderr.
fn aggregate_with_progress(
    path: &Path,
    options: AggregateOptions,
    show_progress: bool,
) -> Result<AggregatedResult> {
    if !show_progress {
        return analysis::aggregate_file(path, options).map_err(Into::into);
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open results file: {}", path.display()))?;
    let total = file.metadata().map(|m| m.len()).unwrap_or(0);

    let progress_bar = ProgressBar::new(total);
    match ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes}",
    ) {
        Ok(style) => progress_bar.set_style(style.progress_chars("#>-")),
        Err(e) => warn!("Invalid progress template: {}", e),
    }

    let result =
        analysis::aggregate_reader(BufReader::new(progress_bar.wrap_read(file)), options);
    progress_bar.finish_and_clear();

    Ok(result?)
}

/// Serve the live feed until interrupted.
async fn run_live(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let addr = config.live.socket_addr()?;
    let cache = SnapshotCache::new();
    let watcher = ResultsWatcher::new(
        config.general.input.clone(),
        AggregateOptions::with_time_series(config.live.include_time_series),
        Duration::from_millis(config.live.debounce_ms),
        cache.clone(),
    );

    println!("📡 Live feed: http://{}/api/events", addr);
    println!(
        "   Monitoring {} for changes...",
        config.general.input.display()
    );

    tokio::select! {
        served = live::server::serve(addr, cache) => served,
        watched = watcher.run() => {
            watched?;
            bail!("File watcher stopped unexpectedly")
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
