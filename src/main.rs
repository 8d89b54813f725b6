use anyhow::{Context, Result};
use log::{error, info, warn};
use std::process::ExitCode;

use print_check::{AnomalyDetector, Config, PrinterService, gcode};

const USAGE: &str = "Usage: print-check <command> [args...]
Commands:
  analyze <file>      - Analyze a gcode file
  check-errors        - Check the printer for errors and anomalies";

/// Print Check - G-code analysis and printer health checks.
///
/// # Commands
///
/// * `analyze <file>` - Print the program metadata of a G-code file as JSON
/// * `check-errors` - Fetch printer and job state from OctoPrint, print the
///   health verdict as JSON and exit with status 1 if it contains errors
///
/// # Environment Variables
///
/// `check-errors` requires `OCTOPRINT_URL` and `OCTOPRINT_API_KEY`; see
/// [`Config::load`] for the optional ones.
///
/// # Usage
///
/// ```bash
/// export OCTOPRINT_URL="http://octopi.local"
/// export OCTOPRINT_API_KEY="..."
/// ./print-check check-errors
/// ./print-check analyze benchy.gcode
/// ```
fn main() -> Result<ExitCode> {
    // Logs go to stderr so stdout stays valid JSON
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stderr)
        .filter_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("analyze") => match args.get(1) {
            Some(path) => analyze(path),
            None => {
                error!("Missing filename");
                Ok(ExitCode::FAILURE)
            }
        },
        Some("check-errors") => check_errors(),
        Some(other) => {
            error!("Unknown command: {}", other);
            eprintln!("{}", USAGE);
            Ok(ExitCode::FAILURE)
        }
        None => {
            eprintln!("{}", USAGE);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn analyze(path: &str) -> Result<ExitCode> {
    let metadata = gcode::analyze_path(path)?;
    info!(
        "Analyzed {} ({} bytes): {} layers",
        metadata.filename, metadata.size_bytes, metadata.layer_count
    );
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(ExitCode::SUCCESS)
}

fn check_errors() -> Result<ExitCode> {
    let config = Config::load().context(
        "Failed to load configuration. Please ensure all required environment variables are set.",
    )?;
    info!("Checking printer at {}", config.octoprint_url);

    let printer = PrinterService::new(
        config.octoprint_url.clone(),
        config.api_key.clone(),
        config.request_timeout(),
    )?;
    let snapshot = printer.fetch_snapshot()?;

    let verdict = AnomalyDetector::new(config.thresholds.clone()).evaluate(&snapshot);
    for message in verdict.errors() {
        error!("{}", message);
    }
    for message in verdict.warnings() {
        warn!("{}", message);
    }
    info!("Printer health: {}", verdict.status().as_str());

    println!("{}", serde_json::to_string_pretty(&verdict)?);

    Ok(if verdict.is_healthy() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
