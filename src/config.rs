use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::anomaly::Thresholds;
use crate::error::ConfigError;

/// Configuration for talking to the printer, loaded from environment variables.
///
/// Only the `check-errors` command needs it; program analysis works on local
/// files alone.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the OctoPrint server, without a trailing slash.
    ///
    /// Environment variable: `OCTOPRINT_URL`
    pub octoprint_url: String,

    /// API key sent as `X-Api-Key` on every request.
    ///
    /// Environment variable: `OCTOPRINT_API_KEY`
    pub api_key: String,

    /// Per-request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_SECONDS`
    pub request_timeout_seconds: u64,

    /// Detector limits. Each one can be overridden through
    /// `TEMP_WARNING_DELTA`, `TEMP_ERROR_DELTA`, `OVERHEAT_CEILING` and
    /// `STALL_SECONDS`.
    pub thresholds: Thresholds,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are not set or cannot be parsed:
    /// - `OCTOPRINT_URL`: OctoPrint base URL (required)
    /// - `OCTOPRINT_API_KEY`: OctoPrint API key (required)
    /// - `REQUEST_TIMEOUT_SECONDS`: Request timeout (default: "10")
    /// - `TEMP_WARNING_DELTA`: Warning deviation from target in °C (default: "5")
    /// - `TEMP_ERROR_DELTA`: Error deviation from target in °C (default: "15")
    /// - `OVERHEAT_CEILING`: Absolute overheating limit in °C (default: "280")
    /// - `STALL_SECONDS`: Seconds at 0% before a print counts as stalled (default: "300")
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let octoprint_url = required(&lookup, "OCTOPRINT_URL")?
            .trim_end_matches('/')
            .to_string();
        let api_key = required(&lookup, "OCTOPRINT_API_KEY")?;

        let request_timeout_seconds = parse_or(
            &lookup,
            "REQUEST_TIMEOUT_SECONDS",
            constants::DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;

        let defaults = Thresholds::default();
        let thresholds = Thresholds {
            temperature_warning_delta: parse_or(
                &lookup,
                "TEMP_WARNING_DELTA",
                defaults.temperature_warning_delta,
            )?,
            temperature_error_delta: parse_or(
                &lookup,
                "TEMP_ERROR_DELTA",
                defaults.temperature_error_delta,
            )?,
            overheat_ceiling: parse_or(&lookup, "OVERHEAT_CEILING", defaults.overheat_ceiling)?,
            stall_after: Duration::from_secs(parse_or(
                &lookup,
                "STALL_SECONDS",
                defaults.stall_after.as_secs(),
            )?),
        };

        if thresholds.temperature_warning_delta > thresholds.temperature_error_delta {
            return Err(ConfigError::InvalidValue {
                field: "TEMP_WARNING_DELTA".to_string(),
                value: thresholds.temperature_warning_delta.to_string(),
                reason: format!(
                    "must not exceed TEMP_ERROR_DELTA ({})",
                    thresholds.temperature_error_delta
                ),
            });
        }

        Ok(Config {
            octoprint_url,
            api_key,
            request_timeout_seconds,
            thresholds,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar {
            var_name: name.to_string(),
        })
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                field: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

/// Application constants used throughout the system.
pub mod constants {
    /// Default timeout for printer API requests in seconds.
    pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

    /// Header carrying the OctoPrint API key.
    pub const API_KEY_HEADER: &str = "X-Api-Key";
}
