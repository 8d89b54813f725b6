use anyhow::Result;
use log::debug;
use serde_json::Value;
use std::time::Duration;

use crate::config::constants::API_KEY_HEADER;
use crate::error::PrinterError;
use crate::telemetry::TelemetrySnapshot;

/// Read-only client for the OctoPrint REST API.
///
/// Fetches the raw printer and job state that feed a [`TelemetrySnapshot`].
/// Transport and HTTP errors are surfaced as-is; there are no retries.
pub struct PrinterService {
    pub api_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl PrinterService {
    /// Create a new PrinterService.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL of the OctoPrint server (e.g., "http://octopi.local")
    /// * `api_key` - OctoPrint API key
    /// * `timeout` - Timeout applied to every request
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            api_url,
            api_key,
            client,
        })
    }

    /// Get the current printer state (`GET /api/printer`).
    ///
    /// Contains the state flags and the heater temperatures.
    pub fn get_printer(&self) -> Result<Value> {
        self.get("/api/printer")
    }

    /// Get the active job and its progress (`GET /api/job`).
    pub fn get_job(&self) -> Result<Value> {
        self.get("/api/job")
    }

    /// Fetch printer and job state and assemble a snapshot from them.
    ///
    /// # Errors
    ///
    /// Returns an error if either request fails.
    pub fn fetch_snapshot(&self) -> Result<TelemetrySnapshot> {
        let printer = self.get_printer()?;
        let job = self.get_job()?;
        Ok(TelemetrySnapshot::from_api_responses(&printer, &job))
    }

    fn get(&self, endpoint: &str) -> Result<Value> {
        let url = format!("{}{}", self.api_url, endpoint);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .map_err(|e| PrinterError::ConnectionFailed {
                api_url: self.api_url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(PrinterError::ApiError {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        if body.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_str(&body)?)
    }
}
