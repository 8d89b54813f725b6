//! Threshold-based health classification of a telemetry snapshot.
//!
//! Rules run in a fixed order and every applicable rule fires; the order of
//! messages in the verdict is the order of the rules, not their severity.

use chrono::{DateTime, Local};
use log::trace;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::telemetry::TelemetrySnapshot;

/// Limits used by the detector, in the sensor's native unit (°C).
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    /// Deviation from target above which a printing heater raises a warning.
    pub temperature_warning_delta: f64,
    /// Deviation from target above which a printing heater raises an error.
    pub temperature_error_delta: f64,
    /// Absolute reading above which any heater is overheating.
    pub overheat_ceiling: f64,
    /// Elapsed print time at 0% completion after which the print looks stalled.
    pub stall_after: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature_warning_delta: 5.0,
            temperature_error_delta: 15.0,
            overheat_ceiling: 280.0,
            stall_after: Duration::from_secs(300),
        }
    }
}

/// Overall health of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Warning,
    Error,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Warning => "warning",
            HealthStatus::Error => "error",
        }
    }
}

/// Result of evaluating one snapshot.
///
/// The status is always derived from the messages: `error` iff there are
/// errors, `warning` iff there are only warnings, `ok` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthVerdict {
    status: HealthStatus,
    errors: Vec<String>,
    warnings: Vec<String>,
    evaluated_at: DateTime<Local>,
}

impl HealthVerdict {
    fn from_findings(findings: Findings, evaluated_at: DateTime<Local>) -> Self {
        let status = if !findings.errors.is_empty() {
            HealthStatus::Error
        } else if !findings.warnings.is_empty() {
            HealthStatus::Warning
        } else {
            HealthStatus::Ok
        };

        Self {
            status,
            errors: findings.errors,
            warnings: findings.warnings,
            evaluated_at,
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn evaluated_at(&self) -> DateTime<Local> {
        self.evaluated_at
    }

    /// True when no error was found. Warnings do not count.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
}

type Rule = fn(&TelemetrySnapshot, &Thresholds, &mut Findings);

/// Evaluation order is report order.
const RULES: [(&str, Rule); 5] = [
    ("machine_error", machine_error),
    ("connection_closed", connection_closed),
    ("temperature_drift", temperature_drift),
    ("overheating", overheating),
    ("stalled_print", stalled_print),
];

fn machine_error(snapshot: &TelemetrySnapshot, _: &Thresholds, findings: &mut Findings) {
    if snapshot.state_flags.error {
        findings.errors.push("machine is in error state".to_string());
    }
}

fn connection_closed(snapshot: &TelemetrySnapshot, _: &Thresholds, findings: &mut Findings) {
    if snapshot.state_flags.closed_or_error {
        findings
            .errors
            .push("machine connection closed or in error".to_string());
    }
}

fn temperature_drift(snapshot: &TelemetrySnapshot, limits: &Thresholds, findings: &mut Findings) {
    if !snapshot.state_flags.printing {
        return;
    }
    for (tool, reading) in &snapshot.tool_temperatures {
        if reading.target <= 0.0 {
            continue;
        }
        let diff = (reading.actual - reading.target).abs();
        if diff > limits.temperature_error_delta {
            findings.errors.push(format!(
                "{} temperature off by {:.1}°C (actual: {:.1}°C, target: {:.1}°C)",
                tool, diff, reading.actual, reading.target
            ));
        } else if diff > limits.temperature_warning_delta {
            findings
                .warnings
                .push(format!("{} temperature {:.1}°C from target", tool, diff));
        }
    }
}

fn overheating(snapshot: &TelemetrySnapshot, limits: &Thresholds, findings: &mut Findings) {
    for (tool, reading) in &snapshot.tool_temperatures {
        if reading.actual > limits.overheat_ceiling {
            findings
                .errors
                .push(format!("{} overheating: {:.1}°C", tool, reading.actual));
        }
    }
}

fn stalled_print(snapshot: &TelemetrySnapshot, limits: &Thresholds, findings: &mut Findings) {
    let progress = &snapshot.job_progress;
    let no_progress = progress.completion_percent == Some(0.0);
    let running_long = progress
        .elapsed_seconds
        .is_some_and(|secs| Duration::from_secs(secs) > limits.stall_after);

    if snapshot.state_flags.printing && no_progress && running_long {
        findings.warnings.push(format!(
            "print may be stalled (no progress after {} seconds)",
            limits.stall_after.as_secs()
        ));
    }
}

/// Classifies telemetry snapshots into health verdicts.
///
/// Evaluation is pure and total: any snapshot, however implausible,
/// produces a verdict.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    thresholds: Thresholds,
}

impl AnomalyDetector {
    /// Create a detector with custom thresholds.
    ///
    /// # Arguments
    ///
    /// * `thresholds` - Limits to apply; [`Thresholds::default`] matches the
    ///   fixed limits used by [`evaluate`]
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Evaluate a snapshot, stamping the verdict with the current local time.
    pub fn evaluate(&self, snapshot: &TelemetrySnapshot) -> HealthVerdict {
        self.evaluate_at(snapshot, Local::now())
    }

    /// Evaluate a snapshot with an explicit evaluation timestamp.
    pub fn evaluate_at(
        &self,
        snapshot: &TelemetrySnapshot,
        evaluated_at: DateTime<Local>,
    ) -> HealthVerdict {
        let mut findings = Findings::default();
        for (name, rule) in RULES {
            let before = findings.errors.len() + findings.warnings.len();
            rule(snapshot, &self.thresholds, &mut findings);
            let fired = findings.errors.len() + findings.warnings.len() - before;
            if fired > 0 {
                trace!("Rule {} produced {} finding(s)", name, fired);
            }
        }
        HealthVerdict::from_findings(findings, evaluated_at)
    }
}

/// Evaluate a snapshot with the default thresholds.
pub fn evaluate(snapshot: &TelemetrySnapshot) -> HealthVerdict {
    AnomalyDetector::default().evaluate(snapshot)
}
