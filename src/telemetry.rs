use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Named machine state flags as reported by OctoPrint's `state.flags`.
///
/// Missing flags read as `false`; flags this crate does not know about are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateFlags {
    pub operational: bool,
    pub printing: bool,
    pub paused: bool,
    pub pausing: bool,
    pub cancelling: bool,
    pub ready: bool,
    pub error: bool,
    pub closed_or_error: bool,
}

/// Actual and target temperature of one heater, in °C.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolTemperature {
    pub actual: f64,
    pub target: f64,
}

/// Progress of the active job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub completion_percent: Option<f64>,
    pub elapsed_seconds: Option<u64>,
}

/// A single point-in-time read of machine state and job progress.
///
/// Tools are keyed by name (`bed`, `tool0`, ...) and iterate in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub state_flags: StateFlags,
    pub tool_temperatures: BTreeMap<String, ToolTemperature>,
    pub job_progress: JobProgress,
}

impl TelemetrySnapshot {
    /// Assemble a snapshot from raw `/api/printer` and `/api/job` responses.
    ///
    /// Never fails. Absent or mistyped sections produce defaults, a heater
    /// entry is only taken when it is an object carrying an `actual` key, and
    /// null readings count as 0.
    ///
    /// # Arguments
    ///
    /// * `printer` - Body of `GET /api/printer`
    /// * `job` - Body of `GET /api/job`
    pub fn from_api_responses(printer: &Value, job: &Value) -> Self {
        let flags = &printer["state"]["flags"];
        let flag = |name: &str| flags[name].as_bool().unwrap_or(false);

        let state_flags = StateFlags {
            operational: flag("operational"),
            printing: flag("printing"),
            paused: flag("paused"),
            pausing: flag("pausing"),
            cancelling: flag("cancelling"),
            ready: flag("ready"),
            error: flag("error"),
            closed_or_error: flag("closedOrError"),
        };

        let tool_temperatures = printer["temperature"]
            .as_object()
            .map(|heaters| {
                heaters
                    .iter()
                    .filter(|(_, data)| data.get("actual").is_some())
                    .map(|(name, data)| {
                        let reading = ToolTemperature {
                            actual: data["actual"].as_f64().unwrap_or(0.0),
                            target: data["target"].as_f64().unwrap_or(0.0),
                        };
                        (name.clone(), reading)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let progress = &job["progress"];
        let job_progress = JobProgress {
            completion_percent: progress["completion"].as_f64(),
            elapsed_seconds: progress["printTime"].as_u64().or_else(|| {
                progress["printTime"]
                    .as_f64()
                    .filter(|t| *t >= 0.0)
                    // round up so a fractional overrun still exceeds a whole-second limit
                    .map(|t| t.ceil() as u64)
            }),
        };

        Self {
            state_flags,
            tool_temperatures,
            job_progress,
        }
    }

    /// Add or replace a heater reading.
    pub fn with_tool(mut self, name: impl Into<String>, actual: f64, target: f64) -> Self {
        self.tool_temperatures
            .insert(name.into(), ToolTemperature { actual, target });
        self
    }
}
