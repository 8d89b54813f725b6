//! Print Check - 3D printer program analysis and health checks.
//!
//! This library extracts manufacturing metadata from G-code produced by
//! slicers and classifies live printer telemetry into a health verdict.
//! Both are pure functions over already-fetched data; the remaining modules
//! only fetch that data and report the results.
//!
//! # Core Components
//!
//! * [`gcode`] - Tolerant metadata extraction from toolpath programs
//! * [`anomaly`] - Threshold-based health classification of telemetry
//! * [`telemetry`] - Telemetry snapshot model and OctoPrint response assembly
//! * [`printer`] - Read-only OctoPrint API client
//! * [`config`] - Environment-based configuration
//! * [`error`] - Error types for the I/O layer
//!
//! # Quick Start
//!
//! ```rust
//! use print_check::*;
//!
//! let metadata = gcode::extract([";LAYER:0", "M104 S210"], "part.gcode", 18);
//! assert_eq!(metadata.layer_count, 1);
//!
//! let snapshot = TelemetrySnapshot::default().with_tool("tool0", 295.0, 0.0);
//! let verdict = anomaly::evaluate(&snapshot);
//! assert_eq!(verdict.status(), HealthStatus::Error);
//! ```

pub mod anomaly;
pub mod config;
pub mod error;
pub mod gcode;
pub mod printer;
pub mod telemetry;

// Re-export commonly used types for convenience
pub use anomaly::{AnomalyDetector, HealthStatus, HealthVerdict, Thresholds};
pub use config::Config;
pub use error::PrintCheckError;
pub use gcode::{MetadataAccumulator, ProgramMetadata};
pub use printer::PrinterService;
pub use telemetry::{JobProgress, StateFlags, TelemetrySnapshot, ToolTemperature};
