//! Telemetry event types describing diagnostics data exposed to CLI/HTTP
//! surfaces.

use serde::{Deserialize, Serialize};

/// Diagnostic error codes surfaced via telemetry metrics, separate from the
/// [`crate::error`] taxonomy used for control flow - these are coarse
/// categories for dashboards, not propagated errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticError {
    InvalidMethod,
    InvalidParameter,
    DetectorFault,
    MalformedControlFrame,
    TransportFailure,
}

/// Rich metric events covering detector latency, buffer occupancy, and
/// anomaly counts across channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    DetectorLatency {
        method: String,
        avg_us: f32,
        max_us: f32,
        sample_count: usize,
    },
    BufferOccupancy {
        channel: String,
        percent: f32,
    },
    AnomalyRecorded {
        channel: String,
        method: String,
    },
    Error {
        code: DiagnosticError,
        context: String,
    },
}
