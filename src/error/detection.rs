//! Errors raised while configuring or running a detector (spec.md §7).

use std::fmt;

use log::{error, warn};

/// Errors surfaced while resolving a method name or applying a parameter,
/// or absorbed while running a detector on one cell of one row.
///
/// Propagation policy (spec.md §7): `InvalidMethod`/`InvalidParameter`
/// propagate to the request boundary (batch: a structured rejection;
/// stream: the control frame is rejected without terminating the session).
/// `DetectorFault` never propagates - callers absorb it as a `false`
/// decision for that cell.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// The method identifier is not in the closed set
    /// `{z_score, lof, fft, ammad}` (spec.md §3).
    InvalidMethod { name: String },

    /// A parameter value was rejected: negative window size, negative
    /// threshold, or a non-numeric value where a number was expected.
    InvalidParameter { field: &'static str, reason: String },

    /// A detector raised an unchecked failure while evaluating one sample
    /// (numerical edge case, allocation failure). Always absorbed as `false`.
    DetectorFault { channel: String, reason: String },
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionError::InvalidMethod { name } => {
                write!(f, "invalid method identifier: {name:?}")
            }
            DetectionError::InvalidParameter { field, reason } => {
                write!(f, "invalid parameter {field}: {reason}")
            }
            DetectionError::DetectorFault { channel, reason } => {
                write!(f, "detector fault on channel {channel:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for DetectionError {}

/// Log a detection-layer error at the severity its propagation policy
/// implies: configuration errors are request-boundary failures (`error!`),
/// detector faults are absorbed-but-noteworthy (`warn!`).
pub fn log_detection_error(err: &DetectionError, context: &str) {
    match err {
        DetectionError::DetectorFault { .. } => warn!("{context}: {err}"),
        _ => error!("{context}: {err}"),
    }
}
