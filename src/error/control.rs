//! Errors raised by the stream orchestrator's control/transport path
//! (spec.md §7).

use std::fmt;

use log::{error, warn};

/// Errors specific to the streaming session's control-frame and
/// outbound-send path.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// A control frame failed to parse as JSON, or parsed with an
    /// unexpected type for one of its fields. Reported to the session's
    /// error sink; the session continues (spec.md §6.2, §7).
    MalformedControlFrame { reason: String },

    /// The outbound send to the session's single subscriber failed
    /// (broken pipe). Terminates the stream loop cleanly (spec.md §7).
    TransportFailure { reason: String },
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::MalformedControlFrame { reason } => {
                write!(f, "malformed control frame: {reason}")
            }
            ControlError::TransportFailure { reason } => {
                write!(f, "transport failure: {reason}")
            }
        }
    }
}

impl std::error::Error for ControlError {}

/// Log a control/transport error at the severity its handling implies:
/// malformed frames are recoverable (`warn!`), transport failures end the
/// session (`error!`).
pub fn log_control_error(err: &ControlError, context: &str) {
    match err {
        ControlError::MalformedControlFrame { .. } => warn!("{context}: {err}"),
        ControlError::TransportFailure { .. } => error!("{context}: {err}"),
    }
}
