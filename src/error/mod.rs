//! Error taxonomy for the anomaly-detection engine (spec.md §7).
//!
//! Split the way the teacher crate splits its own error module: one file
//! per concern, re-exported here. Unlike the teacher there is no FFI
//! boundary to number error codes for, so these are plain `Display` +
//! `std::error::Error` enums logged through the `log` facade.

pub mod control;
pub mod detection;

pub use control::{log_control_error, ControlError};
pub use detection::{log_detection_error, DetectionError};
