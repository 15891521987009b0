//! Analysis State (C7, spec.md §4.8).
//!
//! One Analysis State per batch run or per stream session: the active
//! method/window/threshold configuration, one ring buffer per channel, and
//! (for AMMAD) one adaptive state per channel. Never shared across
//! sessions - this is what resolves spec.md §5's AMMAD state-ownership
//! open question (SPEC_FULL.md §5).

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;

use crate::buffer::RingBuffer;
use crate::config::{AmmadTuning, EngineConfig};
use crate::detectors::ammad::{self, AmmadChannelState, AmmadChannelTable, SafetyLimitTable};
use crate::detectors::{self, Method};
use crate::error::control::ControlError;
use crate::error::detection::{log_detection_error, DetectionError};
use crate::telemetry::{self, DiagnosticError};

/// One active configuration plus per-channel detector state.
pub struct AnalysisState {
    method: Method,
    window: usize,
    threshold: f64,
    buffers: HashMap<String, RingBuffer>,
    ammad_state: AmmadChannelTable,
    ammad_tuning: AmmadTuning,
    safety_limits: SafetyLimitTable,
}

impl AnalysisState {
    /// A fresh session: method `fft`, `W = max(FFT_W, LOF_W, Z_W)`, `τ = 0.5`
    /// (spec.md §4.10).
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            method: config.stream.default_method,
            window: config.stream.default_window,
            threshold: config.stream.default_threshold,
            buffers: HashMap::new(),
            ammad_state: HashMap::new(),
            ammad_tuning: config.ammad.clone(),
            safety_limits: config.safety_limits.to_table(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Validate `name` and, on change, clear every buffer and reset
    /// capacities to the current `W + 1` (spec.md §4.8). AMMAD state is
    /// untouched by a method change: spec.md §3 is explicit that it
    /// "persists across sample ticks and across AMMAD reconfigurations" and
    /// is reset only when the registry itself is reset, not when the
    /// session's method happens to switch away from and back to `ammad`.
    pub fn set_method(&mut self, name: &str) -> Result<(), DetectionError> {
        let method = Method::parse(name)?;
        self.apply_method(method);
        Ok(())
    }

    fn apply_method(&mut self, method: Method) {
        if method == self.method {
            return;
        }
        self.method = method;
        let capacity = self.window + 1;
        for buffer in self.buffers.values_mut() {
            *buffer = RingBuffer::new(capacity);
        }
    }

    /// Reject `window < 0`; on change, resize every existing buffer to
    /// `W + 1`, preserving tails (spec.md §4.8, invariant 7).
    pub fn set_window_size(&mut self, window: i64) -> Result<(), DetectionError> {
        if window < 0 {
            return Err(DetectionError::InvalidParameter {
                field: "window_size",
                reason: "must be >= 0".to_string(),
            });
        }
        let window = window as usize;
        if window == self.window {
            return Ok(());
        }
        self.window = window;
        let capacity = window + 1;
        for buffer in self.buffers.values_mut() {
            buffer.resize(capacity);
        }
        Ok(())
    }

    /// Reject `threshold < 0`.
    pub fn set_score_threshold(&mut self, threshold: f64) -> Result<(), DetectionError> {
        if threshold < 0.0 {
            return Err(DetectionError::InvalidParameter {
                field: "score_threshold",
                reason: "must be >= 0".to_string(),
            });
        }
        self.threshold = threshold;
        Ok(())
    }

    /// Parse a control frame and apply `method`, `window_size`,
    /// `score_threshold`, then the legacy `FFT`/`Z_score`/`LOF` aliases, in
    /// that order (spec.md §6.2). Field-level rejections are reported to
    /// the telemetry sink and do not undo earlier successful updates from
    /// the same frame; only a top-level JSON parse failure returns `Err`.
    pub fn apply_message(&mut self, raw: &str) -> Result<(), ControlError> {
        let value: Value = serde_json::from_str(raw).map_err(|err| ControlError::MalformedControlFrame {
            reason: err.to_string(),
        })?;
        let obj = value.as_object().ok_or_else(|| ControlError::MalformedControlFrame {
            reason: "control frame must be a JSON object".to_string(),
        })?;

        if let Some(method_val) = obj.get("method") {
            match method_val.as_str() {
                Some(name) => {
                    if let Err(err) = self.set_method(name) {
                        self.reject_field(&err);
                    }
                }
                None => self.reject_field(&DetectionError::InvalidParameter {
                    field: "method",
                    reason: "must be a string".to_string(),
                }),
            }
        }

        if let Some(window_val) = obj.get("window_size") {
            match window_val.as_i64() {
                Some(window) => {
                    if let Err(err) = self.set_window_size(window) {
                        self.reject_field(&err);
                    }
                }
                None => self.reject_field(&DetectionError::InvalidParameter {
                    field: "window_size",
                    reason: "must be a non-negative integer".to_string(),
                }),
            }
        }

        if let Some(threshold_val) = obj.get("score_threshold") {
            match threshold_val.as_f64() {
                Some(threshold) => {
                    if let Err(err) = self.set_score_threshold(threshold) {
                        self.reject_field(&err);
                    }
                }
                None => self.reject_field(&DetectionError::InvalidParameter {
                    field: "score_threshold",
                    reason: "must be a number".to_string(),
                }),
            }
        }

        // Legacy keys predate the unified `score_threshold` field; apply
        // only when the current method still matches (spec.md §9).
        for (legacy_key, legacy_method) in [
            ("FFT", Method::Fft),
            ("Z_score", Method::ZScore),
            ("LOF", Method::Lof),
        ] {
            if let Some(legacy_val) = obj.get(legacy_key) {
                if self.method != legacy_method {
                    continue;
                }
                match legacy_val.as_f64() {
                    Some(threshold) => {
                        if let Err(err) = self.set_score_threshold(threshold) {
                            self.reject_field(&err);
                        }
                    }
                    None => self.reject_field(&DetectionError::InvalidParameter {
                        field: "legacy_threshold",
                        reason: format!("{legacy_key} must be a number"),
                    }),
                }
            }
        }

        Ok(())
    }

    fn reject_field(&self, err: &DetectionError) {
        log_detection_error(err, "apply_message");
        telemetry::hub().record_error(DiagnosticError::InvalidParameter, "apply_message");
    }

    /// Append `value` to `channel`'s buffer and evaluate the configured
    /// detector. A detector panic is absorbed as `false` and logged as a
    /// [`DetectionError::DetectorFault`] (spec.md §7) - none of this
    /// crate's detectors are expected to panic on well-formed input, but
    /// the boundary still honours the absorption contract.
    ///
    /// `channel` is a case-insensitive identifier (spec.md §3): it is
    /// normalized to lowercase before touching the buffer map or the AMMAD
    /// table, so `"Pressure"` and `"pressure"` share one buffer and one
    /// AMMAD state rather than silently diverging into two.
    pub fn record_sample(&mut self, channel: &str, value: f64) -> bool {
        let channel = channel.to_ascii_lowercase();
        let channel = channel.as_str();

        let capacity = self.window + 1;
        let buffer = self
            .buffers
            .entry(channel.to_string())
            .or_insert_with(|| RingBuffer::new(capacity));
        buffer.push(value);
        let snapshot = buffer.snapshot();

        telemetry::hub().record_buffer_occupancy(
            channel,
            100.0 * buffer.len() as f32 / buffer.capacity() as f32,
        );

        let method = self.method;
        let window = self.window;
        let threshold = self.threshold;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if method == Method::Ammad {
                let config = self.ammad_tuning.channel_config(channel, &self.safety_limits);
                let state = self
                    .ammad_state
                    .entry(channel.to_string())
                    .or_insert_with(AmmadChannelState::new);
                ammad::detect(state, &config, value)
            } else {
                detectors::detect_stateless(method, &snapshot, window, threshold)
            }
        }));

        let decision = match outcome {
            Ok(decision) => decision,
            Err(_) => {
                let err = DetectionError::DetectorFault {
                    channel: channel.to_string(),
                    reason: "panic during detection".to_string(),
                };
                log_detection_error(&err, "record_sample");
                telemetry::hub().record_error(DiagnosticError::DetectorFault, channel);
                false
            }
        };

        if decision {
            telemetry::hub().record_anomaly(channel, method.as_str());
        }
        decision
    }

    /// All channel names (lowercase-normalized) this state currently tracks
    /// a buffer for.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Clear every buffer, without touching AMMAD state, used when the
    /// stream orchestrator's record sequence wraps around (spec.md §4.10
    /// step 4: "reset the record cursor to 0 and clear all buffers"). AMMAD
    /// channel state must survive a wraparound exactly as it survives any
    /// other sample tick (spec.md §3).
    pub fn reset_buffers(&mut self) {
        self.buffers.clear();
    }

    /// The registry-level reset spec.md §4.7 describes: clears buffers and
    /// the AMMAD channel-state table together. This is the one operation
    /// that actually discards AMMAD history, and it is used only between
    /// independent batch runs (or any other point a caller wants a fully
    /// clean session) - never from the method-switch or stream-wraparound
    /// paths, which must leave AMMAD state alone.
    pub fn reset(&mut self) {
        self.buffers.clear();
        self.ammad_state.clear();
    }
}
