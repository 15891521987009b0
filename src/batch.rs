//! Batch Orchestrator (C8, spec.md §4.9).
//!
//! Replays an already-materialized record sequence, fanning the per-row
//! detector calls out concurrently across channels (structured concurrency;
//! spec.md §5 "batch fans out per-row detector calls"). Buffers are
//! per-channel state owned by one [`AnalysisState`] for the duration of
//! this single batch run.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::detectors::Method;
use crate::error::detection::DetectionError;
use crate::record::{Decision, OutputRecord, Record};
use crate::state::AnalysisState;

/// Request shape for a batch run (spec.md §6.4).
pub struct BatchRequest<'a> {
    pub method: &'a str,
    pub window: Option<usize>,
    pub threshold: Option<f64>,
    pub records: &'a [Record],
}

/// `{ total_records, total_anomalies, data: [...] }` (spec.md §6.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchResponse {
    pub total_records: usize,
    pub total_anomalies: usize,
    pub data: Vec<OutputRecord>,
}

/// Run the batch orchestrator over an already-materialized record slice.
///
/// Rejects with [`DetectionError::InvalidMethod`] if `request.method` is not
/// in the registry; this is the one failure mode that aborts the whole
/// request rather than being absorbed per-cell (spec.md §7).
pub async fn run(request: BatchRequest<'_>, config: &EngineConfig) -> Result<BatchResponse, DetectionError> {
    let method = Method::parse(request.method)?;
    let window = request.window.unwrap_or_else(Method::default_triple_max_window);
    let threshold = request.threshold.unwrap_or_else(|| method.default_threshold());

    let mut state = AnalysisState::new(config);
    // Each batch run gets a fully clean registry (spec.md §4.7: "used
    // between independent batch runs") - explicit here even though a fresh
    // `AnalysisState` has nothing to clear yet, so the reset boundary stays
    // anchored to "one batch run" rather than to incidental events like a
    // mid-session method switch.
    state.reset();
    state.set_method(method.as_str()).expect("method already validated above");
    state.set_window_size(window as i64)?;
    state.set_score_threshold(threshold)?;

    let mut data = Vec::with_capacity(request.records.len());
    let mut total_anomalies = 0usize;

    for record in request.records {
        let mut output = OutputRecord::new(record.time);

        // Fan out per-channel detector calls concurrently within this row
        // (spec.md §4.9, §5); channels never repeat within a row so there
        // is no intra-record contention even for AMMAD's per-channel state.
        let cells: Vec<(String, f64, bool)> = run_row_concurrently(&mut state, record).await;

        for (channel, value, anomalous) in cells {
            if anomalous {
                total_anomalies += 1;
            }
            output = output.with_decision(channel, Decision { value, anomalous });
        }

        data.push(output);
    }

    Ok(BatchResponse {
        total_records: request.records.len(),
        total_anomalies,
        data,
    })
}

/// Detector bodies never suspend (spec.md §5), so "concurrent" fan-out
/// within a row reduces to "order-independent": each channel's detection
/// only touches its own buffer/AMMAD slot, so the result is identical
/// regardless of evaluation order. `join_all` expresses that independence
/// without requiring `AnalysisState` to be split across real OS threads.
async fn run_row_concurrently(state: &mut AnalysisState, record: &Record) -> Vec<(String, f64, bool)> {
    let channels: Vec<(String, f64)> = record
        .channels
        .iter()
        .map(|(name, value)| (name.clone(), *value))
        .collect();

    let futures = channels.into_iter().map(|(channel, value)| {
        let decision = state.record_sample(&channel, value);
        async move { (channel, value, decision) }
    });

    futures::future::join_all(futures).await
}
