//! Stream Orchestrator (C9, spec.md §4.10).
//!
//! One subscriber per session, one cooperative single-threaded loop:
//! reconfiguration and sample emission are strictly serialised, unlike the
//! batch orchestrator's per-row fan-out (spec.md §9 "do not collapse these
//! into one").

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{self, Duration};

use crate::config::EngineConfig;
use crate::error::control::{log_control_error, ControlError};
use crate::record::{Decision, OutputRecord, Record};
use crate::state::AnalysisState;

/// `{"data": {...}}` outbound wire frame (spec.md §6.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamFrame {
    pub data: OutputRecord,
}

/// Run one streaming session to completion. `records` is the replayed
/// sequence; the cursor wraps around indefinitely until either the control
/// channel closes or an outbound send fails (spec.md §4.10 invariants).
pub async fn run(
    records: &[Record],
    mut control_rx: mpsc::Receiver<String>,
    outbound_tx: mpsc::Sender<StreamFrame>,
    config: &EngineConfig,
) {
    let mut state = AnalysisState::new(config);
    let mut cursor = 0usize;

    loop {
        match time::timeout(config.stream.control_poll_timeout, control_rx.recv()).await {
            Ok(Some(message)) => {
                if let Err(err) = state.apply_message(&message) {
                    log_control_error(&err, "stream control channel");
                }
            }
            Ok(None) => {
                // Control channel closed: exit the loop (spec.md §4.10 step 1).
                return;
            }
            Err(_elapsed) => {
                // No message within the poll deadline; fall through to emit.
            }
        }

        if cursor < records.len() {
            let record = &records[cursor];
            cursor += 1;

            let mut output = OutputRecord::new(record.time);
            for (channel, &value) in &record.channels {
                let anomalous = state.record_sample(channel, value);
                output = output.with_decision(channel.clone(), Decision { value, anomalous });
            }

            if outbound_tx.send(StreamFrame { data: output }).await.is_err() {
                log_control_error(
                    &ControlError::TransportFailure {
                        reason: "outbound channel closed".to_string(),
                    },
                    "stream emit",
                );
                return;
            }
        }

        let pause_secs = rand::thread_rng().gen_range(
            config.stream.emission_pause_min.as_secs_f64()..config.stream.emission_pause_max.as_secs_f64(),
        );
        time::sleep(Duration::from_secs_f64(pause_secs)).await;

        if cursor >= records.len() {
            cursor = 0;
            state.reset_buffers();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn fast_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.stream.emission_pause_min = StdDuration::from_millis(1);
        config.stream.emission_pause_max = StdDuration::from_millis(2);
        config.stream.control_poll_timeout = StdDuration::from_millis(1);
        config
    }

    #[tokio::test(start_paused = false)]
    async fn emits_one_frame_per_record_in_order() {
        let records = vec![
            Record::new(0.0).with_channel("A", 10.0),
            Record::new(1.0).with_channel("A", 10.1),
        ];
        let (_control_tx, control_rx) = mpsc::channel::<String>(4);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<StreamFrame>(4);
        let config = fast_config();

        let handle = tokio::spawn(async move {
            run(&records, control_rx, outbound_tx, &config).await;
        });

        let first = outbound_rx.recv().await.unwrap();
        assert_eq!(first.data.time, 0.0);
        let second = outbound_rx.recv().await.unwrap();
        assert_eq!(second.data.time, 1.0);

        handle.abort();
    }

    #[tokio::test]
    async fn closing_control_channel_ends_the_loop() {
        let records = vec![Record::new(0.0).with_channel("A", 10.0)];
        let (control_tx, control_rx) = mpsc::channel::<String>(4);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<StreamFrame>(4);
        let config = fast_config();

        let handle = tokio::spawn(async move {
            run(&records, control_rx, outbound_tx, &config).await;
        });

        outbound_rx.recv().await.unwrap();
        drop(control_tx);
        let result = tokio::time::timeout(StdDuration::from_secs(1), handle).await;
        assert!(result.is_ok(), "loop should exit once the control channel closes");
    }

    #[tokio::test]
    async fn dropping_outbound_receiver_terminates_cleanly() {
        let records = vec![
            Record::new(0.0).with_channel("A", 10.0),
            Record::new(1.0).with_channel("A", 10.1),
        ];
        let (_control_tx, control_rx) = mpsc::channel::<String>(4);
        let (outbound_tx, outbound_rx) = mpsc::channel::<StreamFrame>(4);
        let config = fast_config();
        drop(outbound_rx);

        let result = tokio::time::timeout(
            StdDuration::from_secs(1),
            run(&records, control_rx, outbound_tx, &config),
        )
        .await;
        assert!(result.is_ok(), "a closed outbound channel must terminate the loop");
    }
}
