//! End-to-end coverage of the batch and stream orchestrators against the
//! seed scenarios and invariants (S5, S6, invariants 6-8).

use std::time::Duration;

use drill_anomaly_engine::{BatchRequest, EngineConfig, Record};
use tokio::sync::mpsc;

fn record(time: f64, channels: &[(&str, f64)]) -> Record {
    let mut r = Record::new(time);
    for &(name, value) in channels {
        r = r.with_channel(name, value);
    }
    r
}

#[tokio::test]
async fn s6_batch_aggregate_three_records_two_channels() {
    let records = vec![
        record(0.0, &[("A", 10.0), ("B", 20.0)]),
        record(1.0, &[("A", 10.05), ("B", 20.0)]),
        record(2.0, &[("A", 300.0), ("B", 20.0)]),
    ];

    let request = BatchRequest {
        method: "z_score",
        window: Some(2),
        threshold: Some(2.0),
        records: &records,
    };

    let response = drill_anomaly_engine::run_batch(request, &EngineConfig::default())
        .await
        .expect("z_score is a known method");

    assert_eq!(response.total_records, 3);
    assert_eq!(response.total_anomalies, 1);
    assert!(response.data[2].channels["A"].anomalous);
    assert!(!response.data[2].channels["B"].anomalous);
}

#[tokio::test]
async fn invariant_8_batch_output_shape_matches_input_in_order() {
    let records = vec![
        record(5.0, &[("depth", 100.0), ("rotor_rpm", 50.0)]),
        record(6.0, &[("depth", 100.5), ("rotor_rpm", 50.5)]),
    ];
    let request = BatchRequest {
        method: "lof",
        window: None,
        threshold: None,
        records: &records,
    };

    let response = drill_anomaly_engine::run_batch(request, &EngineConfig::default())
        .await
        .unwrap();

    assert_eq!(response.data.len(), 2);
    assert_eq!(response.data[0].time, 5.0);
    assert_eq!(response.data[1].time, 6.0);
    for output in &response.data {
        assert!(output.channels.contains_key("depth"));
        assert!(output.channels.contains_key("rotor_rpm"));
    }
}

#[tokio::test]
async fn batch_absorbs_unknown_channel_gracefully_across_rows() {
    // A channel present only in one row should not affect others; every row
    // reports exactly the channels it was given.
    let records = vec![
        record(0.0, &[("A", 1.0)]),
        record(1.0, &[("A", 1.0), ("B", 2.0)]),
    ];
    let request = BatchRequest {
        method: "z_score",
        window: Some(10),
        threshold: Some(3.0),
        records: &records,
    };
    let response = drill_anomaly_engine::run_batch(request, &EngineConfig::default())
        .await
        .unwrap();
    assert_eq!(response.data[0].channels.len(), 1);
    assert_eq!(response.data[1].channels.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn s5_reconfiguration_mid_stream_clears_buffer_and_rejects_bad_frame() {
    let mut config = EngineConfig::default();
    config.stream.emission_pause_min = Duration::from_millis(0);
    config.stream.emission_pause_max = Duration::from_millis(1);
    config.stream.control_poll_timeout = Duration::from_millis(1);
    config.stream.default_method = drill_anomaly_engine::Method::Fft;
    config.stream.default_window = 64;

    let mut records = Vec::new();
    for i in 0..20 {
        records.push(record(i as f64, &[("C", 10.0 + i as f64)]));
    }

    let (control_tx, control_rx) = mpsc::channel::<String>(8);
    let (outbound_tx, mut outbound_rx) = mpsc::channel(32);

    let handle = tokio::spawn(async move {
        drill_anomaly_engine::run_stream(&records, control_rx, outbound_tx, &config).await;
    });

    // Drain the first 10 frames (fft warmup/running on channel C).
    for _ in 0..10 {
        outbound_rx.recv().await.unwrap();
    }

    control_tx
        .send(r#"{"method":"z_score"}"#.to_string())
        .await
        .unwrap();

    // The next 5 samples after reconfiguration are warmup under z_score.
    for _ in 0..5 {
        let frame = outbound_rx.recv().await.unwrap();
        assert!(!frame.data.channels["C"].anomalous);
    }

    // A malformed reconfiguration leaves state unchanged and does not
    // terminate the session - frames keep flowing.
    control_tx
        .send(r#"{"window_size":-3}"#.to_string())
        .await
        .unwrap();
    assert!(outbound_rx.recv().await.is_some());

    drop(control_tx);
    let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
}

#[tokio::test]
async fn unknown_method_rejects_batch_request_without_partial_results() {
    let records = vec![record(0.0, &[("A", 1.0)])];
    let request = BatchRequest {
        method: "not_a_method",
        window: None,
        threshold: None,
        records: &records,
    };
    let err = drill_anomaly_engine::run_batch(request, &EngineConfig::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid method"));
}
