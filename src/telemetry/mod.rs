//! Diagnostics telemetry hub.
//!
//! Multiplexes detector latency, buffer occupancy, anomaly counts, and
//! rejected-control-frame events into a bounded history plus an async
//! broadcast stream, the same shape as the teacher's `TelemetryHub` /
//! `TelemetryCollector` pair.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tokio::sync::{broadcast, mpsc};

pub mod events;

pub use events::{DiagnosticError, MetricEvent};

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for HTTP/CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.history.lock().expect("history poisoned");
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn subscribe_unbounded(&self) -> mpsc::UnboundedReceiver<MetricEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.tx.subscribe();

        tokio::spawn(async move {
            while let Ok(event) = broadcast_rx.recv().await {
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        rx
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history.lock().expect("history poisoned");
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Latency tracker maintains a rolling window to compute avg/max latency,
/// keyed per detection method.
struct LatencyTracker {
    samples: VecDeque<f32>,
    max_samples: usize,
}

impl LatencyTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn observe(&mut self, value_us: f32) -> (f32, f32, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value_us.abs());

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let max = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f32, |acc, next| acc.max(next));
        let avg = if count == 0 { 0.0 } else { sum / count as f32 };
        (avg, max, count)
    }
}

/// Top-level hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    latency: Mutex<HashMap<String, LatencyTracker>>,
    buffer_gauges: Mutex<HashMap<String, f32>>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            latency: Mutex::new(HashMap::new()),
            buffer_gauges: Mutex::new(HashMap::new()),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    /// Record one detector invocation's wall-clock cost and publish the
    /// rolling avg/max for that method.
    pub fn record_detector_latency(&self, method: &str, elapsed_us: f32, latency_window: usize) {
        let (avg_us, max_us, sample_count) = {
            let mut latency = self.latency.lock().expect("latency poisoned");
            let tracker = latency
                .entry(method.to_string())
                .or_insert_with(|| LatencyTracker::new(latency_window.max(1)));
            tracker.observe(elapsed_us)
        };
        self.collector.publish(MetricEvent::DetectorLatency {
            method: method.to_string(),
            avg_us,
            max_us,
            sample_count,
        });
    }

    pub fn record_buffer_occupancy(&self, channel: &str, percent: f32) {
        self.buffer_gauges
            .lock()
            .expect("gauges poisoned")
            .insert(channel.to_string(), percent);
        self.collector.publish(MetricEvent::BufferOccupancy {
            channel: channel.to_string(),
            percent,
        });
    }

    pub fn record_anomaly(&self, channel: &str, method: &str) {
        self.collector.publish(MetricEvent::AnomalyRecorded {
            channel: channel.to_string(),
            method: method.to_string(),
        });
    }

    pub fn record_error(&self, code: DiagnosticError, context: &str) {
        self.collector.publish(MetricEvent::Error {
            code,
            context: context.to_string(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_tracker_computes_avg_and_max() {
        let mut tracker = LatencyTracker::new(3);
        tracker.observe(10.0);
        tracker.observe(20.0);
        let (avg, max, count) = tracker.observe(30.0);
        assert_eq!(count, 3);
        assert_eq!(avg, 20.0);
        assert_eq!(max, 30.0);
    }

    #[test]
    fn latency_tracker_evicts_oldest_past_window() {
        let mut tracker = LatencyTracker::new(2);
        tracker.observe(1.0);
        tracker.observe(2.0);
        let (avg, _, count) = tracker.observe(3.0);
        assert_eq!(count, 2);
        assert_eq!(avg, 2.5);
    }

    #[test]
    fn hub_snapshot_tracks_total_and_dropped_events() {
        let hub = TelemetryHub::new(16, 2);
        hub.record_buffer_occupancy("pressure", 10.0);
        hub.record_buffer_occupancy("pressure", 20.0);
        hub.record_buffer_occupancy("pressure", 30.0);
        let snapshot = hub.snapshot();
        assert_eq!(snapshot.total_events, 3);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(snapshot.recent.len(), 2);
    }
}
