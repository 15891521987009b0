//! Drilling telemetry anomaly-detection engine.
//!
//! Four detection methods (Z-score, LOF, FFT, AMMAD) operate over bounded
//! per-channel ring buffers, driven by a batch orchestrator (fan-out per
//! row) and a stream orchestrator (one cooperative loop per session, live
//! reconfiguration via control messages).

pub mod batch;
pub mod buffer;
pub mod config;
pub mod detectors;
pub mod error;
pub mod record;
pub mod state;
pub mod stream;
pub mod telemetry;

#[cfg(feature = "debug_http")]
pub mod http;

pub use batch::{run as run_batch, BatchRequest, BatchResponse};
pub use buffer::RingBuffer;
pub use config::EngineConfig;
pub use detectors::Method;
pub use record::{Decision, OutputRecord, Record};
pub use state::AnalysisState;
pub use stream::{run as run_stream, StreamFrame};

/// Initialise the `tracing`/`log` bridge once for binaries embedding this
/// crate, mirroring the teacher's `init_logging`.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
