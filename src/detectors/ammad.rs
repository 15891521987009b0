//! AMMAD hybrid detector (C5, spec.md §4.6).
//!
//! Adaptive Multi-Method Anomaly Detection: a per-channel stateful blend of
//! Z-score, LOF, and FFT sub-scores, gated by safety-limit and
//! rate-of-change short-circuits and combined through adaptive weights.

use std::collections::{HashMap, VecDeque};

use super::{fft, lof, zscore};

/// History length AMMAD retains per channel.
pub const HISTORY_CAPACITY: usize = 300;
/// Minimum samples before AMMAD will produce a verdict.
pub const MIN_HISTORY: usize = 20;
/// Length of the rolling anomaly-verdict history kept per channel.
const ANOMALY_HISTORY_CAPACITY: usize = 300;

const EPS: f64 = 1e-9;

/// Lower/upper physical bounds for a channel, plus an optional stricter
/// "critical" bound used only for reporting (not evaluated here).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyLimit {
    pub min: f64,
    pub max: f64,
    pub critical: Option<f64>,
}

impl SafetyLimit {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            critical: None,
        }
    }

    pub fn with_critical(mut self, critical: f64) -> Self {
        self.critical = Some(critical);
        self
    }

    fn violated_by(&self, value: f64) -> bool {
        value < self.min || value > self.max
    }
}

/// Channel → safety-limit lookup. A deployment with different physical
/// ranges constructs its own table; `drilling_defaults()` is one canonical
/// source of truth for the 12-channel set this crate ships fixtures for.
#[derive(Debug, Clone, Default)]
pub struct SafetyLimitTable {
    limits: HashMap<String, SafetyLimit>,
}

impl SafetyLimitTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: impl Into<String>, limit: SafetyLimit) -> &mut Self {
        self.limits.insert(channel.into(), limit);
        self
    }

    pub fn get(&self, channel: &str) -> Option<SafetyLimit> {
        self.limits.get(channel).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SafetyLimit)> {
        self.limits.iter().map(|(name, limit)| (name.as_str(), *limit))
    }

    /// The 12-channel drilling parameter set carried over from the original
    /// service's fixture data (spec.md §3 supplement). Representative
    /// physical ranges, not reverse-engineered from upstream bounds.
    pub fn drilling_defaults() -> Self {
        let mut table = Self::new();
        table
            .insert("depth", SafetyLimit::new(0.0, 8000.0))
            .insert("drilling_rate", SafetyLimit::new(0.0, 60.0))
            .insert("hook_load", SafetyLimit::new(0.0, 3_000_000.0))
            .insert("rotor_torque", SafetyLimit::new(0.0, 40_000.0))
            .insert("rotor_rpm", SafetyLimit::new(0.0, 250.0))
            .insert("inlet_pressure", SafetyLimit::new(0.0, 5000.0))
            .insert("inlet_flow_rate", SafetyLimit::new(0.0, 1200.0))
            .insert("outlet_temperature", SafetyLimit::new(-20.0, 150.0))
            .insert("tank_level", SafetyLimit::new(0.0, 500.0))
            .insert("trip_speed", SafetyLimit::new(0.0, 120.0))
            .insert("weight_on_bit", SafetyLimit::new(0.0, 500_000.0))
            .insert("dmk", SafetyLimit::new(0.0, 100.0));
        table
    }
}

/// How strongly a channel resists rapid change; re-weights the Z-score
/// sub-score up for high-inertia channels (slow physical processes) and
/// down for low-inertia ones (spec.md §4.6 step 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InertiaClass {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl InertiaClass {
    fn z_weight_factor(self) -> f64 {
        match self {
            InertiaClass::VeryHigh => 1.4,
            InertiaClass::High => 1.2,
            InertiaClass::Medium => 1.0,
            InertiaClass::Low => 0.8,
            InertiaClass::VeryLow => 0.6,
        }
    }
}

/// Per-channel AMMAD configuration. The base weight triple and the safety
/// limit are the two implementer-observable attributes spec.md §4.6 calls
/// out; everything else here is the ambient tuning this crate fixes (§13).
#[derive(Debug, Clone)]
pub struct ChannelAmmadConfig {
    pub base_weights: (f64, f64, f64),
    pub inertia: InertiaClass,
    pub max_change_rate: f64,
    pub threshold: f64,
    pub requires_consensus: bool,
    pub safety_limit: Option<SafetyLimit>,
}

impl ChannelAmmadConfig {
    pub fn new(max_change_rate: f64) -> Self {
        Self {
            base_weights: (0.4, 0.3, 0.3),
            inertia: InertiaClass::Medium,
            max_change_rate,
            threshold: 0.8,
            requires_consensus: false,
            safety_limit: None,
        }
    }

    pub fn with_safety_limit(mut self, limit: SafetyLimit) -> Self {
        self.safety_limit = Some(limit);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_consensus(mut self, requires_consensus: bool) -> Self {
        self.requires_consensus = requires_consensus;
        self
    }

    pub fn with_inertia(mut self, inertia: InertiaClass) -> Self {
        self.inertia = inertia;
        self
    }
}

/// Per-channel mutable AMMAD state: extended history, last sample, and the
/// rolling record of past verdicts.
#[derive(Debug, Clone, Default)]
pub struct AmmadChannelState {
    history: VecDeque<f64>,
    last_value: Option<f64>,
    anomaly_history: VecDeque<bool>,
}

impl AmmadChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Per-(session, channel) AMMAD state, owned by the session's Analysis
/// State rather than a process-global table (spec.md §9 design note,
/// resolved per SPEC_FULL.md §5).
pub type AmmadChannelTable = HashMap<String, AmmadChannelState>;

struct WindowStats {
    non_stationarity: f64,
    noise: f64,
    trend: f64,
}

fn window_stats(window: &[f64]) -> WindowStats {
    let n = window.len();
    let mean = window.iter().sum::<f64>() / n as f64;
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    let std = variance.sqrt();

    let half = n / 2;
    let non_stationarity = if half == 0 {
        0.0
    } else {
        let first_half_mean = window[..half].iter().sum::<f64>() / half as f64;
        let second_half_mean = window[n - half..].iter().sum::<f64>() / half as f64;
        ((second_half_mean - first_half_mean).abs() / std.max(EPS)).min(1.0)
    };

    let noise = (std / (mean.abs() + EPS)).min(1.0);

    // Least-squares slope over the window index, normalised by the
    // window's own scale so it is comparable across channels.
    let trend = {
        let xs_mean = (n as f64 - 1.0) / 2.0;
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, &value) in window.iter().enumerate() {
            let dx = i as f64 - xs_mean;
            numerator += dx * (value - mean);
            denominator += dx * dx;
        }
        let slope = if denominator < EPS { 0.0 } else { numerator / denominator };
        (slope.abs() * n as f64 / (std.max(EPS) * 4.0)).min(1.0)
    };

    WindowStats {
        non_stationarity,
        noise,
        trend,
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

fn adaptive_weights(base: (f64, f64, f64), inertia: InertiaClass, stats: &WindowStats) -> (f64, f64, f64) {
    let (mut w_z, mut w_lof, mut w_fft) = base;

    w_fft += 0.3 * stats.non_stationarity + 0.2 * stats.noise;
    w_lof += 0.3 * stats.trend;
    w_z *= inertia.z_weight_factor();

    let total = w_z + w_lof + w_fft;
    if total < EPS {
        (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
    } else {
        (w_z / total, w_lof / total, w_fft / total)
    }
}

/// Append `current`, advance per-channel state, and evaluate the full
/// AMMAD pipeline (spec.md §4.6 steps 1-9).
pub fn detect(state: &mut AmmadChannelState, config: &ChannelAmmadConfig, current: f64) -> bool {
    if state.history.len() == HISTORY_CAPACITY {
        state.history.pop_front();
    }
    state.history.push_back(current);

    if state.history.len() < MIN_HISTORY {
        state.last_value = Some(current);
        return false;
    }

    if let Some(limit) = config.safety_limit {
        if limit.violated_by(current) {
            record_verdict(state, true);
            state.last_value = Some(current);
            return true;
        }
    }

    if let Some(previous) = state.last_value {
        if (current - previous).abs() > config.max_change_rate {
            record_verdict(state, true);
            state.last_value = Some(current);
            return true;
        }
    }

    let snapshot: Vec<f64> = state.history.iter().copied().collect();
    let trailing_window = snapshot.len() - 1;

    let z_raw = zscore::raw_score(&snapshot, trailing_window).unwrap_or(0.0);
    let s_z = sigmoid((z_raw - 3.0) / 1.5);

    let lof_k = lof::lightweight_k(trailing_window);
    let lof_raw = lof::raw_score(&snapshot, trailing_window, lof_k).unwrap_or(1.0);
    let s_lof = if lof_raw > 1.0 {
        clamp01((lof_raw - 1.0).ln_1p() / (lof::DEFAULT_THRESHOLD - 1.0).ln_1p())
    } else {
        0.0
    };

    let fft_window = fft::DEFAULT_WINDOW.min(snapshot.len());
    let fft_raw = fft::raw_ratio(&snapshot, fft_window).unwrap_or(0.0);
    let s_fft = (fft_raw / fft::DEFAULT_THRESHOLD).min(1.0);

    let stats = window_stats(&snapshot[..trailing_window]);
    let (w_z, w_lof, w_fft) = adaptive_weights(config.base_weights, config.inertia, &stats);

    let combined = s_z * w_z + s_lof * w_lof + s_fft * w_fft;

    let votes = [
        zscore::detect(&snapshot, trailing_window, zscore::DEFAULT_THRESHOLD),
        lof::detect_with_k(&snapshot, trailing_window, lof::DEFAULT_THRESHOLD, lof_k),
        fft::detect(&snapshot, fft_window, fft::DEFAULT_THRESHOLD),
    ]
    .iter()
    .filter(|&&v| v)
    .count();

    let verdict = if config.requires_consensus {
        (votes >= 2 && combined >= config.threshold) || combined >= config.threshold + 0.15
    } else {
        combined >= config.threshold
            || (([s_z, s_lof, s_fft].iter().any(|&s| s > 0.9)) && combined > config.threshold - 0.1)
    };

    record_verdict(state, verdict);
    state.last_value = Some(current);
    verdict
}

fn record_verdict(state: &mut AmmadChannelState, verdict: bool) {
    if state.anomaly_history.len() == ANOMALY_HISTORY_CAPACITY {
        state.anomaly_history.pop_front();
    }
    state.anomaly_history.push_back(verdict);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stable_config() -> ChannelAmmadConfig {
        ChannelAmmadConfig::new(50.0).with_threshold(0.8)
    }

    #[test]
    fn warmup_returns_false() {
        let mut state = AmmadChannelState::new();
        let config = stable_config();
        for i in 0..19 {
            assert!(!detect(&mut state, &config, 100.0 + i as f64 * 0.01));
        }
    }

    #[test]
    fn s4_safety_limit_short_circuit() {
        let mut state = AmmadChannelState::new();
        let config = ChannelAmmadConfig::new(1000.0)
            .with_safety_limit(SafetyLimit::new(0.0, 400.0))
            .with_threshold(0.99);
        for _ in 0..25 {
            assert!(!detect(&mut state, &config, 100.0));
        }
        assert!(detect(&mut state, &config, 500.0));
    }

    #[test]
    fn rate_of_change_short_circuit_fires_above_max_change_rate() {
        let mut state = AmmadChannelState::new();
        let config = ChannelAmmadConfig::new(5.0).with_threshold(0.99);
        for i in 0..25 {
            assert!(!detect(&mut state, &config, 100.0 + (i as f64) * 0.01));
        }
        assert!(detect(&mut state, &config, 200.0));
    }

    #[test]
    fn stable_signal_within_limits_never_flags() {
        let mut state = AmmadChannelState::new();
        let config = stable_config();
        for i in 0..50 {
            let value = 100.0 + (i as f64 * 0.37).sin() * 0.1;
            assert!(!detect(&mut state, &config, value));
        }
    }

    #[test]
    fn any_path_true_wins_consensus_or_override() {
        // With consensus required, a combined score past the high-confidence
        // override threshold (τ + 0.15) must fire even without 2 votes.
        let mut state = AmmadChannelState::new();
        let config = ChannelAmmadConfig::new(10_000.0)
            .with_threshold(0.5)
            .with_consensus(true);
        for i in 0..25 {
            assert!(!detect(&mut state, &config, 100.0 + (i as f64) * 0.01));
        }
        assert!(detect(&mut state, &config, 900.0));
    }
}
