//! Z-score detector (C2, spec.md §4.3).

/// Default trailing window length.
pub const DEFAULT_WINDOW: usize = 30;
/// Default score threshold.
pub const DEFAULT_THRESHOLD: f64 = 3.0;

/// Dead-signal guard: below this standard deviation the channel is treated
/// as flat and never flagged.
const SIGMA_FLOOR: f64 = 0.01;

/// `values` is oldest-first; the last element is the current sample.
///
/// Returns `false` during warmup (`values.len() <= window`), per the
/// minimum `len > W` in spec.md §4.3.
pub fn detect(values: &[f64], window: usize, threshold: f64) -> bool {
    raw_score(values, window).is_some_and(|z| z > threshold)
}

/// The raw `|current - mean| / std` score, or `None` during warmup or when
/// the dead-signal guard trips (`std < 0.01`).
pub fn raw_score(values: &[f64], window: usize) -> Option<f64> {
    if values.len() <= window {
        return None;
    }
    let current = *values.last().expect("checked non-empty above");
    let trailing = &values[values.len() - window - 1..values.len() - 1];
    let (mean, std) = mean_and_population_std(trailing);
    if std < SIGMA_FLOOR {
        return None;
    }
    Some((current - mean).abs() / std)
}

/// Population mean and standard deviation (divide by `n`, not `n - 1`) over
/// the trailing window, per spec.md §4.3.
fn mean_and_population_std(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
