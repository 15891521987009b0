//! FFT high-frequency-ratio detector (C4, spec.md §4.5).

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Default block length (also the FFT size).
pub const DEFAULT_WINDOW: usize = 64;
/// Default score threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.30;

const TOTAL_ENERGY_FLOOR: f64 = 1e-9;

/// `values` is oldest-first; the last element is the current sample.
///
/// Unlike the Z-score/LOF trailing-window detectors, FFT's minimum is
/// `len >= W` (inclusive) and it operates on the last `W` samples as one
/// block (spec.md §4.5).
pub fn detect(values: &[f64], window: usize, threshold: f64) -> bool {
    raw_ratio(values, window).is_some_and(|ratio| ratio > threshold)
}

/// The high-frequency band energy ratio, or `None` during warmup or when
/// the block carries no energy (`total < eps`).
pub fn raw_ratio(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let block = &values[values.len() - window..];

    let mean = block.iter().sum::<f64>() / window as f64;
    let hann = hann_window(window);
    let mut buffer: Vec<Complex<f64>> = block
        .iter()
        .zip(hann.iter())
        .map(|(&sample, &w)| Complex::new((sample - mean) * w, 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(window);
    fft.process(&mut buffer);

    let magnitudes: Vec<f64> = buffer.iter().map(|c| c.norm()).collect();
    let total: f64 = magnitudes.iter().sum();
    if total < TOTAL_ENERGY_FLOOR {
        return None;
    }

    // Half-open band [W/4, W/2) - preserve exactly, a known source of
    // false-negative regressions if shifted by one (spec.md §9).
    let band_start = window / 4;
    let band_end = window / 2;
    let band_energy: f64 = magnitudes[band_start..band_end].iter().sum();

    Some(band_energy / total)
}

fn hann_window(len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (len as f64 - 1.0)).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_returns_false() {
        let values = vec![1.0; 10];
        assert!(!detect(&values, DEFAULT_WINDOW, DEFAULT_THRESHOLD));
    }

    #[test]
    fn s2_fft_square_wave_burst_detected_at_position_16() {
        let window = 8;
        let threshold = 0.3;
        let mut stream = vec![10.0; 8];
        stream.extend_from_slice(&[30.0, 10.0, 30.0, 10.0, 30.0, 10.0, 30.0, 10.0]);
        assert_eq!(stream.len(), 16);
        assert!(detect(&stream, window, threshold), "burst should be flagged");
    }

    #[test]
    fn s2_fft_constant_block_not_detected_at_position_8() {
        let window = 8;
        let threshold = 0.3;
        let stream = vec![10.0; 8];
        assert!(!detect(&stream, window, threshold));
    }

    #[test]
    fn constant_block_has_zero_energy_after_mean_subtraction() {
        let values = vec![42.0; 64];
        assert!(raw_ratio(&values, 64).is_none());
    }
}
