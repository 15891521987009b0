//! Local-outlier-factor detector (C3, spec.md §4.4).

/// Default trailing window length.
pub const DEFAULT_WINDOW: usize = 60;
/// Default score threshold.
pub const DEFAULT_THRESHOLD: f64 = 25.0;
/// Default neighbour count.
pub const DEFAULT_K: usize = 5;

const EPS: f64 = 1e-6;

/// `values` is oldest-first; the last element is the current sample.
pub fn detect(values: &[f64], window: usize, threshold: f64) -> bool {
    detect_with_k(values, window, threshold, DEFAULT_K)
}

pub fn detect_with_k(values: &[f64], window: usize, threshold: f64, k: usize) -> bool {
    raw_score(values, window, k).is_some_and(|score| score > threshold)
}

/// The neighbour count AMMAD's lightweight LOF sub-score uses:
/// `k = min(5, max(3, W / 15))` (spec.md §4.4).
pub fn lightweight_k(window: usize) -> usize {
    DEFAULT_K.min((window / 15).max(3))
}

/// The raw LOF score, or `None` during warmup or when a guard (constant
/// signal, collapsed density) trips - both of which are "not anomalous".
pub fn raw_score(values: &[f64], window: usize, k: usize) -> Option<f64> {
    if values.len() <= window {
        return None;
    }
    let current = *values.last().expect("checked non-empty above");
    let trailing = &values[values.len() - window - 1..values.len() - 1];

    let anchor = trailing[0];
    let constant_signal = trailing.iter().all(|v| (v - anchor).abs() < EPS) && (current - anchor).abs() < EPS;
    if constant_signal {
        return None;
    }

    let lrd_current = reachability_density(current, trailing, k);
    if lrd_current < EPS {
        return None;
    }

    let mut by_distance: Vec<(usize, f64)> = trailing
        .iter()
        .enumerate()
        .map(|(i, &v)| (i, (v - current).abs()))
        .collect();
    by_distance.sort_by(|a, b| a.1.partial_cmp(&b.1).expect("no NaNs in samples"));
    let k_eff = k.min(by_distance.len());

    let mean_neighbor_lrd: f64 = by_distance[..k_eff]
        .iter()
        .map(|&(idx, _)| {
            let neighbor_value = trailing[idx];
            let pool: Vec<f64> = trailing
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != idx)
                .map(|(_, &v)| v)
                .collect();
            reachability_density(neighbor_value, &pool, k)
        })
        .sum::<f64>()
        / k_eff as f64;

    Some(mean_neighbor_lrd / lrd_current)
}

/// `lrd(p, S)` from spec.md §4.4: the inverse mean reachability distance of
/// `p` against `S`, using the k-th smallest distance as the reachability
/// floor. `1.0` if `S` is empty or distances collapse to zero.
fn reachability_density(point: f64, pool: &[f64], k: usize) -> f64 {
    if pool.is_empty() {
        return 1.0;
    }
    let mut distances: Vec<f64> = pool.iter().map(|s| (s - point).abs()).collect();
    distances.sort_by(|a, b| a.partial_cmp(b).expect("no NaNs in samples"));
    let k_eff = k.min(distances.len());
    let k_dist = distances[k_eff - 1];
    let reach_sum: f64 = distances[..k_eff].iter().map(|d| d.max(k_dist)).sum();
    let mean_reach = reach_sum / k_eff as f64;
    if mean_reach < EPS {
        1.0
    } else {
        1.0 / mean_reach
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_returns_false() {
        let values = vec![1.0, 2.0, 3.0];
        assert!(!detect(&values, 60, DEFAULT_THRESHOLD));
    }

    #[test]
    fn s3_lof_rejects_dead_signal() {
        let window = 5;
        let threshold = 10.0;
        let stream = [7.0, 7.0, 7.0, 7.0, 7.0, 7.0];
        assert!(!detect(&stream, window, threshold));
    }

    #[test]
    fn sharp_spike_scores_above_threshold() {
        let mut values: Vec<f64> = (0..20).map(|i| 10.0 + (i as f64) * 0.01).collect();
        values.push(500.0);
        assert!(detect(&values, 20, 2.0));
    }

    #[test]
    fn lightweight_k_matches_formula() {
        assert_eq!(lightweight_k(60), 4);
        assert_eq!(lightweight_k(15), 3);
        assert_eq!(lightweight_k(150), 5);
    }
}
