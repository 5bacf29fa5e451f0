//! Order statistics over scalar samples.
//!
//! All helpers take a borrowed slice and work on a private copy, so caller
//! data is never reordered. An empty input yields `None` rather than a NaN.

/// Median of `values`: the middle element for odd counts, the mean of the
/// two middle elements for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    if n % 2 == 0 {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    } else {
        Some(sorted[n / 2])
    }
}

/// Element at the `p`-th percentile (`p` in `[0, 100]`).
///
/// The index is `floor(min(1, p / 100) * n)` clamped to `[0, n - 1]`, i.e. no
/// interpolation between neighbouring samples.
pub fn percentile(p: f64, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let n = values.len();
    let fraction = (p / 100.0).min(1.0);
    let index = ((fraction * n as f64).floor().max(0.0) as usize).min(n - 1);

    let mut scratch = values.to_vec();
    let (_, nth, _) = scratch.select_nth_unstable_by(index, f64::total_cmp);
    Some(*nth)
}

/// Smallest element.
pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().min_by(f64::total_cmp)
}

/// `max - min` of `values`, `0.0` when empty.
pub fn range_width(values: &[f64]) -> f64 {
    let lo = values.iter().copied().min_by(f64::total_cmp);
    let hi = values.iter().copied().max_by(f64::total_cmp);
    match (lo, hi) {
        (Some(lo), Some(hi)) => hi - lo,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[7.0]), Some(7.0));
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(median(&[]), None);
        assert_eq!(percentile(10.0, &[]), None);
        assert_eq!(min(&[]), None);
        assert_eq!(range_width(&[]), 0.0);
    }

    #[test]
    fn test_median_does_not_reorder_input() {
        let values = vec![5.0, 1.0, 4.0, 2.0];
        let _ = median(&values);
        let _ = percentile(50.0, &values);
        assert_eq!(values, vec![5.0, 1.0, 4.0, 2.0]);
    }

    #[test]
    fn test_percentile_index_rule() {
        let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        // floor(0.1 * 20) = 2
        assert_eq!(percentile(10.0, &values), Some(2.0));
        assert_eq!(percentile(0.0, &values), Some(0.0));
        // p >= 100 clamps to the last element
        assert_eq!(percentile(100.0, &values), Some(19.0));
        assert_eq!(percentile(250.0, &values), Some(19.0));
        assert_eq!(percentile(-5.0, &values), Some(0.0));
    }

    #[test]
    fn test_percentile_matches_full_sort() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut values: Vec<f64> = (0..101).map(|i| (i * 37 % 101) as f64 * 0.5).collect();
        values.shuffle(&mut rng);

        let mut sorted = values.clone();
        sorted.sort_by(f64::total_cmp);

        for p in [0.0, 10.0, 33.0, 50.0, 90.0, 99.0] {
            let idx = ((p / 100.0) * values.len() as f64).floor() as usize;
            assert_eq!(percentile(p, &values), Some(sorted[idx]));
        }
    }

    #[test]
    fn test_permutation_invariance_and_idempotence() {
        let mut rng = StdRng::seed_from_u64(42);
        let base = vec![8.1, 7.9, 8.4, 7.6, 8.0, 9.3, 7.7];
        let expected_median = median(&base);
        let expected_p10 = percentile(10.0, &base);

        for _ in 0..10 {
            let mut shuffled = base.clone();
            shuffled.shuffle(&mut rng);
            assert_eq!(median(&shuffled), expected_median);
            assert_eq!(median(&shuffled), median(&shuffled));
            assert_eq!(percentile(10.0, &shuffled), expected_p10);
        }
    }

    #[test]
    fn test_percentile_ordering_and_median_agreement() {
        let values = vec![3.2, -1.0, 8.5, 0.4, 2.2];
        let p0 = percentile(0.0, &values).unwrap();
        let p50 = percentile(50.0, &values).unwrap();
        let p100 = percentile(100.0, &values).unwrap();

        assert!(p0 <= p50 && p50 <= p100);
        assert_eq!(Some(p50), median(&values));
    }

    #[test]
    fn test_min_and_width() {
        let values = [7.5, 7.2, 8.9, 7.9];
        assert_eq!(min(&values), Some(7.2));
        assert_relative_eq!(range_width(&values), 1.7, epsilon = 1e-12);
        assert_eq!(range_width(&[3.0]), 0.0);
    }
}
