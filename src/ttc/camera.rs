//! Camera-based TTC from keypoint distance ratios.
//!
//! Under a pinhole model the pixel distance between two points on the same
//! object scales with the inverse of its depth, so for every pair of matched
//! keypoints `h_curr / h_prev = d_prev / d_curr`. With a constant velocity
//! model this gives
//!
//! ```text
//! TTC = -dt / (1 - ratio)
//! ```
//!
//! The median over all pairs is used as the ratio.

use tracing::debug;

use crate::stats;
use crate::tracking::frame::{Correspondence, Keypoint};
use crate::ttc::TtcEstimate;

/// Pairs closer than this in the current frame are dominated by keypoint
/// localisation noise.
pub const MIN_KEYPOINT_DIST_PX: f64 = 100.0;

/// Distance ratios `dist_curr / dist_prev` over all pairs of matches.
pub fn distance_ratios(
    kpts_prev: &[Keypoint],
    kpts_curr: &[Keypoint],
    kpt_matches: &[Correspondence],
) -> Vec<f64> {
    // Matches with out-of-range indices cannot contribute.
    let pairs: Vec<(&Keypoint, &Keypoint)> = kpt_matches
        .iter()
        .filter_map(|m| Some((kpts_prev.get(m.prev_idx)?, kpts_curr.get(m.curr_idx)?)))
        .collect();

    let mut ratios = Vec::new();
    for (i, (outer_prev, outer_curr)) in pairs.iter().enumerate() {
        for (inner_prev, inner_curr) in &pairs[i + 1..] {
            let dist_curr = nalgebra::distance(&outer_curr.pt, &inner_curr.pt);
            let dist_prev = nalgebra::distance(&outer_prev.pt, &inner_prev.pt);

            if dist_prev > f64::EPSILON && dist_curr >= MIN_KEYPOINT_DIST_PX {
                ratios.push(dist_curr / dist_prev);
            }
        }
    }
    ratios
}

/// TTC from a set of distance ratios.
pub fn ttc_from_distance_ratios(ratios: &[f64], frame_rate: f64) -> TtcEstimate {
    let Some(median_ratio) = stats::median(ratios) else {
        return TtcEstimate::Undefined;
    };

    let denom = 1.0 - median_ratio;
    if denom.abs() <= f64::EPSILON {
        // no scale change: the object keeps its distance
        return TtcEstimate::NotClosing;
    }

    let dt = 1.0 / frame_rate;
    TtcEstimate::Seconds(-dt / denom)
}

pub fn compute_ttc_camera(
    kpts_prev: &[Keypoint],
    kpts_curr: &[Keypoint],
    kpt_matches: &[Correspondence],
    frame_rate: f64,
) -> TtcEstimate {
    let ratios = distance_ratios(kpts_prev, kpts_curr, kpt_matches);
    let ttc = ttc_from_distance_ratios(&ratios, frame_rate);

    debug!(
        "TTC camera = {}, {} matches, {} distance ratios, median ratio = {:?}",
        ttc,
        kpt_matches.len(),
        ratios.len(),
        stats::median(&ratios)
    );
    ttc
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Keypoints of a square constellation around `(cx, cy)` scaled by `s`.
    fn square(cx: f64, cy: f64, half: f64, s: f64) -> Vec<Keypoint> {
        [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
            .iter()
            .map(|(dx, dy)| Keypoint::new(cx + dx * half * s, cy + dy * half * s))
            .collect()
    }

    fn identity_matches(n: usize) -> Vec<Correspondence> {
        (0..n).map(|i| Correspondence::new(i, i)).collect()
    }

    #[test]
    fn test_median_ratio_scenario() {
        let ttc = ttc_from_distance_ratios(&[1.05, 1.10, 0.95], 10.0);
        assert_relative_eq!(ttc.seconds().unwrap(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uniform_expansion() {
        let prev = square(600.0, 200.0, 100.0, 1.0);
        let curr = square(600.0, 200.0, 100.0, 1.1);

        let ttc = compute_ttc_camera(&prev, &curr, &identity_matches(4), 10.0);

        // ratio 1.1 -> -0.1 / (1 - 1.1) = 1.0 s
        assert_relative_eq!(ttc.seconds().unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_short_pairs_are_skipped() {
        // all pairwise distances < 100 px
        let prev = square(600.0, 200.0, 20.0, 1.0);
        let curr = square(600.0, 200.0, 20.0, 1.1);

        assert!(distance_ratios(&prev, &curr, &identity_matches(4)).is_empty());
        assert_eq!(
            compute_ttc_camera(&prev, &curr, &identity_matches(4), 10.0),
            TtcEstimate::Undefined
        );
    }

    #[test]
    fn test_coincident_previous_keypoints_are_skipped() {
        let prev = vec![Keypoint::new(10.0, 10.0), Keypoint::new(10.0, 10.0)];
        let curr = vec![Keypoint::new(10.0, 10.0), Keypoint::new(300.0, 10.0)];

        assert!(distance_ratios(&prev, &curr, &identity_matches(2)).is_empty());
    }

    #[test]
    fn test_median_resists_a_mismatched_keypoint() {
        let mut prev = square(600.0, 200.0, 100.0, 1.0);
        let mut curr = square(600.0, 200.0, 100.0, 1.1);
        prev.push(Keypoint::new(600.0, 200.0));
        curr.push(Keypoint::new(600.0, 200.0));
        // sixth match points somewhere unrelated
        prev.push(Keypoint::new(300.0, 50.0));
        curr.push(Keypoint::new(900.0, 390.0));

        let ttc = compute_ttc_camera(&prev, &curr, &identity_matches(6), 10.0);
        assert_relative_eq!(ttc.seconds().unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_scale_change_is_not_closing() {
        let prev = square(600.0, 200.0, 100.0, 1.0);
        let ttc = compute_ttc_camera(&prev, &prev, &identity_matches(4), 10.0);
        assert_eq!(ttc, TtcEstimate::NotClosing);
    }

    #[test]
    fn test_single_match_is_undefined() {
        let prev = square(600.0, 200.0, 100.0, 1.0);
        assert_eq!(
            compute_ttc_camera(&prev, &prev, &identity_matches(1), 10.0),
            TtcEstimate::Undefined
        );
        assert_eq!(compute_ttc_camera(&prev, &prev, &[], 10.0), TtcEstimate::Undefined);
    }
}
