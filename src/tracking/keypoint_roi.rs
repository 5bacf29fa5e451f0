//! Association of keypoint matches with a single region.

use nalgebra::{Point2, Vector2};
use tracing::debug;

use crate::geometry::Roi;
use crate::tracking::frame::{Correspondence, Keypoint, Region};

/// Matches farther from the in-box centroid than `OUTLIER_SIGMA` times the
/// spread are rejected.
pub const OUTLIER_SIGMA: f64 = 1.0;

/// Select the matches whose current keypoint lies in `roi`, then drop the
/// spatial outliers among them.
///
/// The spread is the root mean squared distance of the in-box current
/// keypoints to their centroid. The retention test is inclusive, so a single
/// in-box match (spread 0, distance 0) survives.
pub fn cluster_kpt_matches_with_roi(
    roi: &Roi,
    kpts_curr: &[Keypoint],
    kpt_matches: &[Correspondence],
) -> Vec<Correspondence> {
    let inbox: Vec<(Correspondence, Point2<f64>)> = kpt_matches
        .iter()
        .filter_map(|m| {
            let pt = kpts_curr.get(m.curr_idx)?.pt;
            roi.contains(&pt).then_some((*m, pt))
        })
        .collect();

    if inbox.is_empty() {
        return Vec::new();
    }

    let n = inbox.len() as f64;
    let sum = inbox
        .iter()
        .fold(Vector2::zeros(), |acc, (_, pt)| acc + pt.coords);
    let center = Point2::from(sum / n);

    let variance = inbox
        .iter()
        .map(|(_, pt)| (*pt - center).norm_squared())
        .sum::<f64>()
        / n;
    let spread = variance.sqrt();
    let threshold = spread * OUTLIER_SIGMA;

    let filtered: Vec<Correspondence> = inbox
        .iter()
        .filter(|(_, pt)| (*pt - center).norm() <= threshold)
        .map(|(m, _)| *m)
        .collect();

    debug!(
        "keypoint clustering: {} in box, {} kept (spread {:.1} px)",
        inbox.len(),
        filtered.len(),
        spread
    );

    filtered
}

/// Replace the region's keypoint matches with the clustered subset.
pub fn assign_kpt_matches(
    region: &mut Region,
    kpts_curr: &[Keypoint],
    kpt_matches: &[Correspondence],
) {
    region.kpt_matches = cluster_kpt_matches_with_roi(&region.roi, kpts_curr, kpt_matches);
}
