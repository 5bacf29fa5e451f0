//! Lidar-based TTC from two point sets of the same object.
//!
//! Constant velocity model:
//!
//! ```text
//! v   = (d_prev - d_curr) / dt
//! TTC = d_curr / v
//! ```
//!
//! `d` is the 10th percentile of the forward distances rather than the
//! minimum, so a few spurious returns in front of the object do not drag the
//! estimate.

use tracing::debug;

use crate::stats;
use crate::tracking::frame::LidarPoint;
use crate::ttc::TtcEstimate;

/// Percentile of forward distances used as the object distance.
pub const LIDAR_PERCENTILE: f64 = 10.0;

/// TTC from the previous and current distance to the object.
pub fn ttc_from_distances(prev: f64, curr: f64, frame_rate: f64) -> TtcEstimate {
    if curr >= prev {
        return TtcEstimate::NotClosing;
    }

    let speed = (prev - curr) * frame_rate;
    TtcEstimate::Seconds(curr / speed)
}

pub fn compute_ttc_lidar(
    lidar_points_prev: &[LidarPoint],
    lidar_points_curr: &[LidarPoint],
    frame_rate: f64,
) -> TtcEstimate {
    let x_prev: Vec<f64> = lidar_points_prev.iter().map(|p| p.x).collect();
    let x_curr: Vec<f64> = lidar_points_curr.iter().map(|p| p.x).collect();

    let (Some(prev), Some(curr)) = (
        stats::percentile(LIDAR_PERCENTILE, &x_prev),
        stats::percentile(LIDAR_PERCENTILE, &x_curr),
    ) else {
        return TtcEstimate::Undefined;
    };

    let ttc = ttc_from_distances(prev, curr, frame_rate);
    debug!(
        "TTC lidar = {}, prev/curr = {:.3}/{:.3} m, min = {:?}/{:?}, width = {:.2}/{:.2}",
        ttc,
        prev,
        curr,
        stats::min(&x_prev),
        stats::min(&x_curr),
        stats::range_width(&x_prev),
        stats::range_width(&x_curr)
    );
    ttc
}
