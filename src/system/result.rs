//! Per-frame results handed to reporting and display consumers.

use serde::{Serialize, Serializer};

use crate::stats;
use crate::tracking::frame::{Region, RegionId};
use crate::tracking::region_matching::{RegionMatch, RegionVotes};
use crate::ttc::TtcEstimate;

fn serialize_region_id<S: Serializer>(id: &RegionId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i32(id.0)
}

/// TTC estimates for one region tracked from the previous into the current frame.
#[derive(Debug, Clone, Serialize)]
pub struct TtcReport {
    pub frame: usize,
    #[serde(serialize_with = "serialize_region_id")]
    pub prev_id: RegionId,
    #[serde(serialize_with = "serialize_region_id")]
    pub curr_id: RegionId,
    pub class_id: i32,
    pub n_lidar_prev: usize,
    pub n_lidar_curr: usize,
    /// Keypoint matches left after clustering.
    pub n_kpt_matches: usize,
    pub ttc_lidar: TtcEstimate,
    pub ttc_camera: TtcEstimate,
}

/// Top-view figures of a region's lidar points.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSummary {
    pub id: RegionId,
    pub n_points: usize,
    /// Closest forward distance (m).
    pub min_x: Option<f64>,
    pub median_x: Option<f64>,
    /// Lateral extent (m).
    pub width_y: f64,
}

impl RegionSummary {
    pub fn from_region(region: &Region) -> Self {
        let xs = region.lidar_x();
        let ys: Vec<f64> = region.lidar_points.iter().map(|p| p.y).collect();
        Self {
            id: region.id,
            n_points: region.lidar_points.len(),
            min_x: stats::min(&xs),
            median_x: stats::median(&xs),
            width_y: stats::range_width(&ys),
        }
    }
}

/// Everything produced while processing one frame.
#[derive(Debug, Clone)]
pub struct FrameResult {
    pub frame: usize,
    pub n_keypoints: usize,
    pub n_lidar_points: usize,
    /// Keypoint matches against the previous frame.
    pub n_kpt_matches: usize,
    pub region_matches: RegionMatch,
    /// Vote table behind `region_matches`, with the keypoint matches
    /// collected per current region.
    pub region_votes: RegionVotes,
    pub reports: Vec<TtcReport>,
    pub regions: Vec<RegionSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Roi;
    use crate::tracking::frame::LidarPoint;
    use approx::assert_relative_eq;

    #[test]
    fn test_region_summary() {
        let mut region = Region::new(2, Roi::new(0.0, 0.0, 10.0, 10.0));
        region.lidar_points = vec![
            LidarPoint::new(7.9, -0.7, -1.0, 0.5),
            LidarPoint::new(8.3, 0.6, -1.0, 0.5),
            LidarPoint::new(8.0, 0.1, -1.0, 0.5),
        ];

        let summary = RegionSummary::from_region(&region);

        assert_eq!(summary.n_points, 3);
        assert_eq!(summary.min_x, Some(7.9));
        assert_eq!(summary.median_x, Some(8.0));
        assert_relative_eq!(summary.width_y, 1.3, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_region_summary() {
        let summary = RegionSummary::from_region(&Region::new(0, Roi::new(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(summary.min_x, None);
        assert_eq!(summary.median_x, None);
        assert_eq!(summary.width_y, 0.0);
    }
}
