//! Tracking `Frame` representation.
//!
//! A `Frame` bundles everything measured at one timestamp: camera features,
//! detection regions and the lidar scan. Region-owned data (lidar points,
//! keypoint matches) is derived when the frame is assembled and never
//! survives into another frame.

use crate::geometry::LidarProjection;
use crate::tracking::frame::{Correspondence, FeatureSet, LidarPoint, Region, RegionId};
use crate::tracking::lidar::assign_lidar_points;
use crate::tracking::region_matching::RegionMatch;

#[derive(Debug, Clone)]
pub struct Frame {
    /// Index of the frame in the input sequence.
    pub index: usize,
    pub features: FeatureSet,
    pub regions: Vec<Region>,
    /// Cropped lidar scan.
    pub lidar_points: Vec<LidarPoint>,
    /// Matches from the previous frame's keypoints to this frame's keypoints.
    pub kpt_matches: Vec<Correspondence>,
    /// Regions of the previous frame re-identified in this frame.
    pub region_matches: RegionMatch,
}

impl Frame {
    /// Assemble a frame and associate its lidar points with its regions.
    ///
    /// Any derived data the regions carry on input is discarded.
    pub fn new(
        index: usize,
        features: FeatureSet,
        mut regions: Vec<Region>,
        lidar_points: Vec<LidarPoint>,
        shrink_factor: f64,
        projection: &LidarProjection,
    ) -> Self {
        for region in &mut regions {
            region.kpt_matches.clear();
        }
        assign_lidar_points(&mut regions, &lidar_points, shrink_factor, projection);

        Self {
            index,
            features,
            regions,
            lidar_points,
            kpt_matches: Vec::new(),
            region_matches: RegionMatch::default(),
        }
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn region_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.id == id)
    }

    /// Number of lidar points associated with any region.
    pub fn num_associated_points(&self) -> usize {
        self.regions.iter().map(|r| r.lidar_points.len()).sum()
    }
}
