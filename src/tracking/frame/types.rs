//! Per-frame measurement types: lidar points, keypoints, matches, regions.

use nalgebra::{Point2, Vector3};

use crate::geometry::Roi;

/// One lidar return in the sensor frame (x forward, y left, z up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LidarPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Reflectivity in `[0, 1]`.
    pub r: f64,
}

impl LidarPoint {
    pub fn new(x: f64, y: f64, z: f64, r: f64) -> Self {
        Self { x, y, z, r }
    }

    #[inline]
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// A detected image feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub pt: Point2<f64>,
    /// Diameter of the meaningful neighbourhood.
    pub size: f64,
    /// Orientation in degrees, `-1.0` if not applicable.
    pub angle: f64,
    pub response: f64,
    pub octave: i32,
    /// Detector-specific tag, `-1` if unused. AKAZE stores the evolution
    /// level here and needs it back when describing.
    pub class_id: i32,
}

impl Keypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            pt: Point2::new(x, y),
            size: 1.0,
            angle: -1.0,
            response: 0.0,
            octave: 0,
            class_id: -1,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_response(mut self, response: f64) -> Self {
        self.response = response;
        self
    }
}

/// Keypoint match between the previous frame (`prev_idx`) and the current
/// frame (`curr_idx`).
///
/// Equivalent to OpenCV's `DMatch` with `queryIdx = prev_idx` and
/// `trainIdx = curr_idx`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub prev_idx: usize,
    pub curr_idx: usize,
    /// Descriptor distance reported by the matcher.
    pub distance: f32,
}

impl Correspondence {
    pub fn new(prev_idx: usize, curr_idx: usize) -> Self {
        Self {
            prev_idx,
            curr_idx,
            distance: 0.0,
        }
    }
}

/// Identifier of a detection region, unique within one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub i32);

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BB{}", self.0)
    }
}

/// A detected object in one frame.
///
/// `lidar_points` and `kpt_matches` are derived data. They start empty and
/// are rebuilt every time a frame is assembled, never carried over from an
/// earlier frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: RegionId,
    pub roi: Roi,
    pub class_id: i32,
    pub confidence: f64,
    pub lidar_points: Vec<LidarPoint>,
    pub kpt_matches: Vec<Correspondence>,
}

impl Region {
    pub fn new(id: i32, roi: Roi) -> Self {
        Self {
            id: RegionId(id),
            roi,
            class_id: -1,
            confidence: 0.0,
            lidar_points: Vec::new(),
            kpt_matches: Vec::new(),
        }
    }

    pub fn with_class(mut self, class_id: i32, confidence: f64) -> Self {
        self.class_id = class_id;
        self.confidence = confidence;
        self
    }

    /// Forward distances (x) of the associated lidar points.
    pub fn lidar_x(&self) -> Vec<f64> {
        self.lidar_points.iter().map(|p| p.x).collect()
    }
}
