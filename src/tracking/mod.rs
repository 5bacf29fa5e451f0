//! Per-frame processing: feature matching, point/region association and
//! region re-identification.
//!
//! - Keypoint descriptor matching between consecutive frames
//! - Lidar point cropping and association with detection regions
//! - Keypoint match clustering per region
//! - Region re-identification by match voting

pub mod frame;
pub mod keypoint_roi;
pub mod lidar;
pub mod matching;
pub mod region_matching;
pub mod tracking_frame;

pub use region_matching::{RegionMatch, match_bounding_boxes};
pub use tracking_frame::Frame;
