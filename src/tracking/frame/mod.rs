//! Per-frame measurement types and the feature extraction interface.

pub mod features;
#[cfg(feature = "opencv")]
pub mod opencv_backend;
pub mod proposal;
pub mod types;

pub use features::{
    DescriptorKind, Descriptors, DetectorKind, FeatureExtractor, FeatureSet, validate_combination,
};
pub use proposal::RegionProposer;
pub use types::{Correspondence, Keypoint, LidarPoint, Region, RegionId};
