//! Dataset loading and report export.

pub mod kitti;
pub mod report;

pub use kitti::{KittiCalibration, KittiDataset};
pub use report::ReportWriter;
