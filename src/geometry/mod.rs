//! Geometry utilities: lidar-to-image projection, image rectangles.

pub mod projection;
pub mod roi;

pub use projection::LidarProjection;
pub use roi::Roi;
