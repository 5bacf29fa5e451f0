//! Lidar to image projection.
//!
//! The calibration comes as three fixed matrices, KITTI style:
//!
//! ```text
//! Y = P_rect_00 * R_rect_00 * RT * [x y z 1]^T
//! (u, v) = (Y0 / Y2, Y1 / Y2)
//! ```
//!
//! - `P_rect_00` (3x4): intrinsic projection after rectification
//! - `R_rect_00` (3x3, embedded into a 4x4): rectifying rotation
//! - `RT` (4x4): rigid transform from the velodyne frame to camera 0

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Point2, Vector3, Vector4};

/// Composed sensor-to-pixel projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LidarProjection {
    p: Matrix3x4<f64>,
}

impl LidarProjection {
    /// Compose the projection from its three calibration factors.
    pub fn new(p_rect: Matrix3x4<f64>, r_rect: Matrix3<f64>, rt: Matrix4<f64>) -> Self {
        let mut r_rect_h = Matrix4::identity();
        r_rect_h.fixed_view_mut::<3, 3>(0, 0).copy_from(&r_rect);
        Self {
            p: p_rect * r_rect_h * rt,
        }
    }

    /// Use an already composed 3x4 projection.
    pub fn from_matrix(p: Matrix3x4<f64>) -> Self {
        Self { p }
    }

    pub fn matrix(&self) -> &Matrix3x4<f64> {
        &self.p
    }

    /// Project a sensor-frame point to pixel coordinates.
    ///
    /// Returns `None` for points on or behind the image plane, which have no
    /// meaningful pixel location.
    pub fn project(&self, point: &Vector3<f64>) -> Option<Point2<f64>> {
        let y = self.p * Vector4::new(point.x, point.y, point.z, 1.0);
        if y.z <= 0.0 {
            return None;
        }
        Some(Point2::new(y.x / y.z, y.y / y.z))
    }
}
