//! Lidar point filtering and point-to-region association.

use tracing::debug;

use crate::config::LidarCropConfig;
use crate::geometry::LidarProjection;
use crate::tracking::frame::{LidarPoint, Region};

/// Keep only points inside the configured box in front of the sensor.
///
/// Removes the road surface (z range), points outside the ego lane (y range)
/// and weak reflections.
pub fn crop_lidar_points(points: &[LidarPoint], crop: &LidarCropConfig) -> Vec<LidarPoint> {
    points
        .iter()
        .filter(|p| {
            p.x >= crop.min_x
                && p.x <= crop.max_x
                && p.y.abs() <= crop.max_y
                && p.z >= crop.min_z
                && p.z <= crop.max_z
                && p.r >= crop.min_r
        })
        .copied()
        .collect()
}

/// Group lidar points by the region their image projection falls into.
///
/// Every region rectangle is shrunk by `shrink_factor` first. A point is kept
/// only if exactly one shrunk region encloses it; points enclosed by no
/// region or by several regions are dropped. The result is row-aligned with
/// `regions`.
pub fn cluster_lidar_with_roi(
    regions: &[Region],
    points: &[LidarPoint],
    shrink_factor: f64,
    projection: &LidarProjection,
) -> Vec<Vec<LidarPoint>> {
    let shrunk: Vec<_> = regions.iter().map(|r| r.roi.shrunk(shrink_factor)).collect();
    let mut clusters = vec![Vec::new(); regions.len()];

    let mut n_unprojected = 0usize;
    let mut n_ambiguous = 0usize;
    let mut n_outside = 0usize;

    for point in points {
        let Some(px) = projection.project(&point.position()) else {
            n_unprojected += 1;
            continue;
        };

        let mut enclosing = shrunk
            .iter()
            .enumerate()
            .filter(|(_, roi)| roi.contains(&px))
            .map(|(idx, _)| idx);

        match (enclosing.next(), enclosing.next()) {
            (Some(idx), None) => clusters[idx].push(*point),
            (Some(_), Some(_)) => n_ambiguous += 1,
            (None, _) => n_outside += 1,
        }
    }

    debug!(
        "lidar association: {} points, {} outside, {} ambiguous, {} behind camera",
        points.len(),
        n_outside,
        n_ambiguous,
        n_unprojected
    );

    clusters
}

/// Replace each region's lidar points with a fresh association.
pub fn assign_lidar_points(
    regions: &mut [Region],
    points: &[LidarPoint],
    shrink_factor: f64,
    projection: &LidarProjection,
) {
    let clusters = cluster_lidar_with_roi(regions, points, shrink_factor, projection);
    for (region, cluster) in regions.iter_mut().zip(clusters) {
        region.lidar_points = cluster;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Roi;
    use nalgebra::{Matrix3x4, Vector3};

    /// Camera looking along the lidar x axis: u = 100*(-y)/x + 500, v = 100*(-z)/x + 200.
    fn projection() -> LidarProjection {
        let k = Matrix3x4::new(
            100.0, 0.0, 500.0, 0.0,
            0.0, 100.0, 200.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
        );
        let velo_to_cam = nalgebra::Matrix4::new(
            0.0, -1.0, 0.0, 0.0,
            0.0, 0.0, -1.0, 0.0,
            1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        LidarProjection::from_matrix(k * velo_to_cam)
    }

    /// Lidar point at range 10 m projecting onto pixel (u, v).
    fn point_at_pixel(u: f64, v: f64) -> LidarPoint {
        let x = 10.0;
        LidarPoint::new(x, -(u - 500.0) * x / 100.0, -(v - 200.0) * x / 100.0, 0.5)
    }

    #[test]
    fn test_point_helper_projects_where_expected() {
        let px = projection()
            .project(&Vector3::new(10.0, -1.0, 0.5))
            .unwrap();
        assert!((px.x - 510.0).abs() < 1e-9);
        assert!((px.y - 195.0).abs() < 1e-9);

        let p = point_at_pixel(420.0, 260.0);
        let px = projection().project(&p.position()).unwrap();
        assert!((px.x - 420.0).abs() < 1e-9);
        assert!((px.y - 260.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_inside_single_region_is_assigned() {
        let mut regions = vec![
            Region::new(0, Roi::new(400.0, 150.0, 100.0, 100.0)),
            Region::new(1, Roi::new(600.0, 150.0, 100.0, 100.0)),
        ];
        let points = vec![point_at_pixel(450.0, 200.0), point_at_pixel(650.0, 210.0)];

        assign_lidar_points(&mut regions, &points, 0.1, &projection());

        assert_eq!(regions[0].lidar_points, vec![points[0]]);
        assert_eq!(regions[1].lidar_points, vec![points[1]]);
    }

    #[test]
    fn test_point_in_overlap_is_dropped() {
        let regions = vec![
            Region::new(0, Roi::new(400.0, 150.0, 100.0, 100.0)),
            Region::new(1, Roi::new(440.0, 150.0, 100.0, 100.0)),
        ];
        // inside both shrunk boxes ([405, 495] and [445, 535])
        let points = vec![point_at_pixel(470.0, 200.0)];

        let clusters = cluster_lidar_with_roi(&regions, &points, 0.1, &projection());

        assert!(clusters.iter().all(|c| c.is_empty()));
    }

    #[test]
    fn test_shrink_margin_resolves_edge_ambiguity() {
        let regions = vec![
            Region::new(0, Roi::new(400.0, 150.0, 100.0, 100.0)),
            Region::new(1, Roi::new(490.0, 150.0, 100.0, 100.0)),
        ];
        // both raw boxes contain u=493, only the shrunk second box ([495, 585]) does not
        let points = vec![point_at_pixel(493.0, 200.0)];

        let without_shrink = cluster_lidar_with_roi(&regions, &points, 0.0, &projection());
        assert!(without_shrink.iter().all(|c| c.is_empty()));

        let with_shrink = cluster_lidar_with_roi(&regions, &points, 0.1, &projection());
        assert_eq!(with_shrink[0].len(), 1);
        assert!(with_shrink[1].is_empty());
    }

    #[test]
    fn test_point_in_shrunk_margin_or_outside_is_dropped() {
        let regions = vec![Region::new(0, Roi::new(400.0, 150.0, 100.0, 100.0))];
        let points = vec![point_at_pixel(402.0, 200.0), point_at_pixel(50.0, 50.0)];

        let clusters = cluster_lidar_with_roi(&regions, &points, 0.1, &projection());
        assert!(clusters[0].is_empty());
    }

    #[test]
    fn test_assignment_replaces_stale_points() {
        let mut regions = vec![Region::new(0, Roi::new(400.0, 150.0, 100.0, 100.0))];
        regions[0].lidar_points = vec![LidarPoint::new(1.0, 2.0, 3.0, 0.0)];

        assign_lidar_points(&mut regions, &[], 0.1, &projection());
        assert!(regions[0].lidar_points.is_empty());
    }

    #[test]
    fn test_crop_keeps_points_in_ego_lane_box() {
        let crop = LidarCropConfig::default();
        let points = vec![
            LidarPoint::new(8.0, 0.5, -1.0, 0.5),  // kept
            LidarPoint::new(8.0, 3.0, -1.0, 0.5),  // outside lane
            LidarPoint::new(8.0, 0.0, -1.7, 0.5),  // road surface
            LidarPoint::new(25.0, 0.0, -1.0, 0.5), // too far
            LidarPoint::new(8.0, 0.0, -1.0, 0.01), // weak return
        ];

        let cropped = crop_lidar_points(&points, &crop);
        assert_eq!(cropped, vec![points[0]]);
    }
}
