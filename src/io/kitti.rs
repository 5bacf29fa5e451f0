use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::ReaderBuilder;
use nalgebra::{Matrix3, Matrix3x4, Matrix4};
use serde::Deserialize;
use tracing::warn;

use crate::config::DatasetConfig;
use crate::geometry::{LidarProjection, Roi};
use crate::tracking::frame::{LidarPoint, Region, RegionProposer};

/// Fixed calibration of one camera/lidar rig.
#[derive(Debug, Clone, PartialEq)]
pub struct KittiCalibration {
    /// Rectified projection of camera 0 (3x4).
    pub p_rect_00: Matrix3x4<f64>,
    /// Rectifying rotation of camera 0.
    pub r_rect_00: Matrix3<f64>,
    /// Velodyne to camera 0 rigid transform.
    pub rt: Matrix4<f64>,
}

impl KittiCalibration {
    /// Load from the KITTI raw `calib_cam_to_cam.txt` / `calib_velo_to_cam.txt` pair.
    pub fn load<P: AsRef<Path>>(cam_to_cam: P, velo_to_cam: P) -> Result<Self> {
        let cam_to_cam = cam_to_cam.as_ref();
        let velo_to_cam = velo_to_cam.as_ref();
        let cam = fs::read_to_string(cam_to_cam)
            .with_context(|| format!("Failed to open {}", cam_to_cam.display()))?;
        let velo = fs::read_to_string(velo_to_cam)
            .with_context(|| format!("Failed to open {}", velo_to_cam.display()))?;
        Self::parse(&cam, &velo)
    }

    pub fn parse(cam_to_cam: &str, velo_to_cam: &str) -> Result<Self> {
        let cam = parse_calib_entries(cam_to_cam);
        let velo = parse_calib_entries(velo_to_cam);

        let p_rect_00 = Matrix3x4::from_row_slice(entry(&cam, "P_rect_00", 12)?);
        let r_rect_00 = Matrix3::from_row_slice(entry(&cam, "R_rect_00", 9)?);

        let r = Matrix3::from_row_slice(entry(&velo, "R", 9)?);
        let t = entry(&velo, "T", 3)?;
        let mut rt = Matrix4::identity();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
        rt[(0, 3)] = t[0];
        rt[(1, 3)] = t[1];
        rt[(2, 3)] = t[2];

        Ok(Self {
            p_rect_00,
            r_rect_00,
            rt,
        })
    }

    pub fn projection(&self) -> LidarProjection {
        LidarProjection::new(self.p_rect_00, self.r_rect_00, self.rt)
    }
}

/// Parse `KEY: v0 v1 ...` lines. Lines whose values are not all numeric
/// (e.g. `calib_time: 09-Jan-2012 13:57:47`) are skipped.
fn parse_calib_entries(text: &str) -> HashMap<String, Vec<f64>> {
    let mut entries = HashMap::new();
    for line in text.lines() {
        let Some((key, values)) = line.split_once(':') else {
            continue;
        };
        let parsed: Result<Vec<f64>, _> = values.split_whitespace().map(str::parse).collect();
        if let Ok(values) = parsed {
            entries.insert(key.trim().to_string(), values);
        }
    }
    entries
}

fn entry<'a>(entries: &'a HashMap<String, Vec<f64>>, key: &str, len: usize) -> Result<&'a [f64]> {
    let Some(values) = entries.get(key) else {
        bail!("Calibration entry {} not found", key);
    };
    if values.len() != len {
        bail!(
            "Expected {} elements for {}, got {}",
            len,
            key,
            values.len()
        );
    }
    Ok(values)
}

/// Read a velodyne scan: consecutive little-endian `f32` quadruples `(x, y, z, r)`.
pub fn load_lidar_points<P: AsRef<Path>>(path: P) -> Result<Vec<LidarPoint>> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.len() % 16 != 0 {
        bail!(
            "{} is not a sequence of (x, y, z, r) f32 records ({} bytes)",
            path.display(),
            bytes.len()
        );
    }

    let points = bytes
        .chunks_exact(16)
        .map(|rec| {
            let f = |i: usize| {
                f32::from_le_bytes([rec[i], rec[i + 1], rec[i + 2], rec[i + 3]]) as f64
            };
            LidarPoint::new(f(0), f(4), f(8), f(12))
        })
        .collect();
    Ok(points)
}

/// One row of a per-frame detections file.
#[derive(Debug, Deserialize)]
struct DetectionRecord {
    id: i32,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    class_id: i32,
    confidence: f64,
}

/// Read region proposals from a CSV file with header
/// `id,x,y,width,height,class_id,confidence`.
pub fn load_detections<P: AsRef<Path>>(path: P) -> Result<Vec<Region>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut regions: Vec<Region> = Vec::new();
    for rec in rdr.deserialize() {
        let rec: DetectionRecord =
            rec.with_context(|| format!("Malformed detection in {}", path.display()))?;
        if regions.iter().any(|r| r.id.0 == rec.id) {
            bail!("Duplicate region id {} in {}", rec.id, path.display());
        }
        regions.push(
            Region::new(rec.id, Roi::new(rec.x, rec.y, rec.width, rec.height))
                .with_class(rec.class_id, rec.confidence),
        );
    }
    Ok(regions)
}

/// KITTI raw sequence with offline detections.
#[derive(Debug)]
pub struct KittiDataset {
    config: DatasetConfig,
    pub calibration: KittiCalibration,
}

impl KittiDataset {
    pub fn new(config: &DatasetConfig) -> Result<Self> {
        let calibration = KittiCalibration::load(
            config.root.join(&config.cam_to_cam),
            config.root.join(&config.velo_to_cam),
        )?;
        Ok(Self {
            config: config.clone(),
            calibration,
        })
    }

    /// Frame indices to process, honouring `frame_step`.
    pub fn frame_indices(&self) -> Vec<usize> {
        (self.config.first_frame..=self.config.last_frame)
            .step_by(self.config.frame_step)
            .collect()
    }

    fn file_name(&self, idx: usize, extension: &str) -> String {
        format!("{:0width$}.{}", idx, extension, width = self.config.index_width)
    }

    pub fn image_path(&self, idx: usize) -> PathBuf {
        self.config
            .root
            .join(&self.config.image_dir)
            .join(self.file_name(idx, &self.config.image_extension))
    }

    pub fn lidar_path(&self, idx: usize) -> PathBuf {
        self.config
            .root
            .join(&self.config.lidar_dir)
            .join(self.file_name(idx, "bin"))
    }

    pub fn detections_path(&self, idx: usize) -> PathBuf {
        self.config
            .root
            .join(&self.config.detections_dir)
            .join(self.file_name(idx, "csv"))
    }

    pub fn lidar_points(&self, idx: usize) -> Result<Vec<LidarPoint>> {
        load_lidar_points(self.lidar_path(idx))
    }

    /// Region proposals of a frame. A missing file means no detections.
    pub fn regions(&self, idx: usize) -> Result<Vec<Region>> {
        let path = self.detections_path(idx);
        if !path.exists() {
            warn!("No detections for frame {} ({})", idx, path.display());
            return Ok(Vec::new());
        }
        load_detections(path)
    }
}

impl RegionProposer for KittiDataset {
    fn propose(&mut self, frame_index: usize) -> Result<Vec<Region>> {
        self.regions(frame_index)
    }
}
