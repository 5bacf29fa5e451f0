//! Pipeline configuration loaded from YAML.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::tracking::frame::{DescriptorKind, DetectorKind, validate_combination};
use crate::tracking::matching::{KNN_RATIO, MatcherKind, SelectorKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub lidar_crop: LidarCropConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// KITTI raw layout: `<root>/<image_dir>/0000000000.png`,
/// `<root>/<lidar_dir>/0000000000.bin`, `<root>/<detections_dir>/0000000000.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub root: PathBuf,
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    #[serde(default = "default_lidar_dir")]
    pub lidar_dir: PathBuf,
    #[serde(default = "default_detections_dir")]
    pub detections_dir: PathBuf,
    /// `calib_cam_to_cam.txt` (provides `P_rect_00`, `R_rect_00`).
    pub cam_to_cam: PathBuf,
    /// `calib_velo_to_cam.txt` (provides `R`, `T`).
    pub velo_to_cam: PathBuf,
    #[serde(default)]
    pub first_frame: usize,
    pub last_frame: usize,
    #[serde(default = "default_frame_step")]
    pub frame_step: usize,
    #[serde(default = "default_index_width")]
    pub index_width: usize,
    #[serde(default = "default_image_extension")]
    pub image_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Fraction by which regions are shrunk before lidar association.
    pub shrink_factor: f64,
    /// Sensor rate in frames per second, before `frame_step` is applied.
    pub sensor_frame_rate: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            shrink_factor: 0.10,
            sensor_frame_rate: 10.0,
        }
    }
}

/// Box in front of the ego vehicle (lidar frame, metres) that lidar points
/// must fall into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LidarCropConfig {
    pub min_x: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
    /// Minimum reflectivity.
    pub min_r: f64,
}

impl Default for LidarCropConfig {
    fn default() -> Self {
        Self {
            min_x: 2.0,
            max_x: 20.0,
            max_y: 2.0,
            min_z: -1.5,
            max_z: -0.9,
            min_r: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub detector: DetectorKind,
    pub descriptor: DescriptorKind,
    pub matcher: MatcherKind,
    pub selector: SelectorKind,
    pub knn_ratio: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            detector: DetectorKind::Fast,
            descriptor: DescriptorKind::Brief,
            matcher: MatcherKind::BruteForce,
            selector: SelectorKind::KNearestNeighbors,
            knn_ratio: KNN_RATIO,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// CSV file receiving one row per tracked region and frame.
    pub report_path: Option<PathBuf>,
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("image_02/data")
}

fn default_lidar_dir() -> PathBuf {
    PathBuf::from("velodyne_points/data")
}

fn default_detections_dir() -> PathBuf {
    PathBuf::from("detections")
}

fn default_frame_step() -> usize {
    1
}

fn default_index_width() -> usize {
    10
}

fn default_image_extension() -> String {
    "png".to_string()
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let shrink = self.fusion.shrink_factor;
        if !(0.0..1.0).contains(&shrink) {
            bail!("shrink_factor must be in [0, 1), got {}", shrink);
        }
        if !(self.fusion.sensor_frame_rate > 0.0) {
            bail!(
                "sensor_frame_rate must be positive, got {}",
                self.fusion.sensor_frame_rate
            );
        }
        if self.dataset.frame_step == 0 {
            bail!("frame_step must be at least 1");
        }
        if self.dataset.last_frame < self.dataset.first_frame {
            bail!(
                "last_frame ({}) is before first_frame ({})",
                self.dataset.last_frame,
                self.dataset.first_frame
            );
        }
        if !(self.features.knn_ratio > 0.0 && self.features.knn_ratio <= 1.0) {
            bail!("knn_ratio must be in (0, 1], got {}", self.features.knn_ratio);
        }
        validate_combination(self.features.detector, self.features.descriptor)?;
        Ok(())
    }

    /// Rate of the processed frame sequence (frames/second).
    pub fn frame_rate(&self) -> f64 {
        self.fusion.sensor_frame_rate / self.dataset.frame_step as f64
    }
}
