use anyhow::{Context, Result, bail};
use opencv::imgcodecs;
use opencv::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rust_ttc::config::PipelineConfig;
use rust_ttc::io::{KittiDataset, ReportWriter};
use rust_ttc::system::TtcSystem;
use rust_ttc::tracking::frame::opencv_backend::{OpenCvExtractor, create_opencv_matcher};

const DEFAULT_LOG_FILTER: &str = "rust_ttc=info,rust_ttc_fusion=info";

/// `RUST_LOG`-style directives, falling back to the default when unset or invalid.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/kitti.yaml".to_string());
    let config = PipelineConfig::load(&config_path)?;

    info!("Loading KITTI sequence from: {}", config.dataset.root.display());
    let mut dataset = KittiDataset::new(&config.dataset)?;
    let frames = dataset.frame_indices();
    info!(
        "{} frames, {} + {}, {} / {}, {:.1} Hz",
        frames.len(),
        config.features.detector,
        config.features.descriptor,
        config.features.matcher,
        config.features.selector,
        config.frame_rate()
    );

    let mut extractor = OpenCvExtractor::new(config.features.detector, config.features.descriptor)?;
    let matcher = create_opencv_matcher(
        config.features.matcher,
        config.features.selector,
        config.features.knn_ratio,
    );
    let mut system = TtcSystem::new(&config, dataset.calibration.projection(), matcher);

    let mut report = config
        .output
        .report_path
        .as_ref()
        .map(ReportWriter::create)
        .transpose()?;

    for (i, idx) in frames.into_iter().enumerate() {
        let path = dataset.image_path(idx);
        let image = imgcodecs::imread(
            path.to_str().context("Non UTF-8 image path")?,
            imgcodecs::IMREAD_COLOR,
        )?;
        if image.empty() {
            bail!("Failed to read image {}", path.display());
        }
        let lidar_points = dataset.lidar_points(idx)?;

        let result = system.process_image(idx, &image, &mut extractor, &mut dataset, lidar_points)?;

        if i > 0 && result.region_matches.is_empty() {
            warn!("frame {}: no region re-identified", result.frame);
        }
        for r in &result.reports {
            info!(
                "frame {} {} -> {} (class {}): TTC lidar {}, TTC camera {}",
                r.frame, r.prev_id, r.curr_id, r.class_id, r.ttc_lidar, r.ttc_camera
            );
        }
        if let Some(writer) = report.as_mut() {
            writer.write_all(&result.reports)?;
        }
    }

    if let Some(mut writer) = report {
        writer.flush()?;
        info!("Wrote {} report rows", writer.rows());
    }
    Ok(())
}
