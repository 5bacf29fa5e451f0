//! TTC System - main entry point.
//!
//! The `TtcSystem` owns the calibration, the descriptor matcher and the
//! previous frame. Each call to [`TtcSystem::process_frame`] compares the new
//! frame against the previous one and then replaces it, so no state older
//! than one frame pair is kept.

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info};

use crate::config::{LidarCropConfig, PipelineConfig};
use crate::geometry::LidarProjection;
use crate::tracking::frame::{FeatureExtractor, FeatureSet, LidarPoint, Region, RegionProposer};
use crate::tracking::keypoint_roi::assign_kpt_matches;
use crate::tracking::lidar::crop_lidar_points;
use crate::tracking::matching::DescriptorMatcher;
use crate::tracking::region_matching::{RegionMatch, RegionVotes, match_bounding_boxes};
use crate::tracking::tracking_frame::Frame;
use crate::ttc::{compute_ttc_camera, compute_ttc_lidar};

use super::result::{FrameResult, RegionSummary, TtcReport};

/// Raw measurements of one frame.
pub struct FrameInput {
    pub index: usize,
    pub features: FeatureSet,
    pub regions: Vec<Region>,
    /// Uncropped lidar scan.
    pub lidar_points: Vec<LidarPoint>,
}

pub struct TtcSystem {
    projection: LidarProjection,
    matcher: Box<dyn DescriptorMatcher>,
    crop: LidarCropConfig,
    shrink_factor: f64,
    frame_rate: f64,

    /// Previous frame, if any.
    prev: Option<Frame>,
}

impl TtcSystem {
    pub fn new(
        config: &PipelineConfig,
        projection: LidarProjection,
        matcher: Box<dyn DescriptorMatcher>,
    ) -> Self {
        Self {
            projection,
            matcher,
            crop: config.lidar_crop.clone(),
            shrink_factor: config.fusion.shrink_factor,
            frame_rate: config.frame_rate(),
            prev: None,
        }
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// The most recently processed frame.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.prev.as_ref()
    }

    /// Extract features, query regions and process the frame.
    pub fn process_image<E: FeatureExtractor, R: RegionProposer>(
        &mut self,
        index: usize,
        image: &E::Image,
        extractor: &mut E,
        proposer: &mut R,
        lidar_points: Vec<LidarPoint>,
    ) -> Result<FrameResult> {
        let t_extract = Instant::now();
        let features = extractor.extract(image)?;
        debug!(
            "frame {}: {} keypoints extracted in {:.1} ms",
            index,
            features.keypoints.len(),
            t_extract.elapsed().as_secs_f64() * 1e3
        );

        let regions = proposer.propose(index)?;
        self.process_frame(FrameInput {
            index,
            features,
            regions,
            lidar_points,
        })
    }

    /// Process one frame against the previous one.
    ///
    /// The first frame only initializes the system and yields no reports.
    pub fn process_frame(&mut self, input: FrameInput) -> Result<FrameResult> {
        let lidar_points = crop_lidar_points(&input.lidar_points, &self.crop);
        let mut curr = Frame::new(
            input.index,
            input.features,
            input.regions,
            lidar_points,
            self.shrink_factor,
            &self.projection,
        );

        let mut reports = Vec::new();
        let mut region_votes = RegionVotes::default();
        if let Some(prev) = self.prev.as_ref() {
            curr.kpt_matches = self
                .matcher
                .match_descriptors(&prev.features.descriptors, &curr.features.descriptors)?;

            let matching = match_bounding_boxes(&curr.kpt_matches, prev, &curr);
            curr.region_matches = matching.matches;
            region_votes = matching.votes;

            reports = self.estimate_ttc(prev, &mut curr);
        }

        let result = FrameResult {
            frame: curr.index,
            n_keypoints: curr.features.keypoints.len(),
            n_lidar_points: curr.lidar_points.len(),
            n_kpt_matches: curr.kpt_matches.len(),
            region_matches: curr.region_matches.clone(),
            region_votes,
            reports,
            regions: curr.regions.iter().map(RegionSummary::from_region).collect(),
        };

        info!(
            "frame {}: {} keypoints, {} matches, {} regions, {} tracked, {} lidar points ({} associated)",
            result.frame,
            result.n_keypoints,
            result.n_kpt_matches,
            curr.regions.len(),
            result.region_matches.len(),
            result.n_lidar_points,
            curr.num_associated_points()
        );

        self.prev = Some(curr);
        Ok(result)
    }

    /// Lidar and camera TTC for every region re-identified in `curr`.
    fn estimate_ttc(&self, prev: &Frame, curr: &mut Frame) -> Vec<TtcReport> {
        let pairs: Vec<_> = curr.region_matches.iter().collect();
        let mut reports = Vec::with_capacity(pairs.len());

        for (prev_id, curr_id) in pairs {
            let Some(prev_region) = prev.region(prev_id) else {
                continue;
            };

            let Some(curr_region) = curr.regions.iter_mut().find(|r| r.id == curr_id) else {
                continue;
            };
            assign_kpt_matches(curr_region, &curr.features.keypoints, &curr.kpt_matches);

            let ttc_lidar = compute_ttc_lidar(
                &prev_region.lidar_points,
                &curr_region.lidar_points,
                self.frame_rate,
            );
            let ttc_camera = compute_ttc_camera(
                &prev.features.keypoints,
                &curr.features.keypoints,
                &curr_region.kpt_matches,
                self.frame_rate,
            );

            info!(
                "{} -> {}: TTC lidar {}, TTC camera {} ({} / {} lidar points, {} keypoint matches)",
                prev_id,
                curr_id,
                ttc_lidar,
                ttc_camera,
                prev_region.lidar_points.len(),
                curr_region.lidar_points.len(),
                curr_region.kpt_matches.len()
            );

            reports.push(TtcReport {
                frame: curr.index,
                prev_id,
                curr_id,
                class_id: curr_region.class_id,
                n_lidar_prev: prev_region.lidar_points.len(),
                n_lidar_curr: curr_region.lidar_points.len(),
                n_kpt_matches: curr_region.kpt_matches.len(),
                ttc_lidar,
                ttc_camera,
            });
        }

        reports
    }

    /// Region matches of the last processed frame.
    pub fn region_matches(&self) -> Option<&RegionMatch> {
        self.prev.as_ref().map(|f| &f.region_matches)
    }
}
