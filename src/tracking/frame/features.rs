//! Keypoint detection / description interface.
//!
//! The concrete detector and descriptor families live behind
//! [`FeatureExtractor`]; they are chosen once from configuration through
//! [`DetectorKind`] and [`DescriptorKind`].

use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::tracking::frame::types::Keypoint;

/// Descriptor rows, one per keypoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptors {
    /// Bit-string descriptors compared by Hamming distance (BRISK, BRIEF, ORB, FREAK, AKAZE).
    Binary(Vec<Vec<u8>>),
    /// Real-valued descriptors (SIFT).
    Float(Vec<Vec<f32>>),
}

impl Descriptors {
    pub fn len(&self) -> usize {
        match self {
            Descriptors::Binary(rows) => rows.len(),
            Descriptors::Float(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Descriptors::Binary(_))
    }
}

impl Default for Descriptors {
    fn default() -> Self {
        Descriptors::Binary(Vec::new())
    }
}

/// Keypoints of one image together with their descriptors.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Descriptors,
}

/// Keypoint detector + descriptor extractor for one image type.
pub trait FeatureExtractor {
    type Image: ?Sized;

    fn detect(&mut self, image: &Self::Image) -> Result<Vec<Keypoint>>;

    /// Compute descriptors for `keypoints`. Implementations may drop
    /// keypoints for which no descriptor can be computed (e.g. too close to
    /// the border), so the list is updated in place to stay row-aligned.
    fn describe(
        &mut self,
        image: &Self::Image,
        keypoints: &mut Vec<Keypoint>,
    ) -> Result<Descriptors>;

    fn extract(&mut self, image: &Self::Image) -> Result<FeatureSet> {
        let mut keypoints = self.detect(image)?;
        let descriptors = self.describe(image, &mut keypoints)?;
        Ok(FeatureSet {
            keypoints,
            descriptors,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorKind {
    #[serde(rename = "SHITOMASI")]
    ShiTomasi,
    #[serde(rename = "HARRIS")]
    Harris,
    #[serde(rename = "FAST")]
    Fast,
    #[serde(rename = "BRISK")]
    Brisk,
    #[serde(rename = "ORB")]
    Orb,
    #[serde(rename = "AKAZE")]
    Akaze,
    #[serde(rename = "SIFT")]
    Sift,
}

impl DetectorKind {
    pub fn name(self) -> &'static str {
        match self {
            DetectorKind::ShiTomasi => "SHITOMASI",
            DetectorKind::Harris => "HARRIS",
            DetectorKind::Fast => "FAST",
            DetectorKind::Brisk => "BRISK",
            DetectorKind::Orb => "ORB",
            DetectorKind::Akaze => "AKAZE",
            DetectorKind::Sift => "SIFT",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorKind {
    #[serde(rename = "BRISK")]
    Brisk,
    #[serde(rename = "BRIEF")]
    Brief,
    #[serde(rename = "ORB")]
    Orb,
    #[serde(rename = "FREAK")]
    Freak,
    #[serde(rename = "AKAZE")]
    Akaze,
    #[serde(rename = "SIFT")]
    Sift,
}

impl DescriptorKind {
    pub fn name(self) -> &'static str {
        match self {
            DescriptorKind::Brisk => "BRISK",
            DescriptorKind::Brief => "BRIEF",
            DescriptorKind::Orb => "ORB",
            DescriptorKind::Freak => "FREAK",
            DescriptorKind::Akaze => "AKAZE",
            DescriptorKind::Sift => "SIFT",
        }
    }

    /// Whether the descriptor is a bit string (Hamming norm).
    pub fn is_binary(self) -> bool {
        !matches!(self, DescriptorKind::Sift)
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reject detector/descriptor pairs that cannot work together.
pub fn validate_combination(detector: DetectorKind, descriptor: DescriptorKind) -> Result<()> {
    // AKAZE descriptors need the class_id/octave layout of AKAZE keypoints.
    if descriptor == DescriptorKind::Akaze && detector != DetectorKind::Akaze {
        bail!(
            "AKAZE descriptors require AKAZE keypoints (got {} keypoints)",
            detector
        );
    }
    Ok(())
}
