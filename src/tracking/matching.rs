//! Temporal descriptor matching between consecutive frames.

use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::tracking::frame::{Correspondence, Descriptors};

/// Lowe's ratio for k-NN selection (best / second best).
pub const KNN_RATIO: f32 = 0.8;

/// Compute Hamming distance between two binary descriptors.
/// Returns the number of differing bits over the common length.
pub fn descriptor_distance(desc1: &[u8], desc2: &[u8]) -> u32 {
    desc1
        .iter()
        .zip(desc2)
        .map(|(a, b)| (a ^ b).count_ones())
        .sum()
}

/// L1 distance between two real-valued descriptors.
pub fn l1_distance(desc1: &[f32], desc2: &[f32]) -> f32 {
    desc1.iter().zip(desc2).map(|(a, b)| (a - b).abs()).sum()
}

/// Matcher implementation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatcherKind {
    #[serde(rename = "MAT_BF")]
    BruteForce,
    #[serde(rename = "MAT_FLANN")]
    Flann,
}

/// How the best candidate(s) per query descriptor are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorKind {
    /// Single nearest neighbour.
    #[serde(rename = "SEL_NN")]
    NearestNeighbor,
    /// Two nearest neighbours with a distance ratio test.
    #[serde(rename = "SEL_KNN")]
    KNearestNeighbors,
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatcherKind::BruteForce => f.write_str("MAT_BF"),
            MatcherKind::Flann => f.write_str("MAT_FLANN"),
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKind::NearestNeighbor => f.write_str("SEL_NN"),
            SelectorKind::KNearestNeighbors => f.write_str("SEL_KNN"),
        }
    }
}

/// Produces previous→current keypoint correspondences from two descriptor
/// sets. `source` belongs to the previous frame, `reference` to the current.
pub trait DescriptorMatcher {
    fn match_descriptors(
        &self,
        source: &Descriptors,
        reference: &Descriptors,
    ) -> Result<Vec<Correspondence>>;
}

/// Exhaustive matcher: Hamming norm for binary descriptors, L1 for float
/// descriptors. No cross check.
#[derive(Debug, Clone)]
pub struct BruteForceMatcher {
    selector: SelectorKind,
    ratio: f32,
}

impl BruteForceMatcher {
    pub fn new(selector: SelectorKind) -> Self {
        Self {
            selector,
            ratio: KNN_RATIO,
        }
    }

    pub fn with_ratio(mut self, ratio: f32) -> Self {
        self.ratio = ratio;
        self
    }

    fn select(
        &self,
        query_idx: usize,
        distances: impl Iterator<Item = f32>,
    ) -> Option<Correspondence> {
        let mut best = f32::INFINITY;
        let mut second_best = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (train_idx, dist) in distances.enumerate() {
            if dist < best {
                second_best = best;
                best = dist;
                best_idx = Some(train_idx);
            } else if dist < second_best {
                second_best = dist;
            }
        }

        let train_idx = best_idx?;
        let accepted = match self.selector {
            SelectorKind::NearestNeighbor => true,
            // With a single candidate there is nothing to compare against.
            SelectorKind::KNearestNeighbors => {
                second_best.is_infinite() || best < self.ratio * second_best
            }
        };

        accepted.then_some(Correspondence {
            prev_idx: query_idx,
            curr_idx: train_idx,
            distance: best,
        })
    }
}

impl DescriptorMatcher for BruteForceMatcher {
    fn match_descriptors(
        &self,
        source: &Descriptors,
        reference: &Descriptors,
    ) -> Result<Vec<Correspondence>> {
        let matches = match (source, reference) {
            (Descriptors::Binary(src), Descriptors::Binary(dst)) => src
                .iter()
                .enumerate()
                .filter_map(|(i, q)| {
                    self.select(i, dst.iter().map(|t| descriptor_distance(q, t) as f32))
                })
                .collect(),
            (Descriptors::Float(src), Descriptors::Float(dst)) => src
                .iter()
                .enumerate()
                .filter_map(|(i, q)| self.select(i, dst.iter().map(|t| l1_distance(q, t))))
                .collect(),
            _ => bail!("Cannot match binary descriptors against float descriptors"),
        };
        Ok(matches)
    }
}

/// Build the pure-Rust matcher for the configured family.
pub fn create_matcher(
    matcher: MatcherKind,
    selector: SelectorKind,
    ratio: f32,
) -> Result<Box<dyn DescriptorMatcher>> {
    match matcher {
        MatcherKind::BruteForce => {
            Ok(Box::new(BruteForceMatcher::new(selector).with_ratio(ratio)))
        }
        MatcherKind::Flann => {
            bail!("MAT_FLANN is only available with the `opencv` feature")
        }
    }
}
