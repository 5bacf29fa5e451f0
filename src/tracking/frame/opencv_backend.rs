//! OpenCV detectors, descriptor extractors and matchers.

use anyhow::{Context, Result, bail};
use opencv::core::{self, DMatch, KeyPoint, Mat, Ptr, Vector};
use opencv::features2d::{self, Feature2D};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::xfeatures2d;
use tracing::debug;

use crate::tracking::frame::features::{DescriptorKind, Descriptors, DetectorKind, FeatureExtractor};
use crate::tracking::frame::types::{Correspondence, Keypoint};
use crate::tracking::matching::{DescriptorMatcher, MatcherKind, SelectorKind};

/// Shi-Tomasi / Harris neighbourhood size.
const BLOCK_SIZE: i32 = 4;
const HARRIS_APERTURE: i32 = 5;
const HARRIS_K: f64 = 0.04;
/// Minimum normalized Harris response (0..255).
const HARRIS_MIN_RESPONSE: f32 = 100.0;
const SHI_TOMASI_QUALITY: f64 = 0.01;

fn to_keypoint(kp: &KeyPoint) -> Keypoint {
    Keypoint {
        pt: nalgebra::Point2::new(kp.pt().x as f64, kp.pt().y as f64),
        size: kp.size() as f64,
        angle: kp.angle() as f64,
        response: kp.response() as f64,
        octave: kp.octave(),
        class_id: kp.class_id(),
    }
}

fn to_cv_keypoint(kp: &Keypoint) -> Result<KeyPoint> {
    Ok(KeyPoint::new_coords(
        kp.pt.x as f32,
        kp.pt.y as f32,
        kp.size as f32,
        kp.angle as f32,
        kp.response as f32,
        kp.octave,
        kp.class_id,
    )?)
}

/// Convert a descriptor matrix (one row per keypoint) into owned rows.
pub fn descriptors_from_mat(mat: &Mat) -> Result<Descriptors> {
    if mat.empty() {
        return Ok(Descriptors::default());
    }
    match mat.depth() {
        core::CV_8U => {
            let rows = (0..mat.rows())
                .map(|r| Ok(mat.at_row::<u8>(r)?.to_vec()))
                .collect::<Result<Vec<_>>>()?;
            Ok(Descriptors::Binary(rows))
        }
        core::CV_32F => {
            let rows = (0..mat.rows())
                .map(|r| Ok(mat.at_row::<f32>(r)?.to_vec()))
                .collect::<Result<Vec<_>>>()?;
            Ok(Descriptors::Float(rows))
        }
        depth => bail!("Unsupported descriptor depth {}", depth),
    }
}

/// Descriptor rows as a matrix. Binary rows are widened to `CV_32F` when
/// `as_float` is set.
pub fn descriptors_to_mat(descriptors: &Descriptors, as_float: bool) -> Result<Mat> {
    if descriptors.is_empty() {
        return Ok(Mat::default());
    }
    let mat = match descriptors {
        Descriptors::Binary(rows) if as_float => {
            let rows: Vec<Vec<f32>> = rows
                .iter()
                .map(|row| row.iter().map(|&b| b as f32).collect())
                .collect();
            Mat::from_slice_2d(&rows)?
        }
        Descriptors::Binary(rows) => Mat::from_slice_2d(rows)?,
        Descriptors::Float(rows) => Mat::from_slice_2d(rows)?,
    };
    Ok(mat)
}

/// Detector + descriptor pair backed by OpenCV, operating on 8-bit images.
pub struct OpenCvExtractor {
    detector_kind: DetectorKind,
    detector: Option<Ptr<Feature2D>>,
    descriptor_kind: DescriptorKind,
    descriptor: Ptr<Feature2D>,
}

impl OpenCvExtractor {
    pub fn new(detector_kind: DetectorKind, descriptor_kind: DescriptorKind) -> Result<Self> {
        crate::tracking::frame::validate_combination(detector_kind, descriptor_kind)?;

        let detector: Option<Ptr<Feature2D>> = match detector_kind {
            // gradient-based detectors are run directly in `detect`
            DetectorKind::ShiTomasi | DetectorKind::Harris => None,
            DetectorKind::Fast => Some(features2d::FastFeatureDetector::create_def()?.into()),
            DetectorKind::Brisk => Some(features2d::BRISK::create_def()?.into()),
            DetectorKind::Orb => Some(features2d::ORB::create_def()?.into()),
            DetectorKind::Akaze => Some(features2d::AKAZE::create_def()?.into()),
            DetectorKind::Sift => Some(features2d::SIFT::create_def()?.into()),
        };

        let descriptor: Ptr<Feature2D> = match descriptor_kind {
            DescriptorKind::Brisk => features2d::BRISK::create(30, 3, 1.0)?.into(),
            DescriptorKind::Brief => xfeatures2d::BriefDescriptorExtractor::create_def()?.into(),
            DescriptorKind::Orb => features2d::ORB::create_def()?.into(),
            DescriptorKind::Freak => xfeatures2d::FREAK::create_def()?.into(),
            DescriptorKind::Akaze => features2d::AKAZE::create_def()?.into(),
            DescriptorKind::Sift => features2d::SIFT::create_def()?.into(),
        };

        Ok(Self {
            detector_kind,
            detector,
            descriptor_kind,
            descriptor,
        })
    }

    fn grayscale(image: &Mat) -> Result<Mat> {
        if image.channels() == 1 {
            return Ok(image.clone());
        }
        let mut gray = Mat::default();
        imgproc::cvt_color_def(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
        Ok(gray)
    }

    fn detect_shi_tomasi(gray: &Mat) -> Result<Vec<Keypoint>> {
        let min_distance = BLOCK_SIZE as f64;
        let max_corners = (gray.rows() as f64 * gray.cols() as f64 / min_distance) as i32;

        let mut corners = Vector::<core::Point2f>::new();
        imgproc::good_features_to_track(
            gray,
            &mut corners,
            max_corners,
            SHI_TOMASI_QUALITY,
            min_distance,
            &core::no_array(),
            BLOCK_SIZE,
            false,
            HARRIS_K,
        )?;

        Ok(corners
            .iter()
            .map(|c| Keypoint::new(c.x as f64, c.y as f64).with_size(BLOCK_SIZE as f64))
            .collect())
    }

    fn detect_harris(gray: &Mat) -> Result<Vec<Keypoint>> {
        let mut response = Mat::default();
        imgproc::corner_harris_def(gray, &mut response, BLOCK_SIZE, HARRIS_APERTURE, HARRIS_K)?;

        let mut normalized = Mat::default();
        core::normalize(
            &response,
            &mut normalized,
            0.0,
            255.0,
            core::NORM_MINMAX,
            core::CV_32FC1,
            &core::no_array(),
        )?;

        let mut keypoints: Vec<Keypoint> = Vec::new();
        for row in 0..normalized.rows() {
            for col in 0..normalized.cols() {
                let r = *normalized.at_2d::<f32>(row, col)?;
                if r <= HARRIS_MIN_RESPONSE {
                    continue;
                }
                let candidate = Keypoint::new(col as f64, row as f64)
                    .with_size(2.0 * HARRIS_APERTURE as f64)
                    .with_response(r as f64);
                suppress_non_maxima(&mut keypoints, candidate);
            }
        }
        Ok(keypoints)
    }
}

/// Keep the stronger of any two overlapping keypoints.
fn suppress_non_maxima(keypoints: &mut Vec<Keypoint>, candidate: Keypoint) {
    let overlapping = keypoints.iter().position(|kp| {
        nalgebra::distance(&kp.pt, &candidate.pt) < (kp.size + candidate.size) / 2.0
    });
    match overlapping {
        Some(idx) if candidate.response > keypoints[idx].response => keypoints[idx] = candidate,
        Some(_) => {}
        None => keypoints.push(candidate),
    }
}

impl FeatureExtractor for OpenCvExtractor {
    type Image = Mat;

    fn detect(&mut self, image: &Mat) -> Result<Vec<Keypoint>> {
        let gray = Self::grayscale(image)?;
        let keypoints = match self.detector.as_mut() {
            None if self.detector_kind == DetectorKind::Harris => Self::detect_harris(&gray)?,
            None => Self::detect_shi_tomasi(&gray)?,
            Some(detector) => {
                let mut keypoints = Vector::<KeyPoint>::new();
                detector.detect_def(&gray, &mut keypoints)?;
                keypoints.iter().map(|kp| to_keypoint(&kp)).collect()
            }
        };
        debug!("{} detector: {} keypoints", self.detector_kind, keypoints.len());
        Ok(keypoints)
    }

    fn describe(&mut self, image: &Mat, keypoints: &mut Vec<Keypoint>) -> Result<Descriptors> {
        let gray = Self::grayscale(image)?;
        let mut cv_keypoints = keypoints
            .iter()
            .map(to_cv_keypoint)
            .collect::<Result<Vector<KeyPoint>>>()?;

        let mut mat = Mat::default();
        self.descriptor
            .compute(&gray, &mut cv_keypoints, &mut mat)
            .with_context(|| format!("{} descriptor extraction failed", self.descriptor_kind))?;

        *keypoints = cv_keypoints.iter().map(|kp| to_keypoint(&kp)).collect();
        descriptors_from_mat(&mat)
    }
}

/// Brute-force or FLANN matcher backed by OpenCV.
pub struct OpenCvMatcher {
    kind: MatcherKind,
    selector: SelectorKind,
    ratio: f32,
}

impl OpenCvMatcher {
    pub fn new(kind: MatcherKind, selector: SelectorKind, ratio: f32) -> Self {
        Self {
            kind,
            selector,
            ratio,
        }
    }

    fn create(&self, binary: bool) -> Result<Ptr<features2d::DescriptorMatcher>> {
        let matcher: Ptr<features2d::DescriptorMatcher> = match self.kind {
            MatcherKind::BruteForce => {
                let norm = if binary { core::NORM_HAMMING } else { core::NORM_L1 };
                features2d::BFMatcher::create(norm, false)?.into()
            }
            MatcherKind::Flann => features2d::FlannBasedMatcher::create()?.into(),
        };
        Ok(matcher)
    }
}

fn to_correspondence(m: &DMatch) -> Correspondence {
    Correspondence {
        prev_idx: m.query_idx as usize,
        curr_idx: m.train_idx as usize,
        distance: m.distance,
    }
}

impl DescriptorMatcher for OpenCvMatcher {
    fn match_descriptors(
        &self,
        source: &Descriptors,
        reference: &Descriptors,
    ) -> Result<Vec<Correspondence>> {
        if source.is_empty() || reference.is_empty() {
            return Ok(Vec::new());
        }
        if source.is_binary() != reference.is_binary() {
            bail!("Cannot match binary descriptors against float descriptors");
        }

        let binary = source.is_binary();
        // FLANN's kd-trees need float input
        let as_float = self.kind == MatcherKind::Flann;
        let query = descriptors_to_mat(source, as_float)?;
        let train = descriptors_to_mat(reference, as_float)?;
        let matcher = self.create(binary && !as_float)?;

        let matches = match self.selector {
            SelectorKind::NearestNeighbor => {
                let mut matches = Vector::<DMatch>::new();
                matcher.train_match_def(&query, &train, &mut matches)?;
                matches.iter().map(|m| to_correspondence(&m)).collect()
            }
            SelectorKind::KNearestNeighbors => {
                let mut knn = Vector::<Vector<DMatch>>::new();
                matcher.knn_train_match_def(&query, &train, &mut knn, 2)?;
                knn.iter()
                    .filter_map(|candidates| {
                        let best = candidates.get(0).ok()?;
                        match candidates.get(1) {
                            Ok(second) if best.distance >= self.ratio * second.distance => None,
                            _ => Some(to_correspondence(&best)),
                        }
                    })
                    .collect()
            }
        };
        Ok(matches)
    }
}

/// Matcher for the configured family, OpenCV-backed.
pub fn create_opencv_matcher(
    kind: MatcherKind,
    selector: SelectorKind,
    ratio: f32,
) -> Box<dyn DescriptorMatcher> {
    Box::new(OpenCvMatcher::new(kind, selector, ratio))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harris_suppression_keeps_strongest() {
        let kp = |x: f64, response: f64| Keypoint::new(x, 10.0).with_size(10.0).with_response(response);
        let mut keypoints = Vec::new();
        suppress_non_maxima(&mut keypoints, kp(10.0, 120.0));
        suppress_non_maxima(&mut keypoints, kp(12.0, 150.0));
        suppress_non_maxima(&mut keypoints, kp(13.0, 110.0));
        suppress_non_maxima(&mut keypoints, kp(40.0, 101.0));

        assert_eq!(keypoints.len(), 2);
        assert_eq!(keypoints[0].response, 150.0);
        assert_eq!(keypoints[1].pt.x, 40.0);
    }

    #[test]
    fn test_descriptor_mat_conversion() {
        let descriptors = Descriptors::Binary(vec![vec![1, 2, 3], vec![4, 5, 6]]);
        let mat = descriptors_to_mat(&descriptors, false).unwrap();
        assert_eq!(mat.rows(), 2);
        assert_eq!(descriptors_from_mat(&mat).unwrap(), descriptors);

        let widened = descriptors_to_mat(&descriptors, true).unwrap();
        assert_eq!(
            descriptors_from_mat(&widened).unwrap(),
            Descriptors::Float(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
        );
    }

    #[test]
    fn test_keypoint_conversion_keeps_detector_tags() {
        let cv = KeyPoint::new_coords(12.5, 40.0, 7.0, 33.0, 0.02, 3, 2).unwrap();

        let kp = to_keypoint(&cv);
        assert_eq!(kp.octave, 3);
        assert_eq!(kp.class_id, 2);

        let back = to_cv_keypoint(&kp).unwrap();
        assert_eq!(back.pt(), cv.pt());
        assert_eq!(back.size(), 7.0);
        assert_eq!(back.angle(), 33.0);
        assert_eq!(back.octave(), 3);
        assert_eq!(back.class_id(), 2);
        assert_eq!(to_cv_keypoint(&Keypoint::new(1.0, 2.0)).unwrap().class_id(), -1);
    }

    #[test]
    fn test_brute_force_knn() {
        let source = Descriptors::Binary(vec![vec![0b0000_1111], vec![0b1010_1010]]);
        let reference = Descriptors::Binary(vec![vec![0b0000_1111], vec![0b1010_1011]]);
        let matcher =
            OpenCvMatcher::new(MatcherKind::BruteForce, SelectorKind::KNearestNeighbors, 0.8);

        let matches = matcher.match_descriptors(&source, &reference).unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].prev_idx, matches[0].curr_idx), (0, 0));
        assert_eq!((matches[1].prev_idx, matches[1].curr_idx), (1, 1));
    }
}
