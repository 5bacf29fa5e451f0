//! Time-to-collision estimators.
//!
//! - [`lidar`]: distance change of the closest robust lidar return
//! - [`camera`]: scale change of keypoint constellations between frames

pub mod camera;
pub mod lidar;

pub use camera::compute_ttc_camera;
pub use lidar::compute_ttc_lidar;

use std::fmt;

use serde::{Serialize, Serializer};

/// Result of a TTC estimate.
///
/// `NotClosing` and `Undefined` are kept apart so callers can tell "the
/// object is not getting closer" from "there was not enough data".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TtcEstimate {
    /// Seconds until contact at the current closing rate.
    Seconds(f64),
    /// The object is not approaching.
    NotClosing,
    /// No usable measurements.
    Undefined,
}

impl TtcEstimate {
    /// Scalar encoding: seconds, `0.0` for not closing, NaN for undefined.
    pub fn as_scalar(self) -> f64 {
        match self {
            TtcEstimate::Seconds(s) => s,
            TtcEstimate::NotClosing => 0.0,
            TtcEstimate::Undefined => f64::NAN,
        }
    }

    pub fn seconds(self) -> Option<f64> {
        match self {
            TtcEstimate::Seconds(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_defined(self) -> bool {
        !matches!(self, TtcEstimate::Undefined)
    }
}

impl fmt::Display for TtcEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtcEstimate::Seconds(s) => write!(f, "{:.2} s", s),
            TtcEstimate::NotClosing => f.write_str("not closing"),
            TtcEstimate::Undefined => f.write_str("undefined"),
        }
    }
}

/// Serialized as its scalar encoding.
impl Serialize for TtcEstimate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_scalar())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_encoding() {
        assert_eq!(TtcEstimate::Seconds(1.5).as_scalar(), 1.5);
        assert_eq!(TtcEstimate::NotClosing.as_scalar(), 0.0);
        assert!(TtcEstimate::Undefined.as_scalar().is_nan());
    }

    #[test]
    fn test_sentinels_are_distinct() {
        assert_ne!(TtcEstimate::NotClosing, TtcEstimate::Undefined);
        assert!(TtcEstimate::NotClosing.is_defined());
        assert!(!TtcEstimate::Undefined.is_defined());
        assert_eq!(TtcEstimate::NotClosing.seconds(), None);
        assert_eq!(format!("{}", TtcEstimate::Seconds(1.904)), "1.90 s");
    }
}
