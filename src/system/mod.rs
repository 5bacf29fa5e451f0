//! Frame-to-frame TTC orchestration.
//!
//! This module contains the top-level `TtcSystem` that turns a stream of
//! frames into per-region TTC reports, along with the result types it hands
//! out.

pub mod result;
mod ttc_system;

pub use result::{FrameResult, RegionSummary, TtcReport};
pub use ttc_system::{FrameInput, TtcSystem};
