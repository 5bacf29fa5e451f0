//! Region proposal interface (object detector output).

use anyhow::Result;

use crate::tracking::frame::types::Region;

/// Supplies the detection regions of a frame. Region ids must be unique
/// within one frame.
pub trait RegionProposer {
    fn propose(&mut self, frame_index: usize) -> Result<Vec<Region>>;
}
