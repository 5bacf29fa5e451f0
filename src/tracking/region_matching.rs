//! Re-identification of regions across two frames by keypoint-match voting.
//!
//! Two passes:
//! 1. [`count_region_votes`] folds every keypoint match into a vote table
//!    keyed by `(previous region, current region)`.
//! 2. [`select_best_matches`] walks the table in descending vote order and
//!    greedily builds an injective mapping.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::tracking::frame::{Correspondence, Keypoint, Region, RegionId};
use crate::tracking::tracking_frame::Frame;

/// One entry of the vote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionVote {
    pub prev: RegionId,
    pub curr: RegionId,
    pub votes: usize,
}

/// Vote table plus the matches collected per current region while voting.
#[derive(Debug, Clone, Default)]
pub struct RegionVotes {
    counts: BTreeMap<(RegionId, RegionId), usize>,
    candidates: BTreeMap<RegionId, Vec<Correspondence>>,
}

impl RegionVotes {
    pub fn from_counts(counts: impl IntoIterator<Item = ((RegionId, RegionId), usize)>) -> Self {
        Self {
            counts: counts.into_iter().collect(),
            candidates: BTreeMap::new(),
        }
    }

    pub fn get(&self, prev: RegionId, curr: RegionId) -> usize {
        self.counts.get(&(prev, curr)).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Matches whose current keypoint fell into `curr` while voting. A match
    /// can appear under several current regions.
    pub fn candidates(&self, curr: RegionId) -> &[Correspondence] {
        self.candidates.get(&curr).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Vote triples sorted by vote count, highest first. Equal counts keep
    /// `(prev, curr)` key order.
    pub fn sorted(&self) -> Vec<RegionVote> {
        let mut votes: Vec<RegionVote> = self
            .counts
            .iter()
            .map(|(&(prev, curr), &votes)| RegionVote { prev, curr, votes })
            .collect();
        votes.sort_by(|a, b| b.votes.cmp(&a.votes));
        votes
    }
}

/// Injective partial mapping from previous-frame to current-frame regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionMatch {
    pairs: BTreeMap<RegionId, RegionId>,
}

impl RegionMatch {
    pub fn get(&self, prev: RegionId) -> Option<RegionId> {
        self.pairs.get(&prev).copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `(previous, current)` pairs in previous-id order.
    pub fn iter(&self) -> impl Iterator<Item = (RegionId, RegionId)> + '_ {
        self.pairs.iter().map(|(&p, &c)| (p, c))
    }
}

/// Count, for every pair of previous/current regions, how many matches have
/// their previous keypoint in the first and their current keypoint in the
/// second. Regions are not shrunk here.
pub fn count_region_votes(
    matches: &[Correspondence],
    kpts_prev: &[Keypoint],
    regions_prev: &[Region],
    kpts_curr: &[Keypoint],
    regions_curr: &[Region],
) -> RegionVotes {
    let mut votes = RegionVotes::default();

    for m in matches {
        let kp_prev = kpts_prev.get(m.prev_idx);
        let kp_curr = kpts_curr.get(m.curr_idx);
        let (Some(kp_prev), Some(kp_curr)) = (kp_prev, kp_curr) else {
            continue;
        };

        for prev_region in regions_prev.iter().filter(|r| r.roi.contains(&kp_prev.pt)) {
            for curr_region in regions_curr.iter().filter(|r| r.roi.contains(&kp_curr.pt)) {
                *votes
                    .counts
                    .entry((prev_region.id, curr_region.id))
                    .or_insert(0) += 1;
                votes
                    .candidates
                    .entry(curr_region.id)
                    .or_default()
                    .push(*m);
            }
        }
    }

    votes
}

/// Greedy assignment over vote triples in descending vote order.
///
/// A triple is accepted only if neither id has been seen before. Both ids are
/// marked as seen whether or not the triple was accepted, so an id that loses
/// once is never reconsidered with another partner.
pub fn select_best_matches(sorted: &[RegionVote]) -> RegionMatch {
    let mut seen_prev = BTreeSet::new();
    let mut seen_curr = BTreeSet::new();
    let mut result = RegionMatch::default();

    for vote in sorted {
        if !seen_prev.contains(&vote.prev) && !seen_curr.contains(&vote.curr) {
            result.pairs.insert(vote.prev, vote.curr);
        }
        seen_prev.insert(vote.prev);
        seen_curr.insert(vote.curr);
    }

    result
}

/// Outcome of re-identifying the regions of `prev` in `curr`.
#[derive(Debug, Clone, Default)]
pub struct RegionMatching {
    pub matches: RegionMatch,
    pub votes: RegionVotes,
}

/// Find the best current region for each previous region.
///
/// `matches` index into the previous (`prev_idx`) and current (`curr_idx`)
/// keypoint lists.
pub fn match_bounding_boxes(
    matches: &[Correspondence],
    prev: &Frame,
    curr: &Frame,
) -> RegionMatching {
    let votes = count_region_votes(
        matches,
        &prev.features.keypoints,
        &prev.regions,
        &curr.features.keypoints,
        &curr.regions,
    );
    let best = select_best_matches(&votes.sorted());

    debug!(
        "region matching: {} vote pairs, {} regions matched ({} prev / {} curr)",
        votes.len(),
        best.len(),
        prev.regions.len(),
        curr.regions.len()
    );

    RegionMatching {
        matches: best,
        votes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Roi;
    use std::collections::HashSet;

    fn id(v: i32) -> RegionId {
        RegionId(v)
    }

    #[test]
    fn test_sorted_votes_and_greedy_walk() {
        let votes = RegionVotes::from_counts([
            ((id(1), id(1)), 5),
            ((id(1), id(2)), 3),
            ((id(2), id(2)), 4),
        ]);

        let sorted = votes.sorted();
        let order: Vec<_> = sorted.iter().map(|v| (v.prev.0, v.curr.0, v.votes)).collect();
        assert_eq!(order, vec![(1, 1, 5), (2, 2, 4), (1, 2, 3)]);

        let best = select_best_matches(&sorted);
        assert_eq!(best.len(), 2);
        assert_eq!(best.get(id(1)), Some(id(1)));
        assert_eq!(best.get(id(2)), Some(id(2)));
    }

    #[test]
    fn test_loser_is_never_retried() {
        // (2,1) loses to (1,1); prev 2 is then marked seen and (2,2) is skipped
        let votes = RegionVotes::from_counts([
            ((id(1), id(1)), 9),
            ((id(2), id(1)), 8),
            ((id(2), id(2)), 2),
        ]);

        let best = select_best_matches(&votes.sorted());

        assert_eq!(best.len(), 1);
        assert_eq!(best.get(id(2)), None);
    }

    #[test]
    fn test_equal_votes_keep_key_order() {
        let votes = RegionVotes::from_counts([((id(2), id(5)), 3), ((id(1), id(5)), 3)]);

        let sorted = votes.sorted();
        assert_eq!(sorted[0].prev, id(1));

        let best = select_best_matches(&sorted);
        assert_eq!(best.get(id(1)), Some(id(5)));
        assert_eq!(best.get(id(2)), None);
    }

    #[test]
    fn test_mapping_is_injective() {
        let counts = (0..6).flat_map(|p| {
            (0..6).map(move |c| ((id(p), id(c)), ((p * 7 + c * 3) % 11) as usize))
        });
        let votes = RegionVotes::from_counts(counts);

        let best = select_best_matches(&votes.sorted());
        let currs: HashSet<_> = best.iter().map(|(_, c)| c).collect();
        assert_eq!(currs.len(), best.len());
    }

    #[test]
    fn test_votes_from_keypoint_matches() {
        let regions_prev = vec![
            Region::new(10, Roi::new(0.0, 0.0, 100.0, 100.0)),
            Region::new(11, Roi::new(200.0, 0.0, 100.0, 100.0)),
        ];
        let regions_curr = vec![
            Region::new(20, Roi::new(10.0, 0.0, 100.0, 100.0)),
            Region::new(21, Roi::new(210.0, 0.0, 100.0, 100.0)),
            // overlaps region 20
            Region::new(22, Roi::new(60.0, 0.0, 100.0, 100.0)),
        ];
        let kpts_prev = vec![
            Keypoint::new(20.0, 50.0),
            Keypoint::new(70.0, 50.0),
            Keypoint::new(250.0, 50.0),
            Keypoint::new(500.0, 500.0),
        ];
        let kpts_curr = vec![
            Keypoint::new(30.0, 50.0),
            Keypoint::new(80.0, 50.0),
            Keypoint::new(260.0, 50.0),
            Keypoint::new(30.0, 50.0),
        ];
        let matches: Vec<_> = (0..4).map(|i| Correspondence::new(i, i)).collect();

        let votes =
            count_region_votes(&matches, &kpts_prev, &regions_prev, &kpts_curr, &regions_curr);

        assert_eq!(votes.get(id(10), id(20)), 2);
        assert_eq!(votes.get(id(10), id(22)), 1);
        assert_eq!(votes.get(id(11), id(21)), 1);
        // match 3 has no enclosing previous region
        assert_eq!(votes.len(), 3);
        // match 1 is collected under both overlapping current regions
        assert_eq!(votes.candidates(id(20)).len(), 2);
        assert_eq!(votes.candidates(id(22)), &[matches[1]]);

        let best = select_best_matches(&votes.sorted());
        assert_eq!(best.get(id(10)), Some(id(20)));
        assert_eq!(best.get(id(11)), Some(id(21)));
    }

    #[test]
    fn test_out_of_range_indices_are_ignored() {
        let regions = vec![Region::new(1, Roi::new(0.0, 0.0, 10.0, 10.0))];
        let kpts = vec![Keypoint::new(1.0, 1.0)];
        let matches = vec![Correspondence::new(0, 5), Correspondence::new(3, 0)];

        let votes = count_region_votes(&matches, &kpts, &regions, &kpts, &regions);
        assert!(votes.is_empty());
    }
}
