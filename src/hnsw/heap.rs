//! Heap entries for layer search.

use std::cmp::Ordering;

use crate::vector::Distance;

/// A node slot paired with its distance to the current query.
///
/// Ordered by distance, then slot, so `BinaryHeap<Candidate>` pops the
/// farthest entry and `BinaryHeap<Reverse<Candidate>>` pops the closest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub distance: Distance,
    pub slot: usize,
}

impl Candidate {
    pub fn new(distance: Distance, slot: usize) -> Self {
        Self { distance, slot }
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}
