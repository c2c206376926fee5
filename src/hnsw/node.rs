//! Arena entries of the proximity graph.

use crate::vector::VectorId;

/// One indexed vector and its per-layer neighbor lists.
///
/// A node's id and level never change after insertion. Its neighbor lists
/// grow through back-edges and shrink through pruning, only at layers up to
/// its own level.
#[derive(Debug, Clone)]
pub struct GraphNode {
    id: VectorId,
    level: usize,
    vector: Vec<f32>,
    /// `neighbors[layer]` holds arena slots, ordered by insertion or by
    /// closeness after a prune.
    neighbors: Vec<Vec<usize>>,
}

impl GraphNode {
    pub(crate) fn new(id: VectorId, level: usize, vector: Vec<f32>) -> Self {
        Self {
            id,
            level,
            vector,
            neighbors: vec![Vec::new(); level + 1],
        }
    }

    #[must_use]
    pub fn id(&self) -> VectorId {
        self.id
    }

    /// Highest layer this node appears on.
    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    /// The stored, unit-length vector.
    #[must_use]
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Number of neighbors at `layer` (zero above the node's level).
    #[must_use]
    pub fn degree(&self, layer: usize) -> usize {
        self.neighbors(layer).len()
    }

    pub(crate) fn neighbors(&self, layer: usize) -> &[usize] {
        self.neighbors.get(layer).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn set_neighbors(&mut self, layer: usize, slots: Vec<usize>) {
        debug_assert!(layer <= self.level, "layer above node level");
        if let Some(list) = self.neighbors.get_mut(layer) {
            *list = slots;
        }
    }

    pub(crate) fn push_neighbor(&mut self, layer: usize, slot: usize) {
        debug_assert!(layer <= self.level, "layer above node level");
        if let Some(list) = self.neighbors.get_mut(layer) {
            list.push(slot);
        }
    }
}
