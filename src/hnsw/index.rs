//! HNSW index: insertion, layered search and neighbor selection.
//!
//! Based on "Efficient and robust approximate nearest neighbor search using
//! Hierarchical Navigable Small World graphs" (Malkov & Yashunin).
//!
//! All comparisons use cosine distance, smaller meaning closer.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::HnswConfig;
use crate::hnsw::heap::Candidate;
use crate::hnsw::node::GraphNode;
use crate::vector::flat::top_k;
use crate::vector::math::{distance_unchecked, normalize};
use crate::vector::{Distance, VectorDimension, VectorError, VectorId};

/// Policy used to choose a node's neighbors from a candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborSelection {
    /// Take the closest candidates.
    #[default]
    Simple,
    /// Skip candidates that are closer to an already selected neighbor than
    /// to the base node. With `keep_pruned`, skipped candidates back-fill any
    /// remaining slots.
    Heuristic { keep_pruned: bool },
}

/// Multi-layer proximity graph over unit-length vectors.
#[derive(Debug)]
pub struct HnswIndex {
    dimension: VectorDimension,
    config: HnswConfig,
    nodes: Vec<GraphNode>,
    slots: HashMap<VectorId, usize>,
    /// Slot of the highest-level node.
    entry_point: Option<usize>,
    rng: StdRng,
}

impl HnswIndex {
    /// Creates an empty index.
    ///
    /// Level assignment is seeded from `config.seed` when present.
    pub fn new(dimension: VectorDimension, config: HnswConfig) -> Result<Self, VectorError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(dimension, config, rng)
    }

    /// Creates an empty index drawing levels from the given generator.
    pub fn with_rng(
        dimension: VectorDimension,
        config: HnswConfig,
        rng: StdRng,
    ) -> Result<Self, VectorError> {
        config.validate()?;
        Ok(Self {
            dimension,
            config,
            nodes: Vec::new(),
            slots: HashMap::new(),
            entry_point: None,
            rng,
        })
    }

    /// Inserts a vector under a caller-chosen id.
    ///
    /// The vector is normalized before it is stored. On error the index is
    /// left unchanged.
    ///
    /// # Errors
    /// * `DimensionMismatch` if the vector length differs from the index dimension
    /// * `DuplicateId` if the id is already present
    /// * `DegenerateVector` if the vector has zero magnitude
    pub fn insert(&mut self, id: VectorId, vector: &[f32]) -> Result<(), VectorError> {
        self.dimension.validate_vector(vector)?;
        if self.slots.contains_key(&id) {
            return Err(VectorError::DuplicateId(id.get()));
        }
        let vector = normalize(vector)?;

        let level = self.random_level();
        self.insert_at_level(id, vector, level);
        Ok(())
    }

    /// Returns the `k` nearest ids using the configured `ef_search`
    /// (raised to `k` if smaller).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(VectorId, Distance)>, VectorError> {
        self.search_with_ef(query, k, self.config.ef_search.max(k))
    }

    /// Returns up to `k` nearest ids, best first, searching layer 0 with a
    /// pool of width `ef`. With `ef < k` at most `ef` results come back.
    /// Equal distances are ordered by ascending id.
    ///
    /// # Errors
    /// * `DimensionMismatch` if the query length differs from the index dimension
    /// * `DegenerateVector` if the query has zero magnitude
    pub fn search_with_ef(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
    ) -> Result<Vec<(VectorId, Distance)>, VectorError> {
        self.dimension.validate_vector(query)?;

        let Some(entry) = self.entry_point else {
            return Ok(Vec::new());
        };
        if k == 0 || ef == 0 {
            return Ok(Vec::new());
        }
        let query = normalize(query)?;

        let mut current = entry;
        for layer in (1..=self.nodes[entry].level()).rev() {
            current = self.closest_at_layer(&query, current, layer);
        }

        let pool = self
            .layer_search(&query, &[current], ef, 0)
            .into_iter()
            .map(|c| (self.nodes[c.slot].id(), c.distance))
            .collect();
        Ok(top_k(pool, k))
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Id of the node every search starts from.
    #[must_use]
    pub fn entry_point(&self) -> Option<VectorId> {
        self.entry_point.map(|slot| self.nodes[slot].id())
    }

    /// Level of the entry point, the highest level in the graph.
    #[must_use]
    pub fn max_level(&self) -> Option<usize> {
        self.entry_point.map(|slot| self.nodes[slot].level())
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: VectorId) -> Option<&GraphNode> {
        self.slots.get(&id).map(|&slot| &self.nodes[slot])
    }

    /// Ids of a node's neighbors at `layer`.
    #[must_use]
    pub fn neighbors(&self, id: VectorId, layer: usize) -> Option<Vec<VectorId>> {
        let node = self.node(id)?;
        Some(
            node.neighbors(layer)
                .iter()
                .map(|&slot| self.nodes[slot].id())
                .collect(),
        )
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    /// Draws `floor(-ln(U) * level_multiplier)` with `U` uniform in (0, 1],
    /// clamped to `max_level`.
    fn random_level(&mut self) -> usize {
        let uniform = 1.0 - self.rng.random::<f64>();
        let level = (-uniform.ln() * self.config.level_multiplier).floor() as usize;
        level.min(self.config.max_level)
    }

    /// Links a normalized, validated vector into the graph at a fixed level.
    fn insert_at_level(&mut self, id: VectorId, vector: Vec<f32>, level: usize) {
        let slot = self.nodes.len();
        tracing::debug!(id = id.get(), level, "inserting node");

        let Some(entry) = self.entry_point else {
            self.nodes.push(GraphNode::new(id, level, vector));
            self.slots.insert(id, slot);
            self.entry_point = Some(slot);
            return;
        };
        let entry_level = self.nodes[entry].level();

        // Cheap descent through the layers the new node does not reach
        let mut current = entry;
        for layer in (level + 1..=entry_level).rev() {
            current = self.closest_at_layer(&vector, current, layer);
        }

        // Choose neighbors on every shared layer before the node joins the
        // arena, since lists at one layer never influence searches at another
        let top = level.min(entry_level);
        let mut selected = vec![Vec::new(); top + 1];
        for layer in (0..=top).rev() {
            let candidates =
                self.layer_search(&vector, &[current], self.config.ef_construction, layer);
            selected[layer] = self
                .select_neighbors(&candidates, self.config.m)
                .into_iter()
                .map(|c| c.slot)
                .collect();
            if let Some(best) = candidates.first() {
                current = best.slot;
            }
        }

        let mut node = GraphNode::new(id, level, vector);
        for (layer, neighbors) in selected.iter().enumerate() {
            node.set_neighbors(layer, neighbors.clone());
        }
        self.nodes.push(node);
        self.slots.insert(id, slot);

        for (layer, neighbors) in selected.iter().enumerate() {
            for &neighbor in neighbors {
                self.add_back_edge(neighbor, slot, layer);
            }
        }

        if level > entry_level {
            self.entry_point = Some(slot);
        }
    }

    /// Adds `to` to the neighbor list of `from`, pruning `from` back to the
    /// layer's degree cap when it overflows.
    fn add_back_edge(&mut self, from: usize, to: usize, layer: usize) {
        let cap = self.config.cap_for_layer(layer);
        self.nodes[from].push_neighbor(layer, to);
        if self.nodes[from].degree(layer) <= cap {
            return;
        }

        let base = &self.nodes[from];
        let pool: Vec<Candidate> = base
            .neighbors(layer)
            .iter()
            .map(|&slot| Candidate::new(self.distance_to(base.vector(), slot), slot))
            .collect();
        let kept = self
            .select_neighbors(&pool, cap)
            .into_iter()
            .map(|c| c.slot)
            .collect();
        self.nodes[from].set_neighbors(layer, kept);
    }

    /// Greedy single-best step (pool width 1) at one layer.
    fn closest_at_layer(&self, query: &[f32], start: usize, layer: usize) -> usize {
        self.layer_search(query, &[start], 1, layer)
            .first()
            .map_or(start, |c| c.slot)
    }

    /// Bounded best-first search of one layer.
    ///
    /// Keeps a min-ordered frontier and a max-ordered result set capped at
    /// `ef`, and stops as soon as the closest unexplored candidate is farther
    /// than the worst kept result of a full result set.
    ///
    /// # Returns
    /// At most `ef` candidates ordered best-first.
    pub(crate) fn layer_search(
        &self,
        query: &[f32],
        entry_points: &[usize],
        ef: usize,
        layer: usize,
    ) -> Vec<Candidate> {
        let mut visited = HashSet::new();
        let mut frontier = BinaryHeap::new();
        let mut results: BinaryHeap<Candidate> = BinaryHeap::new();

        for &ep in entry_points {
            if visited.insert(ep) {
                let candidate = Candidate::new(self.distance_to(query, ep), ep);
                frontier.push(Reverse(candidate));
                results.push(candidate);
            }
        }
        while results.len() > ef {
            results.pop();
        }

        while let Some(Reverse(current)) = frontier.pop() {
            if results.len() >= ef
                && results
                    .peek()
                    .is_some_and(|worst| current.distance > worst.distance)
            {
                break;
            }

            for &neighbor in self.nodes[current.slot].neighbors(layer) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let distance = self.distance_to(query, neighbor);
                let improves = results.peek().is_some_and(|worst| distance < worst.distance);
                if results.len() < ef || improves {
                    let candidate = Candidate::new(distance, neighbor);
                    frontier.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Picks up to `m` neighbors from `candidates`, whose distances are
    /// already measured from the base node.
    pub(crate) fn select_neighbors(&self, candidates: &[Candidate], m: usize) -> Vec<Candidate> {
        let mut sorted = candidates.to_vec();
        sorted.sort_unstable();

        match self.config.selection {
            NeighborSelection::Simple => {
                sorted.truncate(m);
                sorted
            }
            NeighborSelection::Heuristic { keep_pruned } => {
                self.select_diverse(sorted, m, keep_pruned)
            }
        }
    }

    fn select_diverse(&self, sorted: Vec<Candidate>, m: usize, keep_pruned: bool) -> Vec<Candidate> {
        let mut selected: Vec<Candidate> = Vec::with_capacity(m);
        let mut pruned = Vec::new();

        for candidate in sorted {
            if selected.len() >= m {
                break;
            }
            let vector = self.nodes[candidate.slot].vector();
            // A candidate closer to a chosen neighbor than to the base sits
            // behind that neighbor
            let shadowed = selected.iter().any(|chosen| {
                self.distance_to(vector, chosen.slot) < candidate.distance
            });
            if shadowed {
                pruned.push(candidate);
            } else {
                selected.push(candidate);
            }
        }

        if keep_pruned {
            let room = m.saturating_sub(selected.len());
            selected.extend(pruned.into_iter().take(room));
        }
        selected
    }

    fn distance_to(&self, query: &[f32], slot: usize) -> Distance {
        distance_unchecked(query, self.nodes[slot].vector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(m: usize, m_max: usize, ef_construction: usize) -> HnswConfig {
        HnswConfig {
            m,
            m_max,
            ef_construction,
            seed: Some(7),
            ..HnswConfig::default()
        }
    }

    fn dim(n: usize) -> VectorDimension {
        VectorDimension::new(n).unwrap()
    }

    fn random_vectors(n: usize, d: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..d).map(|_| rng.random_range(-1.0f32..1.0)).collect())
            .collect()
    }

    fn build(vectors: &[Vec<f32>], config: HnswConfig) -> HnswIndex {
        let mut index = HnswIndex::new(dim(vectors[0].len()), config).unwrap();
        for (i, v) in vectors.iter().enumerate() {
            index.insert(VectorId::new(i as u32), v).unwrap();
        }
        index
    }

    #[test]
    fn test_four_axis_scenario() {
        let vectors = vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
            vec![0.0, -1.0],
        ];
        let index = build(&vectors, config(2, 4, 10));

        let top = index.search(&[0.9, 0.1], 1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].0, VectorId::new(0));

        let top = index.search(&[-0.9, -0.1], 1).unwrap();
        assert_eq!(top[0].0, VectorId::new(2));
    }

    #[test]
    fn test_empty_index_search() {
        let index = HnswIndex::new(dim(3), HnswConfig::default()).unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
        assert_eq!(index.entry_point(), None);
        assert_eq!(index.max_level(), None);
    }

    #[test]
    fn test_dimension_guard_leaves_index_unchanged() {
        let vectors = random_vectors(10, 4, 1);
        let mut index = build(&vectors, config(4, 8, 20));
        let entry = index.entry_point();

        assert_eq!(
            index.insert(VectorId::new(99), &[1.0, 0.0]),
            Err(VectorError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        );
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(VectorError::DimensionMismatch { .. })
        ));
        assert_eq!(index.len(), 10);
        assert_eq!(index.entry_point(), entry);
        assert!(index.node(VectorId::new(99)).is_none());
    }

    #[test]
    fn test_rejects_duplicates_and_degenerate_vectors() {
        let mut index = HnswIndex::new(dim(2), config(2, 4, 10)).unwrap();
        index.insert(VectorId::new(0), &[1.0, 0.0]).unwrap();

        assert_eq!(
            index.insert(VectorId::new(0), &[0.0, 1.0]),
            Err(VectorError::DuplicateId(0))
        );
        assert!(matches!(
            index.insert(VectorId::new(1), &[0.0, 0.0]),
            Err(VectorError::DegenerateVector { .. })
        ));
        assert!(matches!(
            index.search(&[0.0, 0.0], 1),
            Err(VectorError::DegenerateVector { .. })
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_stored_vectors_are_normalized() {
        let mut index = HnswIndex::new(dim(2), config(2, 4, 10)).unwrap();
        index.insert(VectorId::new(5), &[3.0, 4.0]).unwrap();

        let node = index.node(VectorId::new(5)).unwrap();
        assert!((node.vector()[0] - 0.6).abs() < 1e-6);
        assert!((node.vector()[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_self_retrieval() {
        let vectors = random_vectors(120, 16, 2);
        let index = build(&vectors, config(8, 16, 100));

        for (i, v) in vectors.iter().enumerate() {
            let top = index.search_with_ef(v, 1, 120).unwrap();
            assert_eq!(top[0].0, VectorId::new(i as u32), "vector {i}");
            assert!(top[0].1.get().abs() < 1e-5);
        }
    }

    #[test]
    fn test_results_are_ordered_best_first() {
        let vectors = random_vectors(80, 8, 3);
        let index = build(&vectors, config(6, 12, 60));

        let results = index.search_with_ef(&vectors[10], 20, 40).unwrap();
        assert_eq!(results.len(), 20);
        for pair in results.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn test_small_ef_caps_result_count() {
        let vectors = random_vectors(50, 8, 4);
        let index = build(&vectors, config(6, 12, 60));

        assert_eq!(index.search_with_ef(&vectors[0], 10, 3).unwrap().len(), 3);
        assert!(index.search_with_ef(&vectors[0], 10, 0).unwrap().is_empty());
        assert!(index.search_with_ef(&vectors[0], 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_degree_caps_hold() {
        let vectors = random_vectors(200, 8, 5);
        let cfg = HnswConfig {
            m_max0: Some(12),
            ..config(4, 6, 40)
        };
        let index = build(&vectors, cfg);

        for node in index.nodes() {
            assert!(node.degree(0) <= 12);
            for layer in 1..=node.level() {
                assert!(node.degree(layer) <= 6);
            }
            // No lists exist above the node's own level
            assert_eq!(node.degree(node.level() + 1), 0);
        }
    }

    #[test]
    fn test_neighbors_live_on_their_layer() {
        let vectors = random_vectors(150, 6, 6);
        let index = build(&vectors, config(4, 8, 30));

        for node in index.nodes() {
            for layer in 0..=node.level() {
                for neighbor in index.neighbors(node.id(), layer).unwrap() {
                    assert_ne!(neighbor, node.id());
                    assert!(index.node(neighbor).unwrap().level() >= layer);
                }
            }
        }
    }

    #[test]
    fn test_entry_point_has_max_level() {
        let vectors = random_vectors(300, 4, 7);
        let index = build(&vectors, config(4, 8, 20));

        let top = index.max_level().unwrap();
        assert!(index.nodes().all(|node| node.level() <= top));
        let entry = index.entry_point().unwrap();
        assert_eq!(index.node(entry).unwrap().level(), top);
    }

    #[test]
    fn test_higher_level_insert_takes_over_entry_point() {
        let mut index = HnswIndex::new(dim(2), config(2, 4, 10)).unwrap();
        index.insert_at_level(VectorId::new(0), vec![1.0, 0.0], 0);
        index.insert_at_level(VectorId::new(1), vec![0.0, 1.0], 0);
        assert_eq!(index.entry_point(), Some(VectorId::new(0)));

        index.insert_at_level(VectorId::new(2), vec![-1.0, 0.0], 3);
        assert_eq!(index.entry_point(), Some(VectorId::new(2)));
        assert_eq!(index.max_level(), Some(3));

        // Same level does not replace the entry point
        index.insert_at_level(VectorId::new(3), vec![0.0, -1.0], 3);
        assert_eq!(index.entry_point(), Some(VectorId::new(2)));

        // Linked at layer 0 both ways
        let back = index.neighbors(VectorId::new(0), 0).unwrap();
        assert!(back.contains(&VectorId::new(1)));
    }

    #[test]
    fn test_seeded_levels_are_reproducible() {
        let vectors = random_vectors(60, 4, 8);
        let a = build(&vectors, config(4, 8, 20));
        let b = build(&vectors, config(4, 8, 20));

        let levels_a: Vec<usize> = a.nodes().map(GraphNode::level).collect();
        let levels_b: Vec<usize> = b.nodes().map(GraphNode::level).collect();
        assert_eq!(levels_a, levels_b);
        assert_eq!(a.entry_point(), b.entry_point());
    }

    #[test]
    fn test_heuristic_selection_prefers_diverse_neighbors() {
        let mut simple = HnswIndex::new(dim(2), config(2, 4, 10)).unwrap();
        let mut diverse = HnswIndex::new(
            dim(2),
            HnswConfig {
                selection: NeighborSelection::Heuristic { keep_pruned: false },
                ..config(2, 4, 10)
            },
        )
        .unwrap();

        let points = [vec![0.99, 0.14], vec![0.98, 0.2], vec![0.7, -0.7]];
        for index in [&mut simple, &mut diverse] {
            for (i, p) in points.iter().enumerate() {
                index.insert_at_level(VectorId::new(i as u32), normalize(p).unwrap(), 0);
            }
        }

        let base = [1.0, 0.0];
        let pool = |index: &HnswIndex| -> Vec<Candidate> {
            (0..3)
                .map(|slot| Candidate::new(index.distance_to(&base, slot), slot))
                .collect()
        };

        let chosen: Vec<usize> = simple
            .select_neighbors(&pool(&simple), 2)
            .iter()
            .map(|c| c.slot)
            .collect();
        assert_eq!(chosen, vec![0, 1]);

        let chosen: Vec<usize> = diverse
            .select_neighbors(&pool(&diverse), 2)
            .iter()
            .map(|c| c.slot)
            .collect();
        assert_eq!(chosen, vec![0, 2]);
    }

    #[test]
    fn test_layer_search_with_multiple_entry_points() {
        let vectors = random_vectors(40, 4, 9);
        let index = build(&vectors, config(4, 8, 20));
        let query = normalize(&vectors[3]).unwrap();

        let found = index.layer_search(&query, &[0, 1, 2], 40, 0);
        assert!(found.len() <= 40);
        assert_eq!(found[0].slot, 3);
    }

    #[test]
    fn test_ties_order_by_id_not_insertion() {
        let mut index = HnswIndex::new(dim(2), config(2, 4, 10)).unwrap();
        // Same direction, inserted with descending ids
        for id in [40, 7, 19] {
            index.insert(VectorId::new(id), &[1.0, 1.0]).unwrap();
        }
        index.insert(VectorId::new(3), &[-1.0, 0.0]).unwrap();

        let ids: Vec<u32> = index
            .search(&[1.0, 1.0], 3)
            .unwrap()
            .iter()
            .map(|(id, _)| id.get())
            .collect();
        assert_eq!(ids, vec![7, 19, 40]);
    }

    #[test]
    fn test_levels_are_clamped_to_max_level() {
        let cfg = HnswConfig {
            level_multiplier: 1e18,
            max_level: 3,
            ..config(4, 8, 20)
        };
        assert!(cfg.validate().is_ok());

        let vectors = random_vectors(30, 4, 10);
        let index = build(&vectors, cfg);
        assert_eq!(index.len(), 30);
        assert!(index.nodes().all(|node| node.level() <= 3));
        assert_eq!(index.max_level(), Some(3));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = HnswConfig {
            m: 0,
            ..HnswConfig::default()
        };
        assert!(HnswIndex::new(dim(4), bad).is_err());
    }
}
