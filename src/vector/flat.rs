//! Exact nearest neighbor search by scanning every stored vector.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::vector::math::{distance_unchecked, normalize};
use crate::vector::{Distance, VectorDimension, VectorError, VectorId};

/// Brute-force cosine index.
///
/// Searches are exact, which makes this the reference the approximate
/// indexes are measured against.
#[derive(Debug)]
pub struct FlatIndex {
    dimension: VectorDimension,
    records: Vec<(VectorId, Vec<f32>)>,
    ids: HashSet<VectorId>,
}

impl FlatIndex {
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            records: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Stores a normalized copy of `vector` under `id`.
    pub fn insert(&mut self, id: VectorId, vector: &[f32]) -> Result<(), VectorError> {
        self.dimension.validate_vector(vector)?;
        if self.ids.contains(&id) {
            return Err(VectorError::DuplicateId(id.get()));
        }
        let vector = normalize(vector)?;

        self.ids.insert(id);
        self.records.push((id, vector));
        Ok(())
    }

    /// Returns the exact `k` nearest ids, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(VectorId, Distance)>, VectorError> {
        self.dimension.validate_vector(query)?;
        if k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }
        let query = normalize(query)?;

        let scored: Vec<(VectorId, Distance)> = self
            .records
            .par_iter()
            .map(|(id, vector)| (*id, distance_unchecked(&query, vector)))
            .collect();
        Ok(top_k(scored, k))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

/// Sorts by ascending distance (ties by id) and keeps the first `k`.
pub(crate) fn top_k(mut hits: Vec<(VectorId, Distance)>, k: usize) -> Vec<(VectorId, Distance)> {
    hits.sort_unstable_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    hits.truncate(k);
    hits
}
