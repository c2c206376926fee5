//! One-level cluster bucket index.
//!
//! Vectors are grouped around k-means centroids. A query ranks the centroids
//! and scans only the closest buckets, trading some recall for fewer
//! distance computations.

use std::collections::{HashMap, HashSet};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::ClusteringConfig;
use crate::vector::clustering::{self, assign_to_nearest_centroid};
use crate::vector::flat::top_k;
use crate::vector::math::{distance_unchecked, normalize};
use crate::vector::{ClusterId, Distance, VectorDimension, VectorError, VectorId};

/// Cluster bucket index built from [`clustering::train`].
///
/// Records are buffered by [`insert`](Self::insert) and bucketed by
/// [`build`](Self::build). Records inserted after the last build are scanned
/// exactly by every query until the next build.
#[derive(Debug)]
pub struct ClusterIndex {
    dimension: VectorDimension,
    config: ClusteringConfig,

    /// Normalized vectors in insertion order
    vectors: Vec<Vec<f32>>,
    /// Id of `vectors[i]`
    record_ids: Vec<VectorId>,
    ids: HashSet<VectorId>,

    centroids: Vec<Vec<f32>>,
    /// Record positions per centroid
    buckets: Vec<Vec<usize>>,
    assignments: HashMap<VectorId, ClusterId>,
    /// `vectors[..built]` are bucketed
    built: usize,

    rng: StdRng,
}

impl ClusterIndex {
    /// Creates an empty index.
    ///
    /// # Errors
    /// `InvalidParameter` if `clusters` or `n_probe` is zero.
    pub fn new(dimension: VectorDimension, config: ClusteringConfig) -> Result<Self, VectorError> {
        if config.clusters == 0 {
            return Err(VectorError::InvalidParameter {
                name: "clusters",
                reason: "at least one centroid is required",
            });
        }
        if config.n_probe == 0 {
            return Err(VectorError::InvalidParameter {
                name: "n_probe",
                reason: "queries must probe at least one bucket",
            });
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            dimension,
            config,
            vectors: Vec::new(),
            record_ids: Vec::new(),
            ids: HashSet::new(),
            centroids: Vec::new(),
            buckets: Vec::new(),
            assignments: HashMap::new(),
            built: 0,
            rng,
        })
    }

    /// Buffers a normalized copy of `vector` under `id`.
    pub fn insert(&mut self, id: VectorId, vector: &[f32]) -> Result<(), VectorError> {
        self.dimension.validate_vector(vector)?;
        if self.ids.contains(&id) {
            return Err(VectorError::DuplicateId(id.get()));
        }
        let vector = normalize(vector)?;

        self.ids.insert(id);
        self.record_ids.push(id);
        self.vectors.push(vector);
        Ok(())
    }

    /// Trains centroids over every record and rebuilds the buckets.
    ///
    /// # Algorithm
    /// 1. Clamp the configured cluster count to the number of records
    /// 2. Run k-means with the configured initialization
    /// 3. Bucket every record under its final assignment
    pub fn build(&mut self) -> Result<(), VectorError> {
        if self.vectors.is_empty() {
            return Ok(());
        }

        let k = self.config.clusters.clamp(1, self.vectors.len());

        let result = clustering::train(
            &self.vectors,
            k,
            self.config.max_iterations,
            self.config.initialization,
            &mut self.rng,
        )?;

        let mut buckets = vec![Vec::new(); result.centroids.len()];
        let mut assignments = HashMap::with_capacity(self.vectors.len());
        for (position, cluster) in result.assignments.iter().enumerate() {
            buckets[cluster.index()].push(position);
            assignments.insert(self.record_ids[position], *cluster);
        }

        tracing::debug!(
            records = self.vectors.len(),
            k,
            iterations = result.iterations,
            converged = result.converged,
            "cluster index built"
        );

        self.centroids = result.centroids;
        self.buckets = buckets;
        self.assignments = assignments;
        self.built = self.vectors.len();
        Ok(())
    }

    /// Returns up to `k` nearest ids, best first.
    ///
    /// # Algorithm
    /// 1. Rank centroids by distance to the query
    /// 2. Score every record in the `n_probe` closest buckets
    /// 3. Score every record inserted since the last build
    /// 4. Return the top `k`
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(VectorId, Distance)>, VectorError> {
        self.dimension.validate_vector(query)?;
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }
        let query = normalize(query)?;

        let mut ranked: Vec<(usize, Distance)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, centroid)| (i, distance_unchecked(&query, centroid)))
            .collect();
        ranked.sort_unstable_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let probed = ranked
            .iter()
            .take(self.config.n_probe)
            .flat_map(|&(cluster, _)| self.buckets[cluster].iter().copied());
        let pending = self.built..self.vectors.len();

        let candidates = probed
            .chain(pending)
            .map(|position| {
                (
                    self.record_ids[position],
                    distance_unchecked(&query, &self.vectors[position]),
                )
            })
            .collect();

        Ok(top_k(candidates, k))
    }

    /// Nearest centroid to an arbitrary vector, if the index has been built.
    pub fn nearest_cluster(&self, vector: &[f32]) -> Result<Option<ClusterId>, VectorError> {
        self.dimension.validate_vector(vector)?;
        if self.centroids.is_empty() {
            return Ok(None);
        }
        Ok(Some(assign_to_nearest_centroid(vector, &self.centroids)))
    }

    /// Gets the cluster assignment for a specific vector.
    ///
    /// # Returns
    /// The cluster ID if the vector was bucketed by the last build
    #[must_use = "The cluster assignment should be used for cluster-aware operations"]
    pub fn cluster_for(&self, id: VectorId) -> Option<ClusterId> {
        self.assignments.get(&id).copied()
    }

    /// Gets a reference to cluster centroids for inspection.
    #[must_use]
    pub fn centroids(&self) -> &[Vec<f32>] {
        &self.centroids
    }

    /// Gets the number of indexed vectors, bucketed or pending.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Number of records inserted since the last build.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.vectors.len() - self.built
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn config(clusters: usize, n_probe: usize) -> ClusteringConfig {
        ClusteringConfig {
            clusters,
            n_probe,
            seed: Some(42),
            ..ClusteringConfig::default()
        }
    }

    fn create_test_vectors(n: usize, dim: usize) -> Vec<(VectorId, Vec<f32>)> {
        let mut rng = StdRng::seed_from_u64(11);
        (0..n)
            .map(|i| {
                let v = (0..dim).map(|_| rng.random_range(-1.0f32..1.0)).collect();
                (VectorId::new(i as u32), v)
            })
            .collect()
    }

    fn build_index(vectors: &[(VectorId, Vec<f32>)], config: ClusteringConfig) -> ClusterIndex {
        let dim = VectorDimension::new(vectors[0].1.len()).unwrap();
        let mut index = ClusterIndex::new(dim, config).unwrap();
        for (id, v) in vectors {
            index.insert(*id, v).unwrap();
        }
        index.build().unwrap();
        index
    }

    #[test]
    fn test_index_and_search() {
        let vectors = create_test_vectors(100, 8);
        let index = build_index(&vectors, config(4, 1));

        assert_eq!(index.len(), 100);
        assert_eq!(index.centroids().len(), 4);
        assert_eq!(index.pending(), 0);

        // A stored vector always lands in its own nearest bucket
        for (id, v) in vectors.iter().take(20) {
            let results = index.search(v, 1).unwrap();
            assert_eq!(results[0].0, *id);
        }
    }

    #[test]
    fn test_empty_index_search() {
        let mut index = ClusterIndex::new(VectorDimension::new(4).unwrap(), config(4, 1)).unwrap();
        index.build().unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0, 0.0], 5).unwrap().is_empty());
        assert!(index.centroids().is_empty());
    }

    #[test]
    fn test_dimension_validation() {
        let vectors = create_test_vectors(10, 4);
        let mut index = build_index(&vectors, config(2, 1));

        assert!(matches!(
            index.insert(VectorId::new(50), &[1.0, 0.0]),
            Err(VectorError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        ));
        assert!(index.search(&[1.0; 5], 1).is_err());
        assert_eq!(index.len(), 10);
    }

    #[test]
    fn test_cluster_count_is_clamped() {
        let vectors = create_test_vectors(3, 4);
        let index = build_index(&vectors, config(8, 1));
        assert_eq!(index.centroids().len(), 3);
    }

    #[test]
    fn test_cluster_assignment_lookup() {
        let vectors = create_test_vectors(30, 4);
        let index = build_index(&vectors, config(3, 1));

        for (id, v) in &vectors {
            let cluster = index.cluster_for(*id).unwrap();
            assert!(cluster.index() < 3);
            assert_eq!(index.nearest_cluster(&normalize(v).unwrap()).unwrap(), Some(cluster));
        }
        assert_eq!(index.cluster_for(VectorId::new(999)), None);
    }

    #[test]
    fn test_pending_records_are_searchable() {
        let vectors = create_test_vectors(20, 4);
        let mut index = build_index(&vectors, config(4, 1));

        let late = VectorId::new(100);
        index.insert(late, &[0.3, -0.2, 0.9, 0.1]).unwrap();
        assert_eq!(index.pending(), 1);
        assert_eq!(index.cluster_for(late), None);

        let results = index.search(&[0.3, -0.2, 0.9, 0.1], 1).unwrap();
        assert_eq!(results[0].0, late);

        index.build().unwrap();
        assert_eq!(index.pending(), 0);
        assert!(index.cluster_for(late).is_some());
    }

    #[test]
    fn test_probing_every_bucket_is_exact() {
        let vectors = create_test_vectors(60, 6);
        let index = build_index(&vectors, config(5, 5));

        let mut exact = crate::vector::FlatIndex::new(index.dimension());
        for (id, v) in &vectors {
            exact.insert(*id, v).unwrap();
        }

        let query = [0.5, 0.1, -0.3, 0.8, 0.0, -0.6];
        assert_eq!(index.search(&query, 10).unwrap(), exact.search(&query, 10).unwrap());
    }

    #[test]
    fn test_search_returns_sorted_results() {
        let vectors = create_test_vectors(50, 4);
        let index = build_index(&vectors, config(2, 2));

        let results = index.search(&[1.0, 0.5, 0.0, -0.5], 10).unwrap();
        assert_eq!(results.len(), 10);
        for pair in results.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn test_invalid_config() {
        let dim = VectorDimension::new(4).unwrap();
        assert!(ClusterIndex::new(dim, config(0, 1)).is_err());
        assert!(ClusterIndex::new(dim, config(4, 0)).is_err());
    }
}
