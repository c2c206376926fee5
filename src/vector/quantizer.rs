//! Product quantization of embedding vectors.
//!
//! A vector of dimension `D` is split into `num_subspaces` contiguous slices
//! of `D / num_subspaces` values. Each slice position gets its own k-means
//! codebook of `num_clusters` centroids, and a vector is stored as the index
//! of the nearest centroid in every codebook.
//!
//! # Compression Example (384-dim, 8 subspaces, 256 clusters)
//!
//! - Original: 384 × 32 bits = 12288 bits
//! - Encoded: 8 × log2(256) = 64 bits
//!
//! Distances are cosine-flavored: for unit vectors `dot(q, x)` is the sum of
//! the per-slice dot products, so a query can be compared against a code with
//! one table lookup per subspace.

use crate::config::QuantizerConfig;
use crate::vector::clustering::{self, Initialization, assign_to_nearest_centroid};
use crate::vector::math::dot;
use crate::vector::types::{Distance, VectorError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Compact code of one vector: one centroid index per subspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PqCode(Vec<u16>);

impl PqCode {
    /// Wraps raw per-subspace codes.
    #[must_use]
    pub fn new(codes: Vec<u16>) -> Self {
        Self(codes)
    }

    /// Returns the code for each subspace.
    #[must_use]
    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }

    /// Number of subspaces this code covers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-subspace dot products between one query and every centroid.
///
/// `table[s][c]` is the dot product of the query's slice `s` with centroid `c`
/// of codebook `s`.
#[derive(Debug, Clone)]
pub struct DistanceTable {
    table: Vec<Vec<f32>>,
}

/// Product quantizer trained with the k-means clusterer.
#[derive(Debug, Clone)]
pub struct ProductQuantizer {
    num_subspaces: usize,
    num_clusters: usize,
    max_iterations: usize,
    initialization: Initialization,
    /// Seed used by [`fit_seeded`](ProductQuantizer::fit_seeded).
    seed: Option<u64>,
    /// Full vector dimension, known once trained.
    dimension: Option<usize>,
    /// One codebook per subspace, each `num_clusters` slices long.
    centroids: Vec<Vec<Vec<f32>>>,
}

impl ProductQuantizer {
    /// Creates an untrained quantizer.
    ///
    /// # Errors
    /// * `InvalidParameter` if either count is zero or `num_clusters`
    ///   does not fit a 16-bit code
    pub fn new(
        num_subspaces: usize,
        num_clusters: usize,
        max_iterations: usize,
    ) -> Result<Self, VectorError> {
        if num_subspaces == 0 {
            return Err(VectorError::InvalidParameter {
                name: "num_subspaces",
                reason: "at least one subspace is required",
            });
        }
        if num_clusters == 0 || num_clusters > usize::from(u16::MAX) + 1 {
            return Err(VectorError::InvalidParameter {
                name: "num_clusters",
                reason: "must be between 1 and 65536",
            });
        }
        Ok(Self {
            num_subspaces,
            num_clusters,
            max_iterations,
            initialization: Initialization::Sample,
            seed: None,
            dimension: None,
            centroids: Vec::new(),
        })
    }

    /// Creates an untrained quantizer from the `[quantizer]` settings section.
    pub fn from_config(config: &QuantizerConfig) -> Result<Self, VectorError> {
        let mut quantizer =
            Self::new(config.num_subspaces, config.num_clusters, config.max_iterations)?;
        quantizer.seed = config.seed;
        Ok(quantizer)
    }

    /// Uses a different k-means initialization for every codebook.
    #[must_use]
    pub fn with_initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }

    /// Restores a quantizer from previously trained codebooks.
    ///
    /// Identical codebooks always produce identical codes.
    pub fn from_centroids(centroids: Vec<Vec<Vec<f32>>>) -> Result<Self, VectorError> {
        let num_subspaces = centroids.len();
        let num_clusters = centroids.first().map_or(0, Vec::len);
        let sub_dimension = centroids
            .first()
            .and_then(|book| book.first())
            .map_or(0, Vec::len);

        if sub_dimension == 0 {
            return Err(VectorError::InvalidParameter {
                name: "centroids",
                reason: "codebooks must be non-empty",
            });
        }
        let consistent = centroids.iter().all(|book| {
            book.len() == num_clusters && book.iter().all(|c| c.len() == sub_dimension)
        });
        if !consistent {
            return Err(VectorError::InvalidParameter {
                name: "centroids",
                reason: "every codebook needs the same centroid count and slice length",
            });
        }

        let mut quantizer = Self::new(num_subspaces, num_clusters, 0)?;
        quantizer.dimension = Some(sub_dimension * num_subspaces);
        quantizer.centroids = centroids;
        Ok(quantizer)
    }

    /// Trains one codebook per subspace.
    ///
    /// # Errors
    /// * `InvalidSubspaceCount` if the dimension is not divisible by `num_subspaces`
    /// * `DimensionMismatch` if the vectors disagree on dimension
    /// * `ClusteringFailed` if there are fewer vectors than `num_clusters`
    pub fn fit<R: Rng + ?Sized>(
        &mut self,
        vectors: &[Vec<f32>],
        rng: &mut R,
    ) -> Result<(), VectorError> {
        let Some(first) = vectors.first() else {
            return Err(VectorError::ClusteringFailed(
                "no vectors provided for training".to_string(),
            ));
        };
        let dimension = first.len();
        if dimension % self.num_subspaces != 0 || dimension < self.num_subspaces {
            return Err(VectorError::InvalidSubspaceCount {
                dimension,
                num_subspaces: self.num_subspaces,
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(VectorError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let sub_dimension = dimension / self.num_subspaces;
        let mut codebooks = Vec::with_capacity(self.num_subspaces);
        for subspace in 0..self.num_subspaces {
            let range = subspace * sub_dimension..(subspace + 1) * sub_dimension;
            let slices: Vec<Vec<f32>> = vectors.iter().map(|v| v[range.clone()].to_vec()).collect();

            let result = clustering::train(
                &slices,
                self.num_clusters,
                self.max_iterations,
                self.initialization,
                rng,
            )?;
            codebooks.push(result.centroids);
        }

        tracing::debug!(
            subspaces = self.num_subspaces,
            clusters = self.num_clusters,
            vectors = vectors.len(),
            "product quantizer trained"
        );

        self.dimension = Some(dimension);
        self.centroids = codebooks;
        Ok(())
    }

    /// Trains with a generator seeded from the configured seed, or from the
    /// OS when no seed is set.
    pub fn fit_seeded(&mut self, vectors: &[Vec<f32>]) -> Result<(), VectorError> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        self.fit(vectors, &mut rng)
    }

    /// Encodes a vector as the nearest centroid index in every subspace.
    pub fn encode(&self, vector: &[f32]) -> Result<PqCode, VectorError> {
        let sub_dimension = self.validated_sub_dimension(vector)?;
        let codes = vector
            .chunks_exact(sub_dimension)
            .zip(self.centroids.iter())
            .map(|(slice, book)| assign_to_nearest_centroid(slice, book).index() as u16)
            .collect();
        Ok(PqCode(codes))
    }

    /// Reconstructs an approximation of the vector a code was produced from.
    pub fn decode(&self, code: &PqCode) -> Result<Vec<f32>, VectorError> {
        self.validate_code(code)?;
        Ok(code
            .0
            .iter()
            .zip(self.centroids.iter())
            .flat_map(|(&c, book)| book[usize::from(c)].iter().copied())
            .collect())
    }

    /// Precomputes the per-subspace dot products of a query with every centroid.
    pub fn distance_table(&self, query: &[f32]) -> Result<DistanceTable, VectorError> {
        let sub_dimension = self.validated_sub_dimension(query)?;
        let table = query
            .chunks_exact(sub_dimension)
            .zip(self.centroids.iter())
            .map(|(slice, book)| book.iter().map(|c| dot(slice, c)).collect())
            .collect();
        Ok(DistanceTable { table })
    }

    /// Approximate cosine distance between a (unit) query and an encoded vector.
    pub fn table_distance(
        &self,
        table: &DistanceTable,
        code: &PqCode,
    ) -> Result<Distance, VectorError> {
        self.validate_code(code)?;
        let approx_dot: f32 = code
            .0
            .iter()
            .zip(table.table.iter())
            .map(|(&c, row)| row[usize::from(c)])
            .sum();
        Ok(Distance::from_similarity(approx_dot))
    }

    /// Approximate cosine distance between two encoded vectors.
    pub fn symmetric_distance(&self, a: &PqCode, b: &PqCode) -> Result<Distance, VectorError> {
        self.validate_code(a)?;
        self.validate_code(b)?;
        let approx_dot: f32 = a
            .0
            .iter()
            .zip(b.0.iter())
            .zip(self.centroids.iter())
            .map(|((&ca, &cb), book)| dot(&book[usize::from(ca)], &book[usize::from(cb)]))
            .sum();
        Ok(Distance::from_similarity(approx_dot))
    }

    /// Number of subspaces whose codes differ.
    #[must_use]
    pub fn hamming(a: &PqCode, b: &PqCode) -> usize {
        a.0.iter().zip(b.0.iter()).filter(|(x, y)| x != y).count() + a.len().abs_diff(b.len())
    }

    /// Size of the raw vector in bits divided by the size of its code in bits.
    #[must_use]
    pub fn compression_ratio(&self) -> Option<f32> {
        let dimension = self.dimension?;
        let bits_per_code = (self.num_clusters as f32).log2().ceil().max(1.0);
        Some((dimension as f32 * 32.0) / (self.num_subspaces as f32 * bits_per_code))
    }

    /// Trained codebooks, empty until [`fit`](Self::fit) succeeds.
    #[must_use]
    pub fn centroids(&self) -> &[Vec<Vec<f32>>] {
        &self.centroids
    }

    #[must_use]
    pub fn num_subspaces(&self) -> usize {
        self.num_subspaces
    }

    #[must_use]
    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    #[must_use]
    pub fn is_trained(&self) -> bool {
        self.dimension.is_some()
    }

    fn validated_sub_dimension(&self, vector: &[f32]) -> Result<usize, VectorError> {
        let dimension = self.dimension.ok_or(VectorError::NotTrained)?;
        if vector.len() != dimension {
            return Err(VectorError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
        Ok(dimension / self.num_subspaces)
    }

    fn validate_code(&self, code: &PqCode) -> Result<(), VectorError> {
        if !self.is_trained() {
            return Err(VectorError::NotTrained);
        }
        if code.len() != self.num_subspaces {
            return Err(VectorError::DimensionMismatch {
                expected: self.num_subspaces,
                actual: code.len(),
            });
        }
        if let Some((subspace, &bad)) = code
            .0
            .iter()
            .enumerate()
            .find(|(_, c)| usize::from(**c) >= self.num_clusters)
        {
            return Err(VectorError::InvalidCode {
                subspace,
                code: bad,
                num_clusters: self.num_clusters,
            });
        }
        Ok(())
    }
}
