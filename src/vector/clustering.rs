//! K-means clustering used by the bucket index and the product quantizer.
//!
//! This module provides a pure Rust implementation of K-means clustering
//! over embedding vectors. It uses cosine distance as the metric and
//! takes its randomness from the caller so runs are reproducible.
//!
//! # Algorithm Details
//! - Distance metric: cosine distance `1 - similarity`
//! - Initialization: uniform sampling (default), bounded random, or K-means++
//! - Stops after `max_iterations` or when no point changes cluster
//! - Empty clusters keep their previous centroid
//!
//! # Performance Characteristics
//! - O(n * k * d * iterations) time complexity
//! - O(k * d) space for centroids
//! - Parallel assignment step

use crate::vector::math::distance_unchecked;
use crate::vector::types::{ClusterId, VectorError};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maximum number of iterations for K-means clustering.
pub const MAX_ITERATIONS: usize = 100;

/// Epsilon for floating-point comparisons.
const EPSILON: f32 = 1e-10;

/// How the first set of centroids is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initialization {
    /// `k` distinct input points chosen uniformly at random.
    #[default]
    Sample,
    /// Random vectors with every coordinate uniform in [-1, 1].
    RandomRange,
    /// K-means++ seeding: later centroids favor points far from earlier ones.
    KMeansPlusPlus,
}

/// Result of K-means clustering operation.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Cluster centroids, each a vector of the same dimension as input vectors.
    pub centroids: Vec<Vec<f32>>,

    /// Cluster assignment for each input vector.
    pub assignments: Vec<ClusterId>,

    /// Number of update iterations performed.
    pub iterations: usize,

    /// Whether the run stopped because no assignment changed.
    pub converged: bool,
}

/// Errors that can occur during clustering operations.
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error(
        "Empty vector set provided for clustering\nSuggestion: Ensure vectors are generated before clustering"
    )]
    EmptyVectorSet,

    #[error("Invalid cluster count: {0}\nSuggestion: Use k between 1 and the number of vectors")]
    InvalidClusterCount(usize),

    #[error(
        "Dimension mismatch in vectors\nSuggestion: Ensure all vectors come from the same embedding model"
    )]
    DimensionMismatch,

    #[error(
        "Failed to initialize centroids\nSuggestion: Check that vectors contain valid floating-point values"
    )]
    InitializationFailed,

    #[error("Vector operation error: {0}")]
    VectorError(#[from] VectorError),
}

impl From<ClusteringError> for VectorError {
    fn from(err: ClusteringError) -> Self {
        match err {
            ClusteringError::VectorError(inner) => inner,
            other => VectorError::ClusteringFailed(other.to_string()),
        }
    }
}

/// Performs K-means clustering on a set of vectors using cosine distance.
///
/// # Arguments
/// * `points` - Input vectors to cluster (must be non-empty and same dimension)
/// * `k` - Number of clusters (must be >= 1 and <= number of vectors)
/// * `max_iterations` - Upper bound on update iterations
/// * `initialization` - How the starting centroids are picked
/// * `rng` - Source of randomness for initialization
///
/// # Algorithm
/// 1. Initialize centroids
/// 2. Assign every point to its nearest centroid
/// 3. Recompute each centroid as the mean of its points (empty clusters keep
///    their previous centroid) and reassign
/// 4. Repeat 3 until no assignment changes or `max_iterations` is reached
#[must_use = "clustering results should be used or the computation is wasted"]
pub fn train<R: Rng + ?Sized>(
    points: &[Vec<f32>],
    k: usize,
    max_iterations: usize,
    initialization: Initialization,
    rng: &mut R,
) -> Result<KMeansResult, ClusteringError> {
    if points.is_empty() {
        return Err(ClusteringError::EmptyVectorSet);
    }

    if k == 0 || k > points.len() {
        return Err(ClusteringError::InvalidClusterCount(k));
    }

    let dimension = points[0].len();
    if points.iter().any(|v| v.len() != dimension) {
        return Err(ClusteringError::DimensionMismatch);
    }

    let mut centroids = match initialization {
        Initialization::Sample => initialize_by_sampling(points, k, rng),
        Initialization::RandomRange => initialize_random_range(dimension, k, rng),
        Initialization::KMeansPlusPlus => initialize_kmeans_plus_plus(points, k, rng)?,
    };

    let mut assignments = nearest_indices(points, &centroids);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;

        update_centroids(points, &assignments, &mut centroids);

        let next = nearest_indices(points, &centroids);
        if next == assignments {
            converged = true;
            break;
        }
        assignments = next;
    }

    if converged {
        tracing::debug!(k, iterations, "k-means converged");
    } else if max_iterations > 0 {
        tracing::warn!(
            k,
            max_iterations,
            "k-means did not fully converge, returning last centroids"
        );
    }

    Ok(KMeansResult {
        centroids,
        assignments: assignments.into_iter().map(ClusterId::from_index).collect(),
        iterations,
        converged,
    })
}

/// Single nearest-centroid assignment pass.
///
/// # Returns
/// One bucket per centroid (same order as `centroids`), each holding the
/// indices of the points closest to that centroid.
pub fn assign(
    points: &[Vec<f32>],
    centroids: &[Vec<f32>],
) -> Result<Vec<Vec<usize>>, ClusteringError> {
    let Some(first) = centroids.first() else {
        return Err(ClusteringError::InvalidClusterCount(0));
    };
    let dimension = first.len();
    if centroids.iter().chain(points.iter()).any(|v| v.len() != dimension) {
        return Err(ClusteringError::DimensionMismatch);
    }

    let mut buckets = vec![Vec::new(); centroids.len()];
    for (point, cluster) in nearest_indices(points, centroids).into_iter().enumerate() {
        buckets[cluster].push(point);
    }
    Ok(buckets)
}

/// Assigns a vector to the nearest centroid based on cosine distance.
///
/// Ties go to the lowest centroid index.
///
/// # Panics
/// Debug builds assert that `vector` and every centroid share a dimension.
pub fn assign_to_nearest_centroid(vector: &[f32], centroids: &[Vec<f32>]) -> ClusterId {
    ClusterId::from_index(nearest_index(vector, centroids))
}

fn nearest_index(vector: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_distance = None;

    for (i, centroid) in centroids.iter().enumerate() {
        let d = distance_unchecked(vector, centroid);
        if best_distance.is_none_or(|current| d < current) {
            best_distance = Some(d);
            best = i;
        }
    }

    best
}

fn nearest_indices(points: &[Vec<f32>], centroids: &[Vec<f32>]) -> Vec<usize> {
    points
        .par_iter()
        .map(|point| nearest_index(point, centroids))
        .collect()
}

/// Recomputes centroids as the mean of their assigned points.
fn update_centroids(points: &[Vec<f32>], assignments: &[usize], centroids: &mut [Vec<f32>]) {
    let dimension = points[0].len();
    let mut sums = vec![vec![0.0f32; dimension]; centroids.len()];
    let mut sizes = vec![0usize; centroids.len()];

    for (point, &cluster) in points.iter().zip(assignments.iter()) {
        for (sum, &value) in sums[cluster].iter_mut().zip(point.iter()) {
            *sum += value;
        }
        sizes[cluster] += 1;
    }

    for ((centroid, sum), &size) in centroids.iter_mut().zip(sums).zip(sizes.iter()) {
        // Empty clusters keep their previous centroid
        if size == 0 {
            continue;
        }
        let size = size as f32;
        *centroid = sum.into_iter().map(|value| value / size).collect();
    }
}

fn initialize_by_sampling<R: Rng + ?Sized>(
    points: &[Vec<f32>],
    k: usize,
    rng: &mut R,
) -> Vec<Vec<f32>> {
    rand::seq::index::sample(rng, points.len(), k)
        .into_iter()
        .map(|i| points[i].clone())
        .collect()
}

fn initialize_random_range<R: Rng + ?Sized>(
    dimension: usize,
    k: usize,
    rng: &mut R,
) -> Vec<Vec<f32>> {
    (0..k)
        .map(|_| {
            (0..dimension)
                .map(|_| rng.random_range(-1.0f32..=1.0))
                .collect()
        })
        .collect()
}

/// Initializes centroids using the K-means++ algorithm.
///
/// K-means++ selects initial centroids that are far apart, leading to
/// better convergence properties than random initialization.
fn initialize_kmeans_plus_plus<R: Rng + ?Sized>(
    points: &[Vec<f32>],
    k: usize,
    rng: &mut R,
) -> Result<Vec<Vec<f32>>, ClusteringError> {
    let mut centroids = Vec::with_capacity(k);

    let first_idx = rng.random_range(0..points.len());
    centroids.push(points[first_idx].clone());

    for _ in 1..k {
        let weights: Vec<f32> = points
            .iter()
            .map(|point| {
                let nearest = centroids
                    .iter()
                    .map(|c| distance_unchecked(point, c).get().max(0.0))
                    .fold(f32::MAX, f32::min);
                nearest * nearest
            })
            .collect();
        let total: f32 = weights.iter().sum();

        if total < EPSILON {
            // All points are coincident with existing centroids
            break;
        }

        let target = rng.random::<f32>() * total;
        let mut cumulative = 0.0;
        let chosen = weights
            .iter()
            .position(|&w| {
                cumulative += w;
                cumulative >= target
            })
            .unwrap_or(points.len() - 1);
        centroids.push(points[chosen].clone());
    }

    if centroids.len() != k {
        return Err(ClusteringError::InitializationFailed);
    }

    Ok(centroids)
}
