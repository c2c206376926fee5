//! Type-safe wrappers and core types for vector search functionality.
//!
//! This module provides newtypes and error types following the project's
//! strict type safety guidelines. All types implement necessary traits
//! for ergonomic usage while preventing primitive obsession.

use std::cmp::Ordering;
use std::num::NonZeroU32;
use thiserror::Error;

/// Standard vector dimension for sentence embeddings (all-MiniLM-L6-v2 model).
pub const VECTOR_DIMENSION_384: usize = 384;

/// Identifier of an indexed record.
///
/// Ids are assigned by the caller (or sequentially by the search facade),
/// start at zero and are never reassigned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VectorId(u32);

impl VectorId {
    /// Creates a new `VectorId`.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the id following this one, or `None` on overflow.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl std::fmt::Display for VectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe wrapper for cluster IDs in the bucket index.
///
/// Clusters are identified by non-zero IDs to prevent confusion
/// with uninitialized or error states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterId(NonZeroU32);

impl ClusterId {
    /// Creates a new `ClusterId` from a non-zero u32.
    ///
    /// Returns `None` if the provided ID is zero.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Creates the id of the centroid at `index` (ids are 1-indexed).
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .and_then(NonZeroU32::new)
            .unwrap_or(NonZeroU32::MAX);
        Self(raw)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// Returns the zero-based centroid index this id refers to.
    #[must_use]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Cosine distance `1 - similarity`, in the range [0, 2].
///
/// Smaller is more similar. `Distance` is totally ordered so it can be used
/// directly as a heap key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance(f32);

impl Distance {
    /// Distance between identical directions.
    pub const ZERO: Self = Self(0.0);

    /// Distance from a degenerate (zero-magnitude) vector.
    pub const ORTHOGONAL: Self = Self(1.0);

    /// Wraps a raw distance value.
    #[must_use]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Builds the distance corresponding to a cosine similarity.
    #[must_use]
    pub fn from_similarity(similarity: f32) -> Self {
        Self(1.0 - similarity)
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub const fn get(&self) -> f32 {
        self.0
    }

    /// Returns the cosine similarity this distance was derived from.
    #[must_use]
    pub fn similarity(&self) -> f32 {
        1.0 - self.0
    }
}

impl Eq for Distance {}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Distance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

/// Type-safe wrapper for vector dimensions.
///
/// Ensures runtime validation of vector dimensions to prevent
/// dimension mismatches during operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Creates a standard 384-dimensional vector dimension.
    #[must_use]
    pub const fn dimension_384() -> Self {
        Self(VECTOR_DIMENSION_384)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Errors that can occur during vector operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Degenerate vector with magnitude {magnitude}\nSuggestion: Skip empty text chunks or substitute a non-zero embedding"
    )]
    DegenerateVector { magnitude: f32 },

    #[error(
        "Dimension {dimension} is not divisible by {num_subspaces} subspaces\nSuggestion: Choose a subspace count that divides the embedding dimension"
    )]
    InvalidSubspaceCount {
        dimension: usize,
        num_subspaces: usize,
    },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Vector id {0} is already indexed\nSuggestion: Ids must be unique for the lifetime of the index")]
    DuplicateId(u32),

    #[error("Invalid parameter '{name}'\nReason: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: &'static str,
    },

    #[error("Quantizer has not been trained\nSuggestion: Call fit() before encoding vectors")]
    NotTrained,

    #[error(
        "Invalid code {code} in subspace {subspace}: only {num_clusters} centroids exist\nSuggestion: Decode codes with the quantizer that produced them"
    )]
    InvalidCode {
        subspace: usize,
        code: u16,
        num_clusters: usize,
    },

    #[error(
        "Clustering failed: {0}\nSuggestion: Ensure sufficient vectors are available for clustering (minimum: k clusters)"
    )]
    ClusteringFailed(String),

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Verify the embedding model is properly initialized"
    )]
    EmbeddingFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_id_sequence() {
        let id = VectorId::new(0);
        assert_eq!(id.get(), 0);
        assert_eq!(id.next(), Some(VectorId::new(1)));
        assert_eq!(VectorId::new(u32::MAX).next(), None);
    }

    #[test]
    fn test_cluster_id_construction() {
        let id = ClusterId::new(1).unwrap();
        assert_eq!(id.get(), 1);
        assert_eq!(id.index(), 0);

        assert!(ClusterId::new(0).is_none());

        let id = ClusterId::from_index(4);
        assert_eq!(id.get(), 5);
        assert_eq!(id.index(), 4);
    }

    #[test]
    fn test_distance_ordering() {
        let near = Distance::new(0.1);
        let far = Distance::new(1.5);
        assert!(near < far);
        assert_eq!(near.max(far), far);

        let mut values = vec![Distance::new(0.7), Distance::ZERO, Distance::new(2.0)];
        values.sort();
        assert_eq!(values[0], Distance::ZERO);
        assert_eq!(values[2].get(), 2.0);
    }

    #[test]
    fn test_distance_similarity_conversion() {
        let d = Distance::from_similarity(0.25);
        assert!((d.get() - 0.75).abs() < f32::EPSILON);
        assert!((d.similarity() - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_vector_dimension() {
        let dim = VectorDimension::new(384).unwrap();
        assert_eq!(dim.get(), 384);
        assert_eq!(VectorDimension::dimension_384(), dim);

        assert!(VectorDimension::new(0).is_err());

        assert!(dim.validate_vector(&vec![0.1; 384]).is_ok());
        assert_eq!(
            dim.validate_vector(&vec![0.1; 100]),
            Err(VectorError::DimensionMismatch {
                expected: 384,
                actual: 100
            })
        );
    }
}
