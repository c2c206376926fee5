//! Cosine similarity, cosine distance and normalization primitives.
//!
//! Every "closer/farther" comparison in the crate goes through [`distance`]
//! (or its unchecked twin for pre-validated hot loops), so smaller always
//! means more similar.

use crate::vector::types::{Distance, VectorError};

/// Magnitudes below this are treated as zero.
pub const NORM_EPSILON: f32 = 1e-10;

/// Dot product of two vectors. Extra elements of the longer input are ignored.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean length of a vector.
#[inline]
pub fn magnitude(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Computes cosine similarity between two vectors.
///
/// # Returns
/// * Cosine similarity in range [-1, 1], where 1 is most similar
/// * `0.0` when either vector is degenerate (zero magnitude)
///
/// # Errors
/// * `DimensionMismatch` if the vectors have different lengths
pub fn similarity(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(similarity_unchecked(a, b))
}

/// Cosine distance `1 - similarity(a, b)`, in the range [0, 2].
///
/// # Errors
/// * `DimensionMismatch` if the vectors have different lengths
pub fn distance(a: &[f32], b: &[f32]) -> Result<Distance, VectorError> {
    similarity(a, b).map(Distance::from_similarity)
}

/// Returns a unit-length copy of `v`.
///
/// # Errors
/// * `DegenerateVector` if the magnitude is below [`NORM_EPSILON`]
pub fn normalize(v: &[f32]) -> Result<Vec<f32>, VectorError> {
    let mut normalized = v.to_vec();
    normalize_in_place(&mut normalized)?;
    Ok(normalized)
}

/// Normalizes a vector in-place to unit length.
///
/// The vector is left untouched on error.
pub fn normalize_in_place(v: &mut [f32]) -> Result<(), VectorError> {
    let norm = magnitude(v);
    if !norm.is_finite() || norm < NORM_EPSILON {
        return Err(VectorError::DegenerateVector { magnitude: norm });
    }
    for value in v.iter_mut() {
        *value /= norm;
    }
    Ok(())
}

/// Cosine similarity without the length check. Callers guarantee equal lengths.
#[inline]
pub(crate) fn similarity_unchecked(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    let dot_product = dot(a, b);
    let norm_a = magnitude(a);
    let norm_b = magnitude(b);

    if norm_a < NORM_EPSILON || norm_b < NORM_EPSILON {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

/// Cosine distance without the length check. Callers guarantee equal lengths.
#[inline]
pub(crate) fn distance_unchecked(a: &[f32], b: &[f32]) -> Distance {
    Distance::from_similarity(similarity_unchecked(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity() {
        // Identical vectors
        let a = vec![1.0, 2.0, 3.0];
        assert!((similarity(&a, &a).unwrap() - 1.0).abs() < 1e-6);

        // Orthogonal vectors
        assert!(similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < f32::EPSILON);

        // Opposite vectors
        let b = vec![-1.0, -2.0, -3.0];
        assert!((similarity(&a, &b).unwrap() + 1.0).abs() < 1e-6);

        // Zero vector is not an error, it is simply dissimilar to everything
        assert_eq!(similarity(&a, &[0.0, 0.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_similarity_dimension_mismatch() {
        assert_eq!(
            similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]),
            Err(VectorError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
        assert!(distance(&[1.0], &[]).is_err());
    }

    #[test]
    fn test_distance_range() {
        let same = distance(&[0.6, 0.8], &[0.6, 0.8]).unwrap();
        assert!(same.get().abs() < 1e-6);

        let opposite = distance(&[1.0, 0.0], &[-1.0, 0.0]).unwrap();
        assert!((opposite.get() - 2.0).abs() < 1e-6);

        let degenerate = distance(&[1.0, 0.0], &[0.0, 0.0]).unwrap();
        assert_eq!(degenerate, Distance::ORTHOGONAL);
    }

    #[test]
    fn test_normalize() {
        let v = normalize(&[3.0, 4.0]).unwrap();
        assert!((v[0] - 0.6).abs() < f32::EPSILON);
        assert!((v[1] - 0.8).abs() < f32::EPSILON);
        assert!((magnitude(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(&[0.3, -1.7, 2.2, 0.05]).unwrap();
        let twice = normalize(&once).unwrap();
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_degenerate() {
        assert!(matches!(
            normalize(&[0.0, 0.0, 0.0]),
            Err(VectorError::DegenerateVector { .. })
        ));

        let mut v = vec![0.0_f32; 4];
        assert!(normalize_in_place(&mut v).is_err());
        assert_eq!(v, vec![0.0; 4]);
    }
}
