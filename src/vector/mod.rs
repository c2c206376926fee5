//! Vector primitives and the simpler index strategies.
//!
//! Everything here works on cosine distance over unit-length vectors:
//! smaller is closer, `0.0` is identical, `2.0` is opposite.
//!
//! # Architecture
//! - [`math`]: similarity, distance and normalization
//! - [`clustering`]: k-means used by the bucket index and the quantizer
//! - [`ProductQuantizer`]: subspace compression of vectors into short codes
//! - [`ClusterIndex`]: IVF-style bucket index over k-means centroids
//! - [`FlatIndex`]: exact scan, the ground truth for recall

pub mod clustering;
mod embedding;
mod engine;
pub(crate) mod flat;
pub mod math;
mod quantizer;
mod types;

// Re-export core types for public API
pub use clustering::{ClusteringError, Initialization, KMeansResult, assign_to_nearest_centroid};
#[cfg(feature = "fastembed")]
pub use embedding::{FastEmbedGenerator, parse_embedding_model};
pub use embedding::{EmbeddingGenerator, HashingEmbeddingGenerator};
pub use engine::ClusterIndex;
pub use flat::FlatIndex;
pub use math::{distance, dot, magnitude, normalize, normalize_in_place, similarity};
pub use quantizer::{DistanceTable, PqCode, ProductQuantizer};
pub use types::{
    ClusterId, Distance, VECTOR_DIMENSION_384, VectorDimension, VectorError, VectorId,
};
