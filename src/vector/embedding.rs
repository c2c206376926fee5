//! Embedding generation for text spans.
//!
//! The search core only sees vectors. This module is the seam to whatever
//! model turns text into those vectors: the [`EmbeddingGenerator`] trait, a
//! deterministic offline generator, and (behind the `fastembed` feature) the
//! all-MiniLM-L6-v2 model.

use crate::vector::{VectorDimension, VectorError};

/// Trait for generating embeddings from text.
///
/// Implementations of this trait should be thread-safe and
/// capable of handling batch processing efficiently.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts.
    ///
    /// # Returns
    /// A vector of embeddings, one for each input text, or an error
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Get the dimension of embeddings produced by this generator.
    #[must_use]
    fn dimension(&self) -> VectorDimension;
}

/// Deterministic bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed into one coordinate with a
/// hashed sign, and the sum is normalized. Texts sharing words end up close
/// together, which is enough for tests and offline use. A text without any
/// token embeds to the zero vector, which indexes reject as degenerate.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbeddingGenerator {
    dimension: VectorDimension,
}

impl Default for HashingEmbeddingGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl HashingEmbeddingGenerator {
    /// Create a new generator with standard 384 dimensions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimension: VectorDimension::dimension_384(),
        }
    }

    #[must_use]
    pub fn with_dimension(dimension: VectorDimension) -> Self {
        Self { dimension }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let dim = self.dimension.get();
        let mut embedding = vec![0.0; dim];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(&token.to_lowercase());
            let slot = (hash % dim as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[slot] += sign;
        }

        // Degenerate output is left to the index to reject
        let _ = crate::vector::normalize_in_place(&mut embedding);
        embedding
    }
}

impl EmbeddingGenerator for HashingEmbeddingGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

fn fnv1a(token: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    token.bytes().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

#[cfg(feature = "fastembed")]
pub use fast::{FastEmbedGenerator, parse_embedding_model};

#[cfg(feature = "fastembed")]
mod fast {
    use std::path::PathBuf;

    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use parking_lot::Mutex;

    use super::EmbeddingGenerator;
    use crate::config::EmbeddingConfig;
    use crate::vector::{VECTOR_DIMENSION_384, VectorDimension, VectorError};

    /// Maps a configured model name to a fastembed model.
    ///
    /// Only 384-dimensional models are accepted.
    pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
        match name {
            "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
            "AllMiniLML6V2Q" => Ok(EmbeddingModel::AllMiniLML6V2Q),
            "BGESmallENV15" => Ok(EmbeddingModel::BGESmallENV15),
            "MultilingualE5Small" => Ok(EmbeddingModel::MultilingualE5Small),
            other => Err(VectorError::EmbeddingFailed(format!(
                "Unknown embedding model '{other}'. Use one of: AllMiniLML6V2, AllMiniLML6V2Q, BGESmallENV15, MultilingualE5Small"
            ))),
        }
    }

    /// FastEmbed implementation, all-MiniLM-L6-v2 by default.
    ///
    /// # Performance
    /// - Batch processing: ~1-10ms per embedding on average
    /// - Memory: 384 * 4 bytes = 1536 bytes per embedding
    pub struct FastEmbedGenerator {
        model: Mutex<TextEmbedding>,
        dimension: VectorDimension,
    }

    impl FastEmbedGenerator {
        /// Create a generator for the named model, caching downloads in `cache_dir`.
        ///
        /// # Errors
        /// Returns an error if the model name is unknown or the model fails
        /// to initialize or download.
        pub fn new(model: &str, cache_dir: impl Into<PathBuf>) -> Result<Self, VectorError> {
            let model = TextEmbedding::try_new(
                InitOptions::new(parse_embedding_model(model)?)
                    .with_cache_dir(cache_dir.into())
                    .with_show_download_progress(false),
            )
            .map_err(|e| VectorError::EmbeddingFailed(
                format!("Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download")
            ))?;

            Ok(Self {
                model: Mutex::new(model),
                dimension: VectorDimension::dimension_384(),
            })
        }

        /// Create a generator for `embedding.model`.
        ///
        /// # Errors
        /// Fails before loading anything if the model name is unknown or
        /// `embedding.dimension` is not 384.
        pub fn from_settings(
            config: &EmbeddingConfig,
            cache_dir: impl Into<PathBuf>,
        ) -> Result<Self, VectorError> {
            parse_embedding_model(&config.model)?;
            if config.dimension != VECTOR_DIMENSION_384 {
                return Err(VectorError::DimensionMismatch {
                    expected: VECTOR_DIMENSION_384,
                    actual: config.dimension,
                });
            }
            Self::new(&config.model, cache_dir)
        }
    }

    impl EmbeddingGenerator for FastEmbedGenerator {
        fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let embeddings = self
                .model
                .lock()
                .embed(texts.to_vec(), None)
                .map_err(|e| {
                    VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
                })?;

            for embedding in &embeddings {
                if embedding.len() != VECTOR_DIMENSION_384 {
                    return Err(VectorError::DimensionMismatch {
                        expected: VECTOR_DIMENSION_384,
                        actual: embedding.len(),
                    });
                }
            }

            Ok(embeddings)
        }

        fn dimension(&self) -> VectorDimension {
            self.dimension
        }
    }
}
