//! Error types for document search
//!
//! Low-level index errors live next to the code that raises them
//! ([`VectorError`], [`ClusteringError`]). This module wraps them together
//! with the failures of the surrounding layers: configuration, strategy
//! selection and the background indexer.

use thiserror::Error;

use crate::vector::{ClusteringError, VectorError};

/// Main error type for search operations
#[derive(Error, Debug)]
pub enum SearchError {
    /// Index and vector errors
    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Clustering(#[from] ClusteringError),

    /// Configuration errors
    #[error("Failed to load configuration: {0}\nSuggestion: Check .semdex/settings.toml and SEMDEX_* environment variables")]
    Config(#[from] Box<figment::Error>),

    #[error("Unknown index strategy '{0}'\nSuggestion: Use one of: hnsw, cluster, flat")]
    UnknownStrategy(String),

    /// Background indexer errors
    #[error("Failed to start indexer thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Indexer thread exited without a result, likely due to a panic")]
    IndexerDisconnected,

    #[error("Index build for load {generation} was cancelled by a newer load")]
    Cancelled { generation: u64 },
}

impl SearchError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Vector(VectorError::DimensionMismatch { .. }) => "DIMENSION_MISMATCH",
            Self::Vector(VectorError::DegenerateVector { .. }) => "DEGENERATE_VECTOR",
            Self::Vector(VectorError::InvalidSubspaceCount { .. }) => "INVALID_SUBSPACE_COUNT",
            Self::Vector(VectorError::EmbeddingFailed(_)) => "EMBEDDING_FAILED",
            Self::Vector(_) => "VECTOR_ERROR",
            Self::Clustering(_) => "CLUSTERING_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::UnknownStrategy(_) => "UNKNOWN_STRATEGY",
            Self::Spawn(_) => "SPAWN_FAILED",
            Self::IndexerDisconnected => "INDEXER_DISCONNECTED",
            Self::Cancelled { .. } => "CANCELLED",
        }
    }

    /// Whether the failure only affects a single operation, leaving any index
    /// intact.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Spawn(_) | Self::IndexerDisconnected)
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Vector(VectorError::DimensionMismatch { .. }) => vec![
                "Embed documents and queries with the same model",
                "Check that embedding.dimension matches the model output",
            ],
            Self::Vector(VectorError::DegenerateVector { .. }) => {
                vec!["Skip empty text chunks before indexing"]
            }
            Self::IndexerDisconnected => vec![
                "Reload the document to start a fresh build",
                "Run with RUST_LOG=semdex=debug to see where the build stopped",
            ],
            Self::Cancelled { .. } => vec!["Nothing to do, the newer load replaces this one"],
            _ => vec![],
        }
    }
}

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;
