//! The seam between the facade and the concrete indexes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::SearchError;
use crate::hnsw::HnswIndex;
use crate::vector::{ClusterIndex, Distance, FlatIndex, VectorDimension, VectorError, VectorId};

/// Which index backs a [`SearchFacade`](crate::search::SearchFacade).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Layered proximity graph
    #[default]
    Hnsw,
    /// k-means buckets
    Cluster,
    /// Exact scan
    Flat,
}

impl IndexKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Hnsw => "hnsw",
            IndexKind::Cluster => "cluster",
            IndexKind::Flat => "flat",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hnsw" => Ok(IndexKind::Hnsw),
            "cluster" => Ok(IndexKind::Cluster),
            "flat" => Ok(IndexKind::Flat),
            _ => Err(SearchError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Common interface of every nearest neighbor index.
///
/// Vectors are addressed by caller-chosen ids. Results are ordered by
/// ascending cosine distance.
pub trait IndexStrategy: Send + Sync + fmt::Debug {
    /// Adds a vector. A failed insert leaves the index unchanged.
    fn insert(&mut self, id: VectorId, vector: &[f32]) -> Result<(), VectorError>;

    /// Returns up to `k` nearest ids, best first. Empty on an empty index.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(VectorId, Distance)>, VectorError>;

    /// Completes any deferred build work after a batch of inserts.
    fn finish(&mut self) -> Result<(), VectorError> {
        Ok(())
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> VectorDimension;

    fn kind(&self) -> IndexKind;
}

impl IndexStrategy for HnswIndex {
    fn insert(&mut self, id: VectorId, vector: &[f32]) -> Result<(), VectorError> {
        HnswIndex::insert(self, id, vector)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(VectorId, Distance)>, VectorError> {
        HnswIndex::search(self, query, k)
    }

    fn len(&self) -> usize {
        HnswIndex::len(self)
    }

    fn dimension(&self) -> VectorDimension {
        HnswIndex::dimension(self)
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Hnsw
    }
}

impl IndexStrategy for ClusterIndex {
    fn insert(&mut self, id: VectorId, vector: &[f32]) -> Result<(), VectorError> {
        ClusterIndex::insert(self, id, vector)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(VectorId, Distance)>, VectorError> {
        ClusterIndex::search(self, query, k)
    }

    fn finish(&mut self) -> Result<(), VectorError> {
        self.build()
    }

    fn len(&self) -> usize {
        ClusterIndex::len(self)
    }

    fn dimension(&self) -> VectorDimension {
        ClusterIndex::dimension(self)
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Cluster
    }
}

impl IndexStrategy for FlatIndex {
    fn insert(&mut self, id: VectorId, vector: &[f32]) -> Result<(), VectorError> {
        FlatIndex::insert(self, id, vector)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(VectorId, Distance)>, VectorError> {
        FlatIndex::search(self, query, k)
    }

    fn len(&self) -> usize {
        FlatIndex::len(self)
    }

    fn dimension(&self) -> VectorDimension {
        FlatIndex::dimension(self)
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }
}

/// Builds an empty index of the configured kind and dimension.
pub fn build_strategy(settings: &Settings) -> Result<Box<dyn IndexStrategy>, VectorError> {
    let dimension = VectorDimension::new(settings.embedding.dimension)?;

    Ok(match settings.search.strategy {
        IndexKind::Hnsw => Box::new(HnswIndex::new(dimension, settings.hnsw.clone())?),
        IndexKind::Cluster => Box::new(ClusterIndex::new(dimension, settings.clustering.clone())?),
        IndexKind::Flat => Box::new(FlatIndex::new(dimension)),
    })
}
