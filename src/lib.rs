//! In-memory approximate nearest neighbor search over document embeddings.
//!
//! Text spans of a document are embedded, indexed in a hierarchical
//! proximity graph (or a k-means bucket index, or an exact scan) and queried
//! by cosine distance. See [`search::SearchSession`] for the per-document
//! lifecycle.

pub mod config;
pub mod error;
pub mod hnsw;
pub mod logging;
pub mod search;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{SearchError, SearchResult};
pub use hnsw::{HnswIndex, NeighborSelection};
pub use search::{
    BatchReport, DocumentIndexer, Embeddable, IndexEvent, IndexKind, IndexStrategy, Rect,
    SearchFacade, SearchHit, SearchSession, TextSpan,
};
pub use vector::{
    ClusterIndex, Distance, EmbeddingGenerator, FlatIndex, HashingEmbeddingGenerator,
    ProductQuantizer, VectorDimension, VectorError, VectorId,
};
