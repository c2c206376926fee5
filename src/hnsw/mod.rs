//! Hierarchical Navigable Small World proximity graph.
//!
//! The graph keeps every vector at layer 0 and an exponentially thinning
//! subset at each higher layer. Searches start at the entry point on the top
//! layer, greedily descend to layer 0 and then widen into a bounded
//! best-first search.
//!
//! Nodes live in a single arena owned by [`HnswIndex`]; neighbor lists hold
//! arena slots, never references, so the cyclic neighbor graph has no
//! ownership cycles.

mod heap;
mod index;
mod node;

pub use index::{HnswIndex, NeighborSelection};
pub use node::GraphNode;
