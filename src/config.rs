//! Configuration module for the semantic document index.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SEMDEX_` and use double underscores
//! to separate nested levels:
//! - `SEMDEX_HNSW__EF_SEARCH=64` sets `hnsw.ef_search`
//! - `SEMDEX_SEARCH__STRATEGY=cluster` sets `search.strategy`
//! - `SEMDEX_DEBUG=true` sets `debug`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::hnsw::NeighborSelection;
use crate::search::IndexKind;
use crate::vector::{Initialization, VECTOR_DIMENSION_384, VectorError};

/// Directory searched for `settings.toml`, from the current directory upwards.
pub const CONFIG_DIR: &str = ".semdex";

/// Upper bound accepted for `hnsw.max_level`.
pub const MAX_LEVEL_LIMIT: usize = 64;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Proximity graph parameters
    #[serde(default)]
    pub hnsw: HnswConfig,

    /// Bucket index parameters
    #[serde(default)]
    pub clustering: ClusteringConfig,

    /// Product quantizer parameters
    #[serde(default)]
    pub quantizer: QuantizerConfig,

    /// Query-time settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HnswConfig {
    /// Target out-degree per layer
    #[serde(default = "default_m")]
    pub m: usize,

    /// Hard cap on a node's degree before its neighbor list is pruned
    #[serde(default = "default_m_max")]
    pub m_max: usize,

    /// Degree cap at layer 0 (defaults to `m_max`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m_max0: Option<usize>,

    /// Candidate pool width while inserting
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,

    /// Candidate pool width while querying
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,

    /// Scales the exponential layer distribution
    #[serde(default = "default_level_multiplier")]
    pub level_multiplier: f64,

    /// Highest layer a node can be drawn into
    #[serde(default = "default_max_level")]
    pub max_level: usize,

    /// Neighbor selection policy
    #[serde(default)]
    pub selection: NeighborSelection,

    /// Seed for level assignment (random when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClusteringConfig {
    /// Number of buckets (clamped to the record count)
    #[serde(default = "default_clusters")]
    pub clusters: usize,

    /// Upper bound on k-means iterations
    #[serde(default = "default_cluster_iterations")]
    pub max_iterations: usize,

    /// Centroid initialization policy
    #[serde(default)]
    pub initialization: Initialization,

    /// Number of nearest buckets scanned per query
    #[serde(default = "default_n_probe")]
    pub n_probe: usize,

    /// Seed for centroid initialization (random when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QuantizerConfig {
    /// Number of contiguous slices per vector
    #[serde(default = "default_num_subspaces")]
    pub num_subspaces: usize,

    /// Codebook size per subspace
    #[serde(default = "default_num_codes")]
    pub num_clusters: usize,

    /// Upper bound on k-means iterations per codebook
    #[serde(default = "default_quantizer_iterations")]
    pub max_iterations: usize,

    /// Seed for codebook training (random when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SearchConfig {
    /// Index strategy used by new search facades
    #[serde(default)]
    pub strategy: IndexKind,

    /// Number of matches returned when the caller does not ask for a count
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Dimension of produced vectors
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Number of texts embedded per model call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_m() -> usize {
    5
}
fn default_m_max() -> usize {
    10
}
fn default_ef_construction() -> usize {
    200
}
fn default_ef_search() -> usize {
    50
}
fn default_level_multiplier() -> f64 {
    1.0
}
fn default_max_level() -> usize {
    16
}
fn default_clusters() -> usize {
    8
}
fn default_cluster_iterations() -> usize {
    100
}
fn default_n_probe() -> usize {
    1
}
fn default_num_subspaces() -> usize {
    8
}
fn default_num_codes() -> usize {
    256
}
fn default_quantizer_iterations() -> usize {
    25
}
fn default_top_n() -> usize {
    5
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_dimension() -> usize {
    VECTOR_DIMENSION_384
}
fn default_batch_size() -> usize {
    64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            logging: LoggingConfig::default(),
            hnsw: HnswConfig::default(),
            clustering: ClusteringConfig::default(),
            quantizer: QuantizerConfig::default(),
            search: SearchConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: default_m(),
            m_max: default_m_max(),
            m_max0: None,
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
            level_multiplier: default_level_multiplier(),
            max_level: default_max_level(),
            selection: NeighborSelection::default(),
            seed: None,
        }
    }
}

impl HnswConfig {
    /// Degree cap for a given layer.
    #[must_use]
    pub fn cap_for_layer(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0.unwrap_or(self.m_max)
        } else {
            self.m_max
        }
    }

    /// Rejects parameter combinations the graph cannot work with.
    pub fn validate(&self) -> Result<(), VectorError> {
        if self.m == 0 {
            return Err(VectorError::InvalidParameter {
                name: "m",
                reason: "nodes need at least one neighbor per layer",
            });
        }
        if self.m_max < self.m || self.m_max0.is_some_and(|cap| cap < self.m) {
            return Err(VectorError::InvalidParameter {
                name: "m_max",
                reason: "degree caps must be at least m",
            });
        }
        if self.ef_construction == 0 {
            return Err(VectorError::InvalidParameter {
                name: "ef_construction",
                reason: "the construction pool needs at least one slot",
            });
        }
        if !self.level_multiplier.is_finite() || self.level_multiplier <= 0.0 {
            return Err(VectorError::InvalidParameter {
                name: "level_multiplier",
                reason: "must be a positive finite number",
            });
        }
        if self.max_level > MAX_LEVEL_LIMIT {
            return Err(VectorError::InvalidParameter {
                name: "max_level",
                reason: "at most 64 layers above the base layer are supported",
            });
        }
        Ok(())
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            clusters: default_clusters(),
            max_iterations: default_cluster_iterations(),
            initialization: Initialization::default(),
            n_probe: default_n_probe(),
            seed: None,
        }
    }
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            num_subspaces: default_num_subspaces(),
            num_clusters: default_num_codes(),
            max_iterations: default_quantizer_iterations(),
            seed: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            strategy: IndexKind::default(),
            top_n: default_top_n(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels, single underscore stays in names
            .merge(Env::prefixed("SEMDEX_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Save current configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Find `settings.toml` by looking for the config directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join("settings.toml"))
    }
}
