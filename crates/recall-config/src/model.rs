// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Recall memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Recall configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecallConfig {
    /// Engine identity and logging.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Graph store settings.
    #[serde(default)]
    pub graph: GraphConfig,

    /// Entity extraction settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Semantic index and hybrid search settings.
    #[serde(default)]
    pub index: IndexConfig,

    /// Relationship decay settings.
    #[serde(default)]
    pub decay: DecayConfig,
}

/// Engine identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Name of the agent or workspace this store belongs to.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_engine_name() -> String {
    "recall".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("recall").join("recall.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("recall.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Graph store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GraphConfig {
    /// Half-life of the recency component of entity importance, in days.
    #[serde(default = "default_importance_half_life_days")]
    pub importance_half_life_days: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            importance_half_life_days: default_importance_half_life_days(),
        }
    }
}

fn default_importance_half_life_days() -> f64 {
    7.0
}

/// Entity extraction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Candidates below this confidence are dropped (0.0-1.0).
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Number of texts grouped into one completion call during batch extraction.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Run the coreference resolution pass.
    #[serde(default = "default_true")]
    pub resolve_coreferences: bool,

    /// Run the sentiment/temporal pass.
    #[serde(default = "default_true")]
    pub extract_sentiment: bool,

    /// Name similarity above which a candidate merges into an existing entity.
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,

    /// How the user is referred to when resolving self-references.
    #[serde(default = "default_user_name")]
    pub user_name: String,

    /// How the agent is referred to when resolving self-references.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            batch_size: default_batch_size(),
            resolve_coreferences: default_true(),
            extract_sentiment: default_true(),
            dedup_threshold: default_dedup_threshold(),
            user_name: default_user_name(),
            agent_name: default_agent_name(),
        }
    }
}

fn default_min_confidence() -> f64 {
    0.3
}

fn default_batch_size() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_dedup_threshold() -> f64 {
    0.85
}

fn default_user_name() -> String {
    "User".to_string()
}

fn default_agent_name() -> String {
    "Assistant".to_string()
}

/// Semantic index and hybrid search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Target chunk size in estimated tokens.
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,

    /// Overlap between consecutive chunks in estimated tokens.
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Characters per token used for size estimation.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,

    /// Default maximum number of search results.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Default minimum fused score for a result to be returned.
    #[serde(default = "default_search_threshold")]
    pub search_threshold: f64,

    /// Expand queries with matched entity names and their graph neighbors.
    #[serde(default = "default_true")]
    pub query_expansion: bool,

    /// Half-life of the recency signal, in days.
    #[serde(default = "default_recency_half_life_days")]
    pub recency_half_life_days: f64,

    /// Capacity of the background embedding queue.
    #[serde(default = "default_embedding_queue_capacity")]
    pub embedding_queue_capacity: usize,

    /// Per-signal weights for hybrid scoring.
    #[serde(default)]
    pub weights: SignalWeights,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_tokens: default_chunk_tokens(),
            overlap_tokens: default_overlap_tokens(),
            chars_per_token: default_chars_per_token(),
            search_limit: default_search_limit(),
            search_threshold: default_search_threshold(),
            query_expansion: default_true(),
            recency_half_life_days: default_recency_half_life_days(),
            embedding_queue_capacity: default_embedding_queue_capacity(),
            weights: SignalWeights::default(),
        }
    }
}

fn default_chunk_tokens() -> usize {
    400
}

fn default_overlap_tokens() -> usize {
    80
}

fn default_chars_per_token() -> usize {
    4
}

fn default_search_limit() -> usize {
    10
}

fn default_search_threshold() -> f64 {
    0.01
}

fn default_recency_half_life_days() -> f64 {
    7.0
}

fn default_embedding_queue_capacity() -> usize {
    1024
}

/// Weights of the five hybrid search signals.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SignalWeights {
    #[serde(default = "default_vector_weight")]
    pub vector: f64,
    #[serde(default = "default_bm25_weight")]
    pub bm25: f64,
    #[serde(default = "default_graph_weight")]
    pub graph: f64,
    #[serde(default = "default_recency_weight")]
    pub recency: f64,
    #[serde(default = "default_entity_density_weight")]
    pub entity_density: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            vector: default_vector_weight(),
            bm25: default_bm25_weight(),
            graph: default_graph_weight(),
            recency: default_recency_weight(),
            entity_density: default_entity_density_weight(),
        }
    }
}

impl SignalWeights {
    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.vector + self.bm25 + self.graph + self.recency + self.entity_density
    }
}

fn default_vector_weight() -> f64 {
    0.40
}

fn default_bm25_weight() -> f64 {
    0.20
}

fn default_graph_weight() -> f64 {
    0.15
}

fn default_recency_weight() -> f64 {
    0.15
}

fn default_entity_density_weight() -> f64 {
    0.10
}

/// Relationship decay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DecayConfig {
    /// Half-life of relationship weight for a type with decay rate 1.0, in days.
    #[serde(default = "default_decay_half_life_days")]
    pub half_life_days: f64,

    /// Relationships whose decayed weight falls below this are deleted.
    #[serde(default = "default_remove_below")]
    pub remove_below: f64,

    /// Minimum weight change that is persisted.
    #[serde(default = "default_decay_threshold")]
    pub threshold: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            half_life_days: default_decay_half_life_days(),
            remove_below: default_remove_below(),
            threshold: default_decay_threshold(),
        }
    }
}

fn default_decay_half_life_days() -> f64 {
    30.0
}

fn default_remove_below() -> f64 {
    0.1
}

fn default_decay_threshold() -> f64 {
    0.01
}
