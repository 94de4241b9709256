//! Tunables for the pipeline and fusion search, as plain `Default`-able
//! structs (config *loading* — files, env vars — is out of scope per
//! spec.md §1; callers construct these directly).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::search::SearchStrategy;

/// Knobs governing chunking, admission control, and dedup thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Estimated-token threshold above which input is chunked.
    pub chunk_token_threshold: usize,
    /// Target chunk size, in estimated tokens.
    pub chunk_max_tokens: usize,
    /// Overlap between consecutive chunks, in estimated tokens.
    pub chunk_overlap_tokens: usize,
    /// Embedding batch size used by the embedding map.
    pub embed_batch_size: usize,
    /// Cosine-similarity threshold for semantic deduplication.
    pub similarity_threshold: f32,
    /// Whether the DEDUPLICATION stage is scheduled at all.
    pub enable_semantic_dedup: bool,
    /// Whether extraction is split into four type-specific calls or one.
    pub extraction_method: ExtractionMethod,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_token_threshold: constants::CHUNK_TOKEN_THRESHOLD,
            chunk_max_tokens: constants::CHUNK_MAX_TOKENS,
            chunk_overlap_tokens: constants::CHUNK_OVERLAP_TOKENS,
            embed_batch_size: constants::DEFAULT_EMBED_BATCH_SIZE,
            similarity_threshold: constants::DEFAULT_SIMILARITY_THRESHOLD,
            enable_semantic_dedup: false,
            extraction_method: ExtractionMethod::SinglePass,
        }
    }
}

/// How the extraction handler asks the oracle for triples (spec.md §4.2 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    /// One structured call per chunk.
    SinglePass,
    /// Four structured calls per chunk, one per triple type, unioned.
    FourStage,
}

/// Knobs governing fusion search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results to return.
    pub top_k: usize,
    /// Default minimum score for a result to be included.
    pub min_score: f32,
    /// Per-strategy fusion weights.
    pub weights: HashMap<SearchStrategy, f32>,
    /// Which strategies are enabled by default.
    pub enabled_strategies: Vec<SearchStrategy>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let mut weights = HashMap::new();
        weights.insert(SearchStrategy::Entity, constants::DEFAULT_WEIGHT_ENTITY);
        weights.insert(
            SearchStrategy::Relationship,
            constants::DEFAULT_WEIGHT_RELATIONSHIP,
        );
        weights.insert(SearchStrategy::Semantic, constants::DEFAULT_WEIGHT_SEMANTIC);
        weights.insert(SearchStrategy::Concept, constants::DEFAULT_WEIGHT_CONCEPT);

        Self {
            top_k: constants::DEFAULT_SEARCH_TOP_K,
            min_score: constants::DEFAULT_MIN_SCORE,
            weights,
            enabled_strategies: vec![
                SearchStrategy::Entity,
                SearchStrategy::Relationship,
                SearchStrategy::Semantic,
                SearchStrategy::Concept,
            ],
        }
    }
}
