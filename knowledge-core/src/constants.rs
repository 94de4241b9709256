//! Tunable defaults named throughout the spec: chunk sizing, admission
//! limits, dedup thresholds, and fusion search defaults.

use std::time::Duration;

/// Chunking kicks in once the estimated token count exceeds this.
pub const CHUNK_TOKEN_THRESHOLD: usize = 3000;
/// Target chunk size, in estimated tokens.
pub const CHUNK_MAX_TOKENS: usize = 3000;
/// Overlap between consecutive chunks, in estimated tokens.
pub const CHUNK_OVERLAP_TOKENS: usize = 200;
/// Rough chars-per-token ratio used to estimate token counts without a tokenizer.
pub const CHARS_PER_TOKEN: usize = 4;

/// Default bound on concurrent LLM calls per job.
pub const DEFAULT_MAX_AI_CALLS: usize = 4;
/// Default bound on concurrent database connections per job.
pub const DEFAULT_MAX_CONNECTIONS: usize = 2;

/// Default embedding batch size for the embedding map.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;
/// Canonical embedding dimension used across the deployment.
pub const EMBEDDING_DIMENSION: usize = 1536;

/// Default cosine-similarity threshold for semantic deduplication.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;
/// Default minimum score for search results.
pub const DEFAULT_MIN_SCORE: f32 = 0.7;
/// Default top-K for search results.
pub const DEFAULT_SEARCH_TOP_K: usize = 10;

/// Default fusion weight for the entity strategy.
pub const DEFAULT_WEIGHT_ENTITY: f32 = 0.3;
/// Default fusion weight for the relationship strategy.
pub const DEFAULT_WEIGHT_RELATIONSHIP: f32 = 0.2;
/// Default fusion weight for the semantic strategy.
pub const DEFAULT_WEIGHT_SEMANTIC: f32 = 0.3;
/// Default fusion weight for the concept strategy.
pub const DEFAULT_WEIGHT_CONCEPT: f32 = 0.2;

/// Diversity boost base used in `1 + DIVERSITY_BOOST_SCALE * log(1+k)/log(5)`.
pub const DIVERSITY_BOOST_SCALE: f32 = 0.2;

/// Minimum delay before the CONCEPTS stage is enqueued.
pub const CONCEPT_DELAY_MIN_SECS: f64 = 6.0;
/// Maximum delay before the CONCEPTS stage is enqueued.
pub const CONCEPT_DELAY_MAX_SECS: f64 = 60.0;
/// Fraction of extraction processing time used to compute the concept delay.
pub const CONCEPT_DELAY_FACTOR: f64 = 0.1;

/// Minimum delay before the DEDUPLICATION stage is enqueued.
pub const DEDUP_DELAY_MIN_SECS: f64 = 12.0;
/// Maximum delay before the DEDUPLICATION stage is enqueued.
pub const DEDUP_DELAY_MAX_SECS: f64 = 120.0;
/// Fraction of extraction processing time used to compute the dedup delay.
pub const DEDUP_DELAY_FACTOR: f64 = 0.2;

/// Recommended minimum network timeout for oracle/embedder calls.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(45);
/// Per-call retry budget before a chunk is considered failed.
pub const MAX_RETRIES: u32 = 2;

/// Circuit breaker: consecutive failures before the circuit opens.
pub const CIRCUIT_FAILURE_THRESHOLD: u32 = 3;
/// Circuit breaker: how long it stays open before probing again.
pub const CIRCUIT_TIMEOUT: Duration = Duration::from_secs(45);
