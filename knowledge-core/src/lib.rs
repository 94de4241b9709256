#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]

//! # Knowledge Core
//!
//! Core types and algorithms for a knowledge-graph ingestion pipeline and
//! multi-index fusion search engine.
//!
//! This crate owns the domain logic — chunking, extraction orchestration,
//! deduplication, embedding management, and rank fusion — behind traits for
//! everything external: the LLM oracle, the embedder, the task queue, and
//! the storage/vector-search backend. A concrete deployment wires those
//! traits to real collaborators (see `knowledge-store-sql` for the
//! reference storage adapter).
//!
//! ## Module organization
//!
//! ### Domain model
//! - [`types`]: triples, concepts, conceptualization links, vectors, jobs
//! - [`identity`]: deterministic content-addressed ids
//! - [`error`]: the shared error taxonomy and its `error.operation` tags
//! - [`config`]: pipeline and search tunables
//!
//! ### Pipeline
//! - [`chunking`]: paragraph-preserving text chunking
//! - [`embedding_map`]: dedup-before-embed batching
//! - [`dedup`]: exact + semantic deduplication
//! - [`coordinator`]: job lifecycle and stage scheduling
//! - [`handlers`]: the extraction/concept/dedup handlers and the job router
//!
//! ### Search
//! - [`search`]: fusion search across entity/relationship/semantic/concept indexes
//! - [`similarity`]: cosine similarity over raw vectors
//!
//! ### Collaborators & resilience
//! - [`collaborators`]: oracle/embedder/task-queue trait contracts
//! - [`store`]: the storage/vector-search adapter contract
//! - [`job_store`]: the job-lifecycle subset of [`store::StoreAdapter`]
//! - [`circuit_breaker`]: per-source failure isolation
//! - [`resource`]: per-job bounded admission control
//!
//! ## Feature flags
//!
//! - `proptest-arbitrary`: implements `proptest::Arbitrary` for enum types
//!   such as [`types::TripleType`], for property-based tests that need to
//!   generate a whole triple rather than hand-roll its fields.

pub mod chunking;
pub mod circuit_breaker;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod dedup;
pub mod embedding_map;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod job_store;
pub mod resource;
pub mod search;
pub mod similarity;
pub mod store;
pub mod types;

pub use error::{Error, Result};

pub use chunking::{chunk_source, chunk_text, Chunk};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use collaborators::{Embedder, OracleClient, OracleObject, OracleText, TaskQueue, TokenUsage};
pub use config::{ExtractionMethod, PipelineConfig, SearchConfig};
pub use coordinator::{Coordinator, InMemoryJobStore, InitiatePipelineArgs, PipelineStatus};
pub use dedup::{deduplicate, DeduplicationResult, MergeKind, MergedMetadata};
pub use embedding_map::{generate_embedding_map, EmbeddingMap, EmbeddingMapStats};
pub use handlers::{ConceptHandler, DedupHandler, ExtractionHandler, JobResult, Router};
pub use job_store::JobStore;
pub use resource::{ResourceManager, ResourceStatus};
pub use search::{FusionResult, FusionSearch, SearchOptions, SearchStrategy, StrategyScores};
pub use similarity::cosine_similarity;
pub use store::{
    BatchStoreResult, ConceptMatch, KnowledgeBatch, SearchFilter, StoreAdapter, TemporalFilter,
    TimeUnit, TripleMatch,
};
pub use types::{
    AbstractionLevel, Concept, ConceptualizationLink, EntityType, ExtractionMetrics, JobMetadata,
    JobResultPayload, JobStage, JobStatus, JobType, ProcessingJob, ResourceLimits, SourceFields,
    Triple, TripleType, VectorEmbedding, VectorType,
};
