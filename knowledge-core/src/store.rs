//! # Store Adapter
//!
//! Unified trait for the persistence/vector-search engine (spec.md §6.1).
//! The engine itself is external; this module only defines the contract
//! and the shapes it exchanges with the CORE.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job_store::JobStore;
use crate::types::{Concept, ConceptualizationLink, Triple, TripleType, VectorEmbedding, VectorType};
use crate::Result;

/// A unit ("from now" or an explicit range) used by [`TemporalFilter::Window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Days.
    Days,
    /// Weeks.
    Weeks,
    /// Months.
    Months,
    /// Years.
    Years,
}

/// Temporal filtering applied to a search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemporalFilter {
    /// An explicit, closed `[from, to]` date range.
    Range {
        /// Start of the range (inclusive).
        from: Option<DateTime<Utc>>,
        /// End of the range (inclusive).
        to: Option<DateTime<Utc>>,
    },
    /// A rolling window of `value` `unit`s, anchored at `from` (or "now").
    Window {
        /// Anchor point; `None` means "now".
        from: Option<DateTime<Utc>>,
        /// Magnitude of the window.
        value: u32,
        /// Unit the window is measured in.
        unit: TimeUnit,
    },
}

/// Filtering options common to every search query (spec.md §6.1).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Restrict to a temporal window.
    pub temporal: Option<TemporalFilter>,
    /// Restrict to these ingestion sources.
    pub sources: Option<Vec<String>>,
    /// Restrict to these triple types.
    pub types: Option<Vec<TripleType>>,
}

/// A triple returned by a search query, with its match score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleMatch {
    /// The matched triple.
    pub triple: Triple,
    /// Similarity (vector strategies) or a fixed 1.0 (substring fallback).
    pub score: f32,
}

/// A concept returned by a search query, with its match score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptMatch {
    /// The matched concept.
    pub concept: Concept,
    /// Similarity (vector strategies) or a fixed 1.0 (substring fallback).
    pub score: f32,
}

/// Everything produced by one extraction-handler run, to be written
/// atomically (spec.md §4.2 step 8).
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBatch {
    /// Deduplicated triples to upsert.
    pub triples: Vec<Triple>,
    /// Concepts to upsert (empty at the extraction stage; concepts are
    /// generated separately by the CONCEPTS stage).
    pub concepts: Vec<Concept>,
    /// Conceptualization links to insert.
    pub conceptualizations: Vec<ConceptualizationLink>,
    /// Vectors to write, keyed by the text they embed.
    pub vectors: Vec<VectorEmbedding>,
}

/// The result of [`StoreAdapter::batch_store_knowledge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStoreResult {
    /// Net new triples stored (upserts that created a row).
    pub triples_stored: usize,
    /// Net new concepts stored.
    pub concepts_stored: usize,
    /// Triples that collided with an existing identity and were merged.
    pub duplicates_skipped: usize,
}

/// Unified storage + vector-search backend trait.
///
/// All operations are async; a concrete adapter (e.g. `knowledge-store-sql`)
/// owns its own connection pool and circuit breaker. Job-lifecycle methods
/// live on the [`JobStore`] supertrait, so any `StoreAdapter` is usable
/// wherever a [`Coordinator`](crate::coordinator::Coordinator) needs one.
#[async_trait]
pub trait StoreAdapter: JobStore {
    // ---- Triples / concepts / links / vectors ---------------------------

    /// Return the subset of `ids` that already exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on persistence failure.
    async fn check_existing_triples(&self, ids: &[String]) -> Result<Vec<String>>;

    /// Upsert triples by identity, merging confidence (max) and
    /// `extracted_at` (latest) on conflict.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BatchStorage`] on persistence failure.
    async fn store_triples(&self, triples: &[Triple]) -> Result<BatchStoreResult>;

    /// Upsert concepts by identity.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BatchStorage`] on persistence failure.
    async fn store_concepts(&self, concepts: &[Concept]) -> Result<usize>;

    /// Insert conceptualization links (append-only, spec.md §9).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BatchStorage`] on persistence failure.
    async fn store_conceptualizations(&self, links: &[ConceptualizationLink]) -> Result<()>;

    /// Write vectors into the single unified `vector_embeddings` table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::VectorStorageError`] on persistence failure.
    async fn store_vectors(&self, vectors: &[VectorEmbedding]) -> Result<()>;

    /// All of the above in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::BatchStorage`] if any part of the write fails;
    /// the whole transaction rolls back.
    async fn batch_store_knowledge(&self, batch: KnowledgeBatch) -> Result<BatchStoreResult>;

    /// All triples whose `source` starts with `source_prefix` (to catch
    /// `_chunk_<i>` suffixes) and whose `source_type` matches exactly.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on persistence failure.
    async fn get_triples_by_source(
        &self,
        source_prefix: &str,
        source_type: &str,
    ) -> Result<Vec<Triple>>;

    /// Delete triples by identity, cascading their owning vectors.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on persistence failure.
    async fn delete_triples(&self, ids: &[String]) -> Result<usize>;

    /// Whether any concept row already exists for `(source, source_type)`.
    /// Backs the concept handler's idempotency contract (spec.md §4.3): a
    /// second GENERATE_CONCEPTS run for the same pair is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on query failure.
    async fn concepts_exist_for_source(&self, source: &str, source_type: &str) -> Result<bool>;

    // ---- Query surface ----------------------------------------------------

    /// Cosine-similarity search over one vector type.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SearchError`] on query failure.
    async fn search_by_embedding(
        &self,
        vector_type: VectorType,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<TripleMatch>>;

    /// Cosine-similarity search over CONCEPT vectors.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SearchError`] on query failure.
    async fn search_concepts_by_embedding(
        &self,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<ConceptMatch>>;

    /// Every conceptualization link pointing at `concept`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on query failure.
    async fn get_conceptualizations_by_concept(
        &self,
        concept: &str,
    ) -> Result<Vec<ConceptualizationLink>>;

    /// Substring fallback: subject/object contains `query`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SearchError`] on query failure.
    async fn search_by_entity(
        &self,
        query: &str,
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<TripleMatch>>;

    /// Substring fallback: predicate contains `query`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SearchError`] on query failure.
    async fn search_by_relationship(
        &self,
        query: &str,
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<TripleMatch>>;

    /// Substring fallback: concept label contains `query`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SearchError`] on query failure.
    async fn search_by_concept(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ConceptMatch>>;

    /// Every triple. Spec.md §9 flags this as the unscalable path used by
    /// concept-fusion today; implementers should prefer an indexed
    /// element-to-triples view where available.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on query failure.
    async fn get_all_triples(&self) -> Result<Vec<Triple>>;

    /// Total triple count.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on query failure.
    async fn get_triple_count(&self) -> Result<usize>;

    /// Total concept count.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on query failure.
    async fn get_concept_count(&self) -> Result<usize>;

    /// Triple count broken down by [`TripleType`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on query failure.
    async fn get_triple_count_by_type(&self) -> Result<HashMap<TripleType, usize>>;
}
