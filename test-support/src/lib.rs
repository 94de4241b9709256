//! In-memory fakes for the four external collaborators (spec.md §1): the
//! LLM oracle, the embedder, the task queue, and the store adapter. Used by
//! `knowledge-core`'s own handler/coordinator tests and by any crate that
//! wants to exercise the pipeline without a live database or model.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use knowledge_core::collaborators::{Embedder, OracleClient, OracleObject, OracleText, TaskQueue, TokenUsage};
use knowledge_core::job_store::JobStore;
use knowledge_core::store::{
    BatchStoreResult, ConceptMatch, KnowledgeBatch, SearchFilter, StoreAdapter, TripleMatch,
};
use knowledge_core::types::{
    Concept, ConceptualizationLink, JobStage, ProcessingJob, Triple, TripleType, VectorEmbedding,
    VectorType,
};
use knowledge_core::{Error, Result};
use parking_lot::RwLock;
use uuid::Uuid;

/// An [`OracleClient`] that returns pre-programmed responses in FIFO order.
///
/// # Panics
///
/// Calling `generate_object`/`generate_text` past the end of the queued
/// responses panics; tests should queue exactly as many responses as calls.
#[derive(Default)]
pub struct FakeOracleClient {
    objects: RwLock<VecDeque<Result<serde_json::Value>>>,
    texts: RwLock<VecDeque<Result<String>>>,
    calls: AtomicUsize,
}

impl FakeOracleClient {
    /// An oracle with no responses queued yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful `generate_object` response.
    #[must_use]
    pub fn with_object(self, value: serde_json::Value) -> Self {
        self.objects.write().push_back(Ok(value));
        self
    }

    /// Queue a failing `generate_object` response.
    #[must_use]
    pub fn with_object_error(self, error: Error) -> Self {
        self.objects.write().push_back(Err(error));
        self
    }

    /// Queue a successful `generate_text` response.
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.texts.write().push_back(Ok(text.into()));
        self
    }

    /// Number of calls made across both methods.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OracleClient for FakeOracleClient {
    async fn generate_object(&self, _prompt: &str, _schema_name: &str) -> Result<OracleObject> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.objects.write().pop_front();
        let data = next.expect("FakeOracleClient: no more queued `generate_object` responses")?;
        Ok(OracleObject {
            data,
            usage: TokenUsage::default(),
        })
    }

    async fn generate_text(&self, _prompt: &str) -> Result<OracleText> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.texts.write().pop_front();
        let text = next.expect("FakeOracleClient: no more queued `generate_text` responses")?;
        Ok(OracleText {
            text,
            usage: TokenUsage::default(),
        })
    }
}

/// An [`Embedder`] that derives a deterministic vector from a string's byte
/// sum, so identical text always embeds identically and distinct text
/// reliably embeds differently — no model or network call needed.
pub struct FakeEmbedder {
    dimension: usize,
}

impl FakeEmbedder {
    /// Build a fake embedder producing `dimension`-sized vectors.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self {
        Self::new(8)
    }
}

fn deterministic_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let seed: u32 = text.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    (0..dimension)
        .map(|i| {
            let v = seed.wrapping_add(i as u32 * 2_654_435_761);
            (v % 1000) as f32 / 1000.0
        })
        .collect()
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(deterministic_embedding(text, self.dimension))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| deterministic_embedding(t, self.dimension)).collect())
    }
}

/// A [`TaskQueue`] that records every enqueue call instead of dispatching it.
#[derive(Default)]
pub struct FakeTaskQueue {
    enqueued: RwLock<Vec<(Uuid, Option<Duration>)>>,
}

impl FakeTaskQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every job id enqueued so far, in call order.
    #[must_use]
    pub fn enqueued_jobs(&self) -> Vec<Uuid> {
        self.enqueued.read().iter().map(|(id, _)| *id).collect()
    }
}

#[async_trait]
impl TaskQueue for FakeTaskQueue {
    async fn enqueue(&self, job_id: Uuid, delay: Option<Duration>) -> Result<()> {
        self.enqueued.write().push((job_id, delay));
        Ok(())
    }
}

#[derive(Default)]
struct StoreTables {
    triples: HashMap<String, Triple>,
    concepts: HashMap<String, Concept>,
    conceptualizations: Vec<ConceptualizationLink>,
    vectors: Vec<VectorEmbedding>,
    jobs: HashMap<Uuid, ProcessingJob>,
}

/// A full, in-process [`StoreAdapter`] + [`JobStore`], backed by
/// [`HashMap`]s behind a single lock. Mirrors `knowledge-store-sql`'s
/// merge-on-conflict and cascade-delete semantics without a database.
#[derive(Default)]
pub struct InMemoryStoreAdapter {
    tables: RwLock<StoreTables>,
}

impl InMemoryStoreAdapter {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryStoreAdapter {
    async fn create_job(&self, job: &ProcessingJob) -> Result<()> {
        self.tables.write().jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn try_create_child(&self, job: &ProcessingJob) -> Result<bool> {
        let Some(parent_id) = job.parent_job_id else {
            return Err(Error::InvalidInput("child job must set parent_job_id".into()));
        };
        let mut tables = self.tables.write();
        let exists = tables
            .jobs
            .values()
            .any(|j| j.parent_job_id == Some(parent_id) && j.stage == job.stage);
        if exists {
            return Ok(false);
        }
        tables.jobs.insert(job.id, job.clone());
        Ok(true)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<ProcessingJob>> {
        Ok(self.tables.read().jobs.get(&id).cloned())
    }

    async fn update_job(&self, job: &ProcessingJob) -> Result<()> {
        self.tables.write().jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job_by_stage(&self, parent_id: Uuid, stage: JobStage) -> Result<Option<ProcessingJob>> {
        Ok(self
            .tables
            .read()
            .jobs
            .values()
            .find(|j| j.parent_job_id == Some(parent_id) && j.stage == Some(stage))
            .cloned())
    }

    async fn get_children(&self, parent_id: Uuid) -> Result<Vec<ProcessingJob>> {
        Ok(self
            .tables
            .read()
            .jobs
            .values()
            .filter(|j| j.parent_job_id == Some(parent_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreAdapter for InMemoryStoreAdapter {
    async fn check_existing_triples(&self, ids: &[String]) -> Result<Vec<String>> {
        let tables = self.tables.read();
        Ok(ids.iter().filter(|id| tables.triples.contains_key(*id)).cloned().collect())
    }

    async fn store_triples(&self, triples: &[Triple]) -> Result<BatchStoreResult> {
        let mut tables = self.tables.write();
        let mut stored = 0;
        let mut duplicates = 0;
        for triple in triples {
            let id = triple.identity();
            match tables.triples.get_mut(&id) {
                Some(existing) => {
                    existing.confidence = existing.confidence.max(triple.confidence);
                    if triple.extracted_at > existing.extracted_at {
                        existing.extracted_at = triple.extracted_at;
                    }
                    existing.processing_batch_id = triple.processing_batch_id.clone();
                    duplicates += 1;
                }
                None => {
                    tables.triples.insert(id, triple.clone());
                    stored += 1;
                }
            }
        }
        Ok(BatchStoreResult {
            triples_stored: stored,
            concepts_stored: 0,
            duplicates_skipped: duplicates,
        })
    }

    async fn store_concepts(&self, concepts: &[Concept]) -> Result<usize> {
        let mut tables = self.tables.write();
        let mut stored = 0;
        for concept in concepts {
            let id = concept.identity();
            match tables.concepts.get_mut(&id) {
                Some(existing) => {
                    existing.confidence = existing.confidence.max(concept.confidence);
                    if concept.extracted_at > existing.extracted_at {
                        existing.extracted_at = concept.extracted_at;
                    }
                }
                None => {
                    tables.concepts.insert(id, concept.clone());
                }
            }
            stored += 1;
        }
        Ok(stored)
    }

    async fn store_conceptualizations(&self, links: &[ConceptualizationLink]) -> Result<()> {
        self.tables.write().conceptualizations.extend_from_slice(links);
        Ok(())
    }

    async fn store_vectors(&self, vectors: &[VectorEmbedding]) -> Result<()> {
        for vector in vectors {
            vector.validate()?;
        }
        self.tables.write().vectors.extend_from_slice(vectors);
        Ok(())
    }

    async fn batch_store_knowledge(&self, batch: KnowledgeBatch) -> Result<BatchStoreResult> {
        let triple_result = self.store_triples(&batch.triples).await?;
        let concepts_stored = self.store_concepts(&batch.concepts).await?;
        self.store_conceptualizations(&batch.conceptualizations).await?;
        self.store_vectors(&batch.vectors).await?;
        Ok(BatchStoreResult {
            concepts_stored,
            ..triple_result
        })
    }

    async fn get_triples_by_source(&self, source_prefix: &str, source_type: &str) -> Result<Vec<Triple>> {
        Ok(self
            .tables
            .read()
            .triples
            .values()
            .filter(|t| t.source.starts_with(source_prefix) && t.source_type == source_type)
            .cloned()
            .collect())
    }

    async fn delete_triples(&self, ids: &[String]) -> Result<usize> {
        let mut tables = self.tables.write();
        let mut deleted = 0;
        for id in ids {
            if tables.triples.remove(id).is_some() {
                deleted += 1;
            }
        }
        tables.vectors.retain(|v| {
            v.knowledge_triple_id.as_deref().is_none_or(|id| !ids.iter().any(|i| i == id))
        });
        Ok(deleted)
    }

    async fn concepts_exist_for_source(&self, source: &str, source_type: &str) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .concepts
            .values()
            .any(|c| c.source == source && c.source_type == source_type))
    }

    async fn search_by_embedding(
        &self,
        vector_type: VectorType,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<TripleMatch>> {
        let tables = self.tables.read();
        let mut matches: Vec<TripleMatch> = tables
            .vectors
            .iter()
            .filter(|v| v.vector_type == vector_type)
            .filter_map(|v| {
                let triple_id = v.knowledge_triple_id.as_ref()?;
                let triple = tables.triples.get(triple_id)?;
                if !matches_filter(triple, filter) {
                    return None;
                }
                let score = knowledge_core::similarity::cosine_similarity(vector, &v.embedding);
                (score >= min_score).then_some(TripleMatch { triple: triple.clone(), score })
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn search_concepts_by_embedding(
        &self,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<ConceptMatch>> {
        let tables = self.tables.read();
        let mut matches: Vec<ConceptMatch> = tables
            .vectors
            .iter()
            .filter(|v| v.vector_type == VectorType::Concept)
            .filter_map(|v| {
                let concept_id = v.concept_node_id.as_ref()?;
                let concept = tables.concepts.get(concept_id)?;
                let score = knowledge_core::similarity::cosine_similarity(vector, &v.embedding);
                (score >= min_score).then_some(ConceptMatch { concept: concept.clone(), score })
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn get_conceptualizations_by_concept(&self, concept: &str) -> Result<Vec<ConceptualizationLink>> {
        Ok(self
            .tables
            .read()
            .conceptualizations
            .iter()
            .filter(|l| l.concept == concept)
            .cloned()
            .collect())
    }

    async fn search_by_entity(&self, query: &str, top_k: usize, filter: &SearchFilter) -> Result<Vec<TripleMatch>> {
        let tables = self.tables.read();
        let mut matches: Vec<TripleMatch> = tables
            .triples
            .values()
            .filter(|t| (t.subject.contains(query) || t.object.contains(query)) && matches_filter(t, filter))
            .map(|t| TripleMatch { triple: t.clone(), score: 1.0 })
            .collect();
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn search_by_relationship(&self, query: &str, top_k: usize, filter: &SearchFilter) -> Result<Vec<TripleMatch>> {
        let tables = self.tables.read();
        let mut matches: Vec<TripleMatch> = tables
            .triples
            .values()
            .filter(|t| t.predicate.contains(query) && matches_filter(t, filter))
            .map(|t| TripleMatch { triple: t.clone(), score: 1.0 })
            .collect();
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn search_by_concept(&self, query: &str, top_k: usize) -> Result<Vec<ConceptMatch>> {
        let tables = self.tables.read();
        let mut matches: Vec<ConceptMatch> = tables
            .concepts
            .values()
            .filter(|c| c.concept.contains(query))
            .map(|c| ConceptMatch { concept: c.clone(), score: 1.0 })
            .collect();
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn get_all_triples(&self) -> Result<Vec<Triple>> {
        Ok(self.tables.read().triples.values().cloned().collect())
    }

    async fn get_triple_count(&self) -> Result<usize> {
        Ok(self.tables.read().triples.len())
    }

    async fn get_concept_count(&self) -> Result<usize> {
        Ok(self.tables.read().concepts.len())
    }

    async fn get_triple_count_by_type(&self) -> Result<HashMap<TripleType, usize>> {
        let mut counts = HashMap::new();
        for triple in self.tables.read().triples.values() {
            *counts.entry(triple.r#type).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

fn matches_filter(triple: &Triple, filter: &SearchFilter) -> bool {
    if let Some(sources) = &filter.sources {
        if !sources.contains(&triple.source) {
            return false;
        }
    }
    if let Some(types) = &filter.types {
        if !types.contains(&triple.r#type) {
            return false;
        }
    }
    if let Some(temporal) = &filter.temporal {
        use knowledge_core::store::TemporalFilter;
        let (from, to) = match temporal {
            TemporalFilter::Range { from, to } => (*from, *to),
            TemporalFilter::Window { from, value, unit } => {
                use knowledge_core::store::TimeUnit;
                let anchor = from.unwrap_or_else(Utc::now);
                let span = match unit {
                    TimeUnit::Days => chrono::Duration::days(i64::from(*value)),
                    TimeUnit::Weeks => chrono::Duration::weeks(i64::from(*value)),
                    TimeUnit::Months => chrono::Duration::days(i64::from(*value) * 30),
                    TimeUnit::Years => chrono::Duration::days(i64::from(*value) * 365),
                };
                (Some(anchor - span), Some(anchor))
            }
        };
        if let Some(from) = from {
            if triple.extracted_at < from {
                return false;
            }
        }
        if let Some(to) = to {
            if triple.extracted_at > to {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(subject: &str) -> Triple {
        Triple {
            subject: subject.to_string(),
            predicate: "knows".to_string(),
            object: "Bob".to_string(),
            r#type: TripleType::EntityEntity,
            source: "doc-1".to_string(),
            source_type: "document".to_string(),
            source_date: None,
            extracted_at: Utc::now(),
            confidence: 0.5,
            processing_batch_id: None,
        }
    }

    #[tokio::test]
    async fn store_triples_merges_on_conflict() {
        let store = InMemoryStoreAdapter::new();
        let t = triple("Alice");
        store.store_triples(&[t.clone()]).await.unwrap();

        let mut higher = t.clone();
        higher.confidence = 0.9;
        let result = store.store_triples(&[higher]).await.unwrap();
        assert_eq!(result.duplicates_skipped, 1);

        let all = store.get_all_triples().await.unwrap();
        assert!((all[0].confidence - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn fake_embedder_is_deterministic() {
        let embedder = FakeEmbedder::new(4);
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("hello").await.unwrap();
        let c = embedder.embed("world").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 4);
    }

    #[tokio::test]
    async fn fake_oracle_returns_queued_responses_in_fifo_order() {
        let oracle = FakeOracleClient::new()
            .with_object(serde_json::json!({"first": true}))
            .with_object(serde_json::json!({"second": true}));
        let first = oracle.generate_object("p", "schema").await.unwrap();
        assert_eq!(first.data, serde_json::json!({"first": true}));
    }

    #[tokio::test]
    async fn fake_task_queue_records_enqueues() {
        let queue = FakeTaskQueue::new();
        let id = Uuid::new_v4();
        queue.enqueue(id, None).await.unwrap();
        assert_eq!(queue.enqueued_jobs(), vec![id]);
    }
}
