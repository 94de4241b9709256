//! The persistent data model: triples, concepts, conceptualization links,
//! vector embeddings, and processing jobs (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "proptest-arbitrary")]
use proptest::prelude::{prop_oneof, Arbitrary, BoxedStrategy, Just, Strategy};

use crate::identity;

/// The four semantic relation types a triple can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripleType {
    /// A relation between two entities.
    EntityEntity,
    /// A relation between an entity and an event.
    EntityEvent,
    /// A relation between two events.
    EventEvent,
    /// A relation expressing emotional or affective context.
    EmotionalContext,
}

#[cfg(feature = "proptest-arbitrary")]
impl Arbitrary for TripleType {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            Just(Self::EntityEntity),
            Just(Self::EntityEvent),
            Just(Self::EventEvent),
            Just(Self::EmotionalContext),
        ]
        .boxed()
    }
}

/// A directed semantic relation extracted from text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    /// The subject of the relation.
    pub subject: String,
    /// The predicate (relation) text.
    pub predicate: String,
    /// The object of the relation.
    pub object: String,
    /// Which of the four semantic types this triple is.
    pub r#type: TripleType,
    /// The ingestion origin, possibly suffixed `_chunk_<i>`.
    pub source: String,
    /// Caller-supplied source type tag (e.g. `"chat"`, `"document"`).
    pub source_type: String,
    /// When the source content itself was authored/dated, if known.
    pub source_date: Option<DateTime<Utc>>,
    /// When this triple was extracted.
    pub extracted_at: DateTime<Utc>,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f32,
    /// The batch this triple was extracted as part of, if any.
    pub processing_batch_id: Option<String>,
}

impl Triple {
    /// Deterministic identity: base64 of `subject|predicate|object|type`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if any text field is empty or
    /// confidence is outside `[0, 1]`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.subject.trim().is_empty()
            || self.predicate.trim().is_empty()
            || self.object.trim().is_empty()
        {
            return Err(crate::Error::InvalidInput(
                "triple subject/predicate/object must be non-empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(crate::Error::InvalidInput(format!(
                "triple confidence {} out of range [0,1]",
                self.confidence
            )));
        }
        Ok(())
    }

    /// Deterministic identity for this triple (spec.md §3, §9).
    #[must_use]
    pub fn identity(&self) -> String {
        identity::triple_id(&self.subject, &self.predicate, &self.object, self.r#type)
    }

    /// The exact text used for the full-semantic embedding of this triple.
    #[must_use]
    pub fn semantic_text(&self) -> String {
        format!("{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// Granularity of a derived [`Concept`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AbstractionLevel {
    /// Coarse, high-level abstraction (e.g. "Technology Industry").
    High,
    /// Medium-grained abstraction.
    Medium,
    /// Fine-grained, near-literal abstraction.
    Low,
}

/// An abstraction derived from a set of triples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// The concept's label.
    pub concept: String,
    /// How abstract this concept is.
    pub abstraction_level: AbstractionLevel,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// The source this concept was generated from.
    pub source: String,
    /// Caller-supplied source type tag.
    pub source_type: String,
    /// When this concept was generated.
    pub extracted_at: DateTime<Utc>,
}

impl Concept {
    /// Deterministic identity: base64 of `concept|level|source`.
    #[must_use]
    pub fn identity(&self) -> String {
        identity::concept_id(&self.concept, self.abstraction_level, &self.source)
    }
}

/// Which grammatical role a conceptualization link's `source_element` plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    /// The element is an entity (subject/object of an `ENTITY_ENTITY` triple).
    Entity,
    /// The element is an event.
    Event,
    /// The element is a predicate/relation.
    Relation,
}

/// The assertion that an element of a triple belongs to a concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptualizationLink {
    /// The triple element this link describes (subject, predicate, or object text).
    pub source_element: String,
    /// Which role the element plays.
    pub entity_type: EntityType,
    /// The concept this element belongs to.
    pub concept: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Identities of the triples this link was derived from.
    pub context_triples: Vec<String>,
    /// The source this link was generated from.
    pub source: String,
    /// Caller-supplied source type tag.
    pub source_type: String,
    /// When this link was generated.
    pub extracted_at: DateTime<Utc>,
}

/// Which kind of text a [`VectorEmbedding`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VectorType {
    /// Embeds a triple's subject or object text.
    Entity,
    /// Embeds a triple's predicate text.
    Relationship,
    /// Embeds a triple's full `"{s} {p} {o}"` text.
    Semantic,
    /// Embeds a concept's label.
    Concept,
}

/// A dense vector attached to either a triple or a concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEmbedding {
    /// Which kind of text this vector represents.
    pub vector_type: VectorType,
    /// The exact string embedded.
    pub text: String,
    /// The embedding itself; dimension is uniform process-wide.
    pub embedding: Vec<f32>,
    /// The triple this vector belongs to, for ENTITY/RELATIONSHIP/SEMANTIC.
    pub knowledge_triple_id: Option<String>,
    /// The concept this vector belongs to, for CONCEPT.
    pub concept_node_id: Option<String>,
}

impl VectorEmbedding {
    /// Validate the single-owner invariant from spec.md §3.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if neither or both owning ids
    /// are set, or if the vector type doesn't match the owner kind.
    pub fn validate(&self) -> crate::Result<()> {
        let owners = (
            self.knowledge_triple_id.is_some(),
            self.concept_node_id.is_some(),
        );
        match (self.vector_type, owners) {
            (VectorType::Concept, (false, true)) => Ok(()),
            (
                VectorType::Entity | VectorType::Relationship | VectorType::Semantic,
                (true, false),
            ) => Ok(()),
            _ => Err(crate::Error::InvalidInput(
                "vector must point to exactly one owner consistent with its vector_type".into(),
            )),
        }
    }
}

/// The kind of background work a [`ProcessingJob`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    /// The umbrella parent job for one `initiate_pipeline` call.
    ProcessKnowledge,
    /// Chunking + extraction + embedding + dedup + storage.
    ExtractKnowledgeBatch,
    /// Concept generation for a source.
    GenerateConcepts,
    /// Global semantic dedup pass for a source.
    DeduplicateKnowledge,
}

/// Which of the three pipeline stages a child job represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStage {
    /// Chunking + extraction + embedding + dedup + storage.
    Extraction,
    /// Concept generation.
    Concepts,
    /// Global semantic dedup.
    Deduplication,
}

/// The lifecycle status of a [`ProcessingJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created, waiting on the task queue.
    Queued,
    /// A handler has taken it and is making progress.
    Processing,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal (spec.md §3: COMPLETED/FAILED).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Per-job resource limits, injectable via job metadata (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Max concurrent LLM calls for this job.
    pub max_ai_calls: usize,
    /// Max concurrent database connections for this job.
    pub max_connections: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_ai_calls: crate::constants::DEFAULT_MAX_AI_CALLS,
            max_connections: crate::constants::DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// Source fields carried on every job's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFields {
    /// Caller-supplied ingestion origin identifier.
    pub source: String,
    /// Caller-supplied source type tag.
    pub source_type: String,
    /// When the source content was authored/dated, if known.
    pub source_date: Option<DateTime<Utc>>,
}

/// Metrics recorded by the extraction handler and threaded through to
/// `schedule_post_processing` (spec.md §4.1, §4.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetrics {
    /// Wall-clock time the extraction handler spent processing, in seconds.
    pub processing_time_secs: f64,
    /// Fraction of embedding calls averted by the embedding map (0..=1).
    pub embedding_efficiency: f64,
    /// Number of chunks that extracted successfully.
    pub chunks_processed: usize,
    /// Number of chunks attempted in total.
    pub chunks_total: usize,
}

/// Job metadata: source fields plus optional resource limits and metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    /// Source identification for this job.
    pub source_fields: SourceFields,
    /// Per-job resource limits, if overridden.
    pub resource_limits: Option<ResourceLimits>,
    /// Metrics recorded once the extraction handler completes.
    pub extraction_metrics: Option<ExtractionMetrics>,
}

/// The outcome payload of a completed job (spec.md §4.2, §4.8).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResultPayload {
    /// Number of triples written (post-merge).
    pub triples_stored: usize,
    /// Number of concepts written.
    pub concepts_stored: usize,
    /// Number of vectors written.
    pub vectors_generated: usize,
    /// Number of chunks that extracted successfully.
    pub chunks_processed: usize,
    /// Metrics recorded during this run.
    pub metrics: Option<ExtractionMetrics>,
}

/// A unit of background work (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingJob {
    /// Job id.
    pub id: Uuid,
    /// What kind of work this job performs.
    pub job_type: JobType,
    /// The parent job, if this is a stage child.
    pub parent_job_id: Option<Uuid>,
    /// Which stage this job implements; `None` for the parent.
    pub stage: Option<JobStage>,
    /// The raw input text (only meaningful for EXTRACTION jobs).
    pub text: String,
    /// Structured metadata (source fields, resource limits, metrics).
    pub metadata: JobMetadata,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Progress in `[0, 100]`.
    pub progress: u8,
    /// Result payload, once completed.
    pub result: Option<JobResultPayload>,
    /// Error message, if failed.
    pub error_message: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job first transitioned to PROCESSING.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
    /// Construct a new parent job: PROCESSING, `stage = None`.
    #[must_use]
    pub fn new_parent(id: Uuid, text: String, metadata: JobMetadata, now: DateTime<Utc>) -> Self {
        Self {
            id,
            job_type: JobType::ProcessKnowledge,
            parent_job_id: None,
            stage: None,
            text,
            metadata,
            status: JobStatus::Processing,
            progress: 0,
            result: None,
            error_message: None,
            created_at: now,
            started_at: Some(now),
            completed_at: None,
        }
    }

    /// Construct a new child job: QUEUED, stage set, parent set.
    #[must_use]
    pub fn new_child(
        id: Uuid,
        parent_job_id: Uuid,
        job_type: JobType,
        stage: JobStage,
        text: String,
        metadata: JobMetadata,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job_type,
            parent_job_id: Some(parent_job_id),
            stage: Some(stage),
            text,
            metadata,
            status: JobStatus::Queued,
            progress: 0,
            result: None,
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }
}
