//! # Pipeline Coordinator
//!
//! Owns job lifecycle: creating the parent/EXTRACTION pair on ingest, then
//! (once, from inside the extraction handler) the CONCEPTS/DEDUPLICATION
//! children. Races in the source system came from several parallel
//! extractors each trying to schedule the same follow-up jobs; the fix
//! here is that only the extraction handler calls
//! [`Coordinator::schedule_post_processing`], and the store's
//! `(parent_job_id, stage)` uniqueness constraint makes a second attempt a
//! no-op rather than a duplicate (spec.md §4.1).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::collaborators::TaskQueue;
use crate::config::PipelineConfig;
use crate::constants;
use crate::job_store::JobStore;
use crate::types::{
    ExtractionMetrics, JobMetadata, JobStage, JobStatus, JobType, ProcessingJob, ResourceLimits,
    SourceFields,
};
use crate::Result;

/// Arguments to [`Coordinator::initiate_pipeline`].
#[derive(Debug, Clone)]
pub struct InitiatePipelineArgs {
    /// Raw input text.
    pub text: String,
    /// Ingestion origin identifier.
    pub source: String,
    /// Caller-supplied source type tag.
    pub source_type: String,
    /// When the source content was authored/dated, if known.
    pub source_date: Option<chrono::DateTime<Utc>>,
    /// Per-job resource limit override.
    pub resource_limits: Option<ResourceLimits>,
}

/// Snapshot of one stage's job for [`PipelineStatus`].
#[derive(Debug, Clone)]
pub struct StageSnapshot {
    /// Which stage this is.
    pub stage: JobStage,
    /// The child job, if the coordinator has created it yet.
    pub job: Option<ProcessingJob>,
}

/// The result of [`Coordinator::get_pipeline_status`].
#[derive(Debug, Clone)]
pub struct PipelineStatus {
    /// The parent job.
    pub parent: ProcessingJob,
    /// One entry per stage the coordinator knows about.
    pub stages: Vec<StageSnapshot>,
    /// Whether every child that exists is terminal, and at least one exists.
    pub is_complete: bool,
}

/// A lightweight, job-store-agnostic reference to a store adapter plus task
/// queue, used by every coordinator method.
pub struct Coordinator<S, Q> {
    store: Arc<S>,
    queue: Arc<Q>,
    config: PipelineConfig,
}

impl<S, Q> Coordinator<S, Q>
where
    S: JobStore,
    Q: TaskQueue,
{
    /// Build a coordinator over `store`/`queue`, governed by `config`.
    pub fn new(store: Arc<S>, queue: Arc<Q>, config: PipelineConfig) -> Self {
        Self { store, queue, config }
    }

    /// Create the parent job plus its single EXTRACTION child, and enqueue
    /// the child with no delay (spec.md §4.1).
    ///
    /// If the task queue is unavailable, job creation still succeeds; the
    /// job remains observable but will not run until the queue recovers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PipelineInitiation`] if either job row fails
    /// to persist.
    #[instrument(skip(self, args), fields(source = %args.source))]
    pub async fn initiate_pipeline(&self, args: InitiatePipelineArgs) -> Result<Uuid> {
        let now = Utc::now();
        let metadata = JobMetadata {
            source_fields: SourceFields {
                source: args.source.clone(),
                source_type: args.source_type.clone(),
                source_date: args.source_date,
            },
            resource_limits: args.resource_limits,
            extraction_metrics: None,
        };

        let parent_id = Uuid::new_v4();
        let parent = ProcessingJob::new_parent(parent_id, args.text.clone(), metadata.clone(), now);
        self.store
            .create_job(&parent)
            .await
            .map_err(|e| crate::Error::PipelineInitiation(e.to_string()))?;

        let child_id = Uuid::new_v4();
        let child = ProcessingJob::new_child(
            child_id,
            parent_id,
            JobType::ExtractKnowledgeBatch,
            JobStage::Extraction,
            args.text,
            metadata,
            now,
        );
        self.store
            .create_job(&child)
            .await
            .map_err(|e| crate::Error::PipelineInitiation(e.to_string()))?;

        if let Err(e) = self.queue.enqueue(child_id, None).await {
            info!(
                parent_id = %parent_id,
                child_id = %child_id,
                error = %e,
                "task queue unavailable; extraction job created but not enqueued"
            );
        }

        Ok(parent_id)
    }

    /// Called exactly once by the extraction handler on success. Creates
    /// the CONCEPTS child (always) and the DEDUPLICATION child (only if
    /// `PipelineConfig::enable_semantic_dedup`), each with a computed delay
    /// (spec.md §4.1).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PipelineInitiation`] if job creation fails.
    /// A re-execution (the uniqueness constraint already holding a row for
    /// a given stage) is a silent no-op, not an error.
    #[instrument(skip(self, metrics))]
    pub async fn schedule_post_processing(
        &self,
        parent_id: Uuid,
        metrics: ExtractionMetrics,
    ) -> Result<()> {
        let parent = self
            .store
            .get_job(parent_id)
            .await
            .map_err(|e| crate::Error::PipelineInitiation(e.to_string()))?
            .ok_or(crate::Error::NotFound(parent_id))?;

        let concept_delay = clamp_delay(
            metrics.processing_time_secs,
            constants::CONCEPT_DELAY_FACTOR,
            constants::CONCEPT_DELAY_MIN_SECS,
            constants::CONCEPT_DELAY_MAX_SECS,
        );
        let dedup_delay = clamp_delay(
            metrics.processing_time_secs,
            constants::DEDUP_DELAY_FACTOR,
            constants::DEDUP_DELAY_MIN_SECS,
            constants::DEDUP_DELAY_MAX_SECS,
        );

        let mut metadata = parent.metadata.clone();
        metadata.extraction_metrics = Some(metrics);

        self.create_and_enqueue_child(
            parent_id,
            JobType::GenerateConcepts,
            JobStage::Concepts,
            parent.text.clone(),
            metadata.clone(),
            Some(concept_delay),
        )
        .await?;

        if self.config.enable_semantic_dedup {
            self.create_and_enqueue_child(
                parent_id,
                JobType::DeduplicateKnowledge,
                JobStage::Deduplication,
                parent.text.clone(),
                metadata,
                Some(dedup_delay),
            )
            .await?;
        }

        Ok(())
    }

    async fn create_and_enqueue_child(
        &self,
        parent_id: Uuid,
        job_type: JobType,
        stage: JobStage,
        text: String,
        metadata: JobMetadata,
        delay: Option<std::time::Duration>,
    ) -> Result<()> {
        let child_id = Uuid::new_v4();
        let child = ProcessingJob::new_child(child_id, parent_id, job_type, stage, text, metadata, Utc::now());

        let created = self
            .store
            .try_create_child(&child)
            .await
            .map_err(|e| crate::Error::PipelineInitiation(e.to_string()))?;

        if !created {
            info!(parent_id = %parent_id, ?stage, "stage already scheduled, skipping");
            return Ok(());
        }

        if let Err(e) = self.queue.enqueue(child_id, delay).await {
            info!(child_id = %child_id, error = %e, "task queue unavailable for stage child");
        }
        Ok(())
    }

    /// Clamp `progress` to `[0, 100]`; on first call (job currently
    /// QUEUED) transition to PROCESSING and stamp `started_at`; at 100
    /// transition to COMPLETED and stamp `completed_at` (spec.md §4.1).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if `job_id` doesn't exist, or
    /// propagates a store error.
    #[instrument(skip(self, metrics))]
    pub async fn update_progress(
        &self,
        job_id: Uuid,
        progress: u8,
        metrics: Option<ExtractionMetrics>,
    ) -> Result<()> {
        let mut job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(crate::Error::NotFound(job_id))?;

        let clamped = progress.min(100);
        job.progress = clamped;

        if job.status == JobStatus::Queued {
            job.status = JobStatus::Processing;
            job.started_at = Some(Utc::now());
        }

        if let Some(m) = metrics {
            job.metadata.extraction_metrics = Some(m);
        }

        if clamped == 100 {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
        }

        self.store.update_job(&job).await
    }

    /// Parent status, per-stage snapshot, and overall completion.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if `parent_id` doesn't exist, or
    /// propagates a store error.
    pub async fn get_pipeline_status(&self, parent_id: Uuid) -> Result<PipelineStatus> {
        let parent = self
            .store
            .get_job(parent_id)
            .await?
            .ok_or(crate::Error::NotFound(parent_id))?;

        let children = self.store.get_children(parent_id).await?;
        let stages = [JobStage::Extraction, JobStage::Concepts, JobStage::Deduplication]
            .into_iter()
            .map(|stage| StageSnapshot {
                stage,
                job: children.iter().find(|c| c.stage == Some(stage)).cloned(),
            })
            .collect::<Vec<_>>();

        let is_complete = is_complete_from(&children);

        Ok(PipelineStatus {
            parent,
            stages,
            is_complete,
        })
    }

    /// `true` iff `parent_id` has at least one child and every child is
    /// terminal (spec.md §4.1: a pipeline with zero children is never
    /// complete).
    ///
    /// # Errors
    ///
    /// Propagates a store error.
    pub async fn is_pipeline_complete(&self, parent_id: Uuid) -> Result<bool> {
        let children = self.store.get_children(parent_id).await?;
        Ok(is_complete_from(&children))
    }

    /// Lookup helper: the child of `parent_id` at `stage`, if any.
    ///
    /// # Errors
    ///
    /// Propagates a store error.
    pub async fn get_job_by_stage(
        &self,
        parent_id: Uuid,
        stage: JobStage,
    ) -> Result<Option<ProcessingJob>> {
        self.store.get_job_by_stage(parent_id, stage).await
    }
}

fn is_complete_from(children: &[ProcessingJob]) -> bool {
    !children.is_empty() && children.iter().all(|c| c.status.is_terminal())
}

fn clamp_delay(processing_time_secs: f64, factor: f64, min: f64, max: f64) -> std::time::Duration {
    let seconds = (processing_time_secs * factor).max(min).min(max);
    std::time::Duration::from_secs_f64(seconds)
}

/// An in-memory reference [`StoreAdapter`]-adjacent job table, useful for
/// tests and the demo binary; it implements only the job-lifecycle surface
/// the coordinator needs; triple/concept/vector storage is left to a full
/// `StoreAdapter` implementation.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, ProcessingJob>>,
}

impl InMemoryJobStore {
    /// An empty job table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl crate::job_store::JobStore for InMemoryJobStore {
    async fn create_job(&self, job: &ProcessingJob) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn try_create_child(&self, job: &ProcessingJob) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        let Some(parent_id) = job.parent_job_id else {
            return Err(crate::Error::InvalidInput(
                "try_create_child requires parent_job_id".into(),
            ));
        };
        let exists = jobs
            .values()
            .any(|j| j.parent_job_id == Some(parent_id) && j.stage == job.stage);
        if exists {
            return Ok(false);
        }
        jobs.insert(job.id, job.clone());
        Ok(true)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<ProcessingJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn update_job(&self, job: &ProcessingJob) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job_by_stage(
        &self,
        parent_id: Uuid,
        stage: JobStage,
    ) -> Result<Option<ProcessingJob>> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .find(|j| j.parent_job_id == Some(parent_id) && j.stage == Some(stage))
            .cloned())
    }

    async fn get_children(&self, parent_id: Uuid) -> Result<Vec<ProcessingJob>> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.parent_job_id == Some(parent_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_delay_respects_floor_and_ceiling() {
        let fast = clamp_delay(1.0, constants::CONCEPT_DELAY_FACTOR, constants::CONCEPT_DELAY_MIN_SECS, constants::CONCEPT_DELAY_MAX_SECS);
        assert_eq!(fast.as_secs_f64(), constants::CONCEPT_DELAY_MIN_SECS);

        let slow = clamp_delay(10_000.0, constants::CONCEPT_DELAY_FACTOR, constants::CONCEPT_DELAY_MIN_SECS, constants::CONCEPT_DELAY_MAX_SECS);
        assert_eq!(slow.as_secs_f64(), constants::CONCEPT_DELAY_MAX_SECS);
    }

    #[test]
    fn dedup_delay_respects_floor_and_ceiling() {
        let fast = clamp_delay(1.0, constants::DEDUP_DELAY_FACTOR, constants::DEDUP_DELAY_MIN_SECS, constants::DEDUP_DELAY_MAX_SECS);
        assert_eq!(fast.as_secs_f64(), constants::DEDUP_DELAY_MIN_SECS);
    }

    #[test]
    fn zero_children_is_never_complete() {
        assert!(!is_complete_from(&[]));
    }
}
