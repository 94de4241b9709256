//! # Job Router
//!
//! Dispatches a job to its handler by [`JobType`] (spec.md §4.8). Before
//! dispatch the job is set to PROCESSING; on success it is set COMPLETED
//! with its result payload, on failure FAILED with the error message.

use std::sync::Arc;

use tracing::{error, instrument};

use crate::collaborators::{Embedder, OracleClient, TaskQueue};
use crate::job_store::JobStore;
use crate::store::StoreAdapter;
use crate::types::{JobResultPayload, JobStatus, JobType, ProcessingJob};
use crate::Result;

use super::{ConceptHandler, DedupHandler, ExtractionHandler};

/// The outcome of routing one job (spec.md §4.2, §4.8).
#[derive(Debug, Clone)]
pub struct JobResult {
    /// Whether the job completed successfully.
    pub success: bool,
    /// The result payload, if successful.
    pub data: Option<JobResultPayload>,
    /// The error message, if failed.
    pub error: Option<String>,
    /// The stable `error.operation` tag, if failed.
    pub operation: Option<&'static str>,
}

/// Dispatches jobs to the extraction, concept, and dedup handlers.
pub struct Router<S, O, E, Q> {
    store: Arc<S>,
    extraction: ExtractionHandler<S, O, E, Q>,
    concepts: ConceptHandler<S, O>,
    dedup: DedupHandler<S, E>,
}

impl<S, O, E, Q> Router<S, O, E, Q>
where
    S: StoreAdapter,
    O: OracleClient,
    E: Embedder,
    Q: TaskQueue,
{
    /// Build a router wrapping the three handlers plus a reference to
    /// `store` for status transitions.
    pub fn new(
        store: Arc<S>,
        extraction: ExtractionHandler<S, O, E, Q>,
        concepts: ConceptHandler<S, O>,
        dedup: DedupHandler<S, E>,
    ) -> Self {
        Self {
            store,
            extraction,
            concepts,
            dedup,
        }
    }

    /// Route `job_id` to its handler (spec.md §4.8).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if `job_id` doesn't exist;
    /// handler errors are captured in the returned [`JobResult`], not
    /// propagated.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn route(&self, job_id: uuid::Uuid) -> Result<JobResult> {
        let mut job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(crate::Error::NotFound(job_id))?;

        job.status = JobStatus::Processing;
        job.started_at = job.started_at.or_else(|| Some(chrono::Utc::now()));
        self.store.update_job(&job).await?;

        let outcome = self.dispatch(&job).await;

        match outcome {
            Ok(data) => {
                job.status = JobStatus::Completed;
                job.progress = 100;
                job.completed_at = Some(chrono::Utc::now());
                job.result = Some(data.clone());
                self.store.update_job(&job).await?;
                Ok(JobResult {
                    success: true,
                    data: Some(data),
                    error: None,
                    operation: None,
                })
            }
            Err(e) => {
                error!(error = %e, "job failed");
                job.status = JobStatus::Failed;
                job.completed_at = Some(chrono::Utc::now());
                job.error_message = Some(e.to_string());
                self.store.update_job(&job).await?;
                Ok(JobResult {
                    success: false,
                    data: None,
                    error: Some(e.to_string()),
                    operation: e.operation(),
                })
            }
        }
    }

    async fn dispatch(&self, job: &ProcessingJob) -> Result<JobResultPayload> {
        match job.job_type {
            JobType::ExtractKnowledgeBatch | JobType::ProcessKnowledge => {
                self.extraction.execute(job).await
            }
            JobType::GenerateConcepts => self.concepts.execute(job).await,
            JobType::DeduplicateKnowledge => self.dedup.execute(job).await,
        }
    }
}
