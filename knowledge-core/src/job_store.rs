//! # Job Store
//!
//! The job-lifecycle subset of [`crate::store::StoreAdapter`], split out
//! so the [`crate::coordinator::Coordinator`] and its tests can run against
//! a lightweight in-memory table ([`crate::coordinator::InMemoryJobStore`])
//! without needing a full triples/concepts/vectors backend. Every
//! `StoreAdapter` is automatically a `JobStore`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::types::{JobStage, ProcessingJob};
use crate::Result;

/// Job CRUD operations shared by every storage backend.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a brand-new job row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on persistence failure.
    async fn create_job(&self, job: &ProcessingJob) -> Result<()>;

    /// Atomically create a child job, but only if no child already exists
    /// for `(parent_job_id, stage)` — spec.md §4.1's uniqueness constraint.
    ///
    /// # Returns
    ///
    /// `true` if the child was created, `false` if one already existed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on persistence failure.
    async fn try_create_child(&self, job: &ProcessingJob) -> Result<bool>;

    /// Fetch a job by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on persistence failure.
    async fn get_job(&self, id: Uuid) -> Result<Option<ProcessingJob>>;

    /// Overwrite a job row (status/progress/result updates).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on persistence failure.
    async fn update_job(&self, job: &ProcessingJob) -> Result<()>;

    /// Fetch the child of `parent_id` at `stage`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on persistence failure.
    async fn get_job_by_stage(
        &self,
        parent_id: Uuid,
        stage: JobStage,
    ) -> Result<Option<ProcessingJob>>;

    /// Fetch every child of `parent_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] on persistence failure.
    async fn get_children(&self, parent_id: Uuid) -> Result<Vec<ProcessingJob>>;
}
