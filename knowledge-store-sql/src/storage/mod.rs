//! Concrete [`JobStore`]/[`StoreAdapter`] implementation for
//! [`KnowledgeSqlStore`], split into one submodule per table family.

use std::collections::HashMap;

use async_trait::async_trait;
use knowledge_core::job_store::JobStore;
use knowledge_core::store::{
    BatchStoreResult, ConceptMatch, KnowledgeBatch, SearchFilter, StoreAdapter, TripleMatch,
};
use knowledge_core::types::{
    Concept, ConceptualizationLink, JobStage, ProcessingJob, Triple, TripleType, VectorEmbedding,
    VectorType,
};
use knowledge_core::{Error, Result};
use uuid::Uuid;

use crate::KnowledgeSqlStore;

pub(crate) mod concepts;
pub(crate) mod jobs;
pub(crate) mod search;
pub(crate) mod triples;
pub(crate) mod vectors;

#[async_trait]
impl JobStore for KnowledgeSqlStore {
    async fn create_job(&self, job: &ProcessingJob) -> Result<()> {
        let conn = self.get_connection().await?;
        jobs::create_job(&conn, job).await
    }

    async fn try_create_child(&self, job: &ProcessingJob) -> Result<bool> {
        let conn = self.get_connection().await?;
        jobs::try_create_child(&conn, job).await
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<ProcessingJob>> {
        let conn = self.get_connection().await?;
        jobs::get_job(&conn, id).await
    }

    async fn update_job(&self, job: &ProcessingJob) -> Result<()> {
        let conn = self.get_connection().await?;
        jobs::update_job(&conn, job).await
    }

    async fn get_job_by_stage(
        &self,
        parent_id: Uuid,
        stage: JobStage,
    ) -> Result<Option<ProcessingJob>> {
        let conn = self.get_connection().await?;
        jobs::get_job_by_stage(&conn, parent_id, stage).await
    }

    async fn get_children(&self, parent_id: Uuid) -> Result<Vec<ProcessingJob>> {
        let conn = self.get_connection().await?;
        jobs::get_children(&conn, parent_id).await
    }
}

#[async_trait]
impl StoreAdapter for KnowledgeSqlStore {
    async fn check_existing_triples(&self, ids: &[String]) -> Result<Vec<String>> {
        let conn = self.get_connection().await?;
        triples::check_existing_triples(&conn, ids).await
    }

    async fn store_triples(&self, triples: &[Triple]) -> Result<BatchStoreResult> {
        let conn = self.get_connection().await?;
        triples::store_triples(&conn, triples).await
    }

    async fn store_concepts(&self, concepts: &[Concept]) -> Result<usize> {
        let conn = self.get_connection().await?;
        concepts::store_concepts(&conn, concepts).await
    }

    async fn store_conceptualizations(&self, links: &[ConceptualizationLink]) -> Result<()> {
        let conn = self.get_connection().await?;
        concepts::store_conceptualizations(&conn, links).await
    }

    async fn store_vectors(&self, vectors: &[VectorEmbedding]) -> Result<()> {
        let conn = self.get_connection().await?;
        vectors::store_vectors(&conn, vectors).await
    }

    /// Writes triples, concepts, conceptualization links, and vectors inside
    /// one transaction (spec.md §4.2 step 8: the batch is atomic), grounded
    /// on the teacher's own transaction-per-batch pattern.
    async fn batch_store_knowledge(&self, batch: KnowledgeBatch) -> Result<BatchStoreResult> {
        let conn = self.get_connection().await?;

        conn.execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| Error::BatchStorage(format!("failed to begin transaction: {e}")))?;

        let result = async {
            let triple_result = triples::store_triples(&conn, &batch.triples).await?;
            let concepts_stored = concepts::store_concepts(&conn, &batch.concepts).await?;
            concepts::store_conceptualizations(&conn, &batch.conceptualizations).await?;
            vectors::store_vectors(&conn, &batch.vectors).await?;
            Ok::<_, Error>(BatchStoreResult {
                concepts_stored,
                ..triple_result
            })
        }
        .await;

        match result {
            Ok(summary) => {
                conn.execute("COMMIT", ())
                    .await
                    .map_err(|e| Error::BatchStorage(format!("failed to commit batch: {e}")))?;
                Ok(summary)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    async fn get_triples_by_source(
        &self,
        source_prefix: &str,
        source_type: &str,
    ) -> Result<Vec<Triple>> {
        let conn = self.get_connection().await?;
        triples::get_triples_by_source(&conn, source_prefix, source_type).await
    }

    async fn delete_triples(&self, ids: &[String]) -> Result<usize> {
        let conn = self.get_connection().await?;
        triples::delete_triples(&conn, ids).await
    }

    async fn concepts_exist_for_source(&self, source: &str, source_type: &str) -> Result<bool> {
        let conn = self.get_connection().await?;
        concepts::concepts_exist_for_source(&conn, source, source_type).await
    }

    async fn search_by_embedding(
        &self,
        vector_type: VectorType,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<TripleMatch>> {
        let conn = self.get_connection().await?;
        search::search_by_embedding(&conn, vector_type, vector, top_k, min_score, filter).await
    }

    async fn search_concepts_by_embedding(
        &self,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<ConceptMatch>> {
        let conn = self.get_connection().await?;
        search::search_concepts_by_embedding(&conn, vector, top_k, min_score).await
    }

    async fn get_conceptualizations_by_concept(
        &self,
        concept: &str,
    ) -> Result<Vec<ConceptualizationLink>> {
        let conn = self.get_connection().await?;
        concepts::get_conceptualizations_by_concept(&conn, concept).await
    }

    async fn search_by_entity(
        &self,
        query: &str,
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<TripleMatch>> {
        let conn = self.get_connection().await?;
        search::search_by_entity(&conn, query, top_k, filter).await
    }

    async fn search_by_relationship(
        &self,
        query: &str,
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<TripleMatch>> {
        let conn = self.get_connection().await?;
        search::search_by_relationship(&conn, query, top_k, filter).await
    }

    async fn search_by_concept(&self, query: &str, top_k: usize) -> Result<Vec<ConceptMatch>> {
        let conn = self.get_connection().await?;
        search::search_by_concept(&conn, query, top_k).await
    }

    async fn get_all_triples(&self) -> Result<Vec<Triple>> {
        let conn = self.get_connection().await?;
        triples::get_all_triples(&conn).await
    }

    async fn get_triple_count(&self) -> Result<usize> {
        let conn = self.get_connection().await?;
        triples::get_triple_count(&conn).await
    }

    async fn get_concept_count(&self) -> Result<usize> {
        let conn = self.get_connection().await?;
        concepts::get_concept_count(&conn).await
    }

    async fn get_triple_count_by_type(&self) -> Result<HashMap<TripleType, usize>> {
        let conn = self.get_connection().await?;
        triples::get_triple_count_by_type(&conn).await
    }
}
