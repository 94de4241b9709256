//! # Dedup Handler
//!
//! The global semantic dedup pass for a source (spec.md §4.3). Unlike the
//! extraction handler, there is no embedding map to reuse — every text is
//! embedded fresh directly through the embedder.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::collaborators::Embedder;
use crate::config::PipelineConfig;
use crate::dedup::deduplicate;
use crate::embedding_map::generate_embedding_map;
use crate::store::StoreAdapter;
use crate::types::{JobResultPayload, ProcessingJob};
use crate::Result;

/// Runs the semantic-dedup pass over a source's stored triples.
pub struct DedupHandler<S, E> {
    store: Arc<S>,
    embedder: Arc<E>,
    config: PipelineConfig,
}

impl<S, E> DedupHandler<S, E>
where
    S: StoreAdapter,
    E: Embedder,
{
    /// Build a handler over `store`/`embedder`.
    pub fn new(store: Arc<S>, embedder: Arc<E>, config: PipelineConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Run the dedup pass for `job` (spec.md §4.3). A no-op, returning an
    /// empty result, if semantic dedup is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EmbeddingGeneration`] if embedding the
    /// universe fails, or [`crate::Error::DeduplicationError`] if the
    /// delete transaction fails.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn execute(&self, job: &ProcessingJob) -> Result<JobResultPayload> {
        if !self.config.enable_semantic_dedup {
            info!("semantic dedup disabled, skipping");
            return Ok(JobResultPayload::default());
        }

        let source = &job.metadata.source_fields.source;
        let source_type = &job.metadata.source_fields.source_type;
        let triples = self.store.get_triples_by_source(source, source_type).await?;

        if triples.len() < 2 {
            return Ok(JobResultPayload::default());
        }

        let embedding_map = generate_embedding_map(
            &triples,
            &[],
            self.embedder.as_ref(),
            self.config.embed_batch_size,
            false,
        )
        .await?;

        let result = deduplicate(triples, Some(&embedding_map), self.config.similarity_threshold);

        if result.duplicates_removed == 0 {
            return Ok(JobResultPayload::default());
        }

        let duplicate_ids: Vec<String> = result
            .merged_metadata
            .iter()
            .map(|m| m.duplicate_id.clone())
            .collect();

        // Persist the merged confidence/extracted_at before dropping the
        // absorbed duplicates, or the merge computed above is lost.
        self.store
            .store_triples(&result.unique_triples)
            .await
            .map_err(|e| crate::Error::DeduplicationError(e.to_string()))?;

        let removed = self
            .store
            .delete_triples(&duplicate_ids)
            .await
            .map_err(|e| crate::Error::DeduplicationError(e.to_string()))?;

        info!(removed, "semantic dedup removed duplicate triples");

        Ok(JobResultPayload {
            triples_stored: result.unique_triples.len(),
            concepts_stored: 0,
            vectors_generated: 0,
            chunks_processed: 0,
            metrics: None,
        })
    }
}
