//! # Batch Extraction Handler
//!
//! The ten-step algorithm of spec.md §4.2: chunk, extract under admission
//! control with a circuit breaker, clean/validate, merge, embed, dedup,
//! store atomically, then hand off to the coordinator for the follow-on
//! stages.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::chunking::{chunk_source, chunk_text};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry};
use crate::collaborators::{Embedder, OracleClient};
use crate::config::{ExtractionMethod, PipelineConfig};
use crate::constants;
use crate::coordinator::Coordinator;
use crate::dedup::deduplicate;
use crate::embedding_map::generate_embedding_map;
use crate::job_store::JobStore;
use crate::store::{KnowledgeBatch, StoreAdapter};
use crate::types::{
    ExtractionMetrics, JobResultPayload, ProcessingJob, Triple, TripleType, VectorEmbedding,
    VectorType,
};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct RawTriple {
    subject: String,
    predicate: String,
    object: String,
    r#type: TripleType,
    confidence: f32,
    #[serde(default)]
    #[allow(dead_code)]
    semantic_content: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    source_context: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawExtractionPayload {
    #[serde(default)]
    triples: Vec<RawTriple>,
}

/// Executes the batch extraction algorithm against a concrete
/// `StoreAdapter` / `OracleClient` / `Embedder` / `TaskQueue` stack.
pub struct ExtractionHandler<S, O, E, Q> {
    store: Arc<S>,
    oracle: Arc<O>,
    embedder: Arc<E>,
    circuit_breakers: Arc<CircuitBreakerRegistry>,
    coordinator: Arc<Coordinator<S, Q>>,
    config: PipelineConfig,
}

impl<S, O, E, Q> ExtractionHandler<S, O, E, Q>
where
    S: StoreAdapter,
    O: OracleClient,
    E: Embedder,
    Q: crate::collaborators::TaskQueue,
{
    /// Build a handler over the given collaborators and configuration.
    pub fn new(
        store: Arc<S>,
        oracle: Arc<O>,
        embedder: Arc<E>,
        circuit_breakers: Arc<CircuitBreakerRegistry>,
        coordinator: Arc<Coordinator<S, Q>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            embedder,
            circuit_breakers,
            coordinator,
            config,
        }
    }

    /// Run the full extraction algorithm for `job` (spec.md §4.2).
    ///
    /// # Errors
    ///
    /// Returns [`Error::BatchExtraction`] if every chunk fails extraction,
    /// [`Error::EmbeddingGeneration`] if the embedding map build fails, or
    /// [`Error::BatchStorage`] if the atomic write fails.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn execute(&self, job: &ProcessingJob) -> Result<JobResultPayload> {
        let started = Instant::now();
        let source = job.metadata.source_fields.source.clone();

        // Step 1: chunking.
        let chunks = chunk_text(
            &job.text,
            self.config.chunk_max_tokens,
            self.config.chunk_overlap_tokens,
        );
        let multi_chunk = chunks.len() > 1;

        // Step 2: progress 10%.
        self.coordinator.update_progress(job.id, 10, None).await?;

        // Step 3: parallel extraction with admission control.
        let limits = job.metadata.resource_limits.unwrap_or_default();
        let resource_manager = Arc::new(crate::resource::ResourceManager::new(limits));
        let breaker_key = CircuitBreakerRegistry::extraction_key(&source);
        let breaker = self.circuit_breakers.get(&breaker_key);

        let mut futures = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let chunk_source_id = if multi_chunk {
                chunk_source(&source, chunk.index)
            } else {
                source.clone()
            };
            let resource_manager = Arc::clone(&resource_manager);
            let breaker = Arc::clone(&breaker);
            let oracle = Arc::clone(&self.oracle);
            let breaker_key = breaker_key.clone();
            let method = self.config.extraction_method;
            let text = chunk.text.clone();
            futures.push(async move {
                let result = resource_manager
                    .with_ai(|| extract_chunk(oracle.as_ref(), &breaker, &breaker_key, &text, method))
                    .await;
                (chunk_source_id, result)
            });
        }

        let chunk_results = futures::future::join_all(futures).await;

        let mut triples = Vec::new();
        let mut chunks_processed = 0usize;
        for (chunk_source_id, result) in chunk_results {
            match result {
                Ok(raw_triples) => {
                    chunks_processed += 1;
                    for raw in raw_triples {
                        let triple = Triple {
                            subject: raw.subject,
                            predicate: raw.predicate,
                            object: raw.object,
                            r#type: raw.r#type,
                            source: chunk_source_id.clone(),
                            source_type: job.metadata.source_fields.source_type.clone(),
                            source_date: job.metadata.source_fields.source_date,
                            extracted_at: chrono::Utc::now(),
                            confidence: raw.confidence,
                            processing_batch_id: Some(job.id.to_string()),
                        };
                        // Step 4: cleaning & validation.
                        if triple.validate().is_ok() {
                            triples.push(triple);
                        }
                    }
                }
                Err(e) => {
                    warn!(chunk = %chunk_source_id, error = %e, "chunk extraction failed, skipping");
                }
            }
        }

        if chunks_processed == 0 {
            return Err(Error::BatchExtraction(
                "every chunk failed extraction".into(),
            ));
        }

        // Step 5: merge, progress 80%.
        self.coordinator.update_progress(job.id, 80, None).await?;

        // Step 6: embedding map.
        let embedding_map = generate_embedding_map(
            &triples,
            &[],
            self.embedder.as_ref(),
            self.config.embed_batch_size,
            false,
        )
        .await?;

        // Step 7: deduplication.
        let dedup_input = if self.config.enable_semantic_dedup {
            Some(&embedding_map)
        } else {
            None
        };
        let dedup_result = deduplicate(triples, dedup_input, self.config.similarity_threshold);

        // Build vectors for every surviving triple's four embedded texts.
        let mut vectors = Vec::with_capacity(dedup_result.unique_triples.len() * 4);
        for triple in &dedup_result.unique_triples {
            let id = triple.identity();
            push_vector(&mut vectors, &embedding_map, VectorType::Entity, &triple.subject, &id);
            push_vector(&mut vectors, &embedding_map, VectorType::Entity, &triple.object, &id);
            push_vector(
                &mut vectors,
                &embedding_map,
                VectorType::Relationship,
                &triple.predicate,
                &id,
            );
            push_vector(
                &mut vectors,
                &embedding_map,
                VectorType::Semantic,
                &triple.semantic_text(),
                &id,
            );
        }

        // Step 8: atomic storage, progress 95%.
        let vectors_generated = vectors.len();
        let batch = KnowledgeBatch {
            triples: dedup_result.unique_triples,
            concepts: Vec::new(),
            conceptualizations: Vec::new(),
            vectors,
        };
        let store_result = self.store.batch_store_knowledge(batch).await?;
        self.coordinator.update_progress(job.id, 95, None).await?;

        let metrics = ExtractionMetrics {
            processing_time_secs: started.elapsed().as_secs_f64(),
            embedding_efficiency: embedding_map.stats().efficiency(),
            chunks_processed,
            chunks_total: chunks.len(),
        };

        // Step 9: schedule next stages.
        if job.parent_job_id.is_some() {
            self.coordinator
                .schedule_post_processing(job.id, metrics)
                .await?;
        }

        // Step 10: progress 100%, COMPLETED.
        self.coordinator
            .update_progress(job.id, 100, Some(metrics))
            .await?;

        info!(
            triples_stored = store_result.triples_stored,
            chunks_processed,
            chunks_total = chunks.len(),
            "extraction handler completed"
        );

        Ok(JobResultPayload {
            triples_stored: store_result.triples_stored,
            concepts_stored: store_result.concepts_stored,
            vectors_generated,
            chunks_processed,
            metrics: Some(metrics),
        })
    }
}

fn push_vector(
    vectors: &mut Vec<VectorEmbedding>,
    embedding_map: &crate::embedding_map::EmbeddingMap,
    vector_type: VectorType,
    text: &str,
    triple_id: &str,
) {
    if let Some(embedding) = embedding_map.get(text) {
        vectors.push(VectorEmbedding {
            vector_type,
            text: text.to_string(),
            embedding: embedding.clone(),
            knowledge_triple_id: Some(triple_id.to_string()),
            concept_node_id: None,
        });
    }
}

async fn extract_chunk<O: OracleClient>(
    oracle: &O,
    breaker: &CircuitBreaker,
    breaker_key: &str,
    chunk_text: &str,
    method: ExtractionMethod,
) -> Result<Vec<RawTriple>> {
    let stages: Vec<Option<TripleType>> = match method {
        ExtractionMethod::SinglePass => vec![None],
        ExtractionMethod::FourStage => vec![
            Some(TripleType::EntityEntity),
            Some(TripleType::EntityEvent),
            Some(TripleType::EventEvent),
            Some(TripleType::EmotionalContext),
        ],
    };

    let mut triples = Vec::new();
    for stage in stages {
        let prompt = build_extraction_prompt(chunk_text, stage);
        let raw = call_oracle_with_resilience(oracle, breaker, breaker_key, &prompt).await?;
        let cleaned = super::strip_code_fences(&raw);
        let payload: RawExtractionPayload =
            serde_json::from_str(cleaned).map_err(|e| Error::ParseError(e.to_string()))?;
        triples.extend(payload.triples);
    }
    Ok(triples)
}

fn build_extraction_prompt(chunk_text: &str, triple_type: Option<TripleType>) -> String {
    match triple_type {
        None => format!(
            "Extract subject-predicate-object triples from the following text. \
             Respond with JSON {{\"triples\": [...]}}.\n\n{chunk_text}"
        ),
        Some(t) => format!(
            "Extract only {t:?} triples from the following text. \
             Respond with JSON {{\"triples\": [...]}}.\n\n{chunk_text}"
        ),
    }
}

async fn call_oracle_with_resilience<O: OracleClient>(
    oracle: &O,
    breaker: &CircuitBreaker,
    breaker_key: &str,
    prompt: &str,
) -> Result<String> {
    let mut last_err = None;
    for attempt in 0..=constants::MAX_RETRIES {
        let result = breaker
            .call(breaker_key, || async { oracle.generate_text(prompt).await })
            .await;
        match result {
            Ok(text) => return Ok(text.text),
            Err(Error::CircuitBreakerOpen(key)) => return Err(Error::CircuitBreakerOpen(key)),
            Err(e) => {
                last_err = Some(e);
                if attempt < constants::MAX_RETRIES {
                    tokio::time::sleep(breaker.calculate_backoff(attempt)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::AiExtraction("retries exhausted".into())))
}
