//! # Concept Handler
//!
//! Derives high/medium/low-abstraction concepts from a source's stored
//! triples in a single oracle call (spec.md §4.3).

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::collaborators::OracleClient;
use crate::store::{KnowledgeBatch, StoreAdapter};
use crate::types::{
    AbstractionLevel, Concept, ConceptualizationLink, EntityType, JobResultPayload, ProcessingJob,
    TripleType,
};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct RawConcept {
    concept: String,
    abstraction_level: AbstractionLevel,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    source_element: String,
    entity_type: EntityType,
    concept: String,
    confidence: f32,
}

#[derive(Debug, Deserialize, Default)]
struct RawConceptPayload {
    #[serde(default)]
    concepts: Vec<RawConcept>,
    #[serde(default)]
    relationships: Vec<RawRelationship>,
}

/// Generates and stores concepts for a source's already-extracted triples.
pub struct ConceptHandler<S, O> {
    store: Arc<S>,
    oracle: Arc<O>,
}

impl<S, O> ConceptHandler<S, O>
where
    S: StoreAdapter,
    O: OracleClient,
{
    /// Build a handler over `store`/`oracle`.
    pub fn new(store: Arc<S>, oracle: Arc<O>) -> Self {
        Self { store, oracle }
    }

    /// Run concept generation for `job` (spec.md §4.3).
    ///
    /// # Errors
    ///
    /// Returns [`Error::AiExtraction`] on oracle failure, or
    /// [`Error::ParseError`] if the response fails schema validation.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn execute(&self, job: &ProcessingJob) -> Result<JobResultPayload> {
        let source = &job.metadata.source_fields.source;
        let source_type = &job.metadata.source_fields.source_type;

        if self.store.concepts_exist_for_source(source, source_type).await? {
            info!(source = %source, "concepts already generated, skipping");
            return Ok(JobResultPayload::default());
        }

        let triples = self.store.get_triples_by_source(source, source_type).await?;

        let mut entities = HashSet::new();
        let mut events = HashSet::new();
        let mut relations = HashSet::new();

        for triple in &triples {
            relations.insert(triple.predicate.clone());
            match triple.r#type {
                TripleType::EntityEntity | TripleType::EmotionalContext => {
                    entities.insert(triple.subject.clone());
                    entities.insert(triple.object.clone());
                }
                TripleType::EntityEvent => {
                    entities.insert(triple.subject.clone());
                    events.insert(triple.object.clone());
                }
                TripleType::EventEvent => {
                    events.insert(triple.subject.clone());
                    events.insert(triple.object.clone());
                }
            }
        }

        if entities.is_empty() && events.is_empty() && relations.is_empty() {
            return Ok(JobResultPayload::default());
        }

        let prompt = build_concept_prompt(&entities, &events, &relations);
        let response = self
            .oracle
            .generate_object(&prompt, "concept_generation")
            .await
            .map_err(|e| Error::AiExtraction(e.to_string()))?;

        let payload: RawConceptPayload =
            serde_json::from_value(response.data).map_err(|e| Error::ParseError(e.to_string()))?;

        let now = chrono::Utc::now();
        let concepts: Vec<Concept> = payload
            .concepts
            .into_iter()
            .map(|c| Concept {
                concept: c.concept,
                abstraction_level: c.abstraction_level,
                confidence: c.confidence,
                source: source.clone(),
                source_type: source_type.clone(),
                extracted_at: now,
            })
            .collect();

        let links: Vec<ConceptualizationLink> = payload
            .relationships
            .into_iter()
            .map(|r| ConceptualizationLink {
                source_element: r.source_element,
                entity_type: r.entity_type,
                concept: r.concept,
                confidence: r.confidence,
                context_triples: triples.iter().map(|t| t.identity()).collect(),
                source: source.clone(),
                source_type: source_type.clone(),
                extracted_at: now,
            })
            .collect();

        let batch = KnowledgeBatch {
            triples: Vec::new(),
            concepts,
            conceptualizations: links,
            vectors: Vec::new(),
        };
        let result = self.store.batch_store_knowledge(batch).await?;

        Ok(JobResultPayload {
            triples_stored: 0,
            concepts_stored: result.concepts_stored,
            vectors_generated: 0,
            chunks_processed: 0,
            metrics: None,
        })
    }
}

fn build_concept_prompt(
    entities: &HashSet<String>,
    events: &HashSet<String>,
    relations: &HashSet<String>,
) -> String {
    let mut sorted_entities: Vec<&str> = entities.iter().map(String::as_str).collect();
    sorted_entities.sort_unstable();
    let mut sorted_events: Vec<&str> = events.iter().map(String::as_str).collect();
    sorted_events.sort_unstable();
    let mut sorted_relations: Vec<&str> = relations.iter().map(String::as_str).collect();
    sorted_relations.sort_unstable();

    format!(
        "Given these entities: {:?}\nevents: {:?}\nrelations: {:?}\n\
         derive abstraction-level concepts and how each element conceptualizes to one. \
         Respond with JSON {{\"concepts\": [...], \"relationships\": [...]}}.",
        sorted_entities, sorted_events, sorted_relations
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_every_bucket() {
        let mut entities = HashSet::new();
        entities.insert("Alice".to_string());
        let mut events = HashSet::new();
        events.insert("Launch".to_string());
        let mut relations = HashSet::new();
        relations.insert("works at".to_string());

        let prompt = build_concept_prompt(&entities, &events, &relations);
        assert!(prompt.contains("Alice"));
        assert!(prompt.contains("Launch"));
        assert!(prompt.contains("works at"));
    }
}
