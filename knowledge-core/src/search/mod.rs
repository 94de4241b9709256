//! # Fusion Search
//!
//! Queries every enabled index concurrently and fuses their rankings into
//! one list (spec.md §4.7). No single index is authoritative: entity and
//! relationship vectors catch lexical-adjacent matches, semantic vectors
//! catch paraphrase, and the concept strategy catches thematic matches
//! that never share a token with the query.

mod ranking;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::collaborators::Embedder;
use crate::config::SearchConfig;
use crate::store::{ConceptMatch, SearchFilter, StoreAdapter, TripleMatch};
use crate::types::{EntityType, Triple, VectorType};
use crate::Result;

/// One of the four indexes the fusion layer can draw on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Cosine search over ENTITY vectors, substring fallback on subject/object.
    Entity,
    /// Cosine search over RELATIONSHIP vectors, substring fallback on predicate.
    Relationship,
    /// Cosine search over SEMANTIC (full-triple) vectors; no substring fallback.
    Semantic,
    /// Cosine search over CONCEPT vectors, followed by link expansion.
    Concept,
}

impl SearchStrategy {
    fn label(self) -> &'static str {
        match self {
            SearchStrategy::Entity => "entity",
            SearchStrategy::Relationship => "relationship",
            SearchStrategy::Semantic => "semantic",
            SearchStrategy::Concept => "concept",
        }
    }
}

/// Per-strategy scores and the fused score for one matched triple.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyScores {
    /// Position score contributed by the entity strategy, if it matched.
    pub entity: Option<f32>,
    /// Position score contributed by the relationship strategy, if it matched.
    pub relationship: Option<f32>,
    /// Position score contributed by the semantic strategy, if it matched.
    pub semantic: Option<f32>,
    /// Position score contributed by the concept strategy, if it matched.
    pub concept: Option<f32>,
    /// The fused, diversity-boosted score (spec.md §4.7 step 4).
    pub fusion: f32,
}

/// One fused search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    /// The matched triple.
    pub triple: Triple,
    /// Per-strategy and fused scores.
    pub scores: StrategyScores,
    /// Labels of the strategies that surfaced this triple.
    pub search_types: Vec<String>,
}

/// Per-call overrides of [`SearchConfig`]'s defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Override the configured `top_k`.
    pub top_k: Option<usize>,
    /// Override the configured `min_score`.
    pub min_score: Option<f32>,
    /// Override the configured `enabled_strategies`.
    pub enabled_strategies: Option<Vec<SearchStrategy>>,
    /// Source/temporal/type filtering, applied in the adapter layer.
    pub filter: SearchFilter,
}

/// Runs fusion search over a [`StoreAdapter`] and [`Embedder`] pair.
pub struct FusionSearch<'a> {
    store: &'a dyn StoreAdapter,
    embedder: &'a dyn Embedder,
    config: &'a SearchConfig,
}

impl<'a> FusionSearch<'a> {
    /// Build a fusion search over `store`/`embedder`, defaulting to `config`.
    #[must_use]
    pub fn new(store: &'a dyn StoreAdapter, embedder: &'a dyn Embedder, config: &'a SearchConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Run fusion search for `query` (spec.md §4.7).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FusionSearchError`] only if every enabled
    /// strategy fails outright; a partial failure (one strategy erroring
    /// while others succeed) is tolerated and logged.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<FusionResult>> {
        let top_k = options.top_k.unwrap_or(self.config.top_k);
        let min_score = options.min_score.unwrap_or(self.config.min_score);
        let strategies = options
            .enabled_strategies
            .unwrap_or_else(|| self.config.enabled_strategies.clone());
        let filter = &options.filter;

        let query_vector = if strategies
            .iter()
            .any(|s| *s != SearchStrategy::Entity && *s != SearchStrategy::Relationship)
            || strategies.contains(&SearchStrategy::Entity)
            || strategies.contains(&SearchStrategy::Relationship)
        {
            match self.embedder.embed(query).await {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "query embedding failed, falling back to substring search");
                    None
                }
            }
        } else {
            None
        };

        let mut triple_sets: Vec<(SearchStrategy, Vec<TripleMatch>)> = Vec::new();
        let mut concept_set: Vec<(SearchStrategy, Vec<ConceptMatch>)> = Vec::new();
        let mut any_succeeded = false;

        for strategy in &strategies {
            match strategy {
                SearchStrategy::Entity => {
                    let matches = self
                        .run_triple_strategy(
                            *strategy,
                            VectorType::Entity,
                            query,
                            query_vector.as_deref(),
                            top_k,
                            min_score,
                            filter,
                        )
                        .await;
                    if let Some(m) = matches {
                        any_succeeded = true;
                        triple_sets.push((*strategy, m));
                    }
                }
                SearchStrategy::Relationship => {
                    let matches = self
                        .run_triple_strategy(
                            *strategy,
                            VectorType::Relationship,
                            query,
                            query_vector.as_deref(),
                            top_k,
                            min_score,
                            filter,
                        )
                        .await;
                    if let Some(m) = matches {
                        any_succeeded = true;
                        triple_sets.push((*strategy, m));
                    }
                }
                SearchStrategy::Semantic => {
                    if let Some(vector) = query_vector.as_deref() {
                        match self
                            .store
                            .search_by_embedding(VectorType::Semantic, vector, top_k, min_score, filter)
                            .await
                        {
                            Ok(m) => {
                                any_succeeded = true;
                                triple_sets.push((*strategy, m));
                            }
                            Err(e) => warn!(strategy = strategy.label(), error = %e, "strategy failed"),
                        }
                    }
                    // No substring fallback for semantic per spec.md §4.7.
                }
                SearchStrategy::Concept => {
                    let matches = self.run_concept_strategy(query, query_vector.as_deref(), top_k, min_score).await;
                    if let Some(m) = matches {
                        any_succeeded = true;
                        concept_set.push((*strategy, m));
                    }
                }
            }
        }

        if !any_succeeded {
            return Err(crate::Error::FusionSearchError(
                "every enabled search strategy failed".into(),
            ));
        }

        let expanded_concept_triples = self.expand_concept_matches(concept_set, filter).await;

        let mut by_identity: HashMap<String, FusionInput> = HashMap::new();
        for (strategy, matches) in triple_sets {
            accumulate(&mut by_identity, strategy, matches);
        }
        accumulate(&mut by_identity, SearchStrategy::Concept, expanded_concept_triples);

        let results = ranking::fuse(by_identity, &self.config.weights, top_k);
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_triple_strategy(
        &self,
        strategy: SearchStrategy,
        vector_type: VectorType,
        query: &str,
        query_vector: Option<&[f32]>,
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Option<Vec<TripleMatch>> {
        if let Some(vector) = query_vector {
            match self
                .store
                .search_by_embedding(vector_type, vector, top_k, min_score, filter)
                .await
            {
                Ok(m) => return Some(m),
                Err(e) => warn!(strategy = strategy.label(), error = %e, "vector strategy failed, falling back"),
            }
        }

        let fallback = match strategy {
            SearchStrategy::Entity => self.store.search_by_entity(query, top_k, filter).await,
            SearchStrategy::Relationship => self.store.search_by_relationship(query, top_k, filter).await,
            _ => return None,
        };

        match fallback {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(strategy = strategy.label(), error = %e, "substring fallback failed");
                None
            }
        }
    }

    async fn run_concept_strategy(
        &self,
        query: &str,
        query_vector: Option<&[f32]>,
        top_k: usize,
        min_score: f32,
    ) -> Option<Vec<ConceptMatch>> {
        if let Some(vector) = query_vector {
            match self.store.search_concepts_by_embedding(vector, top_k, min_score).await {
                Ok(m) => return Some(m),
                Err(e) => warn!(error = %e, "concept vector search failed, falling back"),
            }
        }

        match self.store.search_by_concept(query, top_k).await {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(error = %e, "concept substring fallback failed");
                None
            }
        }
    }

    /// Expand concept matches into the triples whose subject/predicate/object
    /// appears in one of their conceptualization links, deduped by identity
    /// (spec.md §4.7 step 3).
    async fn expand_concept_matches(
        &self,
        concept_set: Vec<(SearchStrategy, Vec<ConceptMatch>)>,
        filter: &SearchFilter,
    ) -> Vec<TripleMatch> {
        let Some((_, concepts)) = concept_set.into_iter().next() else {
            return Vec::new();
        };

        let mut seen_elements: std::collections::HashSet<(String, EntityType)> =
            std::collections::HashSet::new();
        for c in &concepts {
            match self.store.get_conceptualizations_by_concept(&c.concept.concept).await {
                Ok(links) => {
                    for link in links {
                        seen_elements.insert((link.source_element, link.entity_type));
                    }
                }
                Err(e) => warn!(error = %e, "conceptualization lookup failed"),
            }
        }

        if seen_elements.is_empty() {
            return Vec::new();
        }

        let mut matched = Vec::new();
        let mut seen_ids = std::collections::HashSet::new();
        for (element, entity_type) in &seen_elements {
            let result = match entity_type {
                EntityType::Relation => {
                    self.store.search_by_relationship(element, usize::MAX, filter).await
                }
                EntityType::Entity | EntityType::Event => {
                    self.store.search_by_entity(element, usize::MAX, filter).await
                }
            };
            if let Ok(entity_matches) = result {
                for m in entity_matches {
                    if seen_ids.insert(m.triple.identity()) {
                        matched.push(m);
                    }
                }
            }
        }
        matched
    }
}

struct FusionInput {
    triple: Triple,
    per_strategy: HashMap<SearchStrategy, f32>,
}

fn accumulate(
    by_identity: &mut HashMap<String, FusionInput>,
    strategy: SearchStrategy,
    matches: Vec<TripleMatch>,
) {
    let n = matches.len();
    for (i, m) in matches.into_iter().enumerate() {
        let position_score = (n - i) as f32 / n as f32;
        let id = m.triple.identity();
        let entry = by_identity.entry(id).or_insert_with(|| FusionInput {
            triple: m.triple.clone(),
            per_strategy: HashMap::new(),
        });
        entry.per_strategy.insert(strategy, position_score);
    }
}
