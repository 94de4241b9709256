//! # Embedding Map
//!
//! A job-local, build-once table from text to its embedding vector
//! (spec.md §4.4). Real workloads re-use the same handful of entities
//! and predicates across many triples; collecting the universe of texts
//! first and embedding each exactly once routinely cuts embedder calls
//! by 70-80% versus embedding at every use site.

use std::collections::{HashMap, HashSet};

use crate::collaborators::Embedder;
use crate::types::{Concept, Triple};
use crate::Result;

/// Statistics describing how much deduplication the map achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingMapStats {
    /// Total text occurrences considered (4 per triple + 1 per concept).
    pub total_texts: usize,
    /// Distinct texts actually embedded.
    pub unique_texts: usize,
    /// `total_texts - unique_texts`: embedder calls averted.
    pub duplicates_averted: usize,
    /// Number of `embed_batch` calls made.
    pub batch_calls: usize,
}

impl EmbeddingMapStats {
    /// Fraction of embedder calls averted by deduplication, in `[0, 1]`.
    #[must_use]
    pub fn efficiency(&self) -> f64 {
        if self.total_texts == 0 {
            return 0.0;
        }
        self.duplicates_averted as f64 / self.total_texts as f64
    }
}

/// A job-scoped `text -> embedding` table, never cached across jobs.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingMap {
    embeddings: HashMap<String, Vec<f32>>,
    stats: EmbeddingMapStats,
}

impl EmbeddingMap {
    /// The embedding for `text`, if it was part of the universe this map
    /// was built from.
    #[must_use]
    pub fn get(&self, text: &str) -> Option<&Vec<f32>> {
        self.embeddings.get(text)
    }

    /// Statistics about how much work the build step averted.
    #[must_use]
    pub fn stats(&self) -> EmbeddingMapStats {
        self.stats
    }

    /// Number of distinct embeddings held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Collect every subject, object, predicate, full-semantic text
/// (`"{s} {p} {o}"`), and (if `include_concepts`) concept name across
/// `triples`/`concepts` exactly once, then batch-embed the universe.
///
/// # Errors
///
/// Returns [`crate::Error::EmbeddingGeneration`] if any batch fails; the
/// whole operation aborts (spec.md §4.4).
pub async fn generate_embedding_map(
    triples: &[Triple],
    concepts: &[Concept],
    embedder: &dyn Embedder,
    batch_size: usize,
    include_concepts: bool,
) -> Result<EmbeddingMap> {
    let mut universe: HashSet<String> = HashSet::new();
    let mut total_texts = 0usize;

    for triple in triples {
        for text in [
            triple.subject.clone(),
            triple.object.clone(),
            triple.predicate.clone(),
            triple.semantic_text(),
        ] {
            total_texts += 1;
            universe.insert(text);
        }
    }

    if include_concepts {
        for concept in concepts {
            total_texts += 1;
            universe.insert(concept.concept.clone());
        }
    }

    let unique_texts = universe.len();
    let mut ordered: Vec<String> = universe.into_iter().collect();
    ordered.sort();

    let batch_size = batch_size.max(1);
    let mut embeddings = HashMap::with_capacity(unique_texts);
    let mut batch_calls = 0usize;

    for batch in ordered.chunks(batch_size) {
        let vectors = embedder.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(crate::Error::EmbeddingGeneration(format!(
                "embedder returned {} vectors for a batch of {}",
                vectors.len(),
                batch.len()
            )));
        }
        batch_calls += 1;
        for (text, vector) in batch.iter().zip(vectors) {
            embeddings.insert(text.clone(), vector);
        }
    }

    Ok(EmbeddingMap {
        embeddings,
        stats: EmbeddingMapStats {
            total_texts,
            unique_texts,
            duplicates_averted: total_texts.saturating_sub(unique_texts),
            batch_calls,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AbstractionLevel, TripleType};
    use chrono::Utc;

    fn triple(subject: &str, predicate: &str, object: &str) -> Triple {
        Triple {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            r#type: TripleType::EntityEntity,
            source: "doc-1".into(),
            source_type: "document".into(),
            source_date: None,
            extracted_at: Utc::now(),
            confidence: 0.9,
            processing_batch_id: None,
        }
    }

    struct FakeEmbedder;

    #[async_trait::async_trait]
    impl Embedder for FakeEmbedder {
        fn dimension(&self) -> usize {
            4
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 4])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn deduplicates_repeated_entities_across_triples() {
        // Five predicates x same twenty entities is the real-world shape;
        // here, two triples sharing predicate and object.
        let triples = vec![
            triple("Alice", "works at", "Acme"),
            triple("Bob", "works at", "Acme"),
        ];

        let map = generate_embedding_map(&triples, &[], &FakeEmbedder, 32, true)
            .await
            .unwrap();

        // subject,predicate,object,semantic per triple = 8 occurrences total,
        // but "works at" and "Acme" are shared => 6 unique texts.
        let stats = map.stats();
        assert_eq!(stats.total_texts, 8);
        assert_eq!(stats.unique_texts, 6);
        assert_eq!(stats.duplicates_averted, 2);
        assert!(map.get("Acme").is_some());
        assert!(map.get("works at").is_some());
    }

    #[tokio::test]
    async fn empty_input_yields_empty_map() {
        let map = generate_embedding_map(&[], &[], &FakeEmbedder, 32, true)
            .await
            .unwrap();
        assert!(map.is_empty());
        assert_eq!(map.stats().total_texts, 0);
    }

    #[tokio::test]
    async fn includes_concepts_only_when_requested() {
        let concepts = vec![Concept {
            concept: "Technology".into(),
            abstraction_level: AbstractionLevel::High,
            confidence: 0.8,
            source: "doc-1".into(),
            source_type: "document".into(),
            extracted_at: Utc::now(),
        }];

        let with_concepts = generate_embedding_map(&[], &concepts, &FakeEmbedder, 32, true)
            .await
            .unwrap();
        assert_eq!(with_concepts.stats().total_texts, 1);

        let without_concepts = generate_embedding_map(&[], &concepts, &FakeEmbedder, 32, false)
            .await
            .unwrap();
        assert_eq!(without_concepts.stats().total_texts, 0);
    }
}
