//! # Deduplicator
//!
//! Two-pass merge over a batch of triples (spec.md §4.6): an exact pass
//! keyed by identity, then an optional semantic pass over the survivors.
//! Both passes converge on the same merge rule — keep the higher
//! confidence, the later `extracted_at` — so a caller can treat the
//! result as "one row per distinct fact" regardless of which pass caught
//! the duplicate.

use std::collections::HashMap;

use crate::embedding_map::EmbeddingMap;
use crate::similarity::cosine_similarity;
use crate::types::Triple;

/// Which pass produced a given merge, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// Collapsed because two triples shared an identity key exactly.
    Exact,
    /// Collapsed because two triples' semantic vectors exceeded the
    /// similarity threshold.
    Semantic,
}

/// A record of one duplicate absorbed into a representative.
#[derive(Debug, Clone)]
pub struct MergedMetadata {
    /// Identity of the triple that survived.
    pub representative_id: String,
    /// Identity of the triple that was absorbed.
    pub duplicate_id: String,
    /// Which pass performed the merge.
    pub kind: MergeKind,
}

/// Output of [`deduplicate`].
#[derive(Debug, Clone, Default)]
pub struct DeduplicationResult {
    /// Surviving triples, in representative insertion order.
    pub unique_triples: Vec<Triple>,
    /// Count of triples absorbed across both passes.
    pub duplicates_removed: usize,
    /// One entry per absorbed duplicate.
    pub merged_metadata: Vec<MergedMetadata>,
}

fn merge_confidence_and_date(representative: &mut Triple, duplicate: &Triple) {
    representative.confidence = representative.confidence.max(duplicate.confidence);
    if duplicate.extracted_at > representative.extracted_at {
        representative.extracted_at = duplicate.extracted_at;
    }
}

/// Deduplicate `triples` by exact identity, then (if `embedding_map` is
/// given and `similarity_threshold` is enabled) by pairwise semantic
/// similarity of their `"{s} {p} {o}"` vectors.
///
/// Triples without a vector in `embedding_map` pass through the semantic
/// pass untouched (spec.md §4.6 step 2).
#[must_use]
pub fn deduplicate(
    triples: Vec<Triple>,
    embedding_map: Option<&EmbeddingMap>,
    similarity_threshold: f32,
) -> DeduplicationResult {
    let (mut representatives, mut merged) = exact_pass(triples);
    let mut duplicates_removed = merged.len();

    if let Some(map) = embedding_map {
        let (semantic_survivors, semantic_merges) =
            semantic_pass(representatives, map, similarity_threshold);
        duplicates_removed += semantic_merges.len();
        merged.extend(semantic_merges);
        representatives = semantic_survivors;
    }

    DeduplicationResult {
        unique_triples: representatives,
        duplicates_removed,
        merged_metadata: merged,
    }
}

fn exact_pass(triples: Vec<Triple>) -> (Vec<Triple>, Vec<MergedMetadata>) {
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut representatives: Vec<Triple> = Vec::new();
    let mut merged = Vec::new();

    for triple in triples {
        let key = triple.identity();
        if let Some(&idx) = by_key.get(&key) {
            let duplicate_id = triple.identity();
            merge_confidence_and_date(&mut representatives[idx], &triple);
            merged.push(MergedMetadata {
                representative_id: representatives[idx].identity(),
                duplicate_id,
                kind: MergeKind::Exact,
            });
        } else {
            by_key.insert(key, representatives.len());
            representatives.push(triple);
        }
    }

    (representatives, merged)
}

fn semantic_pass(
    triples: Vec<Triple>,
    embedding_map: &EmbeddingMap,
    threshold: f32,
) -> (Vec<Triple>, Vec<MergedMetadata>) {
    let mut representatives: Vec<Triple> = Vec::new();
    let mut merged = Vec::new();
    let mut absorbed = vec![false; triples.len()];

    for i in 0..triples.len() {
        if absorbed[i] {
            continue;
        }
        let mut representative = triples[i].clone();
        let rep_vector = embedding_map.get(&representative.semantic_text()).cloned();

        if let Some(rep_vector) = rep_vector {
            for j in (i + 1)..triples.len() {
                if absorbed[j] {
                    continue;
                }
                let Some(candidate_vector) = embedding_map.get(&triples[j].semantic_text()) else {
                    continue;
                };
                if cosine_similarity(&rep_vector, candidate_vector) >= threshold {
                    absorbed[j] = true;
                    merge_confidence_and_date(&mut representative, &triples[j]);
                    merged.push(MergedMetadata {
                        representative_id: representative.identity(),
                        duplicate_id: triples[j].identity(),
                        kind: MergeKind::Semantic,
                    });
                }
            }
        }

        representatives.push(representative);
    }

    (representatives, merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TripleType;
    use chrono::{Duration, Utc};

    fn triple(subject: &str, predicate: &str, object: &str, confidence: f32) -> Triple {
        Triple {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            r#type: TripleType::EntityEntity,
            source: "doc-1".into(),
            source_type: "document".into(),
            source_date: None,
            extracted_at: Utc::now(),
            confidence,
            processing_batch_id: None,
        }
    }

    #[test]
    fn exact_duplicates_merge_keeping_higher_confidence() {
        let a = triple("Alice", "works at", "Acme", 0.6);
        let b = triple("Alice", "works at", "Acme", 0.9);

        let result = deduplicate(vec![a, b], None, 0.85);
        assert_eq!(result.unique_triples.len(), 1);
        assert_eq!(result.duplicates_removed, 1);
        assert!((result.unique_triples[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn exact_duplicates_keep_the_later_extracted_at() {
        let mut a = triple("Alice", "works at", "Acme", 0.9);
        a.extracted_at = Utc::now() - Duration::days(1);
        let b = triple("Alice", "works at", "Acme", 0.5);

        let result = deduplicate(vec![a.clone(), b.clone()], None, 0.85);
        assert_eq!(result.unique_triples[0].extracted_at, b.extracted_at);
    }

    #[test]
    fn distinct_triples_are_untouched() {
        let a = triple("Alice", "works at", "Acme", 0.9);
        let b = triple("Bob", "works at", "Other Co", 0.9);
        let result = deduplicate(vec![a, b], None, 0.85);
        assert_eq!(result.unique_triples.len(), 2);
        assert_eq!(result.duplicates_removed, 0);
    }

    #[tokio::test]
    async fn semantic_pass_merges_near_duplicate_vectors() {
        use crate::collaborators::Embedder;
        use crate::Result;

        struct SameVectorEmbedder;
        #[async_trait::async_trait]
        impl Embedder for SameVectorEmbedder {
            fn dimension(&self) -> usize {
                3
            }
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Ok(vec![1.0, 0.0, 0.0])
            }
            async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
            }
        }

        let a = triple("Alice", "works at", "Acme Corp", 0.7);
        let b = triple("Alice", "is employed by", "Acme Corporation", 0.8);

        let map = crate::embedding_map::generate_embedding_map(
            &[a.clone(), b.clone()],
            &[],
            &SameVectorEmbedder,
            32,
            false,
        )
        .await
        .unwrap();

        let result = deduplicate(vec![a, b], Some(&map), 0.85);
        assert_eq!(result.unique_triples.len(), 1);
        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.merged_metadata[0].kind, MergeKind::Semantic);
    }

    proptest::proptest! {
        /// spec.md §8 property 3: merging two identical triples never grows
        /// the unique count, and the survivor takes the max confidence and
        /// the later `extracted_at`.
        #[test]
        fn exact_duplicate_merge_keeps_max_confidence_and_latest_date(
            confidence_a in 0.0f32..=1.0,
            confidence_b in 0.0f32..=1.0,
            offset_seconds in -100_000i64..100_000,
        ) {
            let mut a = triple("Alice", "works at", "Acme", confidence_a);
            let mut b = triple("Alice", "works at", "Acme", confidence_b);
            b.extracted_at = a.extracted_at + Duration::seconds(offset_seconds);
            let (expected_confidence, expected_date) = (
                confidence_a.max(confidence_b),
                a.extracted_at.max(b.extracted_at),
            );

            let result = deduplicate(vec![a, b], None, 0.85);

            proptest::prop_assert_eq!(result.unique_triples.len(), 1);
            proptest::prop_assert_eq!(result.duplicates_removed, 1);
            proptest::prop_assert!(
                (result.unique_triples[0].confidence - expected_confidence).abs() < 1e-6
            );
            proptest::prop_assert_eq!(result.unique_triples[0].extracted_at, expected_date);
        }

        /// spec.md §8 property 7: after the semantic pass, any two surviving
        /// representatives have cosine similarity strictly below the
        /// configured threshold — here, two triples merge iff their vectors'
        /// similarity meets the threshold, and never merge otherwise.
        #[test]
        fn semantic_pass_only_merges_at_or_above_threshold(
            vector_a in proptest::collection::vec(-1.0f32..1.0, 3),
            vector_b in proptest::collection::vec(-1.0f32..1.0, 3),
            threshold in 0.1f32..0.99,
        ) {
            use crate::collaborators::Embedder;

            struct FixedEmbedder {
                a: Vec<f32>,
                b: Vec<f32>,
            }
            #[async_trait::async_trait]
            impl Embedder for FixedEmbedder {
                fn dimension(&self) -> usize {
                    3
                }
                async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
                    Ok(if text.starts_with("Alice works at") { self.a.clone() } else { self.b.clone() })
                }
                async fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
                    let mut out = Vec::with_capacity(texts.len());
                    for t in texts {
                        out.push(self.embed(t).await?);
                    }
                    Ok(out)
                }
            }

            let a = triple("Alice", "works at", "Acme Corp", 0.7);
            let b = triple("Alice", "is employed by", "Acme Corporation", 0.8);
            let embedder = FixedEmbedder { a: vector_a.clone(), b: vector_b.clone() };

            let rt = tokio::runtime::Runtime::new().unwrap();
            let map = rt
                .block_on(crate::embedding_map::generate_embedding_map(
                    &[a.clone(), b.clone()],
                    &[],
                    &embedder,
                    32,
                    false,
                ))
                .unwrap();

            let similarity = crate::similarity::cosine_similarity(&vector_a, &vector_b);
            let result = deduplicate(vec![a, b], Some(&map), threshold);

            if similarity >= threshold {
                proptest::prop_assert_eq!(result.unique_triples.len(), 1);
            } else {
                proptest::prop_assert_eq!(result.unique_triples.len(), 2);
            }
        }
    }
}
