//! Rank fusion with a diversity boost (spec.md §4.7 step 4).
//!
//! `fusion = Σ(score_s × weight_s) / Σ(weight_s)` over strategies that
//! actually matched this triple, then boosted by
//! `×(1 + 0.2 × log(1 + k) / log 5)` where `k` is the number of strategies
//! that matched. A triple three strategies agree on should outrank one a
//! single strategy rates higher, within reason.

use std::collections::HashMap;

use crate::constants::DIVERSITY_BOOST_SCALE;

use super::{FusionInput, FusionResult, SearchStrategy, StrategyScores};

/// A single strategy's position score for one triple — exposed for callers
/// that want to verify the diversity-boost formula directly in tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionScored {
    /// The strategy that produced this score.
    pub strategy: SearchStrategy,
    /// The `(N - i) / N` position score.
    pub score: f32,
}

fn diversity_boost(k: usize) -> f32 {
    1.0 + DIVERSITY_BOOST_SCALE * ((1.0 + k as f32).ln() / 5f32.ln())
}

pub(super) fn fuse(
    by_identity: HashMap<String, FusionInput>,
    weights: &HashMap<SearchStrategy, f32>,
    top_k: usize,
) -> Vec<FusionResult> {
    let mut results: Vec<FusionResult> = by_identity
        .into_values()
        .map(|input| {
            let mut weighted_sum = 0.0f32;
            let mut weight_total = 0.0f32;
            for (strategy, score) in &input.per_strategy {
                let weight = weights.get(strategy).copied().unwrap_or(0.0);
                weighted_sum += score * weight;
                weight_total += weight;
            }
            let base = if weight_total > 0.0 {
                weighted_sum / weight_total
            } else {
                0.0
            };
            let k = input.per_strategy.len();
            let fusion = base * diversity_boost(k);

            let scores = StrategyScores {
                entity: input.per_strategy.get(&SearchStrategy::Entity).copied(),
                relationship: input.per_strategy.get(&SearchStrategy::Relationship).copied(),
                semantic: input.per_strategy.get(&SearchStrategy::Semantic).copied(),
                concept: input.per_strategy.get(&SearchStrategy::Concept).copied(),
                fusion,
            };

            let mut search_types: Vec<String> =
                input.per_strategy.keys().map(|s| s.label().to_string()).collect();
            search_types.sort();

            FusionResult {
                triple: input.triple,
                scores,
                search_types,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.scores
            .fusion
            .partial_cmp(&a.scores.fusion)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TripleType;
    use chrono::Utc;

    fn triple(subject: &str) -> crate::types::Triple {
        crate::types::Triple {
            subject: subject.to_string(),
            predicate: "p".into(),
            object: "o".into(),
            r#type: TripleType::EntityEntity,
            source: "doc-1".into(),
            source_type: "document".into(),
            source_date: None,
            extracted_at: Utc::now(),
            confidence: 0.9,
            processing_batch_id: None,
        }
    }

    fn weights() -> HashMap<SearchStrategy, f32> {
        let mut w = HashMap::new();
        w.insert(SearchStrategy::Entity, 0.3);
        w.insert(SearchStrategy::Relationship, 0.2);
        w.insert(SearchStrategy::Semantic, 0.3);
        w.insert(SearchStrategy::Concept, 0.2);
        w
    }

    #[test]
    fn a_triple_matched_by_more_strategies_outranks_a_single_strategy_hit() {
        let mut by_identity = HashMap::new();

        let mut multi = HashMap::new();
        multi.insert(SearchStrategy::Entity, 0.6);
        multi.insert(SearchStrategy::Semantic, 0.6);
        by_identity.insert(
            "multi".to_string(),
            FusionInput {
                triple: triple("multi"),
                per_strategy: multi,
            },
        );

        let mut single = HashMap::new();
        single.insert(SearchStrategy::Entity, 0.65);
        by_identity.insert(
            "single".to_string(),
            FusionInput {
                triple: triple("single"),
                per_strategy: single,
            },
        );

        let results = fuse(by_identity, &weights(), 10);
        assert_eq!(results[0].triple.subject, "multi");
    }

    #[test]
    fn diversity_boost_grows_with_strategy_count_and_caps_reasonably() {
        assert!((diversity_boost(1) - 1.0).abs() < 1e-6);
        assert!(diversity_boost(2) > diversity_boost(1));
        assert!(diversity_boost(4) > diversity_boost(2));
    }

    #[test]
    fn results_are_truncated_to_top_k() {
        let mut by_identity = HashMap::new();
        for i in 0..5 {
            let mut scores = HashMap::new();
            scores.insert(SearchStrategy::Entity, 0.5);
            by_identity.insert(
                format!("t{i}"),
                FusionInput {
                    triple: triple(&format!("t{i}")),
                    per_strategy: scores,
                },
            );
        }
        let results = fuse(by_identity, &weights(), 2);
        assert_eq!(results.len(), 2);
    }
}
