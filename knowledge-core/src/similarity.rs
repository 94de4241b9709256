//! Cosine similarity over raw (unnormalized) vectors.
//!
//! Spec.md §4.2 is explicit that similarity is computed on raw vectors —
//! unlike some embedding-similarity helpers, this does **not** remap the
//! `[-1, 1]` cosine range into `[0, 1]`, since `min_score`/`similarity_threshold`
//! are spec'd against the raw cosine value.

/// Cosine similarity between `a` and `b`, in `[-1, 1]`.
///
/// Returns `0.0` if the vectors differ in length, are empty, or either has
/// zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_are_maximally_similar() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_score_minus_one() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    proptest::proptest! {
        /// spec.md §8 property 7 relies on cosine similarity staying within
        /// `[-1, 1]`; fuzz arbitrary equal-length vectors to confirm the
        /// bound holds everywhere, not just on the hand-picked cases above.
        #[test]
        fn score_stays_within_unit_range(
            a in proptest::collection::vec(-100.0f32..100.0, 1..8),
            b in proptest::collection::vec(-100.0f32..100.0, 1..8),
        ) {
            let len = a.len().min(b.len());
            let score = cosine_similarity(&a[..len], &b[..len]);
            proptest::prop_assert!(score >= -1.000_1 && score <= 1.000_1);
        }

        #[test]
        fn nonzero_vector_is_maximally_similar_to_itself(
            v in proptest::collection::vec(-100.0f32..100.0, 1..8)
                .prop_filter("needs nonzero magnitude", |v| v.iter().any(|x| *x != 0.0)),
        ) {
            let score = cosine_similarity(&v, &v);
            proptest::prop_assert!((score - 1.0).abs() < 1e-3);
        }
    }
}
