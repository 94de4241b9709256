//! Deterministic identity helpers (spec.md §3, §9).
//!
//! Identity is the base64 of a pipe-joined key. It is a stable wire format,
//! not a secret: it exists so that storing the same observation twice is a
//! trivial upsert rather than a duplicate row.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::types::{AbstractionLevel, TripleType};

fn level_tag(level: AbstractionLevel) -> &'static str {
    match level {
        AbstractionLevel::High => "HIGH",
        AbstractionLevel::Medium => "MEDIUM",
        AbstractionLevel::Low => "LOW",
    }
}

fn type_tag(t: TripleType) -> &'static str {
    match t {
        TripleType::EntityEntity => "ENTITY_ENTITY",
        TripleType::EntityEvent => "ENTITY_EVENT",
        TripleType::EventEvent => "EVENT_EVENT",
        TripleType::EmotionalContext => "EMOTIONAL_CONTEXT",
    }
}

/// Deterministic triple identity: base64 of `subject|predicate|object|type`.
#[must_use]
pub fn triple_id(subject: &str, predicate: &str, object: &str, r#type: TripleType) -> String {
    let key = format!("{subject}|{predicate}|{object}|{}", type_tag(r#type));
    STANDARD.encode(key)
}

/// Deterministic concept identity: base64 of `concept|level|source`.
#[must_use]
pub fn concept_id(concept: &str, level: AbstractionLevel, source: &str) -> String {
    let key = format!("{concept}|{}|{source}", level_tag(level));
    STANDARD.encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triple_id_is_stable_and_order_sensitive() {
        let a = triple_id("John", "works at", "Tech Corp", TripleType::EntityEntity);
        let b = triple_id("John", "works at", "Tech Corp", TripleType::EntityEntity);
        assert_eq!(a, b);

        let c = triple_id("Tech Corp", "works at", "John", TripleType::EntityEntity);
        assert_ne!(a, c);
    }

    #[test]
    fn triple_id_distinguishes_type() {
        let a = triple_id("John", "met", "Mary", TripleType::EntityEntity);
        let b = triple_id("John", "met", "Mary", TripleType::EntityEvent);
        assert_ne!(a, b);
    }

    #[test]
    fn concept_id_is_stable() {
        let a = concept_id("Technology Industry", AbstractionLevel::High, "doc-1");
        let b = concept_id("Technology Industry", AbstractionLevel::High, "doc-1");
        assert_eq!(a, b);
    }
}
