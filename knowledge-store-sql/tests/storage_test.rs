//! End-to-end storage tests against an ephemeral libSQL database.

use chrono::Utc;
use knowledge_core::store::{SearchFilter, StoreAdapter};
use knowledge_core::types::{Triple, TripleType, VectorEmbedding, VectorType};
use knowledge_store_sql::{KnowledgeSqlStore, SqlStoreConfig};
use tempfile::TempDir;

async fn test_store() -> (KnowledgeSqlStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("test.db");
    let db = libsql::Builder::new_local(&db_path).build().await.unwrap();

    let store = KnowledgeSqlStore::from_database(db, SqlStoreConfig::default())
        .await
        .unwrap();
    store.initialize_schema().await.unwrap();
    (store, dir)
}

fn triple(subject: &str, predicate: &str, object: &str) -> Triple {
    Triple {
        subject: subject.to_string(),
        predicate: predicate.to_string(),
        object: object.to_string(),
        r#type: TripleType::EntityEntity,
        source: "doc-1".to_string(),
        source_type: "document".to_string(),
        source_date: None,
        extracted_at: Utc::now(),
        confidence: 0.9,
        processing_batch_id: None,
    }
}

#[tokio::test]
async fn store_triples_is_idempotent_and_merges_confidence() {
    let (store, _dir) = test_store().await;
    let t = triple("Alice", "knows", "Bob");

    let first = store.store_triples(&[t.clone()]).await.unwrap();
    assert_eq!(first.triples_stored, 1);
    assert_eq!(first.duplicates_skipped, 0);

    let mut higher_confidence = t.clone();
    higher_confidence.confidence = 0.99;
    let second = store.store_triples(&[higher_confidence]).await.unwrap();
    assert_eq!(second.triples_stored, 0);
    assert_eq!(second.duplicates_skipped, 1);

    let all = store.get_all_triples().await.unwrap();
    assert_eq!(all.len(), 1);
    assert!((all[0].confidence - 0.99).abs() < f32::EPSILON);
}

#[tokio::test]
async fn search_by_embedding_ranks_by_cosine_similarity() {
    let (store, _dir) = test_store().await;

    let close = triple("Alice", "knows", "Bob");
    let far = triple("Carol", "knows", "Dave");
    store
        .store_triples(&[close.clone(), far.clone()])
        .await
        .unwrap();

    store
        .store_vectors(&[
            VectorEmbedding {
                vector_type: VectorType::Semantic,
                text: "Alice knows Bob".to_string(),
                embedding: vec![1.0, 0.0, 0.0],
                knowledge_triple_id: Some(close.identity()),
                concept_node_id: None,
            },
            VectorEmbedding {
                vector_type: VectorType::Semantic,
                text: "Carol knows Dave".to_string(),
                embedding: vec![0.0, 1.0, 0.0],
                knowledge_triple_id: Some(far.identity()),
                concept_node_id: None,
            },
        ])
        .await
        .unwrap();

    let results = store
        .search_by_embedding(
            VectorType::Semantic,
            &[1.0, 0.0, 0.0],
            10,
            0.0,
            &SearchFilter::default(),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].triple.identity(), close.identity());
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn search_by_embedding_applies_source_filter() {
    let (store, _dir) = test_store().await;

    let mut other_source = triple("Alice", "knows", "Bob");
    other_source.source = "doc-2".to_string();
    store.store_triples(&[other_source.clone()]).await.unwrap();
    store
        .store_vectors(&[VectorEmbedding {
            vector_type: VectorType::Semantic,
            text: "Alice knows Bob".to_string(),
            embedding: vec![1.0, 0.0],
            knowledge_triple_id: Some(other_source.identity()),
            concept_node_id: None,
        }])
        .await
        .unwrap();

    let filter = SearchFilter {
        sources: Some(vec!["doc-1".to_string()]),
        ..Default::default()
    };
    let results = store
        .search_by_embedding(VectorType::Semantic, &[1.0, 0.0], 10, 0.0, &filter)
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn delete_triples_cascades_owning_vectors() {
    let (store, _dir) = test_store().await;
    let t = triple("Alice", "knows", "Bob");
    store.store_triples(&[t.clone()]).await.unwrap();
    store
        .store_vectors(&[VectorEmbedding {
            vector_type: VectorType::Semantic,
            text: "Alice knows Bob".to_string(),
            embedding: vec![1.0, 0.0],
            knowledge_triple_id: Some(t.identity()),
            concept_node_id: None,
        }])
        .await
        .unwrap();

    let deleted = store.delete_triples(&[t.identity()]).await.unwrap();
    assert_eq!(deleted, 1);

    let results = store
        .search_by_embedding(
            VectorType::Semantic,
            &[1.0, 0.0],
            10,
            0.0,
            &SearchFilter::default(),
        )
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn search_by_entity_falls_back_to_substring_match() {
    let (store, _dir) = test_store().await;
    store
        .store_triples(&[triple("Alice", "knows", "Bob")])
        .await
        .unwrap();

    let results = store
        .search_by_entity("Ali", 10, &SearchFilter::default())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!((results[0].score - 1.0).abs() < f32::EPSILON);
}
