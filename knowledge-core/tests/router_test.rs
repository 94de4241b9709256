//! End-to-end router dispatch over `test-support`'s in-memory fakes:
//! ingest -> extraction -> scheduled concept generation -> fusion search.

use std::sync::Arc;

use knowledge_core::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use knowledge_core::config::{PipelineConfig, SearchConfig};
use knowledge_core::coordinator::{Coordinator, InitiatePipelineArgs};
use knowledge_core::handlers::{ConceptHandler, DedupHandler, ExtractionHandler, Router};
use knowledge_core::job_store::JobStore;
use knowledge_core::search::{FusionSearch, SearchOptions};
use knowledge_core::types::JobStage;
use test_support::{FakeEmbedder, FakeOracleClient, FakeTaskQueue, InMemoryStoreAdapter};

fn extraction_response() -> serde_json::Value {
    serde_json::json!({
        "triples": [{
            "subject": "Alice",
            "predicate": "works at",
            "object": "Acme",
            "type": "ENTITY_ENTITY",
            "confidence": 0.95
        }]
    })
}

fn concepts_response() -> serde_json::Value {
    serde_json::json!({
        "concepts": [{"concept": "Employment", "abstraction_level": "MEDIUM", "confidence": 0.8}],
        "relationships": [{
            "source_element": "Alice",
            "entity_type": "ENTITY",
            "concept": "Employment",
            "confidence": 0.8
        }]
    })
}

#[tokio::test]
async fn ingest_then_search_round_trips_through_the_router() {
    let store = Arc::new(InMemoryStoreAdapter::new());
    let oracle = Arc::new(
        FakeOracleClient::new()
            .with_object(extraction_response())
            .with_object(concepts_response()),
    );
    let embedder = Arc::new(FakeEmbedder::new(16));
    let queue = Arc::new(FakeTaskQueue::new());

    let pipeline_config = PipelineConfig::default();
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        pipeline_config.clone(),
    ));

    let extraction = ExtractionHandler::new(
        Arc::clone(&store),
        Arc::clone(&oracle),
        Arc::clone(&embedder),
        Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default())),
        Arc::clone(&coordinator),
        pipeline_config.clone(),
    );
    let concepts = ConceptHandler::new(Arc::clone(&store), Arc::clone(&oracle));
    let dedup = DedupHandler::new(Arc::clone(&store), Arc::clone(&embedder), pipeline_config);
    let router = Router::new(Arc::clone(&store), extraction, concepts, dedup);

    let parent_id = coordinator
        .initiate_pipeline(InitiatePipelineArgs {
            text: "Alice works at Acme.".to_string(),
            source: "doc-1".to_string(),
            source_type: "document".to_string(),
            source_date: None,
            resource_limits: None,
        })
        .await
        .unwrap();

    let extraction_job = store
        .get_job_by_stage(parent_id, JobStage::Extraction)
        .await
        .unwrap()
        .expect("coordinator always creates the EXTRACTION child");
    let extraction_result = router.route(extraction_job.id).await.unwrap();
    assert!(extraction_result.success, "{:?}", extraction_result.error);

    let enqueued = queue.enqueued_jobs();
    assert_eq!(enqueued.len(), 1, "only GENERATE_CONCEPTS, dedup is opt-in");
    for job_id in enqueued {
        let result = router.route(job_id).await.unwrap();
        assert!(result.success, "{:?}", result.error);
    }

    let triples = store.get_all_triples().await.unwrap();
    assert_eq!(triples.len(), 1);
    assert_eq!(triples[0].subject, "Alice");

    let search_config = SearchConfig::default();
    let fusion = FusionSearch::new(store.as_ref(), embedder.as_ref(), &search_config);
    let results = fusion
        .search("Alice", SearchOptions::default())
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].triple.subject, "Alice");
}
