//! Drives one document through the full pipeline — ingest, extraction,
//! concept generation — against a real libSQL store, then runs a fusion
//! search over the result. The oracle and embedder are fakes from
//! `test-support`; everything else is the production code path.

use std::sync::Arc;

use clap::Parser;
use knowledge_core::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use knowledge_core::config::{PipelineConfig, SearchConfig};
use knowledge_core::coordinator::{Coordinator, InitiatePipelineArgs};
use knowledge_core::handlers::{ConceptHandler, DedupHandler, ExtractionHandler, Router};
use knowledge_core::job_store::JobStore;
use knowledge_core::search::{FusionSearch, SearchOptions};
use knowledge_core::types::JobStage;
use knowledge_store_sql::{KnowledgeSqlStore, SqlStoreConfig};
use test_support::{FakeEmbedder, FakeOracleClient, FakeTaskQueue};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "knowledge-pipeline-demo")]
#[command(about = "Ingest one document and search the resulting knowledge graph")]
struct Cli {
    /// Text to ingest.
    #[arg(long, default_value = "Alice works at Acme. Acme launched Orion in March.")]
    text: String,

    /// Query to search for after ingestion.
    #[arg(long, default_value = "Alice")]
    query: String,
}

fn canned_extraction_response() -> serde_json::Value {
    serde_json::json!({
        "triples": [
            {
                "subject": "Alice",
                "predicate": "works at",
                "object": "Acme",
                "type": "ENTITY_ENTITY",
                "confidence": 0.95
            },
            {
                "subject": "Acme",
                "predicate": "launched",
                "object": "Orion",
                "type": "ENTITY_EVENT",
                "confidence": 0.9
            }
        ]
    })
}

fn canned_concepts_response() -> serde_json::Value {
    serde_json::json!({
        "concepts": [
            {"concept": "Employment", "abstraction_level": "MEDIUM", "confidence": 0.8},
            {"concept": "Product launch", "abstraction_level": "MEDIUM", "confidence": 0.8}
        ],
        "relationships": [
            {"source_element": "Alice", "entity_type": "ENTITY", "concept": "Employment", "confidence": 0.8},
            {"source_element": "Orion", "entity_type": "ENTITY", "concept": "Product launch", "confidence": 0.8}
        ]
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // A temp-file database, not `:memory:`: libSQL doesn't share an
    // in-memory database across the separate connections the pool opens.
    let db_dir = tempfile::TempDir::new()?;
    let db = libsql::Builder::new_local(db_dir.path().join("demo.db"))
        .build()
        .await?;
    let store = Arc::new(KnowledgeSqlStore::from_database(db, SqlStoreConfig::default()).await?);
    store.initialize_schema().await?;

    let oracle = Arc::new(
        FakeOracleClient::new()
            .with_object(canned_extraction_response())
            .with_object(canned_concepts_response()),
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
            text: cli.text.clone(),
            source: "demo-doc".to_string(),
            source_type: "document".to_string(),
            source_date: None,
            resource_limits: None,
        })
        .await?;
    tracing::info!(%parent_id, "pipeline initiated");

    let extraction_job = store
        .get_job_by_stage(parent_id, JobStage::Extraction)
        .await?
        .expect("coordinator always creates the EXTRACTION child");
    let extraction_result = router.route(extraction_job.id).await?;
    tracing::info!(success = extraction_result.success, "extraction stage routed");

    // Drive any jobs the extraction handler scheduled (spec.md §4.1: at
    // least the CONCEPTS child; DEDUPLICATION only if enabled).
    for job_id in queue.enqueued_jobs() {
        let result = router.route(job_id).await?;
        tracing::info!(%job_id, success = result.success, "post-processing stage routed");
    }

    let search_config = SearchConfig::default();
    let fusion = FusionSearch::new(store.as_ref(), embedder.as_ref(), &search_config);
    let results = fusion.search(&cli.query, SearchOptions::default()).await?;

    println!("search results for {:?}:", cli.query);
    for result in &results {
        println!(
            "  {} {} {} (fusion score {:.3}, via {:?})",
            result.triple.subject,
            result.triple.predicate,
            result.triple.object,
            result.scores.fusion,
            result.search_types,
        );
    }
    if results.is_empty() {
        println!("  (no matches)");
    }

    Ok(())
}
