//! Database schema definitions for the libSQL storage backend.

/// SQL to create the triples table. `id` is the deterministic identity from
/// [`knowledge_core::types::Triple::identity`].
pub const CREATE_TRIPLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS triples (
    id TEXT PRIMARY KEY NOT NULL,
    subject TEXT NOT NULL,
    predicate TEXT NOT NULL,
    object TEXT NOT NULL,
    triple_type TEXT NOT NULL,
    source TEXT NOT NULL,
    source_type TEXT NOT NULL,
    source_date INTEGER,
    extracted_at INTEGER NOT NULL,
    confidence REAL NOT NULL,
    processing_batch_id TEXT
)
"#;

/// SQL to create the concepts table.
pub const CREATE_CONCEPTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS concepts (
    id TEXT PRIMARY KEY NOT NULL,
    concept TEXT NOT NULL,
    abstraction_level TEXT NOT NULL,
    confidence REAL NOT NULL,
    source TEXT NOT NULL,
    source_type TEXT NOT NULL,
    extracted_at INTEGER NOT NULL
)
"#;

/// SQL to create the conceptualization_links table. Links reference concepts
/// and triples by value, not by foreign key (spec.md §3: element renames are
/// not supported, so there is nothing to cascade against).
pub const CREATE_CONCEPTUALIZATION_LINKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS conceptualization_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_element TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    concept TEXT NOT NULL,
    confidence REAL NOT NULL,
    context_triples TEXT NOT NULL,
    source TEXT NOT NULL,
    source_type TEXT NOT NULL,
    extracted_at INTEGER NOT NULL
)
"#;

/// SQL to create the unified vector_embeddings table (spec.md §6.1: a
/// single table discriminated by `vector_type`). Vectors are owned by
/// exactly one of `knowledge_triple_id`/`concept_node_id`, and cascade on
/// delete of the owning row (spec.md §3).
pub const CREATE_VECTOR_EMBEDDINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS vector_embeddings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    vector_type TEXT NOT NULL,
    text TEXT NOT NULL,
    embedding TEXT NOT NULL,
    knowledge_triple_id TEXT REFERENCES triples(id) ON DELETE CASCADE,
    concept_node_id TEXT REFERENCES concepts(id) ON DELETE CASCADE
)
"#;

/// SQL to create the jobs table backing both [`knowledge_core::job_store::JobStore`]
/// and the triple/concept/vector-facing [`knowledge_core::store::StoreAdapter`] half.
pub const CREATE_JOBS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY NOT NULL,
    job_type TEXT NOT NULL,
    parent_job_id TEXT,
    stage TEXT,
    text TEXT NOT NULL,
    metadata TEXT NOT NULL,
    status TEXT NOT NULL,
    progress INTEGER NOT NULL,
    result TEXT,
    error_message TEXT,
    created_at INTEGER NOT NULL,
    started_at INTEGER,
    completed_at INTEGER
)
"#;

/// Index supporting `get_triples_by_source`'s prefix scan.
pub const CREATE_TRIPLES_SOURCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_triples_source
ON triples(source, source_type)
"#;

/// Index supporting `get_triple_count_by_type`.
pub const CREATE_TRIPLES_TYPE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_triples_type
ON triples(triple_type)
"#;

/// Index supporting `concepts_exist_for_source`.
pub const CREATE_CONCEPTS_SOURCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_concepts_source
ON concepts(source, source_type)
"#;

/// Index supporting `get_conceptualizations_by_concept`.
pub const CREATE_CONCEPTUALIZATION_LINKS_CONCEPT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_conceptualization_links_concept
ON conceptualization_links(concept)
"#;

/// Index narrowing the brute-force cosine scan to one vector type at a time.
pub const CREATE_VECTOR_EMBEDDINGS_TYPE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_vector_embeddings_type
ON vector_embeddings(vector_type)
"#;

/// Index supporting `get_job_by_stage`/`get_children`.
pub const CREATE_JOBS_PARENT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_jobs_parent
ON jobs(parent_job_id, stage)
"#;

/// Every `CREATE TABLE`/`CREATE INDEX` statement, in dependency order
/// (tables before the indexes that reference them).
pub const ALL_STATEMENTS: &[&str] = &[
    CREATE_TRIPLES_TABLE,
    CREATE_CONCEPTS_TABLE,
    CREATE_CONCEPTUALIZATION_LINKS_TABLE,
    CREATE_VECTOR_EMBEDDINGS_TABLE,
    CREATE_JOBS_TABLE,
    CREATE_TRIPLES_SOURCE_INDEX,
    CREATE_TRIPLES_TYPE_INDEX,
    CREATE_CONCEPTS_SOURCE_INDEX,
    CREATE_CONCEPTUALIZATION_LINKS_CONCEPT_INDEX,
    CREATE_VECTOR_EMBEDDINGS_TYPE_INDEX,
    CREATE_JOBS_PARENT_INDEX,
];
