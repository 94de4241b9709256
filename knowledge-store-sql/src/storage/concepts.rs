//! Concept and conceptualization-link persistence.

use knowledge_core::types::{AbstractionLevel, Concept, ConceptualizationLink, EntityType};
use knowledge_core::Error;
use libsql::{Connection, Row};

use crate::convert::{enum_to_text, get_timestamp, text_to_enum};

pub(crate) fn row_to_concept(row: &Row) -> knowledge_core::Result<Concept> {
    let concept: String = row.get(0).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let level_str: String = row.get(1).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let confidence: f64 = row.get(2).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let source: String = row.get(3).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let source_type: String = row.get(4).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let extracted_at = get_timestamp(row, 5)?;

    Ok(Concept {
        concept,
        abstraction_level: text_to_enum::<AbstractionLevel>(&level_str)?,
        confidence: confidence as f32,
        source,
        source_type,
        extracted_at,
    })
}

const SELECT_CONCEPT_COLUMNS: &str = "concept, abstraction_level, confidence, source, source_type, extracted_at";

pub(crate) async fn store_concepts(
    conn: &Connection,
    concepts: &[Concept],
) -> knowledge_core::Result<usize> {
    let mut stored = 0;
    for concept in concepts {
        let id = concept.identity();
        conn.execute(
            r#"
            INSERT INTO concepts (id, concept, abstraction_level, confidence, source, source_type, extracted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                confidence = MAX(confidence, excluded.confidence),
                extracted_at = MAX(extracted_at, excluded.extracted_at)
            "#,
            libsql::params![
                id,
                concept.concept.clone(),
                enum_to_text(&concept.abstraction_level)?,
                f64::from(concept.confidence),
                concept.source.clone(),
                concept.source_type.clone(),
                concept.extracted_at.timestamp(),
            ],
        )
        .await
        .map_err(|e| Error::BatchStorage(format!("failed to upsert concept: {e}")))?;
        stored += 1;
    }
    Ok(stored)
}

pub(crate) async fn concepts_exist_for_source(
    conn: &Connection,
    source: &str,
    source_type: &str,
) -> knowledge_core::Result<bool> {
    let mut rows = conn
        .query(
            "SELECT 1 FROM concepts WHERE source = ? AND source_type = ? LIMIT 1",
            libsql::params![source.to_string(), source_type.to_string()],
        )
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    Ok(rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
        .is_some())
}

pub(crate) async fn get_concept_count(conn: &Connection) -> knowledge_core::Result<usize> {
    let mut rows = conn
        .query("SELECT COUNT(*) FROM concepts", ())
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    let row = rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
        .ok_or_else(|| Error::DatabaseError("COUNT(*) returned no row".to_string()))?;
    let count: i64 = row.get(0).map_err(|e| Error::DatabaseError(e.to_string()))?;
    Ok(count as usize)
}

pub(crate) async fn all_concepts(conn: &Connection) -> knowledge_core::Result<Vec<Concept>> {
    let sql = format!("SELECT {SELECT_CONCEPT_COLUMNS} FROM concepts");
    let mut rows = conn
        .query(&sql, ())
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let mut concepts = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
    {
        concepts.push(row_to_concept(&row)?);
    }
    Ok(concepts)
}

fn row_to_link(row: &Row) -> knowledge_core::Result<ConceptualizationLink> {
    let source_element: String = row.get(0).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let entity_type_str: String = row.get(1).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let concept: String = row.get(2).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let confidence: f64 = row.get(3).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let context_triples_json: String =
        row.get(4).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let source: String = row.get(5).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let source_type: String = row.get(6).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let extracted_at = get_timestamp(row, 7)?;

    Ok(ConceptualizationLink {
        source_element,
        entity_type: text_to_enum::<EntityType>(&entity_type_str)?,
        concept,
        confidence: confidence as f32,
        context_triples: serde_json::from_str(&context_triples_json).map_err(Error::Serialization)?,
        source,
        source_type,
        extracted_at,
    })
}

pub(crate) async fn store_conceptualizations(
    conn: &Connection,
    links: &[ConceptualizationLink],
) -> knowledge_core::Result<()> {
    for link in links {
        let context_triples_json =
            serde_json::to_string(&link.context_triples).map_err(Error::Serialization)?;
        conn.execute(
            r#"
            INSERT INTO conceptualization_links
                (source_element, entity_type, concept, confidence, context_triples, source, source_type, extracted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            libsql::params![
                link.source_element.clone(),
                enum_to_text(&link.entity_type)?,
                link.concept.clone(),
                f64::from(link.confidence),
                context_triples_json,
                link.source.clone(),
                link.source_type.clone(),
                link.extracted_at.timestamp(),
            ],
        )
        .await
        .map_err(|e| Error::BatchStorage(format!("failed to insert conceptualization link: {e}")))?;
    }
    Ok(())
}

pub(crate) async fn get_conceptualizations_by_concept(
    conn: &Connection,
    concept: &str,
) -> knowledge_core::Result<Vec<ConceptualizationLink>> {
    let sql = "SELECT source_element, entity_type, concept, confidence, context_triples, \
               source, source_type, extracted_at FROM conceptualization_links WHERE concept = ?";
    let mut rows = conn
        .query(sql, libsql::params![concept.to_string()])
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let mut links = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
    {
        links.push(row_to_link(&row)?);
    }
    Ok(links)
}
