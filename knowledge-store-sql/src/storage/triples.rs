//! Triple persistence and the prefix/type-scoped read paths.

use std::collections::HashMap;

use knowledge_core::store::BatchStoreResult;
use knowledge_core::types::{Triple, TripleType};
use knowledge_core::Error;
use libsql::{Connection, Row};

use crate::convert::{enum_to_text, get_optional_timestamp, get_timestamp, text_to_enum};

pub(crate) fn row_to_triple(row: &Row) -> knowledge_core::Result<Triple> {
    let subject: String = row.get(0).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let predicate: String = row.get(1).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let object: String = row.get(2).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let triple_type_str: String = row.get(3).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let source: String = row.get(4).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let source_type: String = row.get(5).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let source_date = get_optional_timestamp(row, 6)?;
    let extracted_at = get_timestamp(row, 7)?;
    let confidence: f64 = row.get(8).map_err(|e| Error::DatabaseError(e.to_string()))?;
    let processing_batch_id: Option<String> =
        row.get(9).map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(Triple {
        subject,
        predicate,
        object,
        r#type: text_to_enum::<TripleType>(&triple_type_str)?,
        source,
        source_type,
        source_date,
        extracted_at,
        confidence: confidence as f32,
        processing_batch_id,
    })
}

const SELECT_TRIPLE_COLUMNS: &str = "subject, predicate, object, triple_type, source, \
     source_type, source_date, extracted_at, confidence, processing_batch_id";

pub(crate) async fn check_existing_triples(
    conn: &Connection,
    ids: &[String],
) -> knowledge_core::Result<Vec<String>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql = format!("SELECT id FROM triples WHERE id IN ({placeholders})");
    let params: Vec<libsql::Value> = ids.iter().map(|id| libsql::Value::Text(id.clone())).collect();

    let mut rows = conn
        .query(&sql, libsql::params_from_iter(params))
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let mut existing = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
    {
        existing.push(row.get(0).map_err(|e| Error::DatabaseError(e.to_string()))?);
    }
    Ok(existing)
}

/// Upsert one triple, merging confidence (max) and `extracted_at` (latest)
/// on conflict (spec.md §3, §4.2 step 8). Returns whether the row was newly
/// inserted.
async fn upsert_triple(conn: &Connection, triple: &Triple) -> knowledge_core::Result<bool> {
    let id = triple.identity();
    let existed = !check_existing_triples(conn, std::slice::from_ref(&id))
        .await?
        .is_empty();

    let sql = r#"
        INSERT INTO triples (id, subject, predicate, object, triple_type, source, source_type,
                              source_date, extracted_at, confidence, processing_batch_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            confidence = MAX(confidence, excluded.confidence),
            extracted_at = MAX(extracted_at, excluded.extracted_at),
            processing_batch_id = excluded.processing_batch_id
    "#;

    conn.execute(
        sql,
        libsql::params![
            id,
            triple.subject.clone(),
            triple.predicate.clone(),
            triple.object.clone(),
            enum_to_text(&triple.r#type)?,
            triple.source.clone(),
            triple.source_type.clone(),
            triple.source_date.map(|t| t.timestamp()),
            triple.extracted_at.timestamp(),
            f64::from(triple.confidence),
            triple.processing_batch_id.clone(),
        ],
    )
    .await
    .map_err(|e| Error::BatchStorage(format!("failed to upsert triple: {e}")))?;

    Ok(!existed)
}

pub(crate) async fn store_triples(
    conn: &Connection,
    triples: &[Triple],
) -> knowledge_core::Result<BatchStoreResult> {
    let mut stored = 0;
    let mut duplicates = 0;
    for triple in triples {
        if upsert_triple(conn, triple).await? {
            stored += 1;
        } else {
            duplicates += 1;
        }
    }
    Ok(BatchStoreResult {
        triples_stored: stored,
        concepts_stored: 0,
        duplicates_skipped: duplicates,
    })
}

pub(crate) async fn get_triples_by_source(
    conn: &Connection,
    source_prefix: &str,
    source_type: &str,
) -> knowledge_core::Result<Vec<Triple>> {
    let sql = format!(
        "SELECT {SELECT_TRIPLE_COLUMNS} FROM triples WHERE source LIKE ? AND source_type = ?"
    );
    let mut rows = conn
        .query(
            &sql,
            libsql::params![format!("{source_prefix}%"), source_type.to_string()],
        )
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let mut triples = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
    {
        triples.push(row_to_triple(&row)?);
    }
    Ok(triples)
}

/// Delete triples by identity, explicitly cascading their owning vectors
/// (spec.md §3: vectors are exclusively owned by their triple/concept).
pub(crate) async fn delete_triples(
    conn: &Connection,
    ids: &[String],
) -> knowledge_core::Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let params: Vec<libsql::Value> = ids.iter().map(|id| libsql::Value::Text(id.clone())).collect();

    conn.execute("BEGIN IMMEDIATE", ())
        .await
        .map_err(|e| Error::DatabaseError(format!("failed to begin transaction: {e}")))?;

    let result: knowledge_core::Result<usize> = async {
        conn.execute(
            &format!("DELETE FROM vector_embeddings WHERE knowledge_triple_id IN ({placeholders})"),
            libsql::params_from_iter(params.clone()),
        )
        .await
        .map_err(|e| Error::DatabaseError(format!("failed to delete owning vectors: {e}")))?;

        let deleted = conn
            .execute(
                &format!("DELETE FROM triples WHERE id IN ({placeholders})"),
                libsql::params_from_iter(params),
            )
            .await
            .map_err(|e| Error::DatabaseError(format!("failed to delete triples: {e}")))?;

        Ok(deleted as usize)
    }
    .await;

    match result {
        Ok(deleted) => {
            conn.execute("COMMIT", ())
                .await
                .map_err(|e| Error::DatabaseError(format!("failed to commit transaction: {e}")))?;
            Ok(deleted)
        }
        Err(e) => {
            let _ = conn.execute("ROLLBACK", ()).await;
            Err(e)
        }
    }
}

pub(crate) async fn get_all_triples(conn: &Connection) -> knowledge_core::Result<Vec<Triple>> {
    let sql = format!("SELECT {SELECT_TRIPLE_COLUMNS} FROM triples");
    let mut rows = conn
        .query(&sql, ())
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let mut triples = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
    {
        triples.push(row_to_triple(&row)?);
    }
    Ok(triples)
}

pub(crate) async fn get_triple_count(conn: &Connection) -> knowledge_core::Result<usize> {
    let mut rows = conn
        .query("SELECT COUNT(*) FROM triples", ())
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

pub(crate) async fn get_triple_count_by_type(
    conn: &Connection,
) -> knowledge_core::Result<HashMap<TripleType, usize>> {
    let mut rows = conn
        .query("SELECT triple_type, COUNT(*) FROM triples GROUP BY triple_type", ())
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let mut counts = HashMap::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?
    {
        let type_str: String = row.get(0).map_err(|e| Error::DatabaseError(e.to_string()))?;
        let count: i64 = row.get(1).map_err(|e| Error::DatabaseError(e.to_string()))?;
        counts.insert(text_to_enum::<TripleType>(&type_str)?, count as usize);
    }
    Ok(counts)
}
