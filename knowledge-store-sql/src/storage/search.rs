//! Cosine-similarity search (brute-force, spec.md §6.1/§6.4) and the
//! substring fallbacks used when embedding fails (spec.md §4.7).

use chrono::{DateTime, Duration, Utc};
use knowledge_core::similarity::cosine_similarity;
use knowledge_core::store::{ConceptMatch, SearchFilter, TemporalFilter, TimeUnit, TripleMatch};
use knowledge_core::types::{Triple, VectorType};
use knowledge_core::Error;
use libsql::Connection;

use crate::convert::enum_to_text;
use crate::vector_format;

use super::concepts::all_concepts;
use super::triples::row_to_triple;

const SELECT_TRIPLE_COLUMNS: &str = "subject, predicate, object, triple_type, source, \
     source_type, source_date, extracted_at, confidence, processing_batch_id";

fn window_bounds(anchor: DateTime<Utc>, value: u32, unit: TimeUnit) -> DateTime<Utc> {
    let span = match unit {
        TimeUnit::Days => Duration::days(i64::from(value)),
        TimeUnit::Weeks => Duration::weeks(i64::from(value)),
        TimeUnit::Months => Duration::days(i64::from(value) * 30),
        TimeUnit::Years => Duration::days(i64::from(value) * 365),
    };
    anchor - span
}

/// Resolve a [`SearchFilter::temporal`] into `[from, to]` epoch-second
/// bounds compared against a triple's `extracted_at`.
fn temporal_bounds(filter: Option<&TemporalFilter>) -> (Option<i64>, Option<i64>) {
    match filter {
        None => (None, None),
        Some(TemporalFilter::Range { from, to }) => {
            (from.map(|t| t.timestamp()), to.map(|t| t.timestamp()))
        }
        Some(TemporalFilter::Window { from, value, unit }) => {
            let anchor = from.unwrap_or_else(Utc::now);
            (Some(window_bounds(anchor, *value, *unit).timestamp()), Some(anchor.timestamp()))
        }
    }
}

/// Build a `WHERE`-clause fragment (starting with `AND`, or empty) plus its
/// bound parameters for the triple-level filters in [`SearchFilter`].
fn triple_filter_clause(filter: &SearchFilter) -> knowledge_core::Result<(String, Vec<libsql::Value>)> {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if let Some(sources) = &filter.sources {
        if sources.is_empty() {
            clauses.push("1 = 0".to_string());
        } else {
            let placeholders = sources.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            clauses.push(format!("source IN ({placeholders})"));
            params.extend(sources.iter().cloned().map(libsql::Value::Text));
        }
    }

    if let Some(types) = &filter.types {
        if types.is_empty() {
            clauses.push("1 = 0".to_string());
        } else {
            let placeholders = types.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            clauses.push(format!("triple_type IN ({placeholders})"));
            for t in types {
                params.push(libsql::Value::Text(enum_to_text(t)?));
            }
        }
    }

    let (from, to) = temporal_bounds(filter.temporal.as_ref());
    if let Some(from) = from {
        clauses.push("extracted_at >= ?".to_string());
        params.push(libsql::Value::Integer(from));
    }
    if let Some(to) = to {
        clauses.push("extracted_at <= ?".to_string());
        params.push(libsql::Value::Integer(to));
    }

    if clauses.is_empty() {
        Ok((String::new(), params))
    } else {
        Ok((format!(" AND {}", clauses.join(" AND ")), params))
    }
}

async fn triples_for_vector_type(
    conn: &Connection,
    vector_type: VectorType,
    filter: &SearchFilter,
) -> knowledge_core::Result<Vec<(Triple, Vec<f32>)>> {
    let (filter_clause, filter_params) = triple_filter_clause(filter)?;
    // Triple columns come first (matching `SELECT_TRIPLE_COLUMNS`'s order
    // exactly, so `row_to_triple` can be reused unchanged) with the
    // embedding appended last.
    let sql = format!(
        "SELECT {cols}, v.embedding\n\
         FROM vector_embeddings v\n\
         JOIN triples t ON t.id = v.knowledge_triple_id\n\
         WHERE v.vector_type = ?{filter_clause}",
        cols = SELECT_TRIPLE_COLUMNS
            .split(", ")
            .map(|c| format!("t.{c}"))
            .collect::<Vec<_>>()
            .join(", "),
    );

    let mut params = vec![libsql::Value::Text(enum_to_text(&vector_type)?)];
    params.extend(filter_params);

    let mut rows = conn
        .query(&sql, libsql::params_from_iter(params))
        .await
        .map_err(|e| Error::SearchError(e.to_string()))?;

    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::SearchError(e.to_string()))?
    {
        let triple = row_to_triple(&row)?;
        let embedding_literal: String =
            row.get(10).map_err(|e| Error::SearchError(e.to_string()))?;
        let embedding = vector_format::decode(&embedding_literal)?;
        out.push((triple, embedding));
    }
    Ok(out)
}

pub(crate) async fn search_by_embedding(
    conn: &Connection,
    vector_type: VectorType,
    vector: &[f32],
    top_k: usize,
    min_score: f32,
    filter: &SearchFilter,
) -> knowledge_core::Result<Vec<TripleMatch>> {
    let candidates = triples_for_vector_type(conn, vector_type, filter).await?;

    let mut matches: Vec<TripleMatch> = candidates
        .into_iter()
        .map(|(triple, embedding)| TripleMatch {
            score: cosine_similarity(vector, &embedding),
            triple,
        })
        .filter(|m| m.score >= min_score)
        .collect();

    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches.truncate(top_k);
    Ok(matches)
}

pub(crate) async fn search_concepts_by_embedding(
    conn: &Connection,
    vector: &[f32],
    top_k: usize,
    min_score: f32,
) -> knowledge_core::Result<Vec<ConceptMatch>> {
    let sql = "SELECT c.concept, c.abstraction_level, c.confidence, c.source, \
               c.source_type, c.extracted_at, v.embedding \
               FROM vector_embeddings v JOIN concepts c ON c.id = v.concept_node_id \
               WHERE v.vector_type = ?";
    let mut rows = conn
        .query(sql, libsql::params![enum_to_text(&VectorType::Concept)?])
        .await
        .map_err(|e| Error::SearchError(e.to_string()))?;

    let mut matches = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::SearchError(e.to_string()))?
    {
        let concept = super::concepts::row_to_concept(&row)?;
        let embedding_literal: String =
            row.get(6).map_err(|e| Error::SearchError(e.to_string()))?;
        let embedding = vector_format::decode(&embedding_literal)?;
        let score = cosine_similarity(vector, &embedding);
        if score < min_score {
            continue;
        }
        matches.push(ConceptMatch { concept, score });
    }

    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches.truncate(top_k);
    Ok(matches)
}

pub(crate) async fn search_by_entity(
    conn: &Connection,
    query: &str,
    top_k: usize,
    filter: &SearchFilter,
) -> knowledge_core::Result<Vec<TripleMatch>> {
    let (filter_clause, mut params) = triple_filter_clause(filter)?;
    let pattern = format!("%{query}%");
    params.insert(0, libsql::Value::Text(pattern.clone()));
    params.insert(1, libsql::Value::Text(pattern));

    let sql = format!(
        "SELECT {SELECT_TRIPLE_COLUMNS} FROM triples \
         WHERE (subject LIKE ? OR object LIKE ?){filter_clause} LIMIT ?"
    );
    params.push(libsql::Value::Integer(top_k as i64));

    let mut rows = conn
        .query(&sql, libsql::params_from_iter(params))
        .await
        .map_err(|e| Error::SearchError(e.to_string()))?;

    let mut matches = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::SearchError(e.to_string()))?
    {
        matches.push(TripleMatch {
            triple: row_to_triple(&row)?,
            score: 1.0,
        });
    }
    Ok(matches)
}

pub(crate) async fn search_by_relationship(
    conn: &Connection,
    query: &str,
    top_k: usize,
    filter: &SearchFilter,
) -> knowledge_core::Result<Vec<TripleMatch>> {
    let (filter_clause, mut params) = triple_filter_clause(filter)?;
    params.insert(0, libsql::Value::Text(format!("%{query}%")));

    let sql = format!(
        "SELECT {SELECT_TRIPLE_COLUMNS} FROM triples \
         WHERE predicate LIKE ?{filter_clause} LIMIT ?"
    );
    params.push(libsql::Value::Integer(top_k as i64));

    let mut rows = conn
        .query(&sql, libsql::params_from_iter(params))
        .await
        .map_err(|e| Error::SearchError(e.to_string()))?;

    let mut matches = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::SearchError(e.to_string()))?
    {
        matches.push(TripleMatch {
            triple: row_to_triple(&row)?,
            score: 1.0,
        });
    }
    Ok(matches)
}

pub(crate) async fn search_by_concept(
    conn: &Connection,
    query: &str,
    top_k: usize,
) -> knowledge_core::Result<Vec<ConceptMatch>> {
    let all = all_concepts(conn).await?;
    let needle = query.to_lowercase();
    let mut matches: Vec<ConceptMatch> = all
        .into_iter()
        .filter(|c| c.concept.to_lowercase().contains(&needle))
        .map(|concept| ConceptMatch { concept, score: 1.0 })
        .collect();
    matches.truncate(top_k);
    Ok(matches)
}
