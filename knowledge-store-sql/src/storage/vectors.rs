//! The single unified `vector_embeddings` table (spec.md §6.1).

use knowledge_core::types::VectorEmbedding;
use knowledge_core::Error;
use libsql::Connection;

use crate::convert::enum_to_text;
use crate::vector_format;

pub(crate) async fn store_vectors(
    conn: &Connection,
    vectors: &[VectorEmbedding],
) -> knowledge_core::Result<()> {
    for vector in vectors {
        vector.validate()?;
        conn.execute(
            r#"
            INSERT INTO vector_embeddings
                (vector_type, text, embedding, knowledge_triple_id, concept_node_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
            libsql::params![
                enum_to_text(&vector.vector_type)?,
                vector.text.clone(),
                vector_format::encode(&vector.embedding),
                vector.knowledge_triple_id.clone(),
                vector.concept_node_id.clone(),
            ],
        )
        .await
        .map_err(|e| Error::VectorStorageError(format!("failed to insert vector: {e}")))?;
    }
    Ok(())
}
