//! pgvector-like textual vector literals (spec.md §6.4): `"[f1,f2,…]"`.
//!
//! The wider pack's Turso backend stores embeddings as JSON arrays
//! (`serde_json::to_string`/`from_str`); this backend instead writes the
//! literal format spec.md calls out explicitly, so a deployment targeting a
//! real pgvector-compatible engine can read the column directly.

use knowledge_core::Error;

/// Encode `embedding` as `"[f1,f2,…]"`.
#[must_use]
pub fn encode(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 8 + 2);
    out.push('[');
    for (i, v) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

/// Decode a `"[f1,f2,…]"` literal back into a vector.
///
/// # Errors
///
/// Returns [`knowledge_core::Error::DatabaseError`] if `literal` isn't
/// bracketed or any element fails to parse as `f32`.
pub fn decode(literal: &str) -> knowledge_core::Result<Vec<f32>> {
    let inner = literal
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| Error::DatabaseError(format!("malformed vector literal: {literal}")))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| Error::DatabaseError(format!("malformed vector component: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_vector() {
        let v = vec![0.1_f32, -0.5, 2.0];
        let literal = encode(&v);
        assert_eq!(literal, "[0.1,-0.5,2]");
        let decoded = decode(&literal).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn round_trips_empty_vector() {
        assert_eq!(decode(&encode(&[])).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn rejects_unbracketed_literal() {
        assert!(decode("1,2,3").is_err());
    }
}
