//! Row <-> domain-type conversions shared by every storage submodule.
//!
//! Enum columns reuse each type's existing `serde` impl rather than
//! hand-rolling a second string mapping: `serde_json` renders a unit enum as
//! a quoted string (`"ENTITY_ENTITY"`), so we just strip/add the quotes
//! around the column value.

use chrono::{DateTime, TimeZone, Utc};
use knowledge_core::Error;
use libsql::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Render `value` as the bare (unquoted) text its `serde` impl would embed
/// in a JSON string, e.g. `TripleType::EntityEntity` -> `"ENTITY_ENTITY"`.
pub fn enum_to_text<T: Serialize>(value: &T) -> knowledge_core::Result<String> {
    let json = serde_json::to_string(value).map_err(Error::Serialization)?;
    Ok(json.trim_matches('"').to_string())
}

/// Inverse of [`enum_to_text`].
pub fn text_to_enum<T: DeserializeOwned>(text: &str) -> knowledge_core::Result<T> {
    serde_json::from_str(&format!("\"{text}\"")).map_err(Error::Serialization)
}

/// Read column `idx` as an optional epoch-seconds integer and convert to UTC.
pub fn get_optional_timestamp(
    row: &Row,
    idx: i32,
) -> knowledge_core::Result<Option<DateTime<Utc>>> {
    let raw: Option<i64> = row
        .get(idx)
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    Ok(raw.and_then(|secs| Utc.timestamp_opt(secs, 0).single()))
}

/// Read column `idx` as a non-optional epoch-seconds integer.
pub fn get_timestamp(row: &Row, idx: i32) -> knowledge_core::Result<DateTime<Utc>> {
    let raw: i64 = row
        .get(idx)
        .map_err(|e| Error::DatabaseError(e.to_string()))?;
    Utc.timestamp_opt(raw, 0)
        .single()
        .ok_or_else(|| Error::DatabaseError(format!("invalid timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_core::types::TripleType;

    #[test]
    fn enum_round_trips_through_text() {
        let text = enum_to_text(&TripleType::EntityEvent).unwrap();
        assert_eq!(text, "ENTITY_EVENT");
        let back: TripleType = text_to_enum(&text).unwrap();
        assert_eq!(back, TripleType::EntityEvent);
    }
}
