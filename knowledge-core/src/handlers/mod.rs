//! # Handlers
//!
//! The three job handlers (spec.md §4.2, §4.3) and the router that
//! dispatches to them by [`crate::types::JobType`] (spec.md §4.8).

mod concepts;
mod dedup;
mod extraction;
mod router;

pub use concepts::ConceptHandler;
pub use dedup::DedupHandler;
pub use extraction::ExtractionHandler;
pub use router::{JobResult, Router};

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json_block() {
        let raw = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\":1}");
    }

    #[test]
    fn leaves_unfenced_json_untouched() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }
}
