//! Text chunking for the extraction handler (spec.md §4.2 step 1).
//!
//! Token counts are estimated as `len(text) / CHARS_PER_TOKEN` — there is
//! no tokenizer dependency in the CORE, matching spec.md's explicit
//! estimation formula.

use crate::constants::CHARS_PER_TOKEN;

/// One chunk of the original text, with its synthetic source suffix index.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Index of this chunk within the split (0-based).
    pub index: usize,
    /// The chunk's text.
    pub text: String,
}

/// Estimate the token count of `text` as `len(text) / CHARS_PER_TOKEN`.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Split `text` into chunks of at most `max_tokens` estimated tokens, with
/// `overlap_tokens` of overlap between consecutive chunks, preferring to
/// break on paragraph boundaries (spec.md §4.2 step 1).
///
/// Returns a single chunk, unchanged, if `text` is empty or does not
/// exceed `max_tokens`.
#[must_use]
pub fn chunk_text(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<Chunk> {
    if estimate_tokens(text) <= max_tokens {
        return vec![Chunk {
            index: 0,
            text: text.to_string(),
        }];
    }

    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN).max(1);
    let overlap_chars = overlap_tokens.saturating_mul(CHARS_PER_TOKEN);

    let paragraphs: Vec<&str> = split_preserving_paragraphs(text);

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        let would_be_len = current.chars().count()
            + if current.is_empty() { 0 } else { 2 }
            + paragraph.chars().count();

        if !current.is_empty() && would_be_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            let carry = tail_chars(chunks.last().expect("just pushed"), overlap_chars);
            current.push_str(&carry);
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);

        // A single paragraph longer than max_chars still has to go
        // somewhere; split it hard rather than looping forever.
        while current.chars().count() > max_chars {
            let split_at = max_chars;
            let (head, tail) = split_at_char_boundary(&current, split_at);
            chunks.push(head.to_string());
            let carry = tail_chars(&head, overlap_chars);
            current = format!("{carry}{tail}");
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk { index, text })
        .collect()
}

fn split_preserving_paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n").filter(|p| !p.is_empty()).collect()
}

fn tail_chars(s: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let total = s.chars().count();
    let skip = total.saturating_sub(n);
    let tail: String = s.chars().skip(skip).collect();
    if tail.is_empty() {
        tail
    } else {
        format!("{tail}\n\n")
    }
}

fn split_at_char_boundary(s: &str, char_index: usize) -> (String, String) {
    let head: String = s.chars().take(char_index).collect();
    let tail: String = s.chars().skip(char_index).collect();
    (head, tail)
}

/// The synthetic source identifier for chunk `index` of `source`
/// (spec.md §3: `"{source}_chunk_{i}"`). For a single-chunk split, the
/// caller should use `source` unsuffixed — this helper is only for
/// multi-chunk splits.
#[must_use]
pub fn chunk_source(source: &str, index: usize) -> String {
    format!("{source}_chunk_{index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("hello world", 3000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
    }

    #[test]
    fn exactly_at_threshold_is_not_chunked() {
        // 3000 tokens * 4 chars/token = 12000 chars exactly.
        let text = "a".repeat(12_000);
        assert_eq!(estimate_tokens(&text), 3000);
        let chunks = chunk_text(&text, 3000, 200);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_text_is_split_into_multiple_chunks() {
        let paragraph = "word ".repeat(400); // ~2000 chars
        let text = std::iter::repeat(paragraph.as_str())
            .take(10)
            .collect::<Vec<_>>()
            .join("\n\n");
        assert!(estimate_tokens(&text) > 3000);

        let chunks = chunk_text(&text, 3000, 200);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn chunk_source_uses_spec_suffix_format() {
        assert_eq!(chunk_source("doc-1", 2), "doc-1_chunk_2");
    }
}
