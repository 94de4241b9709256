//! Trait contracts for the three external collaborators spec.md §1 treats
//! as interfaces only: the LLM oracle, the embedder, and the task queue.
//! (The store adapter contract lives in [`crate::store`] — it is large
//! enough to warrant its own module.)

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

/// Token accounting returned alongside every oracle call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens consumed by the completion.
    pub completion_tokens: u32,
    /// Sum of the two.
    pub total_tokens: u32,
}

/// The validated structured result of a `generate_object` call.
#[derive(Debug, Clone)]
pub struct OracleObject {
    /// The structured payload, already schema-validated by the oracle.
    pub data: serde_json::Value,
    /// Token accounting for this call.
    pub usage: TokenUsage,
}

/// The raw-text result of a `generate_text` call (spec.md §6.3: tolerated
/// for oracles that only emit a string, possibly fenced in Markdown).
#[derive(Debug, Clone)]
pub struct OracleText {
    /// The raw completion text.
    pub text: String,
    /// Token accounting for this call.
    pub usage: TokenUsage,
}

/// Structured-object generation given a prompt and a named schema.
///
/// Implementations are expected to validate `data` against the schema
/// named by `schema_name` before returning; a validation failure should
/// surface as [`crate::Error::ParseError`].
#[async_trait]
pub trait OracleClient: Send + Sync {
    /// Ask the oracle for a structured object matching `schema_name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AiExtraction`] on transport failure, or
    /// [`crate::Error::ParseError`] if the oracle's output fails schema
    /// validation.
    async fn generate_object(&self, prompt: &str, schema_name: &str) -> Result<OracleObject>;

    /// Ask the oracle for raw text (used for oracles without native
    /// structured-output support; the caller strips Markdown fences and
    /// parses JSON itself per spec.md §4.2 step 4).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AiExtraction`] on transport failure.
    async fn generate_text(&self, prompt: &str) -> Result<OracleText>;
}

/// Fixed-dimension dense embedding of text, batched.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// The fixed dimension every vector this embedder returns will have.
    fn dimension(&self) -> usize;

    /// Embed a single string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EmbeddingGeneration`] on transport failure.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of strings in one call.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EmbeddingGeneration`] on transport failure;
    /// the whole batch is considered failed (spec.md §4.4).
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Deliver a job id to a worker endpoint after an optional delay.
///
/// At-least-once delivery: a redelivered job id is safe because every
/// handler is idempotent at the identity level (spec.md §5).
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue `job_id`, to be dispatched after `delay` (or immediately).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DatabaseError`] (or a transport-specific
    /// variant) if the queue itself is unavailable; per spec.md §4.1,
    /// the caller (the coordinator) treats this as non-fatal to job
    /// creation — the job remains observable but won't run until the
    /// queue is restored.
    async fn enqueue(&self, job_id: Uuid, delay: Option<Duration>) -> Result<()>;
}
