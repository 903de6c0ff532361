//! Document ingestion primitives and the flat vector index behind Athena's RAG pipeline.

pub mod document;
pub mod vector_index;

pub use vector_index::{ScoredChunk, StoredChunk, VectorIndex, VectorIndexError};

/// Rough token count used to size completion budgets (about four characters per token).
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}
