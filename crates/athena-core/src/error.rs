/// Errors surfaced by [`crate::Client`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Loading the persisted index failed.
    #[error("index error: {0}")]
    Index(#[from] athena_index::IndexError),

    /// `prompt` was called on a client constructed without an index.
    #[error("no vector index is loaded")]
    IndexNotLoaded,

    /// Embedding the query failed.
    #[error("failed to embed the query: {0}")]
    Embedding(#[source] athena_llm::LlmError),

    /// Searching the loaded index failed.
    #[error("failed to search the index: {0}")]
    Search(#[from] athena_memory::VectorIndexError),

    /// The completion request failed, carrying the original message.
    #[error("failed to generate a prompt completion: {0}")]
    Completion(String),
}
