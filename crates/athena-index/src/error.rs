//! Error types for athena-index.

/// Errors that can occur while building, storing or loading an index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error while staging, cleaning or persisting files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Loading source documents failed.
    #[error("document error: {0}")]
    Document(#[from] athena_memory::document::DocumentError),

    #[error("vector index error: {0}")]
    VectorIndex(#[from] athena_memory::VectorIndexError),

    /// LLM provider error (embedding).
    #[error("LLM error: {0}")]
    Llm(#[from] athena_llm::LlmError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The object store answered with a non-success status.
    #[error("cloud storage returned {status}")]
    Cloud { status: reqwest::StatusCode },

    /// No persisted index exists for the key.
    #[error("index not found: {0}")]
    NotFound(String),

    /// Sources produced no chunks to embed.
    #[error("no chunks to index")]
    EmptyIndex,

    /// An include entry escapes the staging directory.
    #[error("invalid include entry: {0}")]
    InvalidInclude(String),

    /// An index name or version is not a single plain path component.
    #[error("invalid index name or version: {0:?}")]
    InvalidName(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
