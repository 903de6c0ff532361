#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("{provider} API request failed (status {status})")]
    Api {
        provider: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("missing API key for {provider}")]
    MissingApiKey { provider: &'static str },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
