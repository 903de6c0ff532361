//! Retrieval-augmented prompt client.

use std::sync::Arc;

use athena_index::{IndexKey, StorageBackend};
use athena_llm::{CompletionParams, LlmProvider, Message};
use athena_memory::{ScoredChunk, VectorIndex, estimate_tokens};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Completion budget reserved for the answer on top of the prompt's own tokens.
const PROMPT_RESPONSE_TOKENS: usize = 2000;

const DEFAULT_TOP_K: usize = 4;

fn default_model_name() -> String {
    "gpt-4".into()
}

fn default_max_tokens() -> u32 {
    1200
}

fn default_top_p() -> f32 {
    1.0
}

fn default_best_of() -> u32 {
    3
}

/// Model and sampling settings for one client session.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Sent as the completion `n`.
    #[serde(default = "default_best_of")]
    pub best_of: u32,
    #[serde(default)]
    pub frequency_penalty: f32,
    #[serde(default)]
    pub presence_penalty: f32,
    #[serde(default)]
    pub stop: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            best_of: default_best_of(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: Vec::new(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn completion_params(&self, max_tokens: u32) -> CompletionParams {
        CompletionParams {
            model: self.model_name.clone(),
            temperature: self.temperature,
            max_tokens,
            top_p: self.top_p,
            n: self.best_of,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            stop: self.stop.clone(),
        }
    }
}

pub struct Client<P> {
    provider: Arc<P>,
    config: ClientConfig,
    top_k: usize,
    index: Option<VectorIndex>,
}

impl<P: LlmProvider> Client<P> {
    /// A client with no index; only [`Client::base_prompt`] is usable until one is
    /// attached with [`Client::with_index`].
    #[must_use]
    pub fn new(provider: Arc<P>, config: ClientConfig) -> Self {
        Self {
            provider,
            config,
            top_k: DEFAULT_TOP_K,
            index: None,
        }
    }

    /// Construct a client and, when both `model_group` and `custom_model` are
    /// non-empty, load the index `(custom_model, version)` from `storage`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Index` if the index cannot be loaded.
    pub async fn open(
        provider: Arc<P>,
        config: ClientConfig,
        storage: &StorageBackend,
        model_group: &str,
        custom_model: &str,
        version: &str,
    ) -> Result<Self, ClientError> {
        let mut client = Self::new(provider, config);
        if !model_group.is_empty() && !custom_model.is_empty() {
            let key = IndexKey::new(custom_model, version);
            let index = storage.load(&key).await?;
            tracing::info!(
                index = %key,
                group = model_group,
                chunks = index.len(),
                "vector index loaded"
            );
            client.index = Some(index);
        }
        Ok(client)
    }

    #[must_use]
    pub fn with_index(mut self, index: VectorIndex) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    /// Chunks most relevant to `text`, best first.
    ///
    /// # Errors
    ///
    /// Returns `IndexNotLoaded` without an index, `Embedding` if the query cannot be
    /// embedded, or `Search` if the index rejects the query vector.
    pub async fn retrieve(&self, text: &str) -> Result<Vec<ScoredChunk>, ClientError> {
        let index = self.index.as_ref().ok_or(ClientError::IndexNotLoaded)?;
        let query = self.provider.embed(text).await.map_err(|e| {
            tracing::error!(error = %e, "query embedding failed");
            ClientError::Embedding(e)
        })?;
        let hits = index.search(&query, self.top_k)?;
        tracing::debug!(
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "retrieved context"
        );
        Ok(hits)
    }

    /// Answer `text` using the retrieved chunks as the system message.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::retrieve`], or `Completion` wrapping a failed
    /// completion request.
    pub async fn prompt(&self, text: &str) -> Result<String, ClientError> {
        let hits = self.retrieve(text).await?;
        let context = hits
            .iter()
            .map(|h| h.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let budget = PROMPT_RESPONSE_TOKENS + estimate_tokens(text);
        let max_tokens = u32::try_from(budget).unwrap_or(u32::MAX);
        let messages = [Message::system(context), Message::user(text)];

        self.complete(&messages, max_tokens).await
    }

    /// Send `system` and `user` straight to the completion API, skipping retrieval.
    /// Empty parts are left out.
    ///
    /// # Errors
    ///
    /// Returns `Completion` when both parts are empty (no request is made) or the
    /// request fails.
    pub async fn base_prompt(&self, system: &str, user: &str) -> Result<String, ClientError> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(Message::system(system));
        }
        if !user.is_empty() {
            messages.push(Message::user(user));
        }
        if messages.is_empty() {
            return Err(ClientError::Completion(
                "no system or user message to send".into(),
            ));
        }

        self.complete(&messages, self.config.max_tokens).await
    }

    async fn complete(
        &self,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<String, ClientError> {
        let params = self.config.completion_params(max_tokens);
        self.provider
            .chat(messages, &params)
            .await
            .map_err(|e| completion_error(&e))
    }
}

fn completion_error(err: &dyn std::error::Error) -> ClientError {
    tracing::error!(error = %err, "completion failed");
    ClientError::Completion(err.to_string())
}

#[cfg(test)]
mod tests {
    use athena_llm::Role;
    use athena_llm::mock::{MockProvider, bag_of_words};
    use athena_memory::document::{Chunk, DocumentMetadata};

    use super::*;

    fn index_of(texts: &[&str]) -> VectorIndex {
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                content: (*t).to_owned(),
                metadata: DocumentMetadata::new("BuildInfo.cpp", "text/x-cpp"),
                chunk_index: i,
            })
            .collect();
        let embeddings = texts.iter().map(|t| bag_of_words(t)).collect();
        VectorIndex::from_embeddings(chunks, embeddings).unwrap()
    }

    fn client(provider: &Arc<MockProvider>) -> Client<MockProvider> {
        Client::new(Arc::clone(provider), ClientConfig::default())
    }

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.model_name, "gpt-4");
        assert!(config.temperature.abs() < f32::EPSILON);
        assert_eq!(config.max_tokens, 1200);
        assert!((config.top_p - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.best_of, 3);
        assert!(config.stop.is_empty());
    }

    #[test]
    fn completion_params_map_best_of_to_n() {
        let params = ClientConfig::default().completion_params(42);
        assert_eq!(params.n, 3);
        assert_eq!(params.max_tokens, 42);
        assert_eq!(params.model, "gpt-4");
    }

    #[tokio::test]
    async fn prompt_sends_retrieved_context() {
        let provider = Arc::new(MockProvider::with_responses(vec![
            "It prints the version.".into(),
        ]));
        let client = client(&provider).with_index(index_of(&[
            "BuildInfo.cpp\n\nstd::string BuildInfo::summary() const { version }",
            "BuildInfo.cpp\n\nint BuildInfo::uptimeSeconds() const { clock }",
        ]));

        let answer = client.prompt("what does summary return").await.unwrap();
        assert_eq!(answer, "It prints the version.");

        let messages = provider.last_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "what does summary return");
        let blocks: Vec<&str> = messages[0].content.split("\n\nBuildInfo.cpp\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert!(
            messages[0]
                .content
                .starts_with("BuildInfo.cpp\n\nstd::string BuildInfo::summary()")
        );
    }

    #[tokio::test]
    async fn prompt_budget_grows_with_question() {
        let provider = Arc::new(MockProvider::default());
        let client = client(&provider).with_index(index_of(&["alpha"]));

        client.prompt("abcdefgh").await.unwrap();
        let params = provider.last_params().unwrap();
        assert_eq!(params.max_tokens, 2002);
        assert_eq!(params.n, 3);
    }

    #[tokio::test]
    async fn prompt_respects_top_k() {
        let provider = Arc::new(MockProvider::default());
        let client = client(&provider)
            .with_index(index_of(&["one", "two", "three", "four", "five", "six"]))
            .with_top_k(2);

        let hits = client.retrieve("one").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "one");
    }

    #[tokio::test]
    async fn prompt_without_index_fails() {
        let provider = Arc::new(MockProvider::default());
        let err = client(&provider).prompt("hello").await.unwrap_err();
        assert!(matches!(err, ClientError::IndexNotLoaded));
        assert_eq!(provider.chat_calls(), 0);
    }

    #[tokio::test]
    async fn completion_errors_are_wrapped() {
        let provider = Arc::new(MockProvider::failing());
        let client = client(&provider).with_index(index_of(&["alpha"]));

        let err = client.prompt("alpha").await.unwrap_err();
        assert!(matches!(err, ClientError::Completion(_)));
        assert_eq!(
            err.to_string(),
            "failed to generate a prompt completion: mock LLM error"
        );
    }

    #[tokio::test]
    async fn embedding_errors_propagate_without_completion() {
        let provider = Arc::new(MockProvider::failing_embeddings());
        let client = client(&provider).with_index(index_of(&["alpha"]));

        let err = client.prompt("alpha").await.unwrap_err();
        assert!(matches!(err, ClientError::Embedding(athena_llm::LlmError::Other(_))));
        assert_eq!(err.to_string(), "failed to embed the query: mock embed error");
        assert_eq!(provider.chat_calls(), 0);
    }

    #[tokio::test]
    async fn search_errors_propagate() {
        let provider = Arc::new(MockProvider::default());
        let chunk = Chunk {
            content: "alpha".into(),
            metadata: DocumentMetadata::new("a.txt", "text/plain"),
            chunk_index: 0,
        };
        let index = VectorIndex::from_embeddings(vec![chunk], vec![vec![1.0, 0.0]]).unwrap();
        let client = client(&provider).with_index(index);

        let err = client.prompt("alpha").await.unwrap_err();
        assert!(matches!(err, ClientError::Search(_)));
        assert_eq!(provider.chat_calls(), 0);
    }

    #[tokio::test]
    async fn base_prompt_with_both_parts() {
        let provider = Arc::new(MockProvider::with_responses(vec!["ok".into()]));
        let answer = client(&provider)
            .base_prompt("You are terse.", "Say ok")
            .await
            .unwrap();

        assert_eq!(answer, "ok");
        let messages = provider.last_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "You are terse.");
        assert_eq!(provider.last_params().unwrap().max_tokens, 1200);
    }

    #[tokio::test]
    async fn base_prompt_drops_empty_parts() {
        let provider = Arc::new(MockProvider::default());
        client(&provider).base_prompt("", "just the user").await.unwrap();

        let messages = provider.last_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn base_prompt_without_messages_fails_fast() {
        let provider = Arc::new(MockProvider::default());
        let err = client(&provider).base_prompt("", "").await.unwrap_err();

        assert!(matches!(err, ClientError::Completion(_)));
        assert!(err.to_string().starts_with("failed to generate a prompt completion"));
        assert_eq!(provider.chat_calls(), 0);
    }
}
