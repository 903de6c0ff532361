use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Per-request sampling parameters for a chat completion.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    /// Number of choices to generate. Only the first one is returned.
    pub n: u32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub stop: Vec<String>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: "gpt-4".into(),
            temperature: 0.0,
            max_tokens: 1200,
            top_p: 1.0,
            n: 1,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: Vec::new(),
        }
    }
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the chat-completion endpoint and return the first choice.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(
        &self,
        messages: &[Message],
        params: &CompletionParams,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Embed a batch of texts, returning one vector per input in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding request fails or returns fewer vectors than inputs.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding request fails.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send {
        let input = vec![text.to_owned()];
        async move {
            let mut vectors = self.embed_batch(&input).await?;
            vectors.pop().ok_or(LlmError::EmptyResponse {
                provider: self.name(),
            })
        }
    }

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        assert_eq!(Role::System.as_str(), "system");
    }

    #[test]
    fn message_constructors() {
        assert_eq!(Message::system("ctx").role, Role::System);
        let user = Message::user("hi");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "hi");
    }

    #[test]
    fn default_params_match_client_defaults() {
        let params = CompletionParams::default();
        assert_eq!(params.model, "gpt-4");
        assert_eq!(params.max_tokens, 1200);
        assert!(params.stop.is_empty());
    }
}
