//! LLM provider abstraction with an OpenAI-compatible backend.

pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod openai;
pub mod provider;
pub(crate) mod retry;

pub use error::LlmError;
pub use provider::{CompletionParams, LlmProvider, Message, Role};
