//! Generative model abstraction.
//!
//! Curation talks to a [`LlmProvider`]; the Ollama adapter is the only network
//! implementation, tests substitute scripted providers.

mod ollama;
mod provider;
mod types;

pub use ollama::OllamaProvider;
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage};
