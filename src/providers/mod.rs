//! Provider implementations for different LLM services.

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;

// Re-export commonly used provider types
pub use anthropic::{AnthropicProvider, AnthropicSettings};
pub use google::{GoogleProvider, GoogleSettings};
pub use ollama::{OllamaProvider, OllamaSettings};
pub use openai::{OpenAICompatibleProvider, OpenAICompatibleSettings};
