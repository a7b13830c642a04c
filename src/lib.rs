//! A unified gateway over chat-capable LLM providers.
//!
//! This library provides a consistent API for talking to a local Ollama server,
//! OpenAI, DeepSeek, Anthropic Claude and Google Gemini: one message format, one
//! error taxonomy, streamed or buffered replies, model listing and connection
//! tests that never fail.

pub mod connection;
pub mod error;
pub mod factory;
pub mod gateway;
pub mod ndjson_stream;
pub mod provider;
pub mod providers;
pub mod response;
pub mod sse_stream;
mod transport;
pub mod types;

// Re-export core types for easy usage
pub use connection::ConnectionTestResult;
pub use error::{Error, ErrorKind, ProviderFailure};
pub use factory::{ProviderConstructor, ProviderFactory, ProviderInfo, ProviderKind, ProviderRegistry};
pub use provider::ChatProvider;
pub use providers::*;
pub use response::ChatStream;
pub use sse_stream::SseEvent;
pub use types::*;
