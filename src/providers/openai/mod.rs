//! OpenAI Chat Completions and the servers that speak it, DeepSeek included.

pub mod client;
pub mod types;

pub use client::{OpenAICompatibleProvider, OpenAICompatibleSettings};
