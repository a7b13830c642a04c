//! Local inference through an Ollama server.

pub mod client;
pub mod types;

pub use client::{OllamaProvider, OllamaSettings};
