pub mod client;
pub mod types;

pub use client::{AnthropicProvider, AnthropicSettings};
