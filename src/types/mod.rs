//! Canonical types shared by every provider.

pub mod config;
pub mod message;

// Re-export commonly used types
pub use config::*;
pub use message::*;
