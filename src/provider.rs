use crate::{ChatMessage, ChatOptions, ChatStream, ConnectionTestResult, Error};

/// A chat-capable backend.
///
/// Instances are immutable after construction and safe to share across
/// concurrent tasks. Every operation except [`ChatProvider::test_connection`]
/// reports failures through [`Error`].
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync + 'static {
    /// Registry name, e.g. `ollama`.
    fn name(&self) -> &str;

    /// Human readable name, e.g. `Ollama (Local)`.
    fn display_name(&self) -> &str;

    /// The model every call is made with.
    fn model(&self) -> &str;

    fn requires_api_key(&self) -> bool {
        true
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    /// Send the conversation and wait for the complete reply.
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<String, Error>;

    /// Send the conversation and receive the reply as it is generated.
    ///
    /// Failures detected before the first fragment are returned here; later
    /// failures end the stream with a single `Err` item.
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatStream, Error>;

    /// Model identifiers this provider can serve.
    async fn list_models(&self) -> Result<Vec<String>, Error>;

    /// Make the cheapest possible live call and report how it went.
    async fn test_connection(&self) -> ConnectionTestResult;
}

/// Checks shared by every provider before a chat request leaves the process.
pub(crate) fn validate_chat_input(messages: &[ChatMessage], options: &ChatOptions) -> Result<(), Error> {
    if messages.is_empty() {
        return Err(Error::config("at least one message is required"));
    }
    options.validate()
}
