pub mod anthropic;
pub mod deepseek;
pub mod google;
pub mod ollama;
pub mod openai;

use llm_gateway::ChatProvider;
use wiremock::{MockServer, ResponseTemplate};

/// Static facts about the provider under test.
#[derive(Debug, Clone)]
pub struct SetupConfig {
    pub name: &'static str,
    pub model: &'static str,
}

/// Wrap text fragments as SSE `data:` events.
pub fn sse_body<I>(payloads: I) -> String
where
    I: IntoIterator<Item = String>,
{
    payloads
        .into_iter()
        .map(|payload| format!("data: {payload}\n\n"))
        .collect()
}

/// Trait for provider-specific test setup
#[async_trait::async_trait]
pub trait ProviderTestSetup {
    /// Get the provider configuration
    fn get_config() -> SetupConfig;

    /// Create the provider instance pointed at the mock server
    fn create_provider(base_url: &str) -> Box<dyn ChatProvider>;

    /// Mount a buffered reply. The mock only matches when the system prompt
    /// sits where this provider expects it.
    async fn mount_chat_mock(mock_server: &MockServer, system: &str, user: &str, reply: &str);

    /// Mount a streamed reply made of `fragments`, in order.
    async fn mount_stream_mock(
        mock_server: &MockServer,
        system: &str,
        user: &str,
        fragments: &[&str],
    );

    /// Answer the connection test's request with HTTP 401.
    async fn mount_unauthorized_mock(mock_server: &MockServer);

    /// Answer the connection test's request with `response`.
    async fn mount_probe_reply(mock_server: &MockServer, response: ResponseTemplate);

    /// Whether a 404 from the connection test means the configured model is
    /// missing, rather than a wrong base URL.
    fn missing_model_on_404() -> bool;
}
