use super::openai::{mount_completion, mount_completion_stream};
use super::{ProviderTestSetup, SetupConfig};
use llm_gateway::{ChatProvider, OpenAICompatibleProvider, ProviderConfig};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct DeepSeekTestSetup;

#[async_trait::async_trait]
impl ProviderTestSetup for DeepSeekTestSetup {
    fn get_config() -> SetupConfig {
        SetupConfig {
            name: "DeepSeek",
            model: "deepseek-chat",
        }
    }

    fn create_provider(base_url: &str) -> Box<dyn ChatProvider> {
        let config = ProviderConfig::new(Self::get_config().model)
            .with_api_key("ds-test-api-key")
            .with_base_url(base_url);
        Box::new(
            OpenAICompatibleProvider::deepseek(&config).expect("Failed to create DeepSeek provider"),
        )
    }

    async fn mount_chat_mock(mock_server: &MockServer, system: &str, user: &str, reply: &str) {
        mount_completion(mock_server, "deepseek-chat", "ds-test-api-key", system, user, reply).await;
    }

    async fn mount_stream_mock(
        mock_server: &MockServer,
        system: &str,
        user: &str,
        fragments: &[&str],
    ) {
        mount_completion_stream(mock_server, system, user, fragments).await;
    }

    async fn mount_unauthorized_mock(mock_server: &MockServer) {
        Self::mount_probe_reply(
            mock_server,
            ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Authentication Fails (no such user)", "type": "authentication_error"}
            })),
        )
        .await;
    }

    async fn mount_probe_reply(mock_server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(response)
            .mount(mock_server)
            .await;
    }

    fn missing_model_on_404() -> bool {
        true
    }
}
