use super::{sse_body, ProviderTestSetup, SetupConfig};
use llm_gateway::{ChatProvider, OpenAICompatibleProvider, ProviderConfig};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct OpenAITestSetup;

/// Mocks for the Chat Completions wire format, shared with DeepSeek.
pub(super) async fn mount_completion(
    mock_server: &MockServer,
    model: &str,
    api_key: &str,
    system: &str,
    user: &str,
    reply: &str,
) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", format!("Bearer {api_key}").as_str()))
        .and(body_json(json!({
            "model": model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": 0.0,
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": reply},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(mock_server)
        .await;
}

pub(super) async fn mount_completion_stream(
    mock_server: &MockServer,
    system: &str,
    user: &str,
    fragments: &[&str],
) {
    let mut payloads = vec![json!({"choices": [{"index": 0, "delta": {"role": "assistant"}}]}).to_string()];
    payloads.extend(fragments.iter().map(|fragment| {
        json!({"choices": [{"index": 0, "delta": {"content": fragment}}]}).to_string()
    }));
    payloads.push(json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}).to_string());
    payloads.push("[DONE]".to_string());

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sse_body(payloads))
                .insert_header("content-type", "text/event-stream")
                .insert_header("cache-control", "no-cache"),
        )
        .expect(1)
        .mount(mock_server)
        .await;
}

#[async_trait::async_trait]
impl ProviderTestSetup for OpenAITestSetup {
    fn get_config() -> SetupConfig {
        SetupConfig {
            name: "OpenAI",
            model: "gpt-4o-mini",
        }
    }

    fn create_provider(base_url: &str) -> Box<dyn ChatProvider> {
        let config = ProviderConfig::new(Self::get_config().model)
            .with_api_key("sk-test-api-key")
            .with_base_url(base_url);
        Box::new(OpenAICompatibleProvider::openai(&config).expect("Failed to create OpenAI provider"))
    }

    async fn mount_chat_mock(mock_server: &MockServer, system: &str, user: &str, reply: &str) {
        mount_completion(mock_server, "gpt-4o-mini", "sk-test-api-key", system, user, reply).await;
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
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })),
        )
        .await;
    }

    async fn mount_probe_reply(mock_server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(response)
            .mount(mock_server)
            .await;
    }

    fn missing_model_on_404() -> bool {
        false
    }
}
