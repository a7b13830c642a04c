use super::{ProviderTestSetup, SetupConfig};
use llm_gateway::{AnthropicProvider, ChatProvider, ProviderConfig};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct AnthropicTestSetup;

fn event(name: &str, payload: serde_json::Value) -> String {
    format!("event: {name}\ndata: {payload}\n\n")
}

#[async_trait::async_trait]
impl ProviderTestSetup for AnthropicTestSetup {
    fn get_config() -> SetupConfig {
        SetupConfig {
            name: "Anthropic",
            model: "claude-3-5-sonnet-20241022",
        }
    }

    fn create_provider(base_url: &str) -> Box<dyn ChatProvider> {
        let config = ProviderConfig::new(Self::get_config().model)
            .with_api_key("sk-ant-test")
            .with_base_url(base_url);
        Box::new(AnthropicProvider::new(&config).expect("Failed to create Anthropic provider"))
    }

    async fn mount_chat_mock(mock_server: &MockServer, system: &str, user: &str, reply: &str) {
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_json(json!({
                "model": "claude-3-5-sonnet-20241022",
                "messages": [{"role": "user", "content": user}],
                "max_tokens": 4096,
                "system": system,
                "temperature": 0.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_01",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": reply}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 12, "output_tokens": 3}
            })))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_stream_mock(
        mock_server: &MockServer,
        system: &str,
        user: &str,
        fragments: &[&str],
    ) {
        let mut body = event(
            "message_start",
            json!({"type": "message_start", "message": {"id": "msg_01", "role": "assistant", "content": []}}),
        );
        body.push_str(&event(
            "content_block_start",
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        ));
        body.push_str(&event("ping", json!({"type": "ping"})));
        for fragment in fragments {
            body.push_str(&event(
                "content_block_delta",
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": fragment}}),
            ));
        }
        body.push_str(&event("content_block_stop", json!({"type": "content_block_stop", "index": 0})));
        body.push_str(&event(
            "message_delta",
            json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}}),
        ));
        body.push_str(&event("message_stop", json!({"type": "message_stop"})));

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_partial_json(json!({
                "messages": [{"role": "user", "content": user}],
                "system": system,
                "stream": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("content-type", "text/event-stream")
                    .insert_header("cache-control", "no-cache"),
            )
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_unauthorized_mock(mock_server: &MockServer) {
        Self::mount_probe_reply(
            mock_server,
            ResponseTemplate::new(401).set_body_json(json!({
                "type": "error",
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })),
        )
        .await;
    }

    async fn mount_probe_reply(mock_server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(response)
            .mount(mock_server)
            .await;
    }

    fn missing_model_on_404() -> bool {
        true
    }
}
