use super::{sse_body, ProviderTestSetup, SetupConfig};
use llm_gateway::{ChatProvider, GoogleProvider, ProviderConfig};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct GoogleTestSetup;

fn expected_request(system: &str, user: &str) -> serde_json::Value {
    json!({
        "contents": [{"role": "user", "parts": [{"text": user}]}],
        "systemInstruction": {"parts": [{"text": system}]},
        "generationConfig": {"temperature": 0.0}
    })
}

#[async_trait::async_trait]
impl ProviderTestSetup for GoogleTestSetup {
    fn get_config() -> SetupConfig {
        SetupConfig {
            name: "Google",
            model: "gemini-2.0-flash-exp",
        }
    }

    fn create_provider(base_url: &str) -> Box<dyn ChatProvider> {
        let config = ProviderConfig::new(Self::get_config().model)
            .with_api_key("g-test-key")
            .with_base_url(base_url);
        Box::new(GoogleProvider::new(&config).expect("Failed to create Google provider"))
    }

    async fn mount_chat_mock(mock_server: &MockServer, system: &str, user: &str, reply: &str) {
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash-exp:generateContent"))
            .and(query_param("key", "g-test-key"))
            .and(body_json(expected_request(system, user)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": reply}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 3}
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
        let mut payloads: Vec<String> = fragments
            .iter()
            .map(|fragment| {
                json!({"candidates": [{"content": {"role": "model", "parts": [{"text": fragment}]}}]})
                    .to_string()
            })
            .collect();
        payloads.push(
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": ""}]}, "finishReason": "STOP"}]})
                .to_string(),
        );

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash-exp:streamGenerateContent"))
            .and(query_param("key", "g-test-key"))
            .and(query_param("alt", "sse"))
            .and(body_json(expected_request(system, user)))
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

    async fn mount_unauthorized_mock(mock_server: &MockServer) {
        Self::mount_probe_reply(
            mock_server,
            ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": 401, "message": "Request had invalid authentication credentials.", "status": "UNAUTHENTICATED"}
            })),
        )
        .await;
    }

    async fn mount_probe_reply(mock_server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash-exp:generateContent"))
            .respond_with(response)
            .mount(mock_server)
            .await;
    }

    fn missing_model_on_404() -> bool {
        true
    }
}
