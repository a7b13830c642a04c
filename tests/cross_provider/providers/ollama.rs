use super::{ProviderTestSetup, SetupConfig};
use llm_gateway::{ChatProvider, OllamaProvider, ProviderConfig};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct OllamaTestSetup;

#[async_trait::async_trait]
impl ProviderTestSetup for OllamaTestSetup {
    fn get_config() -> SetupConfig {
        SetupConfig {
            name: "Ollama",
            model: "llama3.2:latest",
        }
    }

    fn create_provider(base_url: &str) -> Box<dyn ChatProvider> {
        let config = ProviderConfig::new(Self::get_config().model).with_base_url(base_url);
        Box::new(OllamaProvider::new(&config).expect("Failed to create Ollama provider"))
    }

    async fn mount_chat_mock(mock_server: &MockServer, system: &str, user: &str, reply: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({
                "model": "llama3.2:latest",
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user}
                ],
                "stream": false,
                "options": {"temperature": 0.0}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2:latest",
                "message": {"role": "assistant", "content": reply},
                "done": true
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
        let mut body: String = fragments
            .iter()
            .map(|fragment| {
                format!(
                    "{}\n",
                    json!({"message": {"role": "assistant", "content": fragment}, "done": false})
                )
            })
            .collect();
        body.push_str(&format!(
            "{}\n",
            json!({"message": {"role": "assistant", "content": ""}, "done": true, "eval_count": 3})
        ));

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user}
                ],
                "stream": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("content-type", "application/x-ndjson"),
            )
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_unauthorized_mock(mock_server: &MockServer) {
        Self::mount_probe_reply(
            mock_server,
            ResponseTemplate::new(401).set_body_string("unauthorized"),
        )
        .await;
    }

    async fn mount_probe_reply(mock_server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(response)
            .mount(mock_server)
            .await;
    }

    fn missing_model_on_404() -> bool {
        false
    }
}
