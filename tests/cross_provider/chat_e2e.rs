use futures_util::StreamExt;
use llm_gateway::{ChatMessage, ChatOptions};
use serde_json::json;
use wiremock::{MockServer, ResponseTemplate};

use super::providers::{
    anthropic::AnthropicTestSetup, deepseek::DeepSeekTestSetup, google::GoogleTestSetup,
    ollama::OllamaTestSetup, openai::OpenAITestSetup, ProviderTestSetup,
};

const SYSTEM: &str = "You are a terse assistant.";
const USER: &str = "Say hello.";
const FRAGMENTS: [&str; 3] = ["Hel", "lo the", "re"];

/// Chat and stream the same conversation; both must carry the system prompt
/// in the provider's own slot and agree on the reply.
async fn run_chat_test<T: ProviderTestSetup>() -> Result<(), Box<dyn std::error::Error>> {
    let config = T::get_config();

    println!("\n{}", "=".repeat(80));
    println!("Testing {} Provider", config.name);
    println!("{}", "=".repeat(80));

    let reply = FRAGMENTS.concat();
    let messages = [ChatMessage::system(SYSTEM), ChatMessage::user(USER)];
    let options = ChatOptions::default().temperature(0.0);

    let chat_server = MockServer::start().await;
    T::mount_chat_mock(&chat_server, SYSTEM, USER, &reply).await;
    let provider = T::create_provider(&chat_server.uri());
    assert_eq!(provider.model(), config.model);

    let text = provider.chat(&messages, &options).await?;
    assert_eq!(text, reply, "{}: chat reply should match the mock", config.name);
    println!("✅ Buffered chat matched the exact request payload");

    let stream_server = MockServer::start().await;
    T::mount_stream_mock(&stream_server, SYSTEM, USER, &FRAGMENTS).await;
    let provider = T::create_provider(&stream_server.uri());

    let mut stream = provider.stream_chat(&messages, &options).await?;
    let mut received = Vec::new();
    while let Some(fragment) = stream.next().await {
        received.push(fragment?);
    }

    assert_eq!(received, FRAGMENTS, "{}: fragments should arrive in order", config.name);
    assert_eq!(
        received.concat(),
        text,
        "{}: streamed text should equal the buffered reply",
        config.name
    );
    println!("✅ Streamed {} fragments, concatenation equals the chat reply", received.len());

    Ok(())
}

/// A 401 from the probe endpoint reports invalid credentials without failing.
async fn run_unauthorized_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_unauthorized_mock(&mock_server).await;

    let provider = T::create_provider(&mock_server.uri());
    let result = provider.test_connection().await;

    assert!(!result.connected, "{}: should not be connected", config.name);
    assert!(result.models.is_empty());
    assert!(
        result.message.contains("Invalid API key"),
        "{}: unexpected message '{}'",
        config.name,
        result.message
    );
    assert!(result.error.as_deref().is_some_and(|e| e.starts_with("HTTP 401")));
    assert!(result.latency_ms.is_some());
}

/// A 404 keeps the connection when the probe names a model, and fails it
/// when the probe only lists models.
async fn run_not_found_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_probe_reply(
        &mock_server,
        ResponseTemplate::new(404).set_body_json(json!({"error": {"message": "not found"}})),
    )
    .await;

    let result = T::create_provider(&mock_server.uri()).test_connection().await;

    if T::missing_model_on_404() {
        assert!(result.connected, "{}: a missing model is still a connection", config.name);
        assert!(!result.models.is_empty(), "{}: known models should be offered", config.name);
        assert!(
            result.message.contains(&format!("model '{}' not found", config.model)),
            "{}: unexpected message '{}'",
            config.name,
            result.message
        );
        assert!(result.error.is_none());
    } else {
        assert!(!result.connected, "{}: should not be connected", config.name);
        assert!(result.models.is_empty());
        assert!(result.message.contains("HTTP 404"), "{}: {}", config.name, result.message);
        assert!(result.error.as_deref().is_some_and(|e| e.starts_with("HTTP 404")));
    }
    assert!(result.latency_ms.is_some());
}

/// A 429 means valid credentials, but the connection test still fails.
async fn run_rate_limited_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_probe_reply(&mock_server, ResponseTemplate::new(429).set_body_string("{}")).await;

    let result = T::create_provider(&mock_server.uri()).test_connection().await;

    assert!(!result.connected, "{}: should not be connected", config.name);
    assert!(result.models.is_empty());
    assert!(
        result.message.contains("Rate limit exceeded"),
        "{}: unexpected message '{}'",
        config.name,
        result.message
    );
    assert_eq!(result.error.as_deref(), Some("HTTP 429: {}"));
}

#[tokio::test]
async fn test_ollama_chat_e2e() {
    run_chat_test::<OllamaTestSetup>()
        .await
        .expect("Ollama chat test failed");
}

#[tokio::test]
async fn test_openai_chat_e2e() {
    run_chat_test::<OpenAITestSetup>()
        .await
        .expect("OpenAI chat test failed");
}

#[tokio::test]
async fn test_deepseek_chat_e2e() {
    run_chat_test::<DeepSeekTestSetup>()
        .await
        .expect("DeepSeek chat test failed");
}

#[tokio::test]
async fn test_anthropic_chat_e2e() {
    run_chat_test::<AnthropicTestSetup>()
        .await
        .expect("Anthropic chat test failed");
}

#[tokio::test]
async fn test_google_chat_e2e() {
    run_chat_test::<GoogleTestSetup>()
        .await
        .expect("Google chat test failed");
}

#[tokio::test]
async fn test_unauthorized_connection_tests() {
    run_unauthorized_test::<OllamaTestSetup>().await;
    run_unauthorized_test::<OpenAITestSetup>().await;
    run_unauthorized_test::<DeepSeekTestSetup>().await;
    run_unauthorized_test::<AnthropicTestSetup>().await;
    run_unauthorized_test::<GoogleTestSetup>().await;
}

#[tokio::test]
async fn test_not_found_connection_tests() {
    run_not_found_test::<OllamaTestSetup>().await;
    run_not_found_test::<OpenAITestSetup>().await;
    run_not_found_test::<DeepSeekTestSetup>().await;
    run_not_found_test::<AnthropicTestSetup>().await;
    run_not_found_test::<GoogleTestSetup>().await;
}

#[tokio::test]
async fn test_rate_limited_connection_tests() {
    run_rate_limited_test::<OllamaTestSetup>().await;
    run_rate_limited_test::<OpenAITestSetup>().await;
    run_rate_limited_test::<DeepSeekTestSetup>().await;
    run_rate_limited_test::<AnthropicTestSetup>().await;
    run_rate_limited_test::<GoogleTestSetup>().await;
}

#[tokio::test]
async fn test_google_missing_model_reported_as_bad_request() {
    let mock_server = MockServer::start().await;
    GoogleTestSetup::mount_probe_reply(
        &mock_server,
        ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "models/gemini-2.0-flash-exp is not found for API version v1beta",
                "status": "INVALID_ARGUMENT"
            }
        })),
    )
    .await;

    let result = GoogleTestSetup::create_provider(&mock_server.uri())
        .test_connection()
        .await;

    assert!(result.connected);
    assert!(!result.models.is_empty());
    assert!(result.message.contains("model 'gemini-2.0-flash-exp' not found"));
    assert!(result.error.is_none());
}
