use serde::{Deserialize, Serialize};

/// Ollama `/api/chat` request format.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
    pub options: OllamaOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
}

/// Ollama message format; roles map one to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// Sampling options nested under `options`.
#[derive(Debug, Clone, Serialize)]
pub struct OllamaOptions {
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// One chat response object. Non-streaming replies are a single object;
/// streaming replies are one per line, the last with `done: true`.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaChatResponse {
    #[serde(default)]
    pub message: Option<OllamaMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Ollama `/api/tags` response.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaTagsResponse {
    #[serde(default)]
    pub models: Vec<OllamaModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    #[serde(default)]
    pub name: String,
}

impl OllamaTagsResponse {
    /// Model names in listing order; entries without a name are dropped.
    pub fn names(self) -> Vec<String> {
        self.models
            .into_iter()
            .map(|m| m.name)
            .filter(|name| !name.is_empty())
            .collect()
    }
}
