use super::types::*;
use crate::connection::{classify_status, Probe, ProbeVerdict};
use crate::error::StreamError;
use crate::factory::ProviderKind;
use crate::ndjson_stream::NdjsonStreamExt;
use crate::provider::{validate_chat_input, ChatProvider};
use crate::response::Frame;
use crate::transport::{body_stream, HttpTransport};
use crate::types::{ExtraOptions, Timeouts};
use crate::{ChatMessage, ChatOptions, ChatStream, ConnectionTestResult, Error, ProviderConfig};
use futures_util::{stream, StreamExt};

const KIND: ProviderKind = ProviderKind::Ollama;

/// Every option the local-inference provider understands.
#[derive(Debug, Clone, PartialEq)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
    /// How long the server keeps the model loaded, e.g. `5m`.
    pub keep_alive: Option<String>,
    pub timeouts: Timeouts,
}

impl OllamaSettings {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, Error> {
        let mut extra = ExtraOptions::new(KIND.display_name(), config);
        let timeouts = Timeouts::from_extra(&mut extra)?;
        let keep_alive = extra.string("keep_alive")?;
        extra.finish();

        Ok(Self {
            base_url: config.resolve_base_url(KIND.default_base_url())?,
            model: config.model_or(KIND.default_model()),
            keep_alive,
            timeouts,
        })
    }
}

/// Provider for a local Ollama server. No API key is needed.
#[derive(Debug)]
pub struct OllamaProvider {
    settings: OllamaSettings,
    transport: HttpTransport,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, Error> {
        Self::with_settings(OllamaSettings::from_config(config)?)
    }

    pub fn with_settings(settings: OllamaSettings) -> Result<Self, Error> {
        let transport = HttpTransport::new(KIND.display_name(), settings.timeouts)?;
        Ok(Self {
            settings,
            transport,
        })
    }

    pub fn settings(&self) -> &OllamaSettings {
        &self.settings
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.settings.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.settings.base_url)
    }

    /// Convert canonical messages to the Ollama request format.
    fn convert_request(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        stream: bool,
    ) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.settings.model.clone(),
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
                top_p: options.top_p,
            },
            keep_alive: self.settings.keep_alive.clone(),
        }
    }

    /// Decode one NDJSON line of a streaming reply.
    ///
    /// The closing object may still carry text, so it can yield two frames.
    fn decode_line(line: Result<String, StreamError>) -> Vec<Frame> {
        let line = match line {
            Ok(line) => line,
            Err(e) => return vec![Frame::Fail(e.into_error(KIND.display_name()))],
        };

        match serde_json::from_str::<OllamaChatResponse>(&line) {
            Ok(OllamaChatResponse {
                error: Some(error), ..
            }) => vec![Frame::Fail(Error::provider(KIND.display_name(), error))],
            Ok(chunk) => {
                let text = chunk.message.map(|m| m.content).unwrap_or_default();
                match (text.is_empty(), chunk.done) {
                    (true, true) => vec![Frame::Done],
                    (true, false) => vec![Frame::Skip],
                    (false, true) => vec![Frame::Text(text), Frame::Done],
                    (false, false) => vec![Frame::Text(text)],
                }
            }
            Err(e) => {
                tracing::warn!(provider = KIND.name(), error = %e, "skipping malformed stream line");
                vec![Frame::Skip]
            }
        }
    }

    async fn fetch_models(&self) -> Result<Vec<String>, Error> {
        let request = self.transport.get(&self.tags_url());
        let response = self
            .transport
            .send(request, self.settings.timeouts.probe)
            .await?;
        let response = self.transport.ensure_success(response).await?;
        let tags: OllamaTagsResponse = self.transport.read_json(response).await?;
        Ok(tags.names())
    }
}

#[async_trait::async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &str {
        KIND.name()
    }

    fn display_name(&self) -> &str {
        KIND.display_name()
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn requires_api_key(&self) -> bool {
        false
    }

    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<String, Error> {
        validate_chat_input(messages, options)?;
        let body = self.convert_request(messages, options, false);
        tracing::debug!(provider = KIND.name(), model = %self.settings.model, stream = false, "sending chat request");

        let request = self.transport.post(&self.chat_url(), &body);
        let response = self
            .transport
            .send(request, self.settings.timeouts.request)
            .await?;
        let response = self.transport.ensure_success(response).await?;
        let reply: OllamaChatResponse = self.transport.read_json(response).await?;

        if let Some(error) = reply.error {
            return Err(Error::provider(KIND.display_name(), error));
        }
        reply.message.map(|m| m.content).ok_or_else(|| {
            Error::invalid_response(KIND.display_name(), "Response has no message content")
        })
    }

    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatStream, Error> {
        validate_chat_input(messages, options)?;
        let body = self.convert_request(messages, options, true);
        tracing::debug!(provider = KIND.name(), model = %self.settings.model, stream = true, "sending chat request");

        let request = self.transport.post(&self.chat_url(), &body);
        let response = self.transport.send_streaming(request).await?;
        let response = self.transport.ensure_success(response).await?;

        let frames = body_stream(response)
            .ndjson_lines()
            .flat_map(|line| stream::iter(Self::decode_line(line)));

        Ok(ChatStream::from_frames(frames))
    }

    async fn list_models(&self) -> Result<Vec<String>, Error> {
        self.fetch_models().await
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        let mut probe = Probe::new(KIND.display_name(), &self.settings.model);
        let request = self.transport.get(&self.tags_url());
        let sent = probe
            .call(self.transport.send(request, self.settings.timeouts.probe))
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(error) => {
                let mut result = probe.unreachable(&error);
                if matches!(error, Error::Connection(_)) {
                    result.message = format!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.settings.base_url
                    );
                }
                return result;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // A missing tags endpoint says nothing about the configured model
            let verdict = match classify_status(status) {
                ProbeVerdict::ModelNotFound => ProbeVerdict::HttpError,
                verdict => verdict,
            };
            return probe.rejected(verdict, status, &body);
        }

        let models = match self.transport.read_json::<OllamaTagsResponse>(response).await {
            Ok(tags) => tags.names(),
            Err(error) => return probe.unreachable(&error),
        };

        if models.is_empty() {
            return probe.connected_with_note(
                "Connected, but no models are installed. Run 'ollama pull llama3.2' to download one.",
                models,
            );
        }
        probe.success(models)
    }
}
