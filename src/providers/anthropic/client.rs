use super::types::*;
use crate::connection::{classify_status, Probe, ProbeVerdict};
use crate::error::StreamError;
use crate::factory::ProviderKind;
use crate::provider::{validate_chat_input, ChatProvider};
use crate::response::Frame;
use crate::sse_stream::{SseEvent, SseStreamExt};
use crate::transport::{body_stream, HttpTransport};
use crate::types::{ExtraOptions, Role, SplitConversation, Timeouts};
use crate::{ChatMessage, ChatOptions, ChatStream, ConnectionTestResult, Error, ProviderConfig};
use futures_util::StreamExt;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

const KIND: ProviderKind = ProviderKind::Anthropic;

/// Default `anthropic-version` header value.
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// `max_tokens` is mandatory on this API; used when the caller sets none.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Every option the Anthropic provider understands.
#[derive(Debug, Clone)]
pub struct AnthropicSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: SecretString,
    pub api_version: String,
    pub timeouts: Timeouts,
}

impl AnthropicSettings {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, Error> {
        let mut extra = ExtraOptions::new(KIND.display_name(), config);
        let timeouts = Timeouts::from_extra(&mut extra)?;
        let api_version = extra
            .string("anthropic_version")?
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        extra.finish();

        Ok(Self {
            base_url: config.resolve_base_url(KIND.default_base_url())?,
            model: config.model_or(KIND.default_model()),
            api_key: config.require_api_key(KIND.display_name())?,
            api_version,
            timeouts,
        })
    }
}

/// Anthropic Claude provider using the Messages API.
#[derive(Debug)]
pub struct AnthropicProvider {
    settings: AnthropicSettings,
    transport: HttpTransport,
}

impl AnthropicProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, Error> {
        Self::with_settings(AnthropicSettings::from_config(config)?)
    }

    pub fn with_settings(settings: AnthropicSettings) -> Result<Self, Error> {
        let transport = HttpTransport::new(KIND.display_name(), settings.timeouts)?;
        Ok(Self {
            settings,
            transport,
        })
    }

    pub fn settings(&self) -> &AnthropicSettings {
        &self.settings
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.settings.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("x-api-key", self.settings.api_key.expose_secret())
            .header("anthropic-version", &self.settings.api_version)
    }

    /// Convert canonical messages to Anthropic format.
    ///
    /// The system prompt moves to the top-level `system` field.
    fn convert_request(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        stream: bool,
    ) -> MessagesRequest {
        let split = SplitConversation::from_messages(messages);

        MessagesRequest {
            model: self.settings.model.clone(),
            messages: split
                .turns
                .iter()
                .map(|m| AnthropicMessage {
                    role: match m.role {
                        Role::Assistant => "assistant",
                        Role::User | Role::System => "user",
                    }
                    .to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: split.system.map(str::to_string),
            temperature: options.temperature,
            top_p: options.top_p,
            stream,
        }
    }

    /// Decode one SSE event of a streaming reply.
    fn decode_event(event: Result<SseEvent, StreamError>) -> Frame {
        let event = match event {
            Ok(event) => event,
            Err(e) => return Frame::Fail(e.into_error(KIND.display_name())),
        };

        match serde_json::from_str::<StreamEvent>(&event.data) {
            Ok(StreamEvent::ContentBlockDelta { delta }) => {
                delta.text.map_or(Frame::Skip, Frame::Text)
            }
            Ok(StreamEvent::MessageStop) => Frame::Done,
            Ok(StreamEvent::Error { error }) => Frame::Fail(Error::provider(
                KIND.display_name(),
                format!("Stream failed ({}): {}", error.kind, error.message),
            )),
            Ok(StreamEvent::Other) => Frame::Skip,
            Err(e) => {
                tracing::warn!(provider = KIND.name(), error = %e, "skipping malformed stream event");
                Frame::Skip
            }
        }
    }
}

#[async_trait::async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        KIND.name()
    }

    fn display_name(&self) -> &str {
        KIND.display_name()
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<String, Error> {
        validate_chat_input(messages, options)?;
        let body = self.convert_request(messages, options, false);
        tracing::debug!(provider = KIND.name(), model = %self.settings.model, stream = false, "sending chat request");

        let request = self.authorize(self.transport.post(&self.messages_url(), &body));
        let response = self
            .transport
            .send(request, self.settings.timeouts.request)
            .await?;
        let response = self.transport.ensure_success(response).await?;
        let reply: MessagesResponse = self.transport.read_json(response).await?;

        let text = reply
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<String>();
        Ok(text)
    }

    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatStream, Error> {
        validate_chat_input(messages, options)?;
        let body = self.convert_request(messages, options, true);
        tracing::debug!(provider = KIND.name(), model = %self.settings.model, stream = true, "sending chat request");

        let request = self.authorize(self.transport.post(&self.messages_url(), &body));
        let response = self.transport.send_streaming(request).await?;
        let response = self.transport.ensure_success(response).await?;
        let response = self.transport.ensure_event_stream(response).await?;

        let frames = body_stream(response).sse_events().map(Self::decode_event);
        Ok(ChatStream::from_frames(frames))
    }

    /// There is no listing endpoint; the known models are returned.
    async fn list_models(&self) -> Result<Vec<String>, Error> {
        Ok(KIND.static_models().iter().map(|m| m.to_string()).collect())
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        let mut probe = Probe::new(KIND.display_name(), &self.settings.model);
        let messages = [ChatMessage::user("Hi")];
        let body = self.convert_request(&messages, &ChatOptions::default().max_tokens(1), false);

        let request = self.authorize(self.transport.post(&self.messages_url(), &body));
        let response = match probe
            .call(self.transport.send(request, self.settings.timeouts.probe))
            .await
        {
            Ok(response) => response,
            Err(error) => return probe.unreachable(&error),
        };

        let status = response.status();
        let models: Vec<String> = KIND.static_models().iter().map(|m| m.to_string()).collect();
        match classify_status(status) {
            ProbeVerdict::Reachable => probe.success(models),
            ProbeVerdict::ModelNotFound => probe.model_not_found(models, KIND.default_model()),
            verdict => {
                let body = response.text().await.unwrap_or_default();
                probe.rejected(verdict, status, &body)
            }
        }
    }
}
