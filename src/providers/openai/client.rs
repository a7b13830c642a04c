use super::types::*;
use crate::connection::{classify_status, Probe, ProbeVerdict};
use crate::error::StreamError;
use crate::factory::ProviderKind;
use crate::provider::{validate_chat_input, ChatProvider};
use crate::response::Frame;
use crate::sse_stream::{SseEvent, SseStreamExt};
use crate::transport::{body_stream, HttpTransport};
use crate::types::{ExtraOptions, Timeouts};
use crate::{ChatMessage, ChatOptions, ChatStream, ConnectionTestResult, Error, ProviderConfig};
use futures_util::StreamExt;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

/// Models listed first, in this order, when present upstream.
const PRIORITY_MODELS: [&str; 5] = ["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"];

/// Every option the OpenAI-compatible provider understands.
#[derive(Debug, Clone)]
pub struct OpenAICompatibleSettings {
    /// Which flavour this is: [`ProviderKind::OpenAI`] or [`ProviderKind::DeepSeek`].
    pub kind: ProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key: SecretString,
    /// Sent as `OpenAI-Organization` when set.
    pub organization: Option<String>,
    pub timeouts: Timeouts,
}

impl OpenAICompatibleSettings {
    pub fn from_config(kind: ProviderKind, config: &ProviderConfig) -> Result<Self, Error> {
        if !matches!(kind, ProviderKind::OpenAI | ProviderKind::DeepSeek) {
            return Err(Error::config(format!(
                "{} does not speak the OpenAI chat completions API",
                kind.display_name()
            )));
        }

        let mut extra = ExtraOptions::new(kind.display_name(), config);
        let timeouts = Timeouts::from_extra(&mut extra)?;
        let organization = extra.string("organization")?;
        extra.finish();

        Ok(Self {
            kind,
            base_url: config.resolve_base_url(kind.default_base_url())?,
            model: config.model_or(kind.default_model()),
            api_key: config.require_api_key(kind.display_name())?,
            organization,
            timeouts,
        })
    }
}

/// Provider for OpenAI and any server exposing `/chat/completions`.
#[derive(Debug)]
pub struct OpenAICompatibleProvider {
    settings: OpenAICompatibleSettings,
    transport: HttpTransport,
}

impl OpenAICompatibleProvider {
    pub fn new(kind: ProviderKind, config: &ProviderConfig) -> Result<Self, Error> {
        Self::with_settings(OpenAICompatibleSettings::from_config(kind, config)?)
    }

    /// Create an OpenAI provider.
    pub fn openai(config: &ProviderConfig) -> Result<Self, Error> {
        Self::new(ProviderKind::OpenAI, config)
    }

    /// Create a DeepSeek provider.
    pub fn deepseek(config: &ProviderConfig) -> Result<Self, Error> {
        Self::new(ProviderKind::DeepSeek, config)
    }

    pub fn with_settings(settings: OpenAICompatibleSettings) -> Result<Self, Error> {
        let transport = HttpTransport::new(settings.kind.display_name(), settings.timeouts)?;
        Ok(Self {
            settings,
            transport,
        })
    }

    pub fn settings(&self) -> &OpenAICompatibleSettings {
        &self.settings
    }

    fn kind(&self) -> ProviderKind {
        self.settings.kind
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.bearer_auth(self.settings.api_key.expose_secret());
        match &self.settings.organization {
            Some(organization) => request.header("OpenAI-Organization", organization),
            None => request,
        }
    }

    /// Convert canonical messages to the Chat Completions format.
    fn convert_request(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        stream: bool,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages: messages
                .iter()
                .map(|m| ChatCompletionMessage {
                    role: m.role.as_str().to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            stream,
        }
    }

    /// Decode one SSE event of a streaming reply.
    fn decode_event(kind: ProviderKind, event: Result<SseEvent, StreamError>) -> Frame {
        let event = match event {
            Ok(event) => event,
            Err(e) => return Frame::Fail(e.into_error(kind.display_name())),
        };
        if event.is_done() {
            return Frame::Done;
        }

        match serde_json::from_str::<ChatCompletionChunk>(&event.data) {
            Ok(ChatCompletionChunk {
                error: Some(error), ..
            }) => Frame::Fail(Error::provider(kind.display_name(), error.message)),
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .map_or(Frame::Skip, Frame::Text),
            Err(e) => {
                tracing::warn!(provider = kind.name(), error = %e, "skipping malformed stream event");
                Frame::Skip
            }
        }
    }

    async fn fetch_models(&self) -> Result<Vec<String>, Error> {
        let request = self.authorize(self.transport.get(&self.models_url()));
        let response = self
            .transport
            .send(request, self.settings.timeouts.probe)
            .await?;
        let response = self.transport.ensure_success(response).await?;
        let list: ModelList = self.transport.read_json(response).await?;
        Ok(order_models(list.data.into_iter().map(|m| m.id).collect()))
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.settings.base_url)
    }

    /// OpenAI keys start with `sk-`; other servers are free to differ.
    fn has_malformed_key(&self) -> bool {
        self.kind() == ProviderKind::OpenAI
            && self.settings.base_url == ProviderKind::OpenAI.default_base_url()
            && !self.settings.api_key.expose_secret().starts_with("sk-")
    }

    /// Probe by listing models; the same response supplies the model list.
    async fn probe_models(&self) -> ConnectionTestResult {
        let mut probe = Probe::new(self.display_name(), &self.settings.model);
        if self.has_malformed_key() {
            return probe.rejected_locally(
                "Invalid API key format. OpenAI API keys should start with 'sk-'.",
            );
        }

        let request = self.authorize(self.transport.get(&self.models_url()));
        let response = match probe
            .call(self.transport.send(request, self.settings.timeouts.probe))
            .await
        {
            Ok(response) => response,
            Err(error) => return probe.unreachable(&error),
        };

        let status = response.status();
        match classify_status(status) {
            ProbeVerdict::Reachable => match self.transport.read_json::<ModelList>(response).await {
                Ok(list) => probe.success(order_models(list.data.into_iter().map(|m| m.id).collect())),
                Err(error) => probe.unreachable(&error),
            },
            // Listing models has no model to miss; a 404 means a wrong base URL
            ProbeVerdict::ModelNotFound => {
                let body = response.text().await.unwrap_or_default();
                probe.rejected(ProbeVerdict::HttpError, status, &body)
            }
            verdict => {
                let body = response.text().await.unwrap_or_default();
                probe.rejected(verdict, status, &body)
            }
        }
    }

    /// Probe with a one-token chat, for servers without a model listing.
    async fn probe_chat(&self) -> ConnectionTestResult {
        let mut probe = Probe::new(self.display_name(), &self.settings.model);
        let messages = [ChatMessage::user("Hi")];
        let body = self.convert_request(&messages, &ChatOptions::default().max_tokens(1), false);

        let request = self.authorize(self.transport.post(&self.chat_url(), &body));
        let response = match probe
            .call(self.transport.send(request, self.settings.timeouts.probe))
            .await
        {
            Ok(response) => response,
            Err(error) => return probe.unreachable(&error),
        };

        let status = response.status();
        let models = static_models(self.kind());
        match classify_status(status) {
            ProbeVerdict::Reachable => probe.success(models),
            ProbeVerdict::ModelNotFound => probe.model_not_found(models, self.kind().default_model()),
            verdict => {
                let body = response.text().await.unwrap_or_default();
                probe.rejected(verdict, status, &body)
            }
        }
    }
}

#[async_trait::async_trait]
impl ChatProvider for OpenAICompatibleProvider {
    fn name(&self) -> &str {
        self.kind().name()
    }

    fn display_name(&self) -> &str {
        self.kind().display_name()
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<String, Error> {
        validate_chat_input(messages, options)?;
        let body = self.convert_request(messages, options, false);
        tracing::debug!(provider = self.name(), model = %self.settings.model, stream = false, "sending chat request");

        let request = self.authorize(self.transport.post(&self.chat_url(), &body));
        let response = self
            .transport
            .send(request, self.settings.timeouts.request)
            .await?;
        let response = self.transport.ensure_success(response).await?;
        let completion: ChatCompletionResponse = self.transport.read_json(response).await?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            Error::invalid_response(self.display_name(), "Response contains no choices")
        })?;
        if choice.finish_reason.as_deref() == Some("content_filter") {
            tracing::warn!(provider = self.name(), "reply was cut short by the content filter");
        }
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatStream, Error> {
        validate_chat_input(messages, options)?;
        let body = self.convert_request(messages, options, true);
        tracing::debug!(provider = self.name(), model = %self.settings.model, stream = true, "sending chat request");

        let request = self.authorize(self.transport.post(&self.chat_url(), &body));
        let response = self.transport.send_streaming(request).await?;
        let response = self.transport.ensure_success(response).await?;
        let response = self.transport.ensure_event_stream(response).await?;

        let kind = self.kind();
        let frames = body_stream(response)
            .sse_events()
            .map(move |event| Self::decode_event(kind, event));

        Ok(ChatStream::from_frames(frames))
    }

    async fn list_models(&self) -> Result<Vec<String>, Error> {
        match self.kind() {
            ProviderKind::OpenAI => self.fetch_models().await,
            kind => Ok(static_models(kind)),
        }
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        match self.kind() {
            ProviderKind::OpenAI => self.probe_models().await,
            _ => self.probe_chat().await,
        }
    }
}

fn static_models(kind: ProviderKind) -> Vec<String> {
    kind.static_models().iter().map(|m| m.to_string()).collect()
}

/// Keep chat models and put the well-known ones first.
///
/// Ids containing `gpt` are kept; when none do (a compatible server with its
/// own naming), every id is kept.
fn order_models(ids: Vec<String>) -> Vec<String> {
    let chat: Vec<String> = ids.iter().filter(|id| id.contains("gpt")).cloned().collect();
    let mut remaining = if chat.is_empty() { ids } else { chat };

    let mut ordered = Vec::with_capacity(remaining.len());
    for priority in PRIORITY_MODELS {
        if let Some(pos) = remaining.iter().position(|id| id == priority) {
            ordered.push(remaining.remove(pos));
        }
    }
    ordered.extend(remaining);
    ordered
}
