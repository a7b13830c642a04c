use super::types::*;
use crate::connection::{classify_status, Probe, ProbeVerdict};
use crate::error::StreamError;
use crate::factory::ProviderKind;
use crate::provider::{validate_chat_input, ChatProvider};
use crate::response::Frame;
use crate::sse_stream::{SseEvent, SseStreamExt};
use crate::transport::{body_stream, status_error, upstream_message, HttpTransport};
use crate::types::{ExtraOptions, SplitConversation, Timeouts};
use crate::{ChatMessage, ChatOptions, ChatStream, ConnectionTestResult, Error, ProviderConfig, Role};
use futures_util::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};

const KIND: ProviderKind = ProviderKind::Google;

/// Every option the Gemini provider understands.
#[derive(Debug, Clone)]
pub struct GoogleSettings {
    pub base_url: String,
    /// Model id without the `models/` prefix.
    pub model: String,
    pub api_key: SecretString,
    pub timeouts: Timeouts,
}

impl GoogleSettings {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, Error> {
        let mut extra = ExtraOptions::new(KIND.display_name(), config);
        let timeouts = Timeouts::from_extra(&mut extra)?;
        extra.finish();

        let model = config.model_or(KIND.default_model());
        let model = model.strip_prefix("models/").unwrap_or(&model).to_string();

        Ok(Self {
            base_url: config.resolve_base_url(KIND.default_base_url())?,
            model,
            api_key: config.require_api_key(KIND.display_name())?,
            timeouts,
        })
    }
}

/// Google Gemini provider using the Generative Language API.
///
/// The API key travels as the `key` query parameter, so request URLs are
/// never logged and transport errors are stripped of them.
#[derive(Debug)]
pub struct GoogleProvider {
    settings: GoogleSettings,
    transport: HttpTransport,
}

impl GoogleProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, Error> {
        Self::with_settings(GoogleSettings::from_config(config)?)
    }

    pub fn with_settings(settings: GoogleSettings) -> Result<Self, Error> {
        let transport = HttpTransport::new(KIND.display_name(), settings.timeouts)?;
        Ok(Self {
            settings,
            transport,
        })
    }

    pub fn settings(&self) -> &GoogleSettings {
        &self.settings
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url, self.settings.model
        )
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent",
            self.settings.base_url, self.settings.model
        )
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.settings.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.query(&[("key", self.settings.api_key.expose_secret().as_str())])
    }

    /// Convert canonical messages to Gemini format.
    ///
    /// `assistant` becomes `model` and the system prompt moves to
    /// `systemInstruction`.
    fn convert_request(&self, messages: &[ChatMessage], options: &ChatOptions) -> GenerateContentRequest {
        let split = SplitConversation::from_messages(messages);

        GenerateContentRequest {
            contents: split
                .turns
                .iter()
                .map(|m| {
                    let role = match m.role {
                        Role::Assistant => "model",
                        Role::User | Role::System => "user",
                    };
                    Content::text(Some(role), m.content.clone())
                })
                .collect(),
            system_instruction: split.system.map(|text| Content::text(None, text)),
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                top_p: options.top_p,
            },
        }
    }

    /// Decode one SSE event of a streaming reply.
    fn decode_event(event: Result<SseEvent, StreamError>) -> Frame {
        let event = match event {
            Ok(event) => event,
            Err(e) => return Frame::Fail(e.into_error(KIND.display_name())),
        };

        match serde_json::from_str::<GenerateContentResponse>(&event.data) {
            Ok(GenerateContentResponse {
                error: Some(error), ..
            }) => Frame::Fail(Error::provider(KIND.display_name(), error.message)),
            Ok(chunk) => {
                let text = chunk.first_candidate_text();
                if text.is_empty() {
                    Frame::Skip
                } else {
                    Frame::Text(text)
                }
            }
            Err(e) => {
                tracing::warn!(provider = KIND.name(), error = %e, "skipping malformed stream event");
                Frame::Skip
            }
        }
    }

    async fn ensure_success(&self, response: Response) -> Result<Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(google_status_error(status, &body))
    }

    async fn fetch_models(&self) -> Result<Vec<String>, Error> {
        let request = self.authorize(self.transport.get(&self.models_url()));
        let response = self
            .transport
            .send(request, self.settings.timeouts.probe)
            .await?;
        let response = self.ensure_success(response).await?;
        let list: ModelList = self.transport.read_json(response).await?;

        Ok(list
            .models
            .into_iter()
            .filter(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent"))
            .map(|m| m.name.strip_prefix("models/").unwrap_or(&m.name).to_string())
            .collect())
    }
}

/// Gemini answers a bad key with 400 rather than 401.
fn google_status_error(status: StatusCode, body: &str) -> Error {
    if status == StatusCode::BAD_REQUEST && upstream_message(body).contains("API key not valid") {
        return Error::authentication(KIND.display_name(), "Invalid Google API key")
            .with_details(body);
    }
    status_error(KIND.display_name(), status, body)
}

fn probe_verdict(status: StatusCode, body: &str) -> ProbeVerdict {
    if status == StatusCode::BAD_REQUEST {
        let message = upstream_message(body);
        if message.contains("API key not valid") {
            return ProbeVerdict::InvalidCredentials;
        }
        if message.contains("not found") || message.contains("does not exist") {
            return ProbeVerdict::ModelNotFound;
        }
    }
    classify_status(status)
}

fn static_models() -> Vec<String> {
    KIND.static_models().iter().map(|m| m.to_string()).collect()
}

#[async_trait::async_trait]
impl ChatProvider for GoogleProvider {
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
        let body = self.convert_request(messages, options);
        tracing::debug!(provider = KIND.name(), model = %self.settings.model, stream = false, "sending chat request");

        let request = self.authorize(self.transport.post(&self.generate_url(), &body));
        let response = self
            .transport
            .send(request, self.settings.timeouts.request)
            .await?;
        let response = self.ensure_success(response).await?;
        let reply: GenerateContentResponse = self.transport.read_json(response).await?;

        if let Some(error) = reply.error {
            return Err(Error::provider(KIND.display_name(), error.message));
        }
        Ok(reply.first_candidate_text())
    }

    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatStream, Error> {
        validate_chat_input(messages, options)?;
        let body = self.convert_request(messages, options);
        tracing::debug!(provider = KIND.name(), model = %self.settings.model, stream = true, "sending chat request");

        let request = self
            .authorize(self.transport.post(&self.stream_url(), &body))
            .query(&[("alt", "sse")]);
        let response = self.transport.send_streaming(request).await?;
        let response = self.ensure_success(response).await?;
        let response = self.transport.ensure_event_stream(response).await?;

        let frames = body_stream(response).sse_events().map(Self::decode_event);
        Ok(ChatStream::from_frames(frames))
    }

    /// Live listing, falling back to the known models on any failure.
    async fn list_models(&self) -> Result<Vec<String>, Error> {
        match self.fetch_models().await {
            Ok(models) if !models.is_empty() => Ok(models),
            Ok(_) => Ok(static_models()),
            Err(error) => {
                tracing::debug!(provider = KIND.name(), error = %error, "model listing failed, using known models");
                Ok(static_models())
            }
        }
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        let mut probe = Probe::new(KIND.display_name(), &self.settings.model);
        let messages = [ChatMessage::user("Hi")];
        let body = self.convert_request(&messages, &ChatOptions::default().max_tokens(1));

        let request = self.authorize(self.transport.post(&self.generate_url(), &body));
        let response = match probe
            .call(self.transport.send(request, self.settings.timeouts.probe))
            .await
        {
            Ok(response) => response,
            Err(error) => return probe.unreachable(&error),
        };

        let status = response.status();
        let body = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };

        match probe_verdict(status, &body) {
            ProbeVerdict::Reachable => {
                let models = self.list_models().await.unwrap_or_else(|_| static_models());
                probe.success(models)
            }
            ProbeVerdict::ModelNotFound => {
                let models = self.list_models().await.unwrap_or_else(|_| static_models());
                probe.model_not_found(models, KIND.default_model())
            }
            verdict => probe.rejected(verdict, status, &body),
        }
    }
}
