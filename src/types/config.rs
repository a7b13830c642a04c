use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::env;
use std::time::Duration;
use url::Url;

/// Configuration handed to the factory when constructing a provider.
///
/// The provider name is passed alongside it rather than inside it, so the same
/// config shape serves every backend. Providers validate it once, at
/// construction, and keep an immutable copy of the resolved settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// API key. Required by every provider except the local one.
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Model identifier. Empty selects the provider's default model.
    #[serde(default)]
    pub model: String,
    /// Override for the provider's base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Provider-specific options, see each provider's settings struct.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl ProviderConfig {
    /// Create a configuration for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into()));
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The configured model, or `default` when none was given.
    pub fn model_or(&self, default: &str) -> String {
        let model = self.model.trim();
        if model.is_empty() {
            default.to_string()
        } else {
            model.to_string()
        }
    }

    /// The API key, failing when it is absent or blank.
    pub(crate) fn require_api_key(&self, provider: &str) -> Result<SecretString, Error> {
        match &self.api_key {
            Some(key) if !key.expose_secret().trim().is_empty() => {
                Ok(SecretString::new(key.expose_secret().trim().to_string()))
            }
            _ => Err(Error::config(format!(
                "API key required for {provider} provider"
            ))),
        }
    }

    /// The base URL to use, validated and without a trailing slash.
    pub(crate) fn resolve_base_url(&self, default: &str) -> Result<String, Error> {
        let raw = match self.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => default,
        };

        let parsed = Url::parse(raw)
            .map_err(|e| Error::config(format!("Invalid base URL '{raw}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Invalid base URL '{raw}': scheme must be http or https"
            )));
        }

        Ok(raw.trim_end_matches('/').to_string())
    }

    /// Create configuration from environment variables.
    ///
    /// Returns the provider name together with its configuration.
    pub fn from_env() -> Result<(String, Self), Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// `LLM_PROVIDER` selects the provider. Without it, the first provider
    /// with an `<NAME>_API_KEY` set is used, falling back to `ollama`.
    /// `<NAME>_API_KEY`, `<NAME>_MODEL` and `<NAME>_BASE_URL` fill the config.
    pub fn from_lookup<F>(lookup: F) -> Result<(String, Self), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match lookup("LLM_PROVIDER") {
            Some(name) if !name.trim().is_empty() => name.trim().to_lowercase(),
            _ => ["openai", "anthropic", "google", "deepseek"]
                .into_iter()
                .find(|name| lookup(&format!("{}_API_KEY", name.to_uppercase())).is_some())
                .unwrap_or("ollama")
                .to_string(),
        };

        if provider.chars().any(|c| !c.is_ascii_alphanumeric() && c != '-' && c != '_') {
            return Err(Error::config(format!(
                "Invalid LLM_PROVIDER '{provider}'"
            )));
        }

        let prefix = provider.to_uppercase().replace('-', "_");
        let mut config = Self::new(lookup(&format!("{prefix}_MODEL")).unwrap_or_default());
        if let Some(key) = lookup(&format!("{prefix}_API_KEY")) {
            config = config.with_api_key(key);
        }
        if let Some(base_url) = lookup(&format!("{prefix}_BASE_URL")) {
            config = config.with_base_url(base_url);
        }

        Ok((provider, config))
    }
}

/// Sampling options for a single chat call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChatOptions {
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f64,
    /// Upper bound on generated tokens. `None` uses the provider default.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling. `None` leaves the provider default (1.0) in place.
    pub top_p: Option<f64>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            top_p: None,
        }
    }
}

impl ChatOptions {
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Reject out-of-range values before anything is sent.
    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature must be between 0 and 1, got {}",
                self.temperature
            )));
        }
        if let Some(top_p) = self.top_p {
            if !(top_p > 0.0 && top_p <= 1.0) {
                return Err(Error::config(format!(
                    "top_p must be in (0, 1], got {top_p}"
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(Error::config("max_tokens must be positive"));
        }
        Ok(())
    }
}

/// Wall-clock limits applied to provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Whole-request limit for chat; time-to-headers limit for streaming.
    pub request: Duration,
    /// Limit for connection tests and model listings.
    pub probe: Duration,
    /// TCP/TLS connect limit.
    pub connect: Duration,
    /// Longest silence tolerated between two body chunks.
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(120),
            probe: Duration::from_secs(10),
            connect: Duration::from_secs(10),
            read: Duration::from_secs(60),
        }
    }
}

impl Timeouts {
    pub(crate) fn from_extra(extra: &mut ExtraOptions<'_>) -> Result<Self, Error> {
        let defaults = Self::default();
        Ok(Self {
            request: extra.seconds("request_timeout_secs")?.unwrap_or(defaults.request),
            probe: extra.seconds("probe_timeout_secs")?.unwrap_or(defaults.probe),
            connect: extra.seconds("connect_timeout_secs")?.unwrap_or(defaults.connect),
            read: extra.seconds("read_timeout_secs")?.unwrap_or(defaults.read),
        })
    }
}

/// Typed reader over [`ProviderConfig::extra`].
///
/// Every key read is remembered; [`ExtraOptions::finish`] warns about the rest.
pub(crate) struct ExtraOptions<'a> {
    provider: &'a str,
    map: &'a Map<String, Value>,
    known: Vec<&'static str>,
}

impl<'a> ExtraOptions<'a> {
    pub(crate) fn new(provider: &'a str, config: &'a ProviderConfig) -> Self {
        Self {
            provider,
            map: &config.extra,
            known: Vec::new(),
        }
    }

    pub(crate) fn seconds(&mut self, key: &'static str) -> Result<Option<Duration>, Error> {
        self.known.push(key);
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => match value.as_f64().filter(|secs| *secs > 0.0) {
                Some(secs) => Duration::try_from_secs_f64(secs).map(Some).map_err(|_| {
                    Error::config(format!(
                        "{} option '{key}' is out of range: {secs} seconds",
                        self.provider
                    ))
                }),
                None => Err(Error::config(format!(
                    "{} option '{key}' must be a positive number of seconds",
                    self.provider
                ))),
            },
        }
    }

    pub(crate) fn string(&mut self, key: &'static str) -> Result<Option<String>, Error> {
        self.known.push(key);
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(Error::config(format!(
                "{} option '{key}' must be a string",
                self.provider
            ))),
        }
    }

    pub(crate) fn finish(self) {
        for key in self.map.keys() {
            if !self.known.iter().any(|known| *known == key.as_str()) {
                tracing::warn!(provider = self.provider, option = %key, "ignoring unrecognized provider option");
            }
        }
    }
}
