use std::fmt;
use thiserror::Error;

/// Upstream bodies kept on an error are cut to this many characters.
pub const MAX_DETAIL_CHARS: usize = 300;

/// Context carried by every provider-raised error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Display name of the provider that failed.
    pub provider: String,
    /// Human readable summary.
    pub message: String,
    /// Actionable remediation hint.
    pub hint: Option<String>,
    /// Raw upstream payload, truncated, for diagnostics only.
    pub details: Option<String>,
}

impl ProviderFailure {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
            hint: None,
            details: None,
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.provider, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " ({hint})")?;
        }
        Ok(())
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    RateLimit,
    Connection,
    InvalidResponse,
    Unknown,
    Config,
    UnknownProvider,
}

/// Errors that can occur when talking to a provider through the gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    Authentication(ProviderFailure),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(ProviderFailure),

    #[error("Connection failed: {0}")]
    Connection(ProviderFailure),

    #[error("Invalid response: {0}")]
    InvalidResponse(ProviderFailure),

    #[error("Provider error: {0}")]
    Unknown(ProviderFailure),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown provider '{name}'. Available providers: {}", available.join(", "))]
    UnknownProvider { name: String, available: Vec<String> },
}

impl Error {
    pub fn authentication(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Authentication(ProviderFailure::new(provider, message))
            .with_hint("check your API key")
    }

    pub fn rate_limit(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RateLimit(ProviderFailure::new(provider, message))
            .with_hint("wait before retrying or check your plan limits")
    }

    pub fn connection(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Connection(ProviderFailure::new(provider, message))
            .with_hint("check the base URL and your network connection")
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidResponse(ProviderFailure::new(provider, message))
            .with_hint("the provider API may have changed; check the base URL points at a compatible server")
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Unknown(ProviderFailure::new(provider, message))
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    fn failure_mut(&mut self) -> Option<&mut ProviderFailure> {
        match self {
            Error::Authentication(f)
            | Error::RateLimit(f)
            | Error::Connection(f)
            | Error::InvalidResponse(f)
            | Error::Unknown(f) => Some(f),
            Error::Config(_) | Error::UnknownProvider { .. } => None,
        }
    }

    /// The provider context, if this error was raised by a provider.
    pub fn failure(&self) -> Option<&ProviderFailure> {
        match self {
            Error::Authentication(f)
            | Error::RateLimit(f)
            | Error::Connection(f)
            | Error::InvalidResponse(f)
            | Error::Unknown(f) => Some(f),
            Error::Config(_) | Error::UnknownProvider { .. } => None,
        }
    }

    /// Replace the remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        if let Some(failure) = self.failure_mut() {
            failure.hint = Some(hint.into());
        }
        self
    }

    /// Attach the raw upstream payload, truncated to [`MAX_DETAIL_CHARS`].
    pub fn with_details(mut self, details: &str) -> Self {
        if let Some(failure) = self.failure_mut() {
            if !details.trim().is_empty() {
                failure.details = Some(truncate(details, MAX_DETAIL_CHARS));
            }
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::RateLimit(_) => ErrorKind::RateLimit,
            Error::Connection(_) => ErrorKind::Connection,
            Error::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Error::Unknown(_) => ErrorKind::Unknown,
            Error::Config(_) => ErrorKind::Config,
            Error::UnknownProvider { .. } => ErrorKind::UnknownProvider,
        }
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.failure().map(|f| f.provider.as_str())
    }

    pub fn hint(&self) -> Option<&str> {
        self.failure().and_then(|f| f.hint.as_deref())
    }

    pub fn details(&self) -> Option<&str> {
        self.failure().and_then(|f| f.details.as_deref())
    }

    /// Whether retrying with backoff can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::RateLimit(_))
    }
}

/// Errors raised while decoding a streamed response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream read failed: {0}")]
    Transport(String),

    #[error("stream buffer exceeded {0} bytes without a complete frame")]
    Overflow(usize),
}

impl StreamError {
    /// Attribute a stream failure to a provider.
    pub fn into_error(self, provider: &str) -> Error {
        match self {
            StreamError::Transport(message) => Error::connection(
                provider,
                format!("Stream interrupted: {message}"),
            ),
            StreamError::Overflow(_) => Error::invalid_response(provider, self.to_string()),
        }
    }
}

/// Cut `text` to at most `limit` characters, marking the cut.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
