//! Connection test results and the probe bookkeeping every provider shares.

use crate::error::truncate;
use crate::Error;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

/// Outcome of a connection test. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub connected: bool,
    pub message: String,
    pub models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionTestResult {
    pub fn connected(message: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            connected: true,
            message: message.into(),
            models,
            latency_ms: None,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            connected: false,
            message: message.into(),
            models: Vec::new(),
            latency_ms: None,
            error,
        }
    }

    /// Report a failure that happened before any request could be made.
    pub fn from_error(error: &Error) -> Self {
        let message = match error {
            Error::Config(_) => "Invalid provider configuration".to_string(),
            Error::UnknownProvider { name, .. } => format!("Unknown provider '{name}'"),
            other => other
                .failure()
                .map(|f| f.message.clone())
                .unwrap_or_else(|| other.to_string()),
        };
        Self::failed(message, Some(error.to_string()))
    }

    pub fn with_latency(mut self, latency: Option<Duration>) -> Self {
        self.latency_ms = latency.map(|d| d.as_millis() as u64);
        self
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}

/// How a probe response status should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeVerdict {
    Reachable,
    InvalidCredentials,
    ModelNotFound,
    RateLimited,
    HttpError,
}

pub(crate) fn classify_status(status: StatusCode) -> ProbeVerdict {
    match status.as_u16() {
        200..=299 => ProbeVerdict::Reachable,
        401 | 403 => ProbeVerdict::InvalidCredentials,
        404 => ProbeVerdict::ModelNotFound,
        429 => ProbeVerdict::RateLimited,
        _ => ProbeVerdict::HttpError,
    }
}

/// One connection test in progress.
pub(crate) struct Probe<'a> {
    provider: &'a str,
    model: &'a str,
    latency: Option<Duration>,
}

impl<'a> Probe<'a> {
    pub(crate) fn new(provider: &'a str, model: &'a str) -> Self {
        Self {
            provider,
            model,
            latency: None,
        }
    }

    /// Run the probe's single network call, recording its wall-clock latency.
    pub(crate) async fn call<F, T>(&mut self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let output = call.await;
        self.latency = Some(started.elapsed());
        output
    }

    fn finish(&self, result: ConnectionTestResult) -> ConnectionTestResult {
        let result = result.with_latency(self.latency);
        tracing::debug!(
            provider = self.provider,
            connected = result.connected,
            latency_ms = ?result.latency_ms,
            "connection test finished"
        );
        result
    }

    /// Failure decided locally, without I/O.
    pub(crate) fn rejected_locally(&self, message: impl Into<String>) -> ConnectionTestResult {
        self.finish(ConnectionTestResult::failed(message, None))
    }

    pub(crate) fn unreachable(&self, error: &Error) -> ConnectionTestResult {
        let message = match error {
            Error::Connection(_) => format!(
                "Cannot reach {}. Check the base URL and your network connection.",
                self.provider
            ),
            Error::InvalidResponse(_) => format!("Invalid response format from {}", self.provider),
            _ => format!("Unexpected error while contacting {}", self.provider),
        };
        self.finish(ConnectionTestResult::failed(message, Some(error.to_string())))
    }

    /// A response that rules out a working connection.
    pub(crate) fn rejected(
        &self,
        verdict: ProbeVerdict,
        status: StatusCode,
        body: &str,
    ) -> ConnectionTestResult {
        let code = status.as_u16();
        let message = match verdict {
            ProbeVerdict::InvalidCredentials => format!(
                "Invalid API key. Please check your {} API key and its permissions.",
                self.provider
            ),
            ProbeVerdict::RateLimited => format!(
                "Rate limit exceeded. Your {} API key is valid but you've reached the rate limit.",
                self.provider
            ),
            _ => format!("{} API error (HTTP {code})", self.provider),
        };
        let error = format!("HTTP {code}: {}", truncate(body.trim(), 200));
        self.finish(ConnectionTestResult::failed(message, Some(error)))
    }

    /// Credentials worked but the configured model does not exist.
    pub(crate) fn model_not_found(&self, models: Vec<String>, suggestion: &str) -> ConnectionTestResult {
        self.finish(ConnectionTestResult::connected(
            format!(
                "Connected but model '{}' not found. Try: {suggestion}",
                self.model
            ),
            models,
        ))
    }

    /// Connected, with a note on what to do next.
    pub(crate) fn connected_with_note(
        &self,
        note: impl Into<String>,
        models: Vec<String>,
    ) -> ConnectionTestResult {
        self.finish(ConnectionTestResult::connected(note, models))
    }

    /// Connected. Warns, without failing, when the configured model is not
    /// among the listed ones.
    pub(crate) fn success(&self, models: Vec<String>) -> ConnectionTestResult {
        let message = if !models.is_empty() && !models.iter().any(|m| m == self.model) {
            let preview: Vec<&str> = models.iter().take(3).map(String::as_str).collect();
            format!(
                "Connected but model '{}' not found. Available models: {}",
                self.model,
                preview.join(", ")
            )
        } else {
            format!("Connected successfully. Using model: {}", self.model)
        };
        self.finish(ConnectionTestResult::connected(message, models))
    }
}
