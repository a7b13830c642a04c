//! HTTP plumbing shared by every provider: client construction, timeouts and
//! mapping of transport failures and HTTP statuses onto [`Error`].

use crate::error::truncate;
use crate::types::Timeouts;
use crate::Error;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// A pooled HTTP client bound to one provider.
///
/// Cloning is cheap and clones share the connection pool, so concurrent calls
/// on one provider never share mutable state.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    client: Client,
    provider: &'static str,
    timeouts: Timeouts,
}

impl HttpTransport {
    pub(crate) fn new(provider: &'static str, timeouts: Timeouts) -> Result<Self, Error> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client for {provider}: {e}")))?;

        Ok(Self {
            client,
            provider,
            timeouts,
        })
    }

    pub(crate) fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> RequestBuilder {
        self.client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(body)
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send a request bounded by a whole-request timeout.
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<Response, Error> {
        request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(self.provider, e))
    }

    /// Send a streaming request.
    ///
    /// Only the wait for response headers is bounded by the request timeout;
    /// the body is bounded per chunk by the client's read timeout.
    pub(crate) async fn send_streaming(&self, request: RequestBuilder) -> Result<Response, Error> {
        match tokio::time::timeout(self.timeouts.request, request.send()).await {
            Ok(result) => result.map_err(|e| transport_error(self.provider, e)),
            Err(_) => Err(Error::connection(
                self.provider,
                format!(
                    "Timed out after {:?} waiting for a response",
                    self.timeouts.request
                ),
            )),
        }
    }

    /// Pass successful responses through; classify everything else.
    pub(crate) async fn ensure_success(&self, response: Response) -> Result<Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(self.provider, status, &body))
    }

    /// Reject a streaming response whose content type shows it is not SSE.
    ///
    /// Servers that ignore the stream flag answer with a single JSON document.
    pub(crate) async fn ensure_event_stream(&self, response: Response) -> Result<Response, Error> {
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim_start().starts_with("application/json"));
        if !is_json {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::invalid_response(
            self.provider,
            "Expected an event stream but received a JSON document",
        )
        .with_details(&body))
    }

    /// Read the body and decode it as JSON.
    pub(crate) async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, Error> {
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(self.provider, e))?;
        serde_json::from_str(&body).map_err(|e| {
            Error::invalid_response(self.provider, format!("Could not parse response: {e}"))
                .with_details(&body)
        })
    }
}

/// The response body as a byte stream whose errors never carry the URL.
pub(crate) fn body_stream(
    response: Response,
) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin {
    response
        .bytes_stream()
        .map(|chunk| chunk.map_err(reqwest::Error::without_url))
}

/// Map a reqwest failure onto the error taxonomy.
///
/// The URL is stripped first; some providers carry the API key in the query.
pub(crate) fn transport_error(provider: &str, error: reqwest::Error) -> Error {
    let error = error.without_url();
    if error.is_timeout() {
        Error::connection(provider, format!("Request to {provider} timed out"))
    } else if error.is_connect() {
        Error::connection(provider, format!("Cannot connect to {provider}: {error}"))
    } else if error.is_decode() {
        Error::invalid_response(provider, format!("Could not decode response: {error}"))
    } else if error.is_request() || error.is_body() {
        Error::connection(provider, format!("Request to {provider} failed: {error}"))
    } else {
        Error::provider(provider, error.to_string())
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> Error {
    let code = status.as_u16();
    let upstream = upstream_message(body);

    let error = match code {
        401 | 403 => Error::authentication(
            provider,
            format!("Invalid {provider} API key or insufficient permissions (HTTP {code})"),
        ),
        429 => Error::rate_limit(provider, format!("Rate limit exceeded (HTTP 429): {upstream}")),
        404 => Error::provider(provider, format!("Not found (HTTP 404): {upstream}"))
            .with_hint("check the model name and base URL"),
        500..=599 => Error::provider(provider, format!("{provider} returned status {code}: {upstream}"))
            .with_hint("the provider may be temporarily unavailable; retry later"),
        _ => Error::provider(provider, format!("{provider} returned status {code}: {upstream}"))
            .with_hint("check the request parameters and model name"),
    };

    error.with_details(body)
}

/// The most useful human-readable message in an upstream error body.
///
/// Understands `{"error": {"message": ...}}`, `{"error": "..."}` and
/// `{"message": ...}`; anything else is returned truncated.
pub(crate) fn upstream_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.get("error"))
            .or_else(|| value.get("message"))
            .and_then(serde_json::Value::as_str);
        if let Some(message) = message {
            return message.to_string();
        }
    }
    let body = body.trim();
    if body.is_empty() {
        "empty response body".to_string()
    } else {
        truncate(body, 200)
    }
}
