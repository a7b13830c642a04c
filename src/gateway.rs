//! Name-based entry points: pick a provider by name, make one call.
//!
//! Each call constructs its provider through the process-wide
//! [`ProviderFactory`], so configuration errors surface from the call itself.

use crate::{
    ChatMessage, ChatOptions, ChatStream, ConnectionTestResult, Error, ProviderConfig,
    ProviderFactory,
};
use futures::future::join_all;

/// Send a conversation and return the complete reply.
pub async fn chat(
    provider: &str,
    config: &ProviderConfig,
    messages: &[ChatMessage],
    options: &ChatOptions,
) -> Result<String, Error> {
    ProviderFactory::create(provider, config)?
        .chat(messages, options)
        .await
}

/// Send a conversation and stream the reply.
///
/// The returned stream owns its connection and outlives the provider.
pub async fn stream_chat(
    provider: &str,
    config: &ProviderConfig,
    messages: &[ChatMessage],
    options: &ChatOptions,
) -> Result<ChatStream, Error> {
    ProviderFactory::create(provider, config)?
        .stream_chat(messages, options)
        .await
}

pub async fn list_models(provider: &str, config: &ProviderConfig) -> Result<Vec<String>, Error> {
    ProviderFactory::create(provider, config)?.list_models().await
}

/// Test a provider connection. Never fails; construction errors, such as a
/// missing key or a malformed base URL, are reported in the result.
pub async fn test_connection(provider: &str, config: &ProviderConfig) -> ConnectionTestResult {
    match ProviderFactory::create(provider, config) {
        Ok(provider) => provider.test_connection().await,
        Err(error) => {
            tracing::debug!(provider, error = %error, "provider could not be constructed");
            ConnectionTestResult::from_error(&error)
        }
    }
}

/// Test several providers concurrently, returning results in input order.
pub async fn test_connections(
    targets: &[(&str, ProviderConfig)],
) -> Vec<(String, ConnectionTestResult)> {
    let probes = targets.iter().map(|(name, config)| async move {
        (name.to_string(), test_connection(name, config).await)
    });
    join_all(probes).await
}
