//! Stream a reply from whichever provider the environment selects.
//!
//! ```bash
//! export LLM_PROVIDER=anthropic
//! export ANTHROPIC_API_KEY=your_api_key_here
//! RUST_LOG=llm_gateway=debug cargo run --example chat -- "Tell me a short story"
//! ```
//!
//! Without `LLM_PROVIDER`, the first provider with an API key set is used,
//! falling back to a local Ollama server.

use futures_util::StreamExt;
use llm_gateway::{ChatMessage, ChatOptions, Error, ProviderConfig, ProviderFactory};
use std::io::Write;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (name, config) = ProviderConfig::from_env()?;
    let provider = ProviderFactory::create(&name, &config)?;
    println!("Using {} ({})", provider.display_name(), provider.model());

    let status = provider.test_connection().await;
    println!("{}", status.message);
    if !status.connected {
        if let Some(error) = status.error {
            eprintln!("  {error}");
        }
        return Ok(());
    }

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Tell me a short story about a robot learning to paint.".to_string());
    let messages = [
        ChatMessage::system("You are a helpful assistant that responds concisely."),
        ChatMessage::user(question),
    ];
    let options = ChatOptions::default().max_tokens(300);

    let mut stream = provider.stream_chat(&messages, &options).await?;
    while let Some(fragment) = stream.next().await {
        print!("{}", fragment?);
        std::io::stdout().flush().ok();
    }
    println!();

    Ok(())
}
