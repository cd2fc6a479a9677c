//! Chat-completion server binary.
//!
//! Serves the avatar chat endpoint, generating replies through the
//! configured OpenAI-compatible upstream provider.

use mira::config::AvatarConfig;
use mira::llm::api::CompletionsClient;
use mira::llm::server;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AvatarConfig::load_or_default()
        .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid config: {e}"))?;

    let generator = Arc::new(CompletionsClient::new(&config.server.upstream));
    let (addr, handle) = server::serve(&config.server.bind_addr, generator)
        .await
        .map_err(|e| anyhow::anyhow!("failed to start chat server: {e}"))?;
    tracing::info!("mira-server ready on {addr}");

    handle
        .await
        .map_err(|e| anyhow::anyhow!("chat server task failed: {e}"))?;
    Ok(())
}
