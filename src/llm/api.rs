//! HTTP clients for text generation.
//!
//! Two collaborators speak HTTP:
//! - [`AvatarChatClient`] calls an avatar-chat endpoint
//!   (`POST {"text"} → {"ai_response"}`), the request the conversation
//!   controller issues each turn.
//! - [`CompletionsClient`] calls an OpenAI-compatible chat completions
//!   API, non-streaming; `mira-server` uses it as the upstream brain for
//!   the inbound endpoint.

use crate::config::UpstreamConfig;
use crate::error::{AvatarError, Result};
use crate::llm::ResponseGenerator;
use crate::prefs::Preferences;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Request body sent to the avatar-chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarChatRequest {
    /// The user's utterance.
    pub text: String,
}

/// Success body returned by the avatar-chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarChatResponse {
    /// The assistant reply.
    pub ai_response: String,
}

/// Where the avatar-chat endpoint comes from.
///
/// The persisted `api_endpoint` preference is consulted on every request,
/// so edits made in the settings UI take effect on the next turn without
/// rebuilding the client.
pub enum EndpointSource {
    /// A fixed URL.
    Fixed(String),
    /// Re-read the preference file per request; an empty or unreadable
    /// preference falls back to `default`.
    Preferences { path: PathBuf, default: String },
}

impl EndpointSource {
    fn resolve(&self) -> String {
        match self {
            Self::Fixed(url) => url.clone(),
            Self::Preferences { path, default } => match Preferences::load_or_default(path) {
                Ok(prefs) => prefs.effective_endpoint(default).to_owned(),
                Err(e) => {
                    warn!("could not read preferences, using default endpoint: {e}");
                    default.clone()
                }
            },
        }
    }
}

/// Client for the avatar-chat endpoint.
pub struct AvatarChatClient {
    endpoint: EndpointSource,
    client: reqwest::Client,
}

impl AvatarChatClient {
    /// Create a client for a fixed `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        info!("avatar chat client configured for {endpoint}");
        Self {
            endpoint: EndpointSource::Fixed(endpoint),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client that resolves its endpoint from the persisted
    /// preferences on every request.
    #[must_use]
    pub fn from_preferences(path: PathBuf, default: impl Into<String>) -> Self {
        Self {
            endpoint: EndpointSource::Preferences {
                path,
                default: default.into(),
            },
            client: reqwest::Client::new(),
        }
    }

    /// The endpoint the next request would go to.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.endpoint.resolve()
    }
}

#[async_trait]
impl ResponseGenerator for AvatarChatClient {
    async fn generate(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint.resolve())
            .json(&AvatarChatRequest {
                text: text.to_owned(),
            })
            .send()
            .await
            .map_err(|e| AvatarError::Request(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AvatarError::Request(format!(
                "chat request failed with status {status}"
            )));
        }

        let body: AvatarChatResponse = response
            .json()
            .await
            .map_err(|e| AvatarError::Request(format!("malformed chat response: {e}")))?;
        Ok(body.ai_response)
    }
}

/// Non-streaming client for an OpenAI-compatible chat completions API.
pub struct CompletionsClient {
    config: UpstreamConfig,
    client: reqwest::Client,
}

impl CompletionsClient {
    /// Create a client from upstream connection details.
    #[must_use]
    pub fn new(config: &UpstreamConfig) -> Self {
        info!(
            "completions client configured: {} model={}",
            config.api_url, config.api_model
        );
        Self {
            config: config.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn completions_url(&self) -> String {
        // Accept base URLs given with or without a /v1 suffix.
        let base = self
            .config
            .api_url
            .strip_suffix("/v1")
            .unwrap_or(&self.config.api_url);
        let base = base.trim_end_matches('/');
        format!("{base}/v1/chat/completions")
    }
}

#[async_trait]
impl ResponseGenerator for CompletionsClient {
    async fn generate(&self, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.api_model,
            "messages": [
                { "role": "system", "content": self.config.system_prompt },
                { "role": "user", "content": text },
            ],
        });

        let mut request = self.client.post(self.completions_url()).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AvatarError::Request(format!("completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AvatarError::Request(format!(
                "completion request failed with status {status}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AvatarError::Request(format!("malformed completion response: {e}")))?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                AvatarError::Request("completion response missing message content".to_owned())
            })?;
        Ok(content.trim().to_owned())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
