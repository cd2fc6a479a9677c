//! Configuration types for the avatar subsystem.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default avatar-chat endpoint used when no override is configured.
pub const DEFAULT_CHAT_ENDPOINT: &str = "http://127.0.0.1:3100/api/chat";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Avatar-chat collaborator settings.
    pub chat: ChatConfig,
    /// Speech-output settings.
    pub speech: SpeechOptions,
    /// Lip-sync cue scheduling settings.
    pub lipsync: LipSyncConfig,
    /// Chat-completion endpoint settings (server binary).
    pub server: ServerConfig,
}

/// Settings for the outbound avatar-chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Avatar-chat endpoint URL. The persisted `api_endpoint` preference
    /// overrides this when non-empty.
    pub endpoint: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CHAT_ENDPOINT.to_owned(),
        }
    }
}

/// Options applied to each spoken utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechOptions {
    /// Speaking rate multiplier.
    pub rate: f32,
    /// Pitch multiplier.
    pub pitch: f32,
    /// Playback volume in `0.0..=1.0`.
    pub volume: f32,
    /// Preferred voice, matched by name substring against the provider's
    /// voice list. `None` selects a voice heuristically, falling back to
    /// the provider default.
    pub voice: Option<String>,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
        }
    }
}

/// Cue scheduling settings for lip-sync animation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LipSyncConfig {
    /// Interval between successive mouth-shape cues in ms.
    pub cue_interval_ms: u64,
    /// How long each mouth shape is held in ms. Kept shorter than the
    /// interval so cues pulse instead of overlapping.
    pub cue_duration_ms: u64,
    /// Speaking-speed estimate used to bound the cue schedule for an
    /// utterance.
    pub words_per_minute: f32,
}

impl Default for LipSyncConfig {
    fn default() -> Self {
        Self {
            cue_interval_ms: 300,
            cue_duration_ms: 200,
            words_per_minute: 150.0,
        }
    }
}

/// Settings for the chat-completion endpoint served by `mira-server`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    pub bind_addr: String,
    /// Upstream text-generation provider.
    pub upstream: UpstreamConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".to_owned(),
            upstream: UpstreamConfig::default(),
        }
    }
}

/// Connection details for an OpenAI-compatible chat completions provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Provider base URL.
    pub api_url: String,
    /// Model name to request.
    pub api_model: String,
    /// Bearer token. Empty for local servers that need none.
    pub api_key: String,
    /// System prompt prepended to every request.
    pub system_prompt: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_owned(),
            api_model: "gpt-4o".to_owned(),
            api_key: String::new(),
            system_prompt: "You are an AI-powered customer support avatar assistant. \
                            You are helpful, friendly, and knowledgeable. \
                            Provide concise and accurate responses. \
                            If you don't know something, be honest about it."
                .to_owned(),
        }
    }
}

impl AvatarConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::AvatarError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot
    /// be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AvatarError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from the default path when the file exists, defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error only if an existing file fails to read or parse.
    pub fn load_or_default() -> crate::error::Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Default config file path under the platform config directory.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("mira")
            .join("config.toml")
    }

    /// Check option ranges that would make the subsystem misbehave.
    ///
    /// # Errors
    ///
    /// Returns a config error describing the first invalid field.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.speech.rate <= 0.0 {
            return Err(crate::error::AvatarError::Config(
                "speech.rate must be positive".to_owned(),
            ));
        }
        if self.speech.pitch <= 0.0 {
            return Err(crate::error::AvatarError::Config(
                "speech.pitch must be positive".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.speech.volume) {
            return Err(crate::error::AvatarError::Config(
                "speech.volume must be in 0.0..=1.0".to_owned(),
            ));
        }
        if self.lipsync.cue_interval_ms == 0 {
            return Err(crate::error::AvatarError::Config(
                "lipsync.cue_interval_ms must be non-zero".to_owned(),
            ));
        }
        if self.lipsync.cue_duration_ms == 0 {
            return Err(crate::error::AvatarError::Config(
                "lipsync.cue_duration_ms must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
