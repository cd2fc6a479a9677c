//! Persisted user preferences.
//!
//! Owned by the settings UI, consumed by the core: the conversation
//! controller reads the effective chat endpoint at request time, nothing
//! more. URL well-formedness is the owning UI's problem; an empty value
//! means "use the configured default".

use crate::error::{AvatarError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// UI appearance mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Light,
    Dark,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Dark => write!(f, "dark"),
        }
    }
}

/// Preferences persisted across sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Avatar-chat endpoint override. Empty means use the default.
    pub api_endpoint: String,
    /// UI appearance mode.
    pub mode: Mode,
}

impl Preferences {
    /// The endpoint the core should call: the persisted override when
    /// non-empty, `default` otherwise.
    #[must_use]
    pub fn effective_endpoint<'a>(&'a self, default: &'a str) -> &'a str {
        let override_url = self.api_endpoint.trim();
        if override_url.is_empty() {
            default
        } else {
            override_url
        }
    }

    /// Load preferences from `path`, returning defaults when the file does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AvatarError::Config(e.to_string()))
    }

    /// Save preferences to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AvatarError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default preference file path under the platform config directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("mira")
            .join("preferences.toml")
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
