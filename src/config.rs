//! Configuration for the sidebar assistant.
//!
//! Every value has a default; environment variables override them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Default completion endpoint.
pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
/// Default completion model.
pub const DEFAULT_MODEL: &str = "x-ai/grok-4.1-fast:free";
/// Default speech endpoint prefix.
pub const DEFAULT_SPEECH_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// Default speech model.
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
/// Default speech voice.
pub const DEFAULT_VOICE: &str = "Kore";
/// Default background service port.
pub const DEFAULT_PORT: u16 = 8787;

/// Errors raised by configuration checks.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or empty.
    #[error("Invalid config: {0}")]
    Invalid(String),
    /// A URL does not parse.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SidebarConfig {
    /// Completion model settings.
    pub completion: CompletionConfig,
    /// Speech synthesis settings.
    pub speech: SpeechConfig,
    /// Local storage settings.
    pub storage: StorageConfig,
    /// Background service settings.
    pub server: ServerConfig,
    /// Page to report as the active tab.
    pub page_url: Option<String>,
}

impl SidebarConfig {
    /// Build from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values are ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(key) = get("OPENROUTER_API_KEY") {
            config.completion.api_key = Some(key);
        }
        if let Some(model) = get("SIDEBAR_MODEL") {
            config.completion.model = model;
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            config.speech.api_key = Some(key);
        }
        if let Some(voice) = get("SIDEBAR_VOICE") {
            config.speech.voice = voice;
        }
        if let Some(dir) = get("SIDEBAR_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(port) = get("SIDEBAR_PORT").and_then(|p| parse_port(&p)) {
            config.server.port = port;
        }
        config.server.background_url = get("SIDEBAR_BACKGROUND_URL");
        config.page_url = get("SIDEBAR_PAGE_URL");

        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.completion.model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "completion.model must not be empty".to_string(),
            ));
        }

        if self.completion.history_window == 0 {
            return Err(ConfigError::Invalid(
                "completion.history_window must be > 0".to_string(),
            ));
        }

        if self.completion.max_context_chars == 0 {
            return Err(ConfigError::Invalid(
                "completion.max_context_chars must be > 0".to_string(),
            ));
        }

        if self.speech.voice.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "speech.voice must not be empty".to_string(),
            ));
        }

        Url::parse(&self.completion.endpoint)?;
        Url::parse(&self.speech.endpoint_base)?;

        if let Some(url) = &self.server.background_url {
            Url::parse(url)?;
        }

        Ok(())
    }
}

/// Completion model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Chat-completion endpoint.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    /// API key. Requests fail without one.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Maximum page characters embedded in the system instruction.
    pub max_context_chars: usize,
    /// Number of prior messages sent as history.
    pub history_window: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMPLETION_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            max_context_chars: 15_000,
            history_window: 10,
        }
    }
}

impl CompletionConfig {
    /// Set the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Speech synthesis settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Endpoint prefix; the model and method are appended.
    pub endpoint_base: String,
    /// TTS model identifier.
    pub model: String,
    /// Prebuilt voice name.
    pub voice: String,
    /// API key. Synthesis fails without one.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint_base: DEFAULT_SPEECH_ENDPOINT.to_string(),
            model: DEFAULT_SPEECH_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            api_key: None,
        }
    }
}

impl SpeechConfig {
    /// Set the endpoint prefix.
    #[must_use]
    pub fn with_endpoint_base(mut self, endpoint_base: impl Into<String>) -> Self {
        self.endpoint_base = endpoint_base.into();
        self
    }

    /// Set the voice.
    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Local storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the database and rendered audio.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".sidebar_chat"),
        }
    }
}

impl StorageConfig {
    /// `SQLite` database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("sidebar_chat.db")
    }

    /// Where synthesized speech is written.
    #[must_use]
    pub fn speech_path(&self) -> PathBuf {
        self.data_dir.join("speech.wav")
    }
}

/// Background service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// URL of a running background service. When set, the terminal front
    /// end sends questions there instead of calling the model directly.
    pub background_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            background_url: None,
        }
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    match raw.trim().parse() {
        Ok(port) => Some(port),
        Err(e) => {
            warn!("Ignoring SIDEBAR_PORT={raw:?}, using {DEFAULT_PORT}: {e}");
            None
        }
    }
}
