//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::config::CompletionConfig;
use crate::llm::{OpenRouterClient, RemoteError};

/// Shared application state.
pub struct AppState {
    /// Completion client.
    pub client: OpenRouterClient,
    /// Key used when a message carries none.
    pub default_api_key: Option<String>,
    /// Model name, reported by the health endpoint.
    pub model_name: String,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: CompletionConfig) -> Result<Arc<Self>, RemoteError> {
        let default_api_key = config.api_key.clone();
        let model_name = config.model.clone();
        let client = OpenRouterClient::new(config)?;

        Ok(Arc::new(Self {
            client,
            default_api_key,
            model_name,
        }))
    }

    /// Pick the key for a message: its own when present, else the default.
    #[must_use]
    pub fn resolve_key<'a>(&'a self, message_key: &'a str) -> &'a str {
        if message_key.trim().is_empty() {
            self.default_api_key.as_deref().unwrap_or_default()
        } else {
            message_key
        }
    }
}
