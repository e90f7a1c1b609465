//! Error types for the completion client.

use thiserror::Error;

use crate::page::MessagingError;

/// Errors raised while asking the model.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No API key is configured.
    #[error("no API key configured for the completion endpoint")]
    MissingApiKey,
    /// The endpoint answered with a structured error.
    #[error("{0}")]
    Api(String),
    /// The response carried no completion choice.
    #[error("Invalid API response: Missing choices. Response: {0}")]
    MissingChoices(String),
    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The response body was not the expected JSON.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    /// The background channel could not be reached.
    #[error(transparent)]
    Messaging(#[from] MessagingError),
}
