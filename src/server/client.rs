//! Client side of the background message channel.

use std::time::Duration;

use tracing::debug;
use url::Url;

use super::routes::{ASK_AI, ChannelMessage, ChannelReply};
use crate::llm::{AskRequest, CompletionBackend, CompletionFuture, RemoteError};
use crate::page::MessagingError;

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends questions to a running background service.
#[derive(Clone, Debug)]
pub struct BackgroundClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl BackgroundClient {
    /// Connect to the service at `base_url`. `api_key` travels with each
    /// message; without one the service uses its own.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, RemoteError> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join("/api/message"))
            .map_err(|e| {
                MessagingError::ChannelUnavailable(format!("invalid URL {base_url}: {e}"))
            })?;
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.unwrap_or_default(),
        })
    }

    /// Channel endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send(&self, request: AskRequest) -> Result<String, RemoteError> {
        let message = ChannelMessage {
            kind: ASK_AI.to_string(),
            api_key: self.api_key.clone(),
            question: request.question,
            metadata: request.metadata,
            history: request.history,
            attachment: request.attachment,
        };

        debug!("Sending ASK_AI to {}", self.endpoint);
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&message)
            .send()
            .await
            .map_err(|e| MessagingError::ChannelUnavailable(e.to_string()))?;

        let reply: ChannelReply = response.json().await?;
        match reply {
            ChannelReply {
                error: Some(error), ..
            } => Err(RemoteError::Api(error)),
            ChannelReply {
                answer: Some(answer),
                ..
            } => Ok(answer),
            ChannelReply { .. } => Err(RemoteError::Api(
                "empty reply from background service".to_string(),
            )),
        }
    }
}

impl CompletionBackend for BackgroundClient {
    fn ask(&self, request: AskRequest) -> CompletionFuture<'_, Result<String, RemoteError>> {
        Box::pin(self.send(request))
    }
}
