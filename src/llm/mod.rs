//! Chat-completion clients.
//!
//! - `openrouter`: direct client for the OpenRouter completion endpoint
//! - `error`: error taxonomy shared by every backend

pub mod error;
pub mod openrouter;

pub use error::RemoteError;
pub use openrouter::OpenRouterClient;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::chat::types::{Attachment, Message, Role};
use crate::page::PageMetadata;

/// Boxed future type for completion backends.
pub type CompletionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Role of a history turn as the completion API names it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    /// User turn.
    User,
    /// Assistant turn.
    Assistant,
}

/// One prior conversation turn.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    /// Author.
    pub role: HistoryRole,
    /// Text.
    pub content: String,
}

/// Map stored messages to completion history.
///
/// Keeps the last `window` messages, skipping system notices.
#[must_use]
pub fn history_from_messages(messages: &[Message], window: usize) -> Vec<HistoryTurn> {
    let turns: Vec<HistoryTurn> = messages
        .iter()
        .filter_map(|m| {
            let role = match m.role {
                Role::User => HistoryRole::User,
                Role::Assistant => HistoryRole::Assistant,
                Role::System => return None,
            };
            Some(HistoryTurn {
                role,
                content: m.content.clone(),
            })
        })
        .collect();

    let skip = turns.len().saturating_sub(window);
    turns.into_iter().skip(skip).collect()
}

/// Everything the model needs to answer one question.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    /// The user's question.
    pub question: String,
    /// Metadata of the page the user is looking at.
    #[serde(default)]
    pub metadata: PageMetadata,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    /// Staged attachment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

/// Anything that can answer an [`AskRequest`].
pub trait CompletionBackend: Send + Sync {
    /// Ask the model and return its answer text.
    fn ask(&self, request: AskRequest) -> CompletionFuture<'_, Result<String, RemoteError>>;
}
