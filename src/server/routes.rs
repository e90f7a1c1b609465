//! HTTP route handlers for the background message channel.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chat::types::Attachment;
use crate::llm::{AskRequest, HistoryTurn};
use crate::page::PageMetadata;

use super::state::AppState;

/// Message type asking the model a question.
pub const ASK_AI: &str = "ASK_AI";

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/message", post(handle_message))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sidebar-background",
        "model": state.model_name,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// A message sent over the channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    /// Message type. Only [`ASK_AI`] is handled.
    #[serde(rename = "type")]
    pub kind: String,
    /// API key; empty means the server's own.
    #[serde(default)]
    pub api_key: String,
    /// The user's question.
    #[serde(default)]
    pub question: String,
    /// Page metadata.
    #[serde(default)]
    pub metadata: PageMetadata,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    /// Staged attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

/// Reply carried back over the channel. Exactly one field is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelReply {
    /// The model's answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Why no answer was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelReply {
    fn answer(answer: String) -> Self {
        Self {
            answer: Some(answer),
            error: None,
        }
    }

    fn error(error: impl Into<String>) -> Self {
        Self {
            answer: None,
            error: Some(error.into()),
        }
    }
}

/// Handle a channel message.
///
/// Model failures are reported in-band with status 200.
async fn handle_message(
    State(state): State<Arc<AppState>>,
    Json(message): Json<ChannelMessage>,
) -> (StatusCode, Json<ChannelReply>) {
    if message.kind != ASK_AI {
        return (
            StatusCode::BAD_REQUEST,
            Json(ChannelReply::error(format!(
                "Unknown message type: {}",
                message.kind
            ))),
        );
    }

    let api_key = state.resolve_key(&message.api_key).to_string();
    let request = AskRequest {
        question: message.question,
        metadata: message.metadata,
        history: message.history,
        attachment: message.attachment,
    };

    match state.client.ask_with_key(&api_key, &request).await {
        Ok(answer) => (StatusCode::OK, Json(ChannelReply::answer(answer))),
        Err(e) => {
            warn!("ASK_AI failed: {e}");
            (StatusCode::OK, Json(ChannelReply::error(e.to_string())))
        }
    }
}
