//! OpenRouter chat-completion client with native web search.
//!
//! One request per question, no retry. The system instruction embeds the
//! current page (truncated) and tells the model when to search the web.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AskRequest, CompletionBackend, CompletionFuture, HistoryRole, RemoteError};
use crate::chat::types::AttachmentKind;
use crate::config::CompletionConfig;
use crate::page::PageMetadata;

/// Connection timeout. Requests themselves are not time-limited.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Placeholder when the page offered no content.
const NO_CONTENT: &str = "No content available.";

/// Build the system instruction for a page.
///
/// The page content is cut to `max_chars` characters.
#[must_use]
pub fn build_system_prompt(metadata: &PageMetadata, max_chars: usize) -> String {
    let content = metadata.main_content.as_deref().map_or_else(
        || NO_CONTENT.to_string(),
        |text| text.chars().take(max_chars).collect(),
    );

    format!(
        r"You are a smart, helpful assistant with full browsing ability using web search.

[CURRENT PAGE CONTEXT]
URL: {url}
Title: {title}
Content: {content}

[INSTRUCTIONS]
1. **Page Focus**: Use the provided webpage content when the user is asking about the current page.
2. **Missing Info**: If the information is missing from the page (e.g. location, release date, price), AUTOMATICALLY use your web search capability.
3. **General Questions**: If the question is unrelated to the page (e.g. weather, general knowledge), ignore the page content and use web search.
4. **No Hallucinations**: Always confirm facts using search if not in the page.
5. **Format**: Present answers in clear, well-structured language. If you used search, cite your sources naturally.
",
        url = metadata.url,
        title = metadata.title,
    )
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    web_search_options: WebSearchOptions,
    extra_body: ExtraBody,
}

#[derive(Debug, Serialize)]
struct WebSearchOptions {}

#[derive(Debug, Serialize)]
struct ExtraBody {
    reasoning: Reasoning,
}

#[derive(Debug, Serialize)]
struct Reasoning {
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Assemble system, history and user messages.
fn build_messages(request: &AskRequest, max_context_chars: usize) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(ChatMessage {
        role: "system",
        content: MessageContent::Text(build_system_prompt(&request.metadata, max_context_chars)),
    });

    for turn in &request.history {
        let role = match turn.role {
            HistoryRole::User => "user",
            HistoryRole::Assistant => "assistant",
        };
        messages.push(ChatMessage {
            role,
            content: MessageContent::Text(turn.content.clone()),
        });
    }

    let content = match &request.attachment {
        None => MessageContent::Text(request.question.clone()),
        Some(attachment) => match attachment.kind {
            AttachmentKind::Text => MessageContent::Text(attachment.inline_into(&request.question)),
            AttachmentKind::Image => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: request.question.clone(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: attachment.content.clone(),
                    },
                },
            ]),
        },
    };
    messages.push(ChatMessage {
        role: "user",
        content,
    });

    messages
}

/// Extract the answer from a completion response body.
fn parse_completion(body: &str) -> Result<String, RemoteError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)?;
    if let Some(error) = response.error {
        return Err(RemoteError::Api(error.message));
    }

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| RemoteError::MissingChoices(body.to_string()))
}

/// Client for the OpenRouter completion endpoint.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl OpenRouterClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: CompletionConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    /// Ask with an explicit API key.
    ///
    /// # Errors
    /// Returns an error if the key is empty, the request fails, or the
    /// response is an error or carries no choice.
    pub async fn ask_with_key(
        &self,
        api_key: &str,
        request: &AskRequest,
    ) -> Result<String, RemoteError> {
        if api_key.trim().is_empty() {
            return Err(RemoteError::MissingApiKey);
        }

        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: build_messages(request, self.config.max_context_chars),
            web_search_options: WebSearchOptions {},
            extra_body: ExtraBody {
                reasoning: Reasoning { enabled: false },
            },
        };

        debug!(
            "Asking {} with {} history turns",
            self.config.model,
            request.history.len()
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let text = response.text().await?;
        parse_completion(&text)
    }
}

impl CompletionBackend for OpenRouterClient {
    fn ask(&self, request: AskRequest) -> CompletionFuture<'_, Result<String, RemoteError>> {
        Box::pin(async move {
            let api_key = self.config.api_key.clone().unwrap_or_default();
            self.ask_with_key(&api_key, &request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;
    use crate::chat::types::Attachment;
    use crate::llm::HistoryTurn;

    fn request() -> AskRequest {
        AskRequest {
            question: "Where is it?".to_string(),
            metadata: PageMetadata {
                url: "https://example.com".to_string(),
                title: "Example".to_string(),
                main_content: Some("x".repeat(20_000)),
            },
            history: vec![HistoryTurn {
                role: HistoryRole::Assistant,
                content: "Hello".to_string(),
            }],
            attachment: None,
        }
    }

    #[test]
    fn test_system_prompt_truncates_content() {
        let prompt = build_system_prompt(&request().metadata, 15_000);
        assert!(prompt.contains("URL: https://example.com"));
        assert!(prompt.contains("Title: Example"));
        assert!(prompt.contains(&"x".repeat(15_000)));
        assert!(!prompt.contains(&"x".repeat(15_001)));
    }

    #[test]
    fn test_system_prompt_without_content() {
        let prompt = build_system_prompt(&PageMetadata::default(), 15_000);
        assert!(prompt.contains("Content: No content available."));
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatCompletionRequest {
            model: "m",
            messages: build_messages(&request(), 100),
            web_search_options: WebSearchOptions {},
            extra_body: ExtraBody {
                reasoning: Reasoning { enabled: false },
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["web_search_options"], serde_json::json!({}));
        assert_eq!(value["extra_body"]["reasoning"]["enabled"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "assistant");
        assert_eq!(value["messages"][2]["content"], "Where is it?");
    }

    #[test]
    fn test_image_attachment_becomes_content_parts() {
        let mut req = request();
        req.attachment = Some(Attachment::image("cat.png", "data:image/png;base64,AA=="));
        let value = serde_json::to_value(build_messages(&req, 100)).unwrap();
        let parts = &value[2]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AA==");
    }

    #[test]
    fn test_text_attachment_inlined() {
        let mut req = request();
        req.attachment = Some(Attachment::text("a.txt", "body"));
        let value = serde_json::to_value(build_messages(&req, 100)).unwrap();
        assert_eq!(value[2]["content"], "Where is it?\n\n[File: a.txt]\nbody");
    }

    #[test]
    fn test_parse_completion() {
        let ok = parse_completion(r#"{"choices":[{"message":{"content":"Austin"}}]}"#);
        assert_eq!(ok.unwrap(), "Austin");

        let api = parse_completion(r#"{"error":{"message":"Rate limited"}}"#);
        assert!(matches!(api, Err(RemoteError::Api(m)) if m == "Rate limited"));

        let empty = parse_completion(r#"{"choices":[]}"#);
        assert!(matches!(empty, Err(RemoteError::MissingChoices(_))));

        assert!(matches!(parse_completion("<html>"), Err(RemoteError::Json(_))));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let client = OpenRouterClient::new(CompletionConfig::default()).unwrap();
        let result = client.ask(request()).await;
        assert!(matches!(result, Err(RemoteError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_ask_against_local_endpoint() {
        let seen: Arc<Mutex<Option<(String, serde_json::Value)>>> = Arc::new(Mutex::new(None));

        async fn handler(
            State(seen): State<Arc<Mutex<Option<(String, serde_json::Value)>>>>,
            headers: HeaderMap,
            Json(body): Json<serde_json::Value>,
        ) -> Json<serde_json::Value> {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            *seen.lock().unwrap() = Some((auth, body));
            Json(serde_json::json!({"choices":[{"message":{"content":"Austin, Texas"}}]}))
        }

        let app = Router::new()
            .route("/v1/chat/completions", post(handler))
            .with_state(Arc::clone(&seen));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let config = CompletionConfig::default()
            .with_endpoint(format!("http://{addr}/v1/chat/completions"))
            .with_api_key("sk-test");
        let client = OpenRouterClient::new(config).unwrap();

        let answer = client.ask(request()).await.unwrap();
        assert_eq!(answer, "Austin, Texas");

        let (auth, body) = seen.lock().unwrap().take().unwrap();
        assert_eq!(auth, "Bearer sk-test");
        assert_eq!(body["model"], "x-ai/grok-4.1-fast:free");
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(3));
    }
}
