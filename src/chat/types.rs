//! Data model for chat sessions, messages, attachments and pending actions.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to a session until its first user message names it.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Number of characters kept when deriving a title from a message.
const TITLE_MAX_CHARS: usize = 30;

/// Opaque chat identifier.
///
/// New ids are `UUIDv7` strings, so they sort by creation time. Ids loaded from
/// storage are kept verbatim, whatever their shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    /// Generate a fresh, creation-time-ordered identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ChatId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Text typed by the user.
    User,
    /// Model reply. Stored as `"AI"` for compatibility with existing records.
    #[serde(rename = "AI", alias = "Assistant")]
    Assistant,
    /// Status and error notices; never sent to the model.
    System,
}

impl Role {
    /// Stable lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single persisted chat message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub role: Role,
    /// Message text. Text attachments are inlined for user messages.
    pub content: String,
}

impl Message {
    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Build a system notice.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// A persisted conversation thread.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Unique identifier.
    pub id: ChatId,
    /// Display title.
    #[serde(default = "default_title")]
    pub title: String,
    /// Ordered message history.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Last activity timestamp in milliseconds since Unix epoch.
    #[serde(default)]
    pub last_updated: i64,
}

impl ChatSession {
    /// Create an empty session with the default title.
    #[must_use]
    pub fn new(id: ChatId, now_ms: i64) -> Self {
        Self {
            id,
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            last_updated: now_ms,
        }
    }

    /// Whether the title is still the placeholder.
    #[must_use]
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    /// Content of the most recent user message, if any.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

/// Derive a session title from the first user message.
///
/// Keeps the first 30 characters and appends `...` when the text was longer.
#[must_use]
pub fn derive_title(text: &str) -> String {
    let mut title: String = text.chars().take(TITLE_MAX_CHARS).collect();
    if text.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

/// Kind of staged attachment.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    /// Image carried as a `data:` URI.
    Image,
    /// Extracted text content.
    Text,
}

/// A transient payload staged for the next outgoing message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Image or text.
    pub kind: AttachmentKind,
    /// Data URI for images, extracted text otherwise.
    pub content: String,
    /// Original file name.
    pub name: String,
}

impl Attachment {
    /// Build a text attachment.
    #[must_use]
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: AttachmentKind::Text,
            content: content.into(),
            name: name.into(),
        }
    }

    /// Build an image attachment from a data URI.
    #[must_use]
    pub fn image(name: impl Into<String>, data_uri: impl Into<String>) -> Self {
        Self {
            kind: AttachmentKind::Image,
            content: data_uri.into(),
            name: name.into(),
        }
    }

    /// Inline the attachment into a user message for storage.
    ///
    /// Text content is kept under a `[File: name]` header; images are only
    /// noted by name so image data never reaches storage.
    #[must_use]
    pub fn inline_into(&self, text: &str) -> String {
        let note = match self.kind {
            AttachmentKind::Text => format!("[File: {}]\n{}", self.name, self.content),
            AttachmentKind::Image => format!("[Image: {}]", self.name),
        };
        if text.is_empty() {
            note
        } else {
            format!("{text}\n\n{note}")
        }
    }
}

/// Kind of follow-up the assistant offered.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Run a web search for the query.
    SearchWeb,
}

/// An offered, not yet confirmed, follow-up action.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    /// What to do on confirmation.
    pub kind: ActionKind,
    /// Query extracted from the offer.
    pub query: String,
}

impl PendingAction {
    /// Build a web-search action.
    #[must_use]
    pub fn search_web(query: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::SearchWeb,
            query: query.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_truncates() {
        let title = derive_title("Explain quantum entanglement in simple terms please");
        assert_eq!(title, "Explain quantum entanglement i...");
    }

    #[test]
    fn test_derive_title_short_text_kept() {
        assert_eq!(derive_title("Hello"), "Hello");
        let exact = "a".repeat(30);
        assert_eq!(derive_title(&exact), exact);
    }

    #[test]
    fn test_derive_title_counts_chars_not_bytes() {
        let text = "é".repeat(31);
        let title = derive_title(&text);
        assert_eq!(title, format!("{}...", "é".repeat(30)));
    }

    #[test]
    fn test_role_wire_names() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"AI","content":"hi"}"#);

        let legacy: Message = serde_json::from_str(r#"{"role":"Assistant","content":"x"}"#).unwrap();
        assert_eq!(legacy.role, Role::Assistant);
    }

    #[test]
    fn test_session_json_shape() {
        let session = ChatSession::new(ChatId::from("1700000000000"), 42);
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["id"], "1700000000000");
        assert_eq!(value["title"], DEFAULT_TITLE);
        assert_eq!(value["lastUpdated"], 42);
    }

    #[test]
    fn test_generated_ids_are_ordered() {
        let first = ChatId::generate();
        let second = ChatId::generate();
        assert_ne!(first, second);
        assert!(first < second);
    }

    #[test]
    fn test_inline_attachment() {
        let text = Attachment::text("notes.txt", "line one");
        assert_eq!(
            text.inline_into("Summarize"),
            "Summarize\n\n[File: notes.txt]\nline one"
        );

        let image = Attachment::image("cat.png", "data:image/png;base64,AAAA");
        let inlined = image.inline_into("");
        assert_eq!(inlined, "[Image: cat.png]");
        assert!(!inlined.contains("base64"));
    }

    #[test]
    fn test_last_user_message() {
        let mut session = ChatSession::new(ChatId::generate(), 0);
        assert!(session.last_user_message().is_none());
        session.messages.push(Message::user("Where is Tesla HQ?"));
        session.messages.push(Message::assistant("I can check that."));
        assert_eq!(session.last_user_message(), Some("Where is Tesla HQ?"));
    }
}
