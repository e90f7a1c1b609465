//! State-change events published by the session controller.
//!
//! Front ends subscribe with a [`ChatObserver`] and re-render from the
//! events alone; the controller never knows how it is displayed.

use super::types::{Attachment, ChatId, ChatSession, Message};

/// One entry of the session list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionSummary {
    /// Session id.
    pub id: ChatId,
    /// Display title.
    pub title: String,
    /// Last activity, milliseconds since Unix epoch.
    pub last_updated: i64,
    /// Whether this is the current session.
    pub active: bool,
}

impl SessionSummary {
    pub(crate) fn of(session: &ChatSession, current: Option<&ChatId>) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            last_updated: session.last_updated,
            active: current == Some(&session.id),
        }
    }
}

/// Something the presentation layer should reflect.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChatEvent {
    /// The session list or its active marker changed.
    SessionsChanged(Vec<SessionSummary>),
    /// An empty session became current; show the welcome state.
    ConversationReset,
    /// An existing session became current; show its messages.
    ConversationLoaded(Vec<Message>),
    /// A message should be displayed. The attachment is for display only.
    MessageAppended {
        /// The message.
        message: Message,
        /// Staged attachment sent with it, if any.
        attachment: Option<Attachment>,
    },
    /// A remote request started.
    ThinkingStarted,
    /// The remote request finished, successfully or not.
    ThinkingFinished,
}

/// Subscriber to controller events.
pub trait ChatObserver: Send + Sync {
    /// React to an event.
    fn on_event(&self, event: &ChatEvent);
}

/// Asks the user before a destructive operation.
pub trait Confirmer: Send + Sync {
    /// Whether `session` may be deleted.
    fn confirm_delete(&self, session: &ChatSession) -> bool;
}

/// Confirms everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysConfirm;

impl Confirmer for AlwaysConfirm {
    fn confirm_delete(&self, _session: &ChatSession) -> bool {
        true
    }
}
