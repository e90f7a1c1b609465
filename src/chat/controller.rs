//! Session controller.
//!
//! Owns the chat list, the current selection and the pending-action slot.
//! Every operation takes `&mut self`, so state changes never interleave.
//! Observers receive a [`ChatEvent`] for everything worth displaying.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::events::{AlwaysConfirm, ChatEvent, ChatObserver, Confirmer, SessionSummary};
use super::intent::{IntentStrategy, ReplyKind, classify_reply, is_vague_query};
use super::store::ChatStore;
use super::types::{ActionKind, Attachment, ChatId, ChatSession, Message, PendingAction, derive_title};
use crate::llm::{AskRequest, CompletionBackend, history_from_messages};
use crate::page::{PageContextProvider, PageMetadata};

/// Assistant acknowledgement when a pending action is declined.
pub const DECLINE_MESSAGE: &str = "Okay, I won't do that.";

/// Default number of prior messages sent as history.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// What happened to a user message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SendOutcome {
    /// Nothing to send.
    Ignored,
    /// A pending action was declined locally.
    Declined,
    /// The model answered.
    Answered,
    /// The request failed; an error notice was displayed.
    Failed,
}

/// Emits [`ChatEvent::ThinkingFinished`] on drop, including when the
/// request future is abandoned.
struct ThinkingGuard<'a> {
    observers: &'a [Box<dyn ChatObserver>],
}

impl<'a> ThinkingGuard<'a> {
    fn start(observers: &'a [Box<dyn ChatObserver>]) -> Self {
        for observer in observers {
            observer.on_event(&ChatEvent::ThinkingStarted);
        }
        Self { observers }
    }
}

impl Drop for ThinkingGuard<'_> {
    fn drop(&mut self) {
        for observer in self.observers {
            observer.on_event(&ChatEvent::ThinkingFinished);
        }
    }
}

/// Coordinates chat state, persistence and the completion backend.
pub struct SessionController {
    chats: Vec<ChatSession>,
    current: Option<ChatId>,
    pending: Option<PendingAction>,
    store: Box<dyn ChatStore>,
    backend: Arc<dyn CompletionBackend>,
    page: Arc<dyn PageContextProvider>,
    intent: Box<dyn IntentStrategy>,
    confirmer: Box<dyn Confirmer>,
    observers: Vec<Box<dyn ChatObserver>>,
    history_window: usize,
    /// The stored record could not be read and has not been backed up yet.
    unread_record: bool,
}

impl SessionController {
    /// Create a controller. Call [`init`](Self::init) before use.
    #[must_use]
    pub fn new(
        store: Box<dyn ChatStore>,
        backend: Arc<dyn CompletionBackend>,
        page: Arc<dyn PageContextProvider>,
        intent: Box<dyn IntentStrategy>,
    ) -> Self {
        Self {
            chats: Vec::new(),
            current: None,
            pending: None,
            store,
            backend,
            page,
            intent,
            confirmer: Box::new(AlwaysConfirm),
            observers: Vec::new(),
            history_window: DEFAULT_HISTORY_WINDOW,
            unread_record: false,
        }
    }

    /// Ask `confirmer` before deleting sessions.
    #[must_use]
    pub fn with_confirmer(mut self, confirmer: Box<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    /// Send at most `window` prior messages as history.
    #[must_use]
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// Register an observer.
    pub fn subscribe(&mut self, observer: Box<dyn ChatObserver>) {
        self.observers.push(observer);
    }

    /// All sessions, most recent first.
    #[must_use]
    pub fn chats(&self) -> &[ChatSession] {
        &self.chats
    }

    /// The current session.
    #[must_use]
    pub fn current_session(&self) -> Option<&ChatSession> {
        let id = self.current.as_ref()?;
        self.chats.iter().find(|c| &c.id == id)
    }

    /// The offered action awaiting confirmation.
    #[must_use]
    pub const fn pending_action(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// Load the stored list and select a session.
    ///
    /// An unreadable store is treated as empty and left untouched: the
    /// fresh session lives in memory until the user changes something, and
    /// the old record is backed up before that first save. The list is
    /// never empty afterwards.
    pub fn init(&mut self) {
        self.chats = match self.store.load() {
            Ok(chats) => chats,
            Err(e) => {
                warn!("Failed to load chats, starting fresh: {e}");
                self.unread_record = true;
                Vec::new()
            }
        };
        info!("Loaded {} chat sessions", self.chats.len());

        match self.chats.first().map(|c| c.id.clone()) {
            Some(id) => {
                self.select_session(&id);
            }
            None => {
                self.start_session(!self.unread_record);
            }
        }
    }

    /// Start an empty session and make it current.
    pub fn create_session(&mut self) -> ChatId {
        self.start_session(true)
    }

    fn start_session(&mut self, save: bool) -> ChatId {
        let session = ChatSession::new(ChatId::generate(), now_ms());
        let id = session.id.clone();
        self.chats.insert(0, session);
        self.current = Some(id.clone());
        debug!("Created chat {id}");

        if save {
            self.persist();
        }
        self.emit(&ChatEvent::ConversationReset);
        self.emit_sessions();
        id
    }

    /// Delete a session after confirmation.
    ///
    /// Returns whether the session was removed. Unknown ids and declined
    /// confirmations change nothing.
    pub fn delete_session(&mut self, id: &ChatId) -> bool {
        let Some(position) = self.chats.iter().position(|c| &c.id == id) else {
            return false;
        };
        if !self.confirmer.confirm_delete(&self.chats[position]) {
            return false;
        }

        self.chats.remove(position);
        debug!("Deleted chat {id}");

        if self.chats.is_empty() {
            self.create_session();
            return true;
        }

        let was_current = self.current.as_ref() == Some(id);
        if was_current {
            self.current = self.chats.first().map(|c| c.id.clone());
        }
        self.persist();
        if was_current {
            self.emit_conversation();
        }
        self.emit_sessions();
        true
    }

    /// Make `id` current. Unknown ids are ignored.
    pub fn select_session(&mut self, id: &ChatId) -> bool {
        if !self.chats.iter().any(|c| &c.id == id) {
            return false;
        }
        self.current = Some(id.clone());
        self.emit_conversation();
        self.emit_sessions();
        true
    }

    /// Handle text typed by the user, with an optional staged attachment.
    ///
    /// A reply to a pending offer is intercepted: affirmative replies run
    /// the offered search, negative ones decline it locally. Anything else
    /// is stored and sent to the model.
    pub async fn send_user_message(
        &mut self,
        text: &str,
        attachment: Option<Attachment>,
    ) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() && attachment.is_none() {
            return SendOutcome::Ignored;
        }

        if self.pending.is_some() {
            match classify_reply(text) {
                ReplyKind::Affirmative => {
                    if let Some(action) = self.pending.take() {
                        return self.execute_pending(action).await;
                    }
                }
                ReplyKind::Negative => {
                    self.pending = None;
                    self.emit_message(Message::user(text), None);
                    self.emit_message(Message::assistant(DECLINE_MESSAGE), None);
                    return SendOutcome::Declined;
                }
                ReplyKind::Neither => {}
            }
        }

        let content = attachment
            .as_ref()
            .map_or_else(|| text.to_string(), |a| a.inline_into(text));
        let Some(session) = self.current_session_mut() else {
            return SendOutcome::Ignored;
        };

        session.messages.push(Message::user(content.clone()));
        session.last_updated = now_ms();
        let retitled = session.has_default_title();
        if retitled {
            session.title = match &attachment {
                Some(a) if text.is_empty() => derive_title(&a.name),
                _ => derive_title(text),
            };
        }

        self.persist();
        self.emit_message(Message::user(content), attachment.clone());
        if retitled {
            self.emit_sessions();
        }

        self.send_to_remote(text, attachment).await
    }

    /// Ask the model and record its answer in the current session.
    ///
    /// History is the tail of the current session as stored, so a prompt
    /// typed by the user is its last entry. Page context is best-effort.
    /// Failures are displayed as a system notice and leave the stored
    /// session untouched.
    pub async fn send_to_remote(
        &mut self,
        prompt: &str,
        attachment: Option<Attachment>,
    ) -> SendOutcome {
        let Some(session_id) = self.current.clone() else {
            return SendOutcome::Ignored;
        };

        let metadata = self.page_metadata().await;
        let history = self.history(&session_id);
        let request = AskRequest {
            question: prompt.to_string(),
            metadata,
            history,
            attachment,
        };

        let result = {
            let _thinking = ThinkingGuard::start(&self.observers);
            self.backend.ask(request).await
        };

        match result {
            Ok(answer) => {
                if let Some(session) = self.chats.iter_mut().find(|c| c.id == session_id) {
                    session.messages.push(Message::assistant(answer.clone()));
                }
                self.persist();
                self.pending = self.intent.detect(&answer);
                self.emit_message(Message::assistant(answer), None);
                SendOutcome::Answered
            }
            Err(e) => {
                warn!("Completion request failed: {e}");
                self.emit_message(Message::system(format!("Error: {e}")), None);
                SendOutcome::Failed
            }
        }
    }

    async fn execute_pending(&mut self, action: PendingAction) -> SendOutcome {
        match action.kind {
            ActionKind::SearchWeb => {
                let mut query = action.query;
                if is_vague_query(&query) {
                    if let Some(previous) = self.current_session().and_then(ChatSession::last_user_message) {
                        debug!("Vague search query {query:?}, using last user message");
                        query = previous.to_string();
                    }
                }

                self.emit_message(Message::user(format!("Yes, search for \"{query}\"")), None);
                self.send_to_remote(&format!("Search for {query}"), None)
                    .await
            }
        }
    }

    async fn page_metadata(&self) -> PageMetadata {
        let tab = match self.page.active_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                debug!("No active tab: {e}");
                return PageMetadata::default();
            }
        };

        match self.page.page_content(&tab).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => tab.into(),
            Err(e) => {
                debug!("Page content unavailable: {e}");
                tab.into()
            }
        }
    }

    fn history(&self, id: &ChatId) -> Vec<crate::llm::HistoryTurn> {
        self.chats
            .iter()
            .find(|c| &c.id == id)
            .map(|session| history_from_messages(&session.messages, self.history_window))
            .unwrap_or_default()
    }

    fn current_session_mut(&mut self) -> Option<&mut ChatSession> {
        let id = self.current.as_ref()?;
        self.chats.iter_mut().find(|c| &c.id == id)
    }

    fn persist(&mut self) {
        if self.unread_record {
            if let Err(e) = self.store.back_up_record() {
                warn!("Not saving over an unreadable chat record: {e}");
                self.emit_message(Message::system(format!("Could not save chats: {e}")), None);
                return;
            }
            self.unread_record = false;
        }
        if let Err(e) = self.store.save(&self.chats) {
            warn!("Failed to save chats: {e}");
            self.emit_message(Message::system(format!("Could not save chats: {e}")), None);
        }
    }

    fn emit(&self, event: &ChatEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }

    fn emit_message(&self, message: Message, attachment: Option<Attachment>) {
        self.emit(&ChatEvent::MessageAppended {
            message,
            attachment,
        });
    }

    fn emit_conversation(&self) {
        let event = match self.current_session() {
            Some(session) if !session.messages.is_empty() => {
                ChatEvent::ConversationLoaded(session.messages.clone())
            }
            _ => ChatEvent::ConversationReset,
        };
        self.emit(&event);
    }

    fn emit_sessions(&self) {
        let summaries = self
            .chats
            .iter()
            .map(|c| SessionSummary::of(c, self.current.as_ref()))
            .collect();
        self.emit(&ChatEvent::SessionsChanged(summaries));
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
