//! Chat sessions and the controller that drives them.
//!
//! - `types`: sessions, messages, attachments, pending actions
//! - `store`: persistence of the session list
//! - `attachment`: staging files from disk
//! - `intent`: detection of offers to search and reply classification
//! - `events`: observer interface for front ends
//! - `controller`: the session controller

pub mod attachment;
pub mod controller;
pub mod events;
pub mod intent;
pub mod store;
pub mod types;

pub use controller::{SendOutcome, SessionController};
pub use events::{AlwaysConfirm, ChatEvent, ChatObserver, Confirmer, SessionSummary};
pub use intent::{IntentStrategy, OfferSearchDetector};
pub use store::{ChatStore, SqliteChatStore};
pub use types::{Attachment, ChatId, ChatSession, Message, PendingAction, Role};
