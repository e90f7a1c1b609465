//! Detection of assistant offers to run a web search.
//!
//! The detector is a text heuristic: it looks for phrases such as
//! "Would you like me to search for ..." in a reply and extracts the query.
//! A query that only points back at the conversation ("that information")
//! is accepted here and resolved when the user confirms, because only then
//! is the preceding user question known.

use regex::Regex;
use tracing::debug;

use crate::chat::types::PendingAction;

/// Offer pattern. Group 1 is the query.
const OFFER_PATTERN: &str = r"(?i)(?:would you like me to|should i|do you want me to|i can|i can certainly) (?:search|check|look up|find) (?:for )?(.+?)(?:\?|$|\.|,| with a quick search| if you'd like)";

/// Trailing filler removed from an extracted query, applied in order.
const FILLER_SUFFIXES: [&str; 4] = [
    " for you",
    " with a quick search",
    " if you'd like",
    " that information",
];

/// Replies that confirm a pending action.
const AFFIRMATIVE: [&str; 12] = [
    "yes",
    "yeah",
    "yep",
    "sure",
    "ok",
    "okay",
    "do it",
    "go ahead",
    "please do",
    "yup",
    "i would",
    "yes please",
];

/// Replies that decline a pending action.
const NEGATIVE: [&str; 7] = ["no", "nah", "nope", "stop", "cancel", "don't", "no thanks"];

/// Queries too vague to search for on their own.
const VAGUE_QUERIES: [&str; 5] = ["that information", "that", "it", "the info", "this"];

/// Minimum length of a query that is used as-is.
const MIN_QUERY_CHARS: usize = 3;

/// Strategy that turns an assistant reply into an optional pending action.
pub trait IntentStrategy: Send + Sync {
    /// Inspect a reply. `None` means the reply offers nothing.
    fn detect(&self, reply: &str) -> Option<PendingAction>;
}

/// Regex-based detector for offers to search the web.
pub struct OfferSearchDetector {
    pattern: Regex,
}

impl OfferSearchDetector {
    /// Compile the offer pattern.
    ///
    /// # Errors
    /// Returns an error if the pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(OFFER_PATTERN)?,
        })
    }
}

impl IntentStrategy for OfferSearchDetector {
    fn detect(&self, reply: &str) -> Option<PendingAction> {
        let captured = self.pattern.captures(reply)?.get(1)?.as_str();
        let query = strip_fillers(captured.trim());
        if query.is_empty() {
            return None;
        }

        debug!("Pending search offer detected: {query}");
        Some(PendingAction::search_web(query))
    }
}

/// Remove trailing filler phrases, case-insensitively.
fn strip_fillers(query: &str) -> String {
    let mut out = query;
    for suffix in FILLER_SUFFIXES {
        if let Some(stripped) = strip_suffix_ignore_case(out, suffix) {
            out = stripped;
        }
    }
    out.to_string()
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let split = text.len().checked_sub(suffix.len())?;
    if !text.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = text.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

/// How a user reply relates to a pending action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplyKind {
    /// Confirms the action.
    Affirmative,
    /// Declines the action.
    Negative,
    /// Unrelated to the action.
    Neither,
}

/// Classify a reply by exact, case-insensitive phrase match.
#[must_use]
pub fn classify_reply(text: &str) -> ReplyKind {
    let reply = text.trim().to_lowercase();
    if AFFIRMATIVE.contains(&reply.as_str()) {
        ReplyKind::Affirmative
    } else if NEGATIVE.contains(&reply.as_str()) {
        ReplyKind::Negative
    } else {
        ReplyKind::Neither
    }
}

/// Whether a query needs the conversation to be meaningful.
#[must_use]
pub fn is_vague_query(query: &str) -> bool {
    let lowered = query.to_lowercase();
    VAGUE_QUERIES.contains(&lowered.as_str()) || query.chars().count() < MIN_QUERY_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(reply: &str) -> Option<String> {
        let detector = OfferSearchDetector::new().unwrap();
        detector.detect(reply).map(|action| action.query)
    }

    #[test]
    fn test_detect_question_offer() {
        let query = detect("Would you like me to search for the Tesla headquarters address?");
        assert_eq!(query.as_deref(), Some("the Tesla headquarters address"));
    }

    #[test]
    fn test_detect_should_i_check() {
        let query = detect("The page has no price. Should I check the current price of the Model 3?");
        assert_eq!(query.as_deref(), Some("the current price of the Model 3"));
    }

    #[test]
    fn test_detect_vague_offer_strips_fillers() {
        let query = detect(
            "It doesn't mention where the headquarters is. I can certainly find that information for you with a quick search if you'd like!",
        );
        assert_eq!(query.as_deref(), Some("that information"));
    }

    #[test]
    fn test_detect_strips_for_you() {
        let query = detect("I can look up the release date for you.");
        assert_eq!(query.as_deref(), Some("the release date"));
    }

    #[test]
    fn test_detect_end_of_text() {
        let query = detect("do you want me to find recent reviews");
        assert_eq!(query.as_deref(), Some("recent reviews"));
    }

    #[test]
    fn test_no_offer() {
        assert!(detect("Tesla is headquartered in Austin, Texas.").is_none());
        assert!(detect("").is_none());
    }

    #[test]
    fn test_classify_reply() {
        assert_eq!(classify_reply("yes"), ReplyKind::Affirmative);
        assert_eq!(classify_reply("  Yes Please "), ReplyKind::Affirmative);
        assert_eq!(classify_reply("GO AHEAD"), ReplyKind::Affirmative);
        assert_eq!(classify_reply("no thanks"), ReplyKind::Negative);
        assert_eq!(classify_reply("Don't"), ReplyKind::Negative);
        assert_eq!(classify_reply("yes, and also the weather"), ReplyKind::Neither);
        assert_eq!(classify_reply("what about Berlin?"), ReplyKind::Neither);
    }

    #[test]
    fn test_is_vague_query() {
        assert!(is_vague_query("that information"));
        assert!(is_vague_query("That"));
        assert!(is_vague_query("ab"));
        assert!(!is_vague_query("the Tesla headquarters address"));
        assert!(!is_vague_query("abc"));
    }
}
