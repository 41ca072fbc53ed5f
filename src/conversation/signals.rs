//! Lightweight lexical signals extracted from a conversation.
//!
//! Pure substring/regex matching, no service calls:
//! - topics: fixed keyword → tag table
//! - pending requests: request-like user messages in the last few turns
//!   that no later assistant message marks as fulfilled

use std::sync::LazyLock;

use regex::Regex;

use crate::conversation::thread::{Role, ThreadMessage};

/// How many trailing messages are scanned for pending requests.
pub const PENDING_WINDOW: usize = 5;

/// Keyword → topic tag. Order determines tag order in the output.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("ui", &["button", "page", "component", "layout", "form", "interface", "landing"]),
    ("styling", &["css", "style", "color", "theme", "font", "dark mode"]),
    ("backend", &["api", "endpoint", "server", "backend", "webhook"]),
    ("data", &["database", "sql", "schema", "table", "migration"]),
    ("deployment", &["deploy", "hosting", "release", "preview"]),
    ("bugfix", &["bug", "error", "broken", "crash", "fix"]),
    ("testing", &["test", "coverage", "qa"]),
    ("analysis", &["analyze", "analyse", "review", "audit", "performance"]),
];

static REQUEST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(can you|could you|would you|please|i need|i want|i'd like|let's|build|create|make|add|fix|update|change)\b",
    )
    .unwrap()
});

static FULFILLED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(done|completed|finished|shipped|deployed|here you go|all set)\b").unwrap()
});

/// Tags whose keywords appear (case-insensitive substring) in any message.
pub fn topics<'a>(messages: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let corpus: String = messages
        .into_iter()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("\n");

    TOPIC_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| corpus.contains(k)))
        .map(|(tag, _)| (*tag).to_string())
        .collect()
}

/// Whether a message reads like a request for work.
pub fn is_request(content: &str) -> bool {
    REQUEST_PATTERN.is_match(content)
}

/// Request-like user messages in `window` without a later fulfilment reply,
/// in chronological order.
pub fn pending_requests(window: &[ThreadMessage]) -> Vec<String> {
    window
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::User && is_request(&m.content))
        .filter(|(i, _)| {
            !window[i + 1..]
                .iter()
                .any(|later| later.role == Role::Assistant && FULFILLED_PATTERN.is_match(&later.content))
        })
        .map(|(_, m)| m.content.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn msg(role: Role, content: &str) -> ThreadMessage {
        ThreadMessage {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn topics_match_keywords_case_insensitively() {
        let tags = topics(["Add a BUTTON to the page", "and hook up the API"]);
        assert_eq!(tags, vec!["ui".to_string(), "backend".to_string()]);
    }

    #[test]
    fn topics_empty_for_small_talk() {
        assert!(topics(["hello there", "how are you?"]).is_empty());
    }

    #[test]
    fn request_detection() {
        assert!(is_request("Could you make the header sticky?"));
        assert!(is_request("please update the docs"));
        assert!(!is_request("thanks, that looks great"));
    }

    #[test]
    fn pending_requests_in_chronological_order() {
        let window = vec![
            msg(Role::User, "can you build a navbar"),
            msg(Role::Assistant, "sure, starting"),
            msg(Role::User, "also add a footer please"),
        ];
        assert_eq!(
            pending_requests(&window),
            vec!["can you build a navbar".to_string(), "also add a footer please".to_string()]
        );
    }

    #[test]
    fn fulfilled_requests_are_dropped() {
        let window = vec![
            msg(Role::User, "can you build a navbar"),
            msg(Role::Assistant, "Done! The navbar is live."),
            msg(Role::User, "now fix the footer"),
        ];
        assert_eq!(pending_requests(&window), vec!["now fix the footer".to_string()]);
    }

    #[test]
    fn assistant_messages_are_never_pending() {
        let window = vec![msg(Role::Assistant, "could you clarify what to build?")];
        assert!(pending_requests(&window).is_empty());
    }
}
