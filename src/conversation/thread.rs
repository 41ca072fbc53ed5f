//! Per-user rolling conversation window.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MAX_HISTORY;
use crate::conversation::signals;

/// Who said a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in a conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of a thread handed to the classifier.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationContext {
    pub message_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    /// Tags derived from keyword matches across the thread.
    pub topics: Vec<String>,
    /// Request-like messages from the last few turns that look unanswered.
    pub pending_requests: Vec<String>,
    /// The most recent messages, oldest first.
    pub recent: Vec<ThreadMessage>,
}

/// Bounded message history for a single user.
///
/// Holds at most `limit` messages (never more than `MAX_HISTORY`); the
/// oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ConversationThread {
    messages: VecDeque<ThreadMessage>,
    limit: usize,
    started_at: DateTime<Utc>,
}

impl ConversationThread {
    pub fn new() -> Self {
        Self::with_limit(MAX_HISTORY)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            limit: limit.clamp(1, MAX_HISTORY),
            started_at: Utc::now(),
        }
    }

    /// Append a message, evicting the oldest beyond the limit.
    pub fn add_message(
        &mut self,
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> &ThreadMessage {
        if self.messages.is_empty() {
            self.started_at = timestamp;
        }
        self.messages.push_back(ThreadMessage {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp,
        });
        while self.messages.len() > self.limit {
            self.messages.pop_front();
        }
        // Non-empty: we just pushed.
        &self.messages[self.messages.len() - 1]
    }

    /// The last `n` messages, most recent last.
    pub fn recent_messages(&self, n: usize) -> Vec<ThreadMessage> {
        let start = self.messages.len().saturating_sub(n);
        self.messages.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Build the classifier-facing snapshot.
    pub fn context(&self, recent: usize) -> ConversationContext {
        let all: Vec<&ThreadMessage> = self.messages.iter().collect();
        let window = self.recent_messages(signals::PENDING_WINDOW);

        ConversationContext {
            message_count: self.messages.len(),
            started_at: (!self.messages.is_empty()).then_some(self.started_at),
            last_activity: self.messages.back().map(|m| m.timestamp),
            topics: signals::topics(all.iter().map(|m| m.content.as_str())),
            pending_requests: signals::pending_requests(&window),
            recent: self.recent_messages(recent),
        }
    }
}

impl Default for ConversationThread {
    fn default() -> Self {
        Self::new()
    }
}
