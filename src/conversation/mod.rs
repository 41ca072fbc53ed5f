//! Conversation context — per-user rolling history and lexical signals.
//!
//! Each user gets an independent `ConversationThread`. Threads live for the
//! process lifetime only; after a restart they start empty.

pub mod signals;
pub mod thread;

pub use thread::{ConversationContext, ConversationThread, Role, ThreadMessage};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::MAX_HISTORY;

/// Number of recent messages included in a context snapshot.
const CONTEXT_RECENT_MESSAGES: usize = 10;

/// Owns every user's conversation thread, keyed by user id.
pub struct ConversationManager {
    threads: RwLock<HashMap<String, ConversationThread>>,
    history_limit: usize,
}

impl ConversationManager {
    pub fn new(history_limit: usize) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            history_limit: history_limit.clamp(1, MAX_HISTORY),
        }
    }

    /// Append a message to the user's thread, creating it on first use.
    pub async fn add_message(
        &self,
        user_id: &str,
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> ThreadMessage {
        let mut threads = self.threads.write().await;
        let thread = threads
            .entry(user_id.to_string())
            .or_insert_with(|| ConversationThread::with_limit(self.history_limit));
        thread.add_message(role, content, timestamp).clone()
    }

    /// Last `n` messages for a user, most recent last.
    pub async fn recent_messages(&self, user_id: &str, n: usize) -> Vec<ThreadMessage> {
        self.threads
            .read()
            .await
            .get(user_id)
            .map(|t| t.recent_messages(n))
            .unwrap_or_default()
    }

    /// Context snapshot for a user (empty if the user has no thread yet).
    pub async fn context(&self, user_id: &str) -> ConversationContext {
        self.threads
            .read()
            .await
            .get(user_id)
            .map(|t| t.context(CONTEXT_RECENT_MESSAGES))
            .unwrap_or_default()
    }

    /// Number of users with a live thread.
    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

impl Default for ConversationManager {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}
