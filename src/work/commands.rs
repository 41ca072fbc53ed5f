//! Lifecycle commands — cancel, pause, resume, status and history for
//! existing work items.
//!
//! Pausing currently stops the work: the item moves to `cancelled` and the
//! reply says so. Resume is not implemented and never mutates anything.

use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::intent::Intent;
use crate::work::model::{WorkItem, WorkItemPatch, WorkStatus};
use crate::work::orchestrator::MAX_UPDATE_ATTEMPTS;
use crate::work::store::WorkItemStore;

/// Items listed by `history`.
const HISTORY_ITEMS: usize = 10;

/// A management verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManageAction {
    Cancel,
    Pause,
    Resume,
    Status,
    History,
}

/// Extra verbs, whole words only so "paste" or "stopwatch" don't match.
static CANCEL_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(stop|abort)\b").unwrap());
static RESUME_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(unpause|continue)\b").unwrap());
static PAUSE_WORDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bhold\b").unwrap());
static HISTORY_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(recent|past)\b").unwrap());
static STATUS_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(progress|list|running)\b").unwrap());

impl ManageAction {
    /// Match a verb in free text, case-insensitively.
    ///
    /// The core verbs match anywhere; the extra verbs need word boundaries.
    /// Resume is checked before pause so "unpause" resumes.
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has(&["cancel", "undo"]) || CANCEL_WORDS.is_match(text) {
            Some(Self::Cancel)
        } else if has(&["resume"]) || RESUME_WORDS.is_match(text) {
            Some(Self::Resume)
        } else if has(&["pause"]) || PAUSE_WORDS.is_match(text) {
            Some(Self::Pause)
        } else if has(&["history"]) || HISTORY_WORDS.is_match(text) {
            Some(Self::History)
        } else if has(&["status"]) || STATUS_WORDS.is_match(text) {
            Some(Self::Status)
        } else {
            None
        }
    }
}

/// Reply to a management command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    pub message: String,
    /// Suggested next action, when there is one.
    pub suggestion: Option<String>,
}

impl CommandResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
        }
    }

    fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Message and suggestion joined for display.
    pub fn text(&self) -> String {
        match &self.suggestion {
            Some(s) => format!("{}\n{}", self.message, s),
            None => self.message.clone(),
        }
    }
}

pub struct LifecycleCommandHandler {
    store: Arc<WorkItemStore>,
}

impl LifecycleCommandHandler {
    pub fn new(store: Arc<WorkItemStore>) -> Self {
        Self { store }
    }

    /// Dispatch a `manage` intent.
    ///
    /// The verb comes from `specific`, then `subcategory`, then the raw text.
    pub async fn handle(&self, intent: &Intent, user: &str, raw_text: &str) -> CommandResponse {
        let action = ManageAction::parse(&intent.specific)
            .or_else(|| ManageAction::parse(&intent.subcategory))
            .or_else(|| ManageAction::parse(raw_text));

        let target = intent.parameters.target.as_deref();
        match action {
            Some(ManageAction::Cancel) => {
                self.cancel(target, intent.parameters.context.as_deref(), user).await
            }
            Some(ManageAction::Pause) => self.pause(target, user).await,
            Some(ManageAction::Resume) => resume(),
            Some(ManageAction::Status) => self.status(user).await,
            Some(ManageAction::History) => self.history(user).await,
            None => CommandResponse::new("I couldn't tell which command you meant.")
                .with_suggestion("Try 'status', 'cancel', or 'history'."),
        }
    }

    /// Cancel the target item. Terminal items are left untouched.
    pub async fn cancel(&self, hint: Option<&str>, reason: Option<&str>, user: &str) -> CommandResponse {
        match self.store.find_target(hint, user).await {
            Some(item) => self.cancel_item(item, reason, user).await,
            None => not_found(hint, "cancel"),
        }
    }

    /// Cancel `item` with a versioned update, re-checking its status after
    /// every conflict.
    async fn cancel_item(&self, mut item: WorkItem, reason: Option<&str>, user: &str) -> CommandResponse {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            match item.status {
                WorkStatus::Completed => {
                    return CommandResponse::new(format!(
                        "'{}' is already completed, so there's nothing to cancel.",
                        item.title
                    ));
                }
                WorkStatus::Failed => {
                    return CommandResponse::new(format!(
                        "'{}' already failed, so there's nothing to cancel.",
                        item.title
                    ))
                    .with_suggestion("Describe the work again to start a fresh attempt.");
                }
                WorkStatus::Cancelled => {
                    return CommandResponse::new(format!("'{}' is already cancelled.", item.title));
                }
                _ => {}
            }

            let mut patch = WorkItemPatch::status(WorkStatus::Cancelled).with_completion(Utc::now());
            if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
                patch = patch.with_error(format!("Cancelled: {reason}"));
            }
            match self.store.update_if_version(&item.id, item.version, patch).await {
                Ok(_) => {
                    info!(item_id = %item.id, user, "Work cancelled");
                    return CommandResponse::new(format!("Cancelled '{}' ({}).", item.title, item.id));
                }
                Err(StoreError::VersionConflict { .. }) => {
                    debug!(item_id = %item.id, attempt, "Item changed during cancel, re-reading");
                    match self.store.get(&item.id).await {
                        Some(fresh) => item = fresh,
                        None => return not_found(Some(&item.id), "cancel"),
                    }
                }
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "Cancel failed");
                    return busy(&item, "cancel");
                }
            }
        }
        busy(&item, "cancel")
    }

    /// Pause the target item. Pausing stops the work.
    pub async fn pause(&self, hint: Option<&str>, user: &str) -> CommandResponse {
        match self.store.find_target(hint, user).await {
            Some(item) => self.pause_item(item, user).await,
            None => not_found(hint, "pause"),
        }
    }

    async fn pause_item(&self, mut item: WorkItem, user: &str) -> CommandResponse {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            if !matches!(
                item.status,
                WorkStatus::Analyzing | WorkStatus::Building | WorkStatus::Deploying
            ) {
                return CommandResponse::new(format!(
                    "'{}' is {}, so it can't be paused.",
                    item.title, item.status
                ));
            }

            let patch = WorkItemPatch::status(WorkStatus::Cancelled)
                .with_completion(Utc::now())
                .with_error("Paused by user; pausing stops the work");
            match self.store.update_if_version(&item.id, item.version, patch).await {
                Ok(_) => {
                    info!(item_id = %item.id, user, "Work paused (stopped)");
                    return CommandResponse::new(format!(
                        "Stopped '{}'. Pausing isn't supported yet, so the work was cancelled.",
                        item.title
                    ))
                    .with_suggestion("Ask again when you want it built.");
                }
                Err(StoreError::VersionConflict { .. }) => {
                    debug!(item_id = %item.id, attempt, "Item changed during pause, re-reading");
                    match self.store.get(&item.id).await {
                        Some(fresh) => item = fresh,
                        None => return not_found(Some(&item.id), "pause"),
                    }
                }
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "Pause failed");
                    return busy(&item, "pause");
                }
            }
        }
        busy(&item, "pause")
    }

    /// Active items for `user`, newest first.
    pub async fn status(&self, user: &str) -> CommandResponse {
        let mine: Vec<WorkItem> = self
            .store
            .list_active()
            .await
            .into_iter()
            .filter(|i| i.requested_by == user)
            .collect();

        if mine.is_empty() {
            return CommandResponse::new("Nothing is in progress right now.")
                .with_suggestion("Tell me what you'd like built.");
        }

        let now = Utc::now();
        let mut lines = vec![format!("{} active:", plural(mine.len(), "item"))];
        for item in &mine {
            lines.push(format!(
                "- {} ({}): {} {}%, started {}",
                item.title,
                item.id,
                item.status,
                item.progress,
                started_label(item, now)
            ));
        }
        CommandResponse::new(lines.join("\n"))
    }

    /// Recent items for `user` of any status, newest first.
    pub async fn history(&self, user: &str) -> CommandResponse {
        let recent = self.store.list_recent_for(user, HISTORY_ITEMS).await;
        if recent.is_empty() {
            return CommandResponse::new("You haven't requested any work yet.");
        }

        let now = Utc::now();
        let mut lines = vec![format!("Your last {}:", plural(recent.len(), "item"))];
        for item in &recent {
            lines.push(format!(
                "- {} ({}): {}, started {}",
                item.title,
                item.id,
                item.status,
                started_label(item, now)
            ));
        }
        CommandResponse::new(lines.join("\n"))
    }
}

fn resume() -> CommandResponse {
    CommandResponse::new("Resuming work isn't implemented yet.")
        .with_suggestion("Describe the work again to start it fresh.")
}

fn not_found(hint: Option<&str>, verb: &str) -> CommandResponse {
    match hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) => CommandResponse::new(format!("I couldn't find any work matching '{hint}'."))
            .with_suggestion("Say 'status' to see what's active, then use the item id."),
        None => CommandResponse::new(format!("There's nothing to {verb} right now."))
            .with_suggestion("Say 'status' to see what's active."),
    }
}

fn busy(item: &WorkItem, verb: &str) -> CommandResponse {
    CommandResponse::new(format!("I couldn't {verb} '{}' right now.", item.title))
        .with_suggestion("Try again in a moment.")
}

fn started_label(item: &WorkItem, now: chrono::DateTime<Utc>) -> String {
    match item.elapsed_label(now).as_str() {
        "just now" => "just now".to_string(),
        label => format!("{label} ago"),
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::intent::{Complexity, IntentCategory, IntentParameters};
    use crate::work::model::{NewWorkItem, WorkOutputs};
    use crate::work::repository::NullRepository;

    async fn handler_with(titles: &[&str]) -> (LifecycleCommandHandler, Arc<WorkItemStore>, Vec<WorkItem>) {
        let store = Arc::new(WorkItemStore::open(Arc::new(NullRepository)).await);
        let mut items = Vec::new();
        for title in titles {
            items.push(
                store
                    .create(NewWorkItem {
                        title: title.to_string(),
                        description: title.to_string(),
                        original_request: title.to_string(),
                        requested_by: "u1".into(),
                        complexity: Complexity::Simple,
                        assigned_workers: vec!["frontend".into()],
                        primary_worker: Some("frontend".into()),
                        clarified_requirements: Vec::new(),
                        user_preferences: HashMap::new(),
                    })
                    .await,
            );
        }
        (LifecycleCommandHandler::new(store.clone()), store, items)
    }

    fn manage(specific: &str, target: Option<&str>) -> Intent {
        Intent {
            category: IntentCategory::Manage,
            subcategory: "manage-work".into(),
            specific: specific.into(),
            confidence: 0.9,
            reasoning: String::new(),
            required_workers: Vec::new(),
            complexity: Complexity::Simple,
            parameters: IntentParameters {
                description: specific.into(),
                target: target.map(String::from),
                ..IntentParameters::default()
            },
        }
    }

    #[test]
    fn parses_verbs() {
        assert_eq!(ManageAction::parse("please CANCEL that"), Some(ManageAction::Cancel));
        assert_eq!(ManageAction::parse("undo"), Some(ManageAction::Cancel));
        assert_eq!(ManageAction::parse("pause the navbar"), Some(ManageAction::Pause));
        assert_eq!(ManageAction::parse("unpause it"), Some(ManageAction::Resume));
        assert_eq!(ManageAction::parse("what's the status?"), Some(ManageAction::Status));
        assert_eq!(ManageAction::parse("show my history"), Some(ManageAction::History));
        assert_eq!(ManageAction::parse("hello"), None);
    }

    #[test]
    fn extra_verbs_need_whole_words() {
        assert_eq!(ManageAction::parse("stop the build"), Some(ManageAction::Cancel));
        assert_eq!(ManageAction::parse("put it on hold"), Some(ManageAction::Pause));
        assert_eq!(ManageAction::parse("list my work"), Some(ManageAction::Status));
        assert_eq!(ManageAction::parse("show past requests"), Some(ManageAction::History));

        assert_eq!(ManageAction::parse("paste this snippet"), None);
        assert_eq!(ManageAction::parse("build a playlist page"), None);
        assert_eq!(ManageAction::parse("raise the threshold"), None);
        assert_eq!(ManageAction::parse("add a stopwatch"), None);
    }

    #[tokio::test]
    async fn cancel_without_work() {
        let (handler, _, _) = handler_with(&[]).await;
        let reply = handler.handle(&manage("cancel", None), "u1", "cancel").await;
        assert!(reply.message.contains("nothing to cancel"));
        assert!(reply.suggestion.is_some());
    }

    #[tokio::test]
    async fn cancel_latest_active_with_reason() {
        let (handler, store, items) = handler_with(&["Navbar"]).await;
        let mut intent = manage("cancel", None);
        intent.parameters.context = Some("changed my mind".into());

        let reply = handler.handle(&intent, "u1", "cancel it").await;
        assert!(reply.message.starts_with("Cancelled 'Navbar'"));

        let stored = store.get(&items[0].id).await.unwrap();
        assert_eq!(stored.status, WorkStatus::Cancelled);
        assert!(stored.actual_completion.is_some());
        assert_eq!(stored.errors, vec!["Cancelled: changed my mind"]);
    }

    #[tokio::test]
    async fn cancel_twice_is_idempotent() {
        let (handler, store, items) = handler_with(&["Navbar"]).await;
        let id = items[0].id.clone();
        handler.cancel(Some(&id), None, "u1").await;
        let first = store.get(&id).await.unwrap();

        let reply = handler.cancel(Some(&id), None, "u1").await;
        assert!(reply.message.contains("already cancelled"));
        let second = store.get(&id).await.unwrap();
        assert_eq!(first.actual_completion, second.actual_completion);
        assert_eq!(first.version, second.version);
    }

    #[tokio::test]
    async fn cancel_completed_is_rejected() {
        let (handler, store, items) = handler_with(&["Navbar"]).await;
        let id = items[0].id.clone();
        let done = store
            .update(&id, WorkItemPatch::status(WorkStatus::Completed).with_progress(100))
            .await
            .unwrap();

        let reply = handler.cancel(Some(&id), None, "u1").await;
        assert!(reply.message.contains("already completed"));
        assert_eq!(store.get(&id).await.unwrap(), done);
    }

    #[tokio::test]
    async fn cancel_rechecks_item_completed_after_lookup() {
        let (handler, store, items) = handler_with(&["Navbar"]).await;
        let id = items[0].id.clone();
        let seen = store.find_target(None, "u1").await.unwrap();

        // Work finishes between the lookup and the cancel write.
        let done = store
            .update_if_version(
                &id,
                seen.version,
                WorkItemPatch::status(WorkStatus::Completed)
                    .with_progress(100)
                    .with_outputs(WorkOutputs {
                        files: vec!["a.tsx".into()],
                        ..WorkOutputs::default()
                    }),
            )
            .await
            .unwrap();

        let reply = handler.cancel_item(seen, None, "u1").await;
        assert!(reply.message.contains("already completed"));
        assert_eq!(store.get(&id).await.unwrap(), done);
    }

    #[tokio::test]
    async fn pause_rechecks_item_completed_after_lookup() {
        let (handler, store, items) = handler_with(&["Navbar"]).await;
        let id = items[0].id.clone();
        let seen = store.find_target(None, "u1").await.unwrap();
        let done = store
            .update(&id, WorkItemPatch::status(WorkStatus::Completed).with_progress(100))
            .await
            .unwrap();

        let reply = handler.pause_item(seen, "u1").await;
        assert!(reply.message.contains("can't be paused"));
        assert_eq!(store.get(&id).await.unwrap(), done);
    }

    #[tokio::test]
    async fn cancel_applies_after_unrelated_progress() {
        let (handler, store, items) = handler_with(&["Navbar"]).await;
        let id = items[0].id.clone();
        let seen = store.find_target(None, "u1").await.unwrap();
        store
            .update(&id, WorkItemPatch::status(WorkStatus::Building).with_progress(60))
            .await;

        let reply = handler.cancel_item(seen, None, "u1").await;
        assert!(reply.message.starts_with("Cancelled"));
        let stored = store.get(&id).await.unwrap();
        assert_eq!(stored.status, WorkStatus::Cancelled);
        assert_eq!(stored.progress, 60);
    }

    #[tokio::test]
    async fn cancel_unknown_target() {
        let (handler, _, _) = handler_with(&["Navbar"]).await;
        let reply = handler.cancel(Some("pricing"), None, "u1").await;
        assert!(reply.message.contains("couldn't find any work matching 'pricing'"));
    }

    #[tokio::test]
    async fn pause_stops_active_work() {
        let (handler, store, items) = handler_with(&["Navbar"]).await;
        let reply = handler.handle(&manage("pause", Some("navbar")), "u1", "pause").await;
        assert!(reply.message.contains("was cancelled"));
        assert_eq!(store.get(&items[0].id).await.unwrap().status, WorkStatus::Cancelled);
    }

    #[tokio::test]
    async fn pause_rejects_planning_item() {
        let (handler, store, items) = handler_with(&["Navbar"]).await;
        store
            .update(&items[0].id, WorkItemPatch::status(WorkStatus::Planning))
            .await;
        let reply = handler.pause(None, "u1").await;
        assert!(reply.message.contains("can't be paused"));
        assert_eq!(store.get(&items[0].id).await.unwrap().status, WorkStatus::Planning);
    }

    #[tokio::test]
    async fn resume_is_not_implemented() {
        let (handler, store, items) = handler_with(&["Navbar"]).await;
        let before = store.get(&items[0].id).await.unwrap();
        let reply = handler.handle(&manage("resume", None), "u1", "resume").await;
        assert!(reply.message.contains("isn't implemented"));
        assert_eq!(store.get(&items[0].id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn status_lists_active_items() {
        let (handler, store, items) = handler_with(&["Navbar", "Footer"]).await;
        store
            .update(&items[1].id, WorkItemPatch::status(WorkStatus::Building).with_progress(60))
            .await;

        let reply = handler.status("u1").await;
        assert!(reply.message.starts_with("2 items active:"));
        assert!(reply.message.contains("Footer"));
        assert!(reply.message.contains("building 60%"));

        let idle = handler.status("nobody").await;
        assert!(idle.message.contains("Nothing is in progress"));
    }

    #[tokio::test]
    async fn history_includes_finished_items() {
        let (handler, store, items) = handler_with(&["Navbar"]).await;
        store
            .update(&items[0].id, WorkItemPatch::status(WorkStatus::Completed))
            .await;
        let reply = handler.handle(&manage("history", None), "u1", "history").await;
        assert!(reply.message.contains("Navbar"));
        assert!(reply.message.contains("completed"));
    }

    #[test]
    fn text_joins_suggestion() {
        let reply = CommandResponse::new("a").with_suggestion("b");
        assert_eq!(reply.text(), "a\nb");
    }
}
