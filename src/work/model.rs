//! Work item data model — items, lifecycle status, and partial updates.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::intent::Complexity;

/// Lifecycle status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Analyzing,
    Planning,
    Building,
    Deploying,
    Completed,
    Failed,
    Cancelled,
}

impl WorkStatus {
    /// Terminal states never progress further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyzing => "analyzing",
            Self::Planning => "planning",
            Self::Building => "building",
            Self::Deploying => "deploying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the orchestrator may move an item from `self` to `target`.
    ///
    /// Terminal states are final; anything else may move forward or end.
    pub fn can_transition_to(&self, target: WorkStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        target.is_terminal() || target.rank() >= self.rank()
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Analyzing => 0,
            Self::Planning => 1,
            Self::Building => 2,
            Self::Deploying => 3,
            Self::Completed | Self::Failed | Self::Cancelled => 4,
        }
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority derived from complexity at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn from_complexity(complexity: Complexity) -> Self {
        match complexity {
            Complexity::Simple => Self::Low,
            Complexity::Medium => Self::Medium,
            Complexity::Complex => Self::High,
            Complexity::Enterprise => Self::Critical,
        }
    }
}

/// Artifacts produced by a completed item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOutputs {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

/// A persisted, trackable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub original_request: String,
    /// User who asked for the work.
    #[serde(default)]
    pub requested_by: String,
    pub status: WorkStatus,
    pub priority: Priority,
    pub complexity: Complexity,
    pub assigned_workers: Vec<String>,
    pub primary_worker: Option<String>,
    /// 0–100, never decreases while the item is non-terminal.
    pub progress: u8,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_completion: Option<DateTime<Utc>>,
    #[serde(default)]
    pub clarified_requirements: Vec<String>,
    #[serde(default)]
    pub user_preferences: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<WorkOutputs>,
    /// Append-only diagnostic log.
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub retry_count: u32,
    /// Bumped on every store mutation.
    #[serde(default)]
    pub version: u64,
}

/// Fields supplied by the caller of `WorkItemStore::create`.
#[derive(Debug, Clone)]
pub struct NewWorkItem {
    pub title: String,
    pub description: String,
    pub original_request: String,
    pub requested_by: String,
    pub complexity: Complexity,
    pub assigned_workers: Vec<String>,
    pub primary_worker: Option<String>,
    pub clarified_requirements: Vec<String>,
    pub user_preferences: HashMap<String, String>,
}

impl WorkItem {
    /// Materialize a new item in `analyzing` with zero progress.
    pub fn new(spec: NewWorkItem, now: DateTime<Utc>) -> Self {
        let estimated_completion = chrono::Duration::from_std(spec.complexity.estimated_duration())
            .ok()
            .map(|d| now + d);
        Self {
            id: generate_id(now),
            title: spec.title,
            description: spec.description,
            original_request: spec.original_request,
            requested_by: spec.requested_by,
            status: WorkStatus::Analyzing,
            priority: Priority::from_complexity(spec.complexity),
            complexity: spec.complexity,
            assigned_workers: spec.assigned_workers,
            primary_worker: spec.primary_worker,
            progress: 0,
            start_time: now,
            estimated_completion,
            actual_completion: None,
            clarified_requirements: spec.clarified_requirements,
            user_preferences: spec.user_preferences,
            outputs: None,
            errors: Vec::new(),
            retry_count: 0,
            version: 0,
        }
    }

    /// Apply a shallow merge of `patch`.
    ///
    /// Progress is clamped to 100 and never lowered while the item is
    /// non-terminal.
    pub fn apply(&mut self, patch: WorkItemPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.progress {
            let progress = progress.min(100);
            if self.status.is_terminal() || progress >= self.progress {
                self.progress = progress;
            }
        }
        if let Some(assigned) = patch.assigned_workers {
            self.assigned_workers = assigned;
        }
        if let Some(primary) = patch.primary_worker {
            self.primary_worker = Some(primary);
        }
        if let Some(at) = patch.actual_completion {
            self.actual_completion = Some(at);
        }
        if let Some(outputs) = patch.outputs {
            self.outputs = Some(outputs);
        }
        self.errors.extend(patch.append_errors);
        if let Some(retry_count) = patch.retry_count {
            self.retry_count = retry_count;
        }
    }

    /// Time since the item started, rounded to whole minutes for display.
    pub fn elapsed_label(&self, now: DateTime<Utc>) -> String {
        let minutes = (now - self.start_time).num_minutes().max(0);
        match minutes {
            0 => "just now".to_string(),
            1 => "1 minute".to_string(),
            m if m < 60 => format!("{m} minutes"),
            m => format!("{}h {}m", m / 60, m % 60),
        }
    }
}

/// A partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct WorkItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<WorkStatus>,
    pub progress: Option<u8>,
    pub assigned_workers: Option<Vec<String>>,
    pub primary_worker: Option<String>,
    pub actual_completion: Option<DateTime<Utc>>,
    pub outputs: Option<WorkOutputs>,
    /// Appended to `errors`, never replacing it.
    pub append_errors: Vec<String>,
    pub retry_count: Option<u32>,
}

impl WorkItemPatch {
    pub fn status(status: WorkStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.append_errors.push(error.into());
        self
    }

    pub fn with_completion(mut self, at: DateTime<Utc>) -> Self {
        self.actual_completion = Some(at);
        self
    }

    pub fn with_outputs(mut self, outputs: WorkOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }
}

/// `work_<millis>_<9 base36 chars>`. Unique with high probability only.
fn generate_id(now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("work_{}_{}", now.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(complexity: Complexity) -> NewWorkItem {
        NewWorkItem {
            title: "Landing page".into(),
            description: "Build a landing page".into(),
            original_request: "build me a landing page".into(),
            requested_by: "alice".into(),
            complexity,
            assigned_workers: vec!["frontend".into()],
            primary_worker: Some("frontend".into()),
            clarified_requirements: Vec::new(),
            user_preferences: HashMap::new(),
        }
    }

    #[test]
    fn priority_follows_complexity() {
        assert_eq!(Priority::from_complexity(Complexity::Simple), Priority::Low);
        assert_eq!(Priority::from_complexity(Complexity::Medium), Priority::Medium);
        assert_eq!(Priority::from_complexity(Complexity::Complex), Priority::High);
        assert_eq!(Priority::from_complexity(Complexity::Enterprise), Priority::Critical);
    }

    #[test]
    fn new_item_starts_analyzing() {
        let now = Utc::now();
        let item = WorkItem::new(spec(Complexity::Complex), now);
        assert_eq!(item.status, WorkStatus::Analyzing);
        assert_eq!(item.progress, 0);
        assert_eq!(item.retry_count, 0);
        assert_eq!(item.priority, Priority::High);
        assert_eq!(item.start_time, now);
        assert_eq!(item.estimated_completion, Some(now + chrono::Duration::minutes(45)));
        assert!(item.id.starts_with("work_"));
    }

    #[test]
    fn ids_differ() {
        let now = Utc::now();
        let a = WorkItem::new(spec(Complexity::Simple), now);
        let b = WorkItem::new(spec(Complexity::Simple), now);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn progress_never_decreases_while_active() {
        let mut item = WorkItem::new(spec(Complexity::Simple), Utc::now());
        item.apply(WorkItemPatch::status(WorkStatus::Building).with_progress(50));
        item.apply(WorkItemPatch::default().with_progress(20));
        assert_eq!(item.progress, 50);
        item.apply(WorkItemPatch::default().with_progress(250));
        assert_eq!(item.progress, 100);
    }

    #[test]
    fn errors_are_appended() {
        let mut item = WorkItem::new(spec(Complexity::Simple), Utc::now());
        item.apply(WorkItemPatch::default().with_error("first"));
        item.apply(WorkItemPatch::default().with_error("second"));
        assert_eq!(item.errors, vec!["first", "second"]);
    }

    #[test]
    fn terminal_status_is_final() {
        assert!(WorkStatus::Analyzing.can_transition_to(WorkStatus::Planning));
        assert!(WorkStatus::Building.can_transition_to(WorkStatus::Cancelled));
        assert!(!WorkStatus::Deploying.can_transition_to(WorkStatus::Planning));
        assert!(!WorkStatus::Cancelled.can_transition_to(WorkStatus::Building));
        assert!(!WorkStatus::Completed.can_transition_to(WorkStatus::Failed));
    }

    #[test]
    fn elapsed_label_formats() {
        let mut item = WorkItem::new(spec(Complexity::Simple), Utc::now());
        let now = item.start_time;
        assert_eq!(item.elapsed_label(now), "just now");
        assert_eq!(item.elapsed_label(now + chrono::Duration::minutes(7)), "7 minutes");
        item.start_time = now - chrono::Duration::minutes(125);
        assert_eq!(item.elapsed_label(now), "2h 5m");
    }

    #[test]
    fn serializes_camel_case_with_iso_dates() {
        let item = WorkItem::new(spec(Complexity::Medium), Utc::now());
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "analyzing");
        assert_eq!(json["primaryWorker"], "frontend");
        assert!(json["startTime"].as_str().unwrap().contains('T'));
    }
}
