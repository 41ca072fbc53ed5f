//! Work orchestrator — turns accepted intents into progress on work items.
//!
//! Execution is a single logical task per item:
//! 1. Validate every assigned worker against the registry
//! 2. Notify the primary worker
//! 3. Consume the worker's progress stream, re-reading the item before each
//!    phase so a cancel stops execution
//! 4. Apply each phase with a versioned update, retrying on conflict

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, WorkError, WorkerError};
use crate::intent::{Intent, IntentCategory};
use crate::notify::CoordinationNotifier;
use crate::work::activity::{ACTIVITY_CHANNEL_CAPACITY, WorkActivity};
use crate::work::model::{NewWorkItem, WorkItem, WorkItemPatch, WorkStatus};
use crate::work::store::WorkItemStore;
use crate::workers::{ProgressEvent, WorkerRegistry};

/// Versioned update attempts before giving up on a phase.
pub(crate) const MAX_UPDATE_ATTEMPTS: usize = 5;

/// Max chars of the description used as a title.
const TITLE_MAX_CHARS: usize = 60;

/// Outcome of `execute_work`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub success: bool,
    pub message: String,
}

impl ExecutionReport {
    fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

pub struct WorkOrchestrator {
    store: Arc<WorkItemStore>,
    registry: Arc<WorkerRegistry>,
    notifier: Arc<dyn CoordinationNotifier>,
    activity_tx: broadcast::Sender<WorkActivity>,
}

impl WorkOrchestrator {
    pub fn new(
        store: Arc<WorkItemStore>,
        registry: Arc<WorkerRegistry>,
        notifier: Arc<dyn CoordinationNotifier>,
    ) -> Self {
        let (activity_tx, _) = broadcast::channel(ACTIVITY_CHANNEL_CAPACITY);
        Self {
            store,
            registry,
            notifier,
            activity_tx,
        }
    }

    pub fn store(&self) -> &Arc<WorkItemStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Subscribe to orchestration events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkActivity> {
        self.activity_tx.subscribe()
    }

    fn publish(&self, event: WorkActivity) {
        // No subscribers is fine.
        let _ = self.activity_tx.send(event);
    }

    /// Create the work item for a `build` / `modify` / `analyze` intent.
    pub async fn create_from_intent(
        &self,
        intent: &Intent,
        requested_by: &str,
        original_request: &str,
    ) -> WorkItem {
        let primary = intent
            .required_workers
            .first()
            .cloned()
            .unwrap_or_else(|| default_worker(intent.category).to_string());
        let mut assigned = intent.required_workers.clone();
        if assigned.is_empty() {
            assigned.push(primary.clone());
        }

        let description = if intent.parameters.description.trim().is_empty() {
            original_request.trim().to_string()
        } else {
            intent.parameters.description.trim().to_string()
        };

        self.store
            .create(NewWorkItem {
                title: derive_title(&description),
                description,
                original_request: original_request.to_string(),
                requested_by: requested_by.to_string(),
                complexity: intent.complexity,
                assigned_workers: assigned,
                primary_worker: Some(primary),
                clarified_requirements: intent.parameters.requirements.clone(),
                user_preferences: Default::default(),
            })
            .await
    }

    /// Run the item to completion, failure or cancellation.
    pub async fn execute_work(&self, id: &str) -> ExecutionReport {
        match self.run(id).await {
            Ok(report) => report,
            Err(e) => {
                match &e {
                    WorkError::WorkersUnavailable { names } => {
                        warn!(item_id = %id, workers = ?names, "Work not started, workers unavailable");
                    }
                    WorkError::Cancelled { .. } => info!(item_id = %id, "Work stopped after cancel"),
                    _ => warn!(item_id = %id, error = %e, "Work execution ended early"),
                }
                ExecutionReport::failure(e.to_string())
            }
        }
    }

    async fn run(&self, id: &str) -> Result<ExecutionReport, WorkError> {
        let item = self
            .store
            .get(id)
            .await
            .ok_or_else(|| WorkError::NotFound { id: id.to_string() })?;

        let primary = item
            .primary_worker
            .clone()
            .ok_or_else(|| WorkError::NoPrimaryWorker { id: id.to_string() })?;

        let mut required = item.assigned_workers.clone();
        if !required.contains(&primary) {
            required.push(primary.clone());
        }
        self.registry
            .check(&required)
            .map_err(|names| WorkError::WorkersUnavailable { names })?;
        let worker = self
            .registry
            .get(&primary)
            .ok_or_else(|| WorkError::WorkersUnavailable {
                names: vec![primary.clone()],
            })?;

        self.send_notification(
            &primary,
            &format!("New task: {}. {}", item.title, item.description),
            json!({
                "itemId": item.id,
                "status": item.status,
                "priority": item.priority,
                "complexity": item.complexity,
                "requirements": item.clarified_requirements,
                "assignedWorkers": item.assigned_workers,
            }),
        )
        .await;
        self.publish(WorkActivity::Assigned {
            item_id: item.id.clone(),
            worker: primary.clone(),
            title: item.title.clone(),
        });
        info!(item_id = %item.id, worker = %primary, "Work dispatched");

        let mut progress = worker.start(&item);
        while let Some(next) = progress.next().await {
            match next {
                Ok(event) => {
                    let updated = self.apply_phase(id, &event).await?;
                    self.send_notification(
                        &primary,
                        &format!(
                            "{}: {} ({}%) {}",
                            updated.title, updated.status, updated.progress, event.message
                        ),
                        json!({
                            "itemId": updated.id,
                            "status": updated.status,
                            "progress": updated.progress,
                        }),
                    )
                    .await;
                    self.publish(WorkActivity::Phase {
                        item_id: updated.id.clone(),
                        status: updated.status,
                        progress: updated.progress,
                        message: event.message.clone(),
                    });

                    if updated.status == WorkStatus::Completed {
                        let summary = completion_summary(&updated, &primary);
                        info!(item_id = %updated.id, "Work completed");
                        self.publish(WorkActivity::Completed {
                            item_id: updated.id.clone(),
                            summary: summary.clone(),
                        });
                        return Ok(ExecutionReport::success(summary));
                    }
                }
                Err(worker_error) => {
                    let reason = worker_error.to_string();
                    error!(item_id = %id, error = %reason, "Worker failed");
                    self.mark_failed(id, &reason).await;
                    return Ok(ExecutionReport::failure(format!(
                        "Work on '{}' failed: {reason}",
                        item.title
                    )));
                }
            }
        }

        let reason = WorkerError::Aborted {
            worker: primary.clone(),
            reason: "progress stream ended before completion".into(),
        }
        .to_string();
        self.mark_failed(id, &reason).await;
        Ok(ExecutionReport::failure(format!(
            "Work on '{}' failed: {reason}",
            item.title
        )))
    }

    /// Apply one progress event with a versioned update.
    ///
    /// Re-reads the item before every attempt; a terminal item stops
    /// execution instead of being overwritten.
    async fn apply_phase(&self, id: &str, event: &ProgressEvent) -> Result<WorkItem, WorkError> {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self
                .store
                .get(id)
                .await
                .ok_or_else(|| WorkError::NotFound { id: id.to_string() })?;

            if current.status.is_terminal() {
                if current.status == WorkStatus::Cancelled {
                    self.publish(WorkActivity::Cancelled {
                        item_id: id.to_string(),
                    });
                }
                return Err(WorkError::Cancelled {
                    id: id.to_string(),
                    phase: event.phase.to_string(),
                });
            }

            let mut patch = WorkItemPatch::default().with_progress(event.progress);
            if current.status.can_transition_to(event.phase) {
                patch.status = Some(event.phase);
            } else {
                warn!(item_id = %id, from = %current.status, to = %event.phase, "Ignoring backwards phase");
            }
            if event.phase == WorkStatus::Completed {
                patch.actual_completion = Some(Utc::now());
                patch.outputs = Some(event.outputs.clone().unwrap_or_default());
            }

            match self.store.update_if_version(id, current.version, patch).await {
                Ok(updated) => return Ok(updated),
                Err(StoreError::VersionConflict { .. }) => {
                    debug!(item_id = %id, attempt, "Version conflict, re-reading item");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let actual = self.store.get(id).await.map(|i| i.version).unwrap_or_default();
        Err(StoreError::VersionConflict {
            id: id.to_string(),
            expected: actual,
            actual,
        }
        .into())
    }

    /// Record a worker failure unless the item already ended.
    ///
    /// Retries version conflicts; the failure event is published only once
    /// the write lands.
    async fn mark_failed(&self, id: &str, reason: &str) {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let Some(current) = self.store.get(id).await else {
                return;
            };
            if current.status.is_terminal() {
                debug!(item_id = %id, status = %current.status, "Not overwriting terminal item");
                return;
            }
            let patch = WorkItemPatch::status(WorkStatus::Failed)
                .with_error(reason)
                .with_completion(Utc::now());
            match self.store.update_if_version(id, current.version, patch).await {
                Ok(_) => {
                    self.publish(WorkActivity::Failed {
                        item_id: id.to_string(),
                        error: reason.to_string(),
                    });
                    return;
                }
                Err(StoreError::VersionConflict { .. }) => {
                    debug!(item_id = %id, attempt, "Version conflict while recording failure");
                }
                Err(e) => {
                    warn!(item_id = %id, error = %e, "Could not record failure");
                    return;
                }
            }
        }
        warn!(item_id = %id, "Gave up recording failure after repeated conflicts");
    }

    async fn send_notification(&self, target: &str, message: &str, metadata: serde_json::Value) {
        if let Err(e) = self.notifier.notify(target, message, metadata).await {
            warn!(target_worker = %target, error = %e, "Coordination notification failed");
        }
    }
}

fn default_worker(category: IntentCategory) -> &'static str {
    match category {
        IntentCategory::Analyze => "analyst",
        _ => "frontend",
    }
}

/// First sentence of the description, capped at `TITLE_MAX_CHARS`.
fn derive_title(description: &str) -> String {
    let first = description
        .split(['.', '\n', '!', '?'])
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("Untitled work");
    if first.chars().count() <= TITLE_MAX_CHARS {
        return first.to_string();
    }
    let cut: String = first.chars().take(TITLE_MAX_CHARS - 3).collect();
    format!("{}...", cut.trim_end())
}

fn completion_summary(item: &WorkItem, worker: &str) -> String {
    let mut summary = format!("Finished '{}' ({}) with {worker}.", item.title, item.id);
    if let Some(outputs) = &item.outputs {
        if !outputs.files.is_empty() {
            summary.push_str(&format!(" Files: {}.", outputs.files.join(", ")));
        }
        if let Some(url) = &outputs.preview_url {
            summary.push_str(&format!(" Preview: {url}"));
        }
        if let Some(url) = &outputs.deployment_url {
            summary.push_str(&format!(" Deployed: {url}"));
        }
        if let Some(url) = &outputs.pr_url {
            summary.push_str(&format!(" PR: {url}"));
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};

    use super::*;
    use crate::error::NotifyError;
    use crate::intent::{Complexity, IntentParameters};
    use crate::notify::ActivityNotifier;
    use crate::work::repository::NullRepository;
    use crate::workers::Worker;

    fn intent(category: IntentCategory, workers: &[&str]) -> Intent {
        Intent {
            category,
            subcategory: "build-ui".into(),
            specific: "component".into(),
            confidence: 0.9,
            reasoning: String::new(),
            required_workers: workers.iter().map(|w| w.to_string()).collect(),
            complexity: Complexity::Simple,
            parameters: IntentParameters {
                description: "Build a pricing table. Three tiers.".into(),
                requirements: vec!["responsive".into()],
                ..IntentParameters::default()
            },
        }
    }

    async fn setup(registry: WorkerRegistry) -> (WorkOrchestrator, Arc<ActivityNotifier>) {
        let store = Arc::new(WorkItemStore::open(Arc::new(NullRepository)).await);
        let notifier = Arc::new(ActivityNotifier::new());
        let orchestrator = WorkOrchestrator::new(store, Arc::new(registry), notifier.clone());
        (orchestrator, notifier)
    }

    #[tokio::test]
    async fn create_from_intent_fills_defaults() {
        let (orch, _) = setup(WorkerRegistry::with_defaults(Duration::ZERO)).await;
        let item = orch
            .create_from_intent(&intent(IntentCategory::Analyze, &[]), "u1", "analyze signups")
            .await;
        assert_eq!(item.title, "Build a pricing table");
        assert_eq!(item.primary_worker.as_deref(), Some("analyst"));
        assert_eq!(item.assigned_workers, vec!["analyst"]);
        assert_eq!(item.clarified_requirements, vec!["responsive"]);
        assert_eq!(item.requested_by, "u1");
    }

    #[tokio::test]
    async fn runs_all_phases_and_notifies_each() {
        let (orch, notifier) = setup(WorkerRegistry::with_defaults(Duration::ZERO)).await;
        let mut rx = orch.subscribe();
        let item = orch
            .create_from_intent(&intent(IntentCategory::Build, &["frontend"]), "u1", "build")
            .await;

        let report = orch.execute_work(&item.id).await;
        assert!(report.success, "{}", report.message);
        assert!(report.message.contains("Preview"));

        let done = orch.store().get(&item.id).await.unwrap();
        assert_eq!(done.status, WorkStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.actual_completion.is_some());
        assert!(!done.outputs.unwrap().files.is_empty());

        // one assignment + four phases
        assert_eq!(notifier.records_for("frontend").len(), 5);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(WorkActivity::Assigned { .. })));
        assert!(matches!(events.last(), Some(WorkActivity::Completed { .. })));
    }

    #[tokio::test]
    async fn todo_worker_fails_fast() {
        let (orch, notifier) = setup(WorkerRegistry::with_defaults(Duration::ZERO)).await;
        let item = orch
            .create_from_intent(&intent(IntentCategory::Build, &["mobile", "frontend"]), "u1", "app")
            .await;

        let report = orch.execute_work(&item.id).await;
        assert!(!report.success);
        assert!(report.message.contains("mobile"));

        let unchanged = orch.store().get(&item.id).await.unwrap();
        assert_eq!(unchanged.status, WorkStatus::Analyzing);
        assert_eq!(unchanged.progress, 0);
        assert!(notifier.records().is_empty());
    }

    #[tokio::test]
    async fn missing_item_is_reported() {
        let (orch, _) = setup(WorkerRegistry::with_defaults(Duration::ZERO)).await;
        let report = orch.execute_work("work_0_missing").await;
        assert!(!report.success);
        assert!(report.message.contains("not found"));
    }

    struct BrokenWorker;

    impl Worker for BrokenWorker {
        fn name(&self) -> &str {
            "frontend"
        }

        fn start(&self, _item: &WorkItem) -> BoxStream<'static, Result<ProgressEvent, WorkerError>> {
            stream::iter(vec![
                Ok(ProgressEvent::new(WorkStatus::Planning, 25, "planning")),
                Err(WorkerError::PhaseFailed {
                    worker: "frontend".into(),
                    phase: "building".into(),
                    reason: "compiler exploded".into(),
                }),
            ])
            .boxed()
        }
    }

    #[tokio::test]
    async fn worker_error_marks_item_failed() {
        let mut registry = WorkerRegistry::new();
        registry.register(Arc::new(BrokenWorker));
        let (orch, _) = setup(registry).await;
        let item = orch
            .create_from_intent(&intent(IntentCategory::Build, &["frontend"]), "u1", "build")
            .await;

        let report = orch.execute_work(&item.id).await;
        assert!(!report.success);
        assert!(report.message.contains("compiler exploded"));

        let failed = orch.store().get(&item.id).await.unwrap();
        assert_eq!(failed.status, WorkStatus::Failed);
        assert_eq!(failed.progress, 25);
        assert_eq!(failed.errors.len(), 1);
        assert!(failed.outputs.is_none());
    }

    #[tokio::test]
    async fn failure_is_not_recorded_over_cancelled_item() {
        let (orch, _) = setup(WorkerRegistry::with_defaults(Duration::ZERO)).await;
        let mut rx = orch.subscribe();
        let item = orch
            .create_from_intent(&intent(IntentCategory::Build, &["frontend"]), "u1", "build")
            .await;
        let cancelled = orch
            .store()
            .update(&item.id, WorkItemPatch::status(WorkStatus::Cancelled))
            .await
            .unwrap();

        orch.mark_failed(&item.id, "worker went away").await;

        assert_eq!(orch.store().get(&item.id).await.unwrap(), cancelled);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failure_event_follows_recorded_failure() {
        let (orch, _) = setup(WorkerRegistry::with_defaults(Duration::ZERO)).await;
        let mut rx = orch.subscribe();
        let item = orch
            .create_from_intent(&intent(IntentCategory::Build, &["frontend"]), "u1", "build")
            .await;

        orch.mark_failed(&item.id, "worker went away").await;

        let stored = orch.store().get(&item.id).await.unwrap();
        assert_eq!(stored.status, WorkStatus::Failed);
        assert_eq!(stored.errors, vec!["worker went away"]);
        match rx.try_recv() {
            Ok(WorkActivity::Failed { item_id, error }) => {
                assert_eq!(item_id, item.id);
                assert_eq!(error, "worker went away");
            }
            other => panic!("expected Failed event, got {other:?}"),
        }
    }

    /// Notifier whose deliveries always fail.
    struct UnreachableNotifier;

    #[async_trait]
    impl CoordinationNotifier for UnreachableNotifier {
        async fn notify(
            &self,
            target: &str,
            _message: &str,
            _metadata: serde_json::Value,
        ) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery {
                target: target.to_string(),
                reason: "connection refused".into(),
            })
        }
    }

    #[tokio::test]
    async fn notification_failures_do_not_stop_work() {
        let store = Arc::new(WorkItemStore::open(Arc::new(NullRepository)).await);
        let orch = WorkOrchestrator::new(
            store,
            Arc::new(WorkerRegistry::with_defaults(Duration::ZERO)),
            Arc::new(UnreachableNotifier),
        );
        let item = orch
            .create_from_intent(&intent(IntentCategory::Build, &["frontend"]), "u1", "build")
            .await;

        let report = orch.execute_work(&item.id).await;
        assert!(report.success, "{}", report.message);

        let done = orch.store().get(&item.id).await.unwrap();
        assert_eq!(done.status, WorkStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.outputs.is_some());
    }

    #[tokio::test]
    async fn cancel_between_phases_stops_execution() {
        let (orch, _) = setup(WorkerRegistry::with_defaults(Duration::from_millis(100))).await;
        let orch = Arc::new(orch);
        let item = orch
            .create_from_intent(&intent(IntentCategory::Build, &["frontend"]), "u1", "build")
            .await;

        let runner = {
            let orch = Arc::clone(&orch);
            let id = item.id.clone();
            tokio::spawn(async move { orch.execute_work(&id).await })
        };

        tokio::time::sleep(Duration::from_millis(150)).await;
        orch.store()
            .update(&item.id, WorkItemPatch::status(WorkStatus::Cancelled))
            .await;

        let report = runner.await.unwrap();
        assert!(!report.success);
        assert!(report.message.contains("cancelled"));

        let stored = orch.store().get(&item.id).await.unwrap();
        assert_eq!(stored.status, WorkStatus::Cancelled);
        assert!(stored.outputs.is_none());
    }

    #[test]
    fn titles_are_trimmed_and_capped() {
        assert_eq!(derive_title("Add dark mode. Also fix the footer"), "Add dark mode");
        let long = "a".repeat(100);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
        assert!(title.ends_with("..."));
        assert_eq!(derive_title("   "), "Untitled work");
    }
}
