//! Work item store — in-memory map with write-through persistence.
//!
//! Every mutation is persisted before the write lock is released, so the
//! repository always sees versions in order. Persistence failures are logged
//! and the in-memory state is kept.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::work::model::{NewWorkItem, WorkItem, WorkItemPatch};
use crate::work::repository::WorkItemRepository;

pub struct WorkItemStore {
    items: RwLock<HashMap<String, WorkItem>>,
    repo: Arc<dyn WorkItemRepository>,
}

impl WorkItemStore {
    /// Load every persisted item. An unreadable store starts empty.
    pub async fn open(repo: Arc<dyn WorkItemRepository>) -> Self {
        let items = match repo.load_all().await {
            Ok(list) => list.into_iter().map(|i| (i.id.clone(), i)).collect(),
            Err(e) => {
                warn!(error = %e, "Could not load work items, starting empty");
                HashMap::new()
            }
        };
        info!(count = items.len(), "Work item store ready");
        Self {
            items: RwLock::new(items),
            repo,
        }
    }

    async fn persist(&self, item: &WorkItem) {
        if let Err(e) = self.repo.put(item).await {
            error!(item_id = %item.id, error = %e, "Failed to persist work item");
        }
    }

    /// Create a new item in `analyzing` and persist it immediately.
    pub async fn create(&self, spec: NewWorkItem) -> WorkItem {
        let item = WorkItem::new(spec, Utc::now());
        let mut items = self.items.write().await;
        items.insert(item.id.clone(), item.clone());
        self.persist(&item).await;
        info!(item_id = %item.id, title = %item.title, "Work item created");
        item
    }

    pub async fn get(&self, id: &str) -> Option<WorkItem> {
        self.items.read().await.get(id).cloned()
    }

    /// Merge `patch` into the item, persist, and return the result.
    ///
    /// Last writer wins; use `update_if_version` to detect lost updates.
    pub async fn update(&self, id: &str, patch: WorkItemPatch) -> Option<WorkItem> {
        let mut items = self.items.write().await;
        let item = items.get_mut(id)?;
        item.apply(patch);
        item.version += 1;
        let updated = item.clone();
        self.persist(&updated).await;
        debug!(item_id = %id, status = %updated.status, progress = updated.progress, "Work item updated");
        Some(updated)
    }

    /// Merge `patch` only if the stored version still equals `expected`.
    pub async fn update_if_version(
        &self,
        id: &str,
        expected: u64,
        patch: WorkItemPatch,
    ) -> Result<WorkItem, StoreError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        if item.version != expected {
            return Err(StoreError::VersionConflict {
                id: id.to_string(),
                expected,
                actual: item.version,
            });
        }
        item.apply(patch);
        item.version += 1;
        let updated = item.clone();
        self.persist(&updated).await;
        debug!(item_id = %id, version = updated.version, status = %updated.status, "Work item updated");
        Ok(updated)
    }

    /// Resolve the item a management command refers to.
    ///
    /// Without a hint: the most recently started non-terminal item of `user`.
    /// With a hint: exact id, then case-insensitive title substring (newest
    /// first).
    pub async fn find_target(&self, hint: Option<&str>, user: &str) -> Option<WorkItem> {
        let items = self.items.read().await;
        let mut mine: Vec<&WorkItem> = items.values().filter(|i| i.requested_by == user).collect();
        mine.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        let hint = hint.map(str::trim).filter(|h| !h.is_empty());
        let Some(hint) = hint else {
            return mine.into_iter().find(|i| !i.status.is_terminal()).cloned();
        };

        if let Some(exact) = mine.iter().find(|i| i.id == hint) {
            return Some((*exact).clone());
        }
        let needle = hint.to_lowercase();
        mine.into_iter()
            .find(|i| i.title.to_lowercase().contains(&needle))
            .cloned()
    }

    /// All non-terminal items, newest first.
    pub async fn list_active(&self) -> Vec<WorkItem> {
        let items = self.items.read().await;
        let mut active: Vec<WorkItem> = items
            .values()
            .filter(|i| !i.status.is_terminal())
            .cloned()
            .collect();
        active.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        active
    }

    /// The `n` most recently started items of any status, newest first.
    pub async fn list_recent(&self, n: usize) -> Vec<WorkItem> {
        let items = self.items.read().await;
        let mut all: Vec<WorkItem> = items.values().cloned().collect();
        all.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        all.truncate(n);
        all
    }

    /// The `n` most recently started items requested by `user`.
    pub async fn list_recent_for(&self, user: &str, n: usize) -> Vec<WorkItem> {
        let items = self.items.read().await;
        let mut mine: Vec<WorkItem> = items
            .values()
            .filter(|i| i.requested_by == user)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        mine.truncate(n);
        mine
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}
