//! Durable backing for the work item store.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::work::model::WorkItem;

/// Persistence backend for work items.
///
/// The store keeps its own in-memory map; a repository only has to load
/// everything once at startup and accept one item per mutation.
#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    /// Load every persisted item.
    async fn load_all(&self) -> Result<Vec<WorkItem>, StoreError>;

    /// Insert or replace one item.
    async fn put(&self, item: &WorkItem) -> Result<(), StoreError>;
}

/// Repository that keeps nothing. Used in tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct NullRepository;

#[async_trait]
impl WorkItemRepository for NullRepository {
    async fn load_all(&self) -> Result<Vec<WorkItem>, StoreError> {
        Ok(Vec::new())
    }

    async fn put(&self, _item: &WorkItem) -> Result<(), StoreError> {
        Ok(())
    }
}
