//! libSQL backend — one row per work item, atomic per-key upsert.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::work::model::WorkItem;
use crate::work::repository::WorkItemRepository;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS work_items (
    id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    status TEXT NOT NULL,
    version INTEGER NOT NULL,
    started_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_work_items_started ON work_items(started_at);
";

/// libSQL-backed repository.
///
/// The item itself is stored as a JSON body; `status`, `version` and
/// `started_at` are duplicated into columns for ad-hoc inspection.
pub struct LibSqlRepository {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlRepository {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Open(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;
        let repo = Self::from_database(db)?;
        repo.init_schema().await?;
        info!(path = %path.display(), "Work item database opened");
        Ok(repo)
    }

    /// In-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;
        let repo = Self::from_database(db)?;
        repo.init_schema().await?;
        Ok(repo)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(SCHEMA)
            .await
            .map_err(|e| StoreError::Query(format!("schema: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl WorkItemRepository for LibSqlRepository {
    async fn load_all(&self) -> Result<Vec<WorkItem>, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT id, body FROM work_items ORDER BY started_at", ())
            .await
            .map_err(|e| StoreError::Query(format!("load_all: {e}")))?;

        let mut items = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("load_all row: {e}")))?
        {
            let id: String = row.get(0).map_err(|e| StoreError::Query(e.to_string()))?;
            let body: String = row.get(1).map_err(|e| StoreError::Query(e.to_string()))?;
            match serde_json::from_str::<WorkItem>(&body) {
                Ok(item) => items.push(item),
                Err(e) => warn!(id = %id, error = %e, "Skipping unreadable work item row"),
            }
        }
        debug!(count = items.len(), "Work items loaded from libSQL");
        Ok(items)
    }

    async fn put(&self, item: &WorkItem) -> Result<(), StoreError> {
        let body = serde_json::to_string(item)?;
        let version = i64::try_from(item.version)
            .map_err(|_| StoreError::Query(format!("put: version {} out of range", item.version)))?;
        self.conn
            .execute(
                "INSERT INTO work_items (id, body, status, version, started_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    body = excluded.body,
                    status = excluded.status,
                    version = excluded.version,
                    updated_at = excluded.updated_at",
                params![
                    item.id.clone(),
                    body,
                    item.status.as_str(),
                    version,
                    item.start_time.to_rfc3339(),
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("put: {e}")))?;
        Ok(())
    }
}
