//! Single-document JSON persistence.
//!
//! All items live in one JSON array. Every `put` rewrites the whole document
//! through a temp file and a rename, so a crash mid-write leaves the previous
//! document intact. A document that can't be loaded is moved aside to
//! `<name>.corrupt` before anything new is written; if that move fails, writes
//! are refused so the old document is never replaced.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::work::model::WorkItem;
use crate::work::repository::WorkItemRepository;

pub struct JsonFileRepository {
    path: PathBuf,
    /// Last written document, keyed by id.
    items: Mutex<BTreeMap<String, WorkItem>>,
    /// Set when an unloadable document could not be moved aside.
    read_only: AtomicBool,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            items: Mutex::new(BTreeMap::new()),
            read_only: AtomicBool::new(false),
        }
    }

    /// Where an unloadable document is moved.
    pub fn corrupt_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "work-items".into());
        name.push(".corrupt");
        self.path.with_file_name(name)
    }

    /// Move the current document out of the way after a failed load.
    async fn set_aside(&self) {
        let aside = self.corrupt_path();
        match tokio::fs::rename(&self.path, &aside).await {
            Ok(()) => {
                warn!(path = %self.path.display(), moved_to = %aside.display(), "Unloadable work item file moved aside");
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Could not move unloadable work item file, refusing writes");
                self.read_only.store(true, Ordering::SeqCst);
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_document(&self, items: &BTreeMap<String, WorkItem>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut list: Vec<&WorkItem> = items.values().collect();
        list.sort_by_key(|item| item.start_time);
        let body = serde_json::to_vec_pretty(&list)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), count = list.len(), "Work items written");
        Ok(())
    }
}

#[async_trait]
impl WorkItemRepository for JsonFileRepository {
    async fn load_all(&self) -> Result<Vec<WorkItem>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No work item file yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                self.set_aside().await;
                return Err(e.into());
            }
        };

        let loaded: Vec<WorkItem> = match serde_json::from_slice(&bytes) {
            Ok(loaded) => loaded,
            Err(e) => {
                self.set_aside().await;
                return Err(e.into());
            }
        };
        let mut items = self.items.lock().await;
        items.clear();
        for item in &loaded {
            items.insert(item.id.clone(), item.clone());
        }
        info!(path = %self.path.display(), count = loaded.len(), "Work items loaded");
        Ok(loaded)
    }

    async fn put(&self, item: &WorkItem) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::Open(format!(
                "{} could not be loaded or moved aside, not overwriting it",
                self.path.display()
            )));
        }
        let mut items = self.items.lock().await;
        items.insert(item.id.clone(), item.clone());
        self.write_document(&items).await
    }
}
