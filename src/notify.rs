//! Coordination notifications — outbound messages addressed to workers.
//!
//! Delivery failures are the caller's to log; they never abort execution.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::NotifyError;

/// Number of records kept by `ActivityNotifier`.
pub const NOTIFICATION_LOG_CAPACITY: usize = 200;

/// Outbound notification boundary.
#[async_trait]
pub trait CoordinationNotifier: Send + Sync {
    async fn notify(
        &self,
        target: &str,
        message: &str,
        metadata: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// A delivered notification.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinationRecord {
    pub target: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

/// Notifier that logs each message and keeps the most recent ones.
#[derive(Default)]
pub struct ActivityNotifier {
    log: Mutex<VecDeque<CoordinationRecord>>,
}

impl ActivityNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded notifications, oldest first.
    pub fn records(&self) -> Vec<CoordinationRecord> {
        self.log
            .lock()
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Recorded notifications addressed to `target`.
    pub fn records_for(&self, target: &str) -> Vec<CoordinationRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.target == target)
            .collect()
    }
}

#[async_trait]
impl CoordinationNotifier for ActivityNotifier {
    async fn notify(
        &self,
        target: &str,
        message: &str,
        metadata: serde_json::Value,
    ) -> Result<(), NotifyError> {
        info!(target_worker = %target, message, "Coordination notification");
        let mut log = self.log.lock().map_err(|_| NotifyError::Delivery {
            target: target.to_string(),
            reason: "notification log poisoned".into(),
        })?;
        if log.len() == NOTIFICATION_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(CoordinationRecord {
            target: target.to_string(),
            message: message.to_string(),
            metadata,
            sent_at: Utc::now(),
        });
        Ok(())
    }
}
