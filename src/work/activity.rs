//! Activity stream for work items — real-time updates on orchestration.
//!
//! The orchestrator broadcasts `WorkActivity` events; the binary prints them
//! and tests subscribe to assert on the sequence.

use serde::{Deserialize, Serialize};

use crate::work::model::WorkStatus;

/// Capacity of the activity broadcast channel.
pub const ACTIVITY_CHANNEL_CAPACITY: usize = 256;

/// Events emitted while a work item is orchestrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkActivity {
    /// The item was handed to its primary worker.
    Assigned {
        item_id: String,
        worker: String,
        title: String,
    },
    /// The item entered a new phase.
    Phase {
        item_id: String,
        status: WorkStatus,
        progress: u8,
        message: String,
    },
    /// All phases finished.
    Completed { item_id: String, summary: String },
    /// A worker error ended the item.
    Failed { item_id: String, error: String },
    /// Execution stopped because the item was cancelled.
    Cancelled { item_id: String },
}

impl WorkActivity {
    pub fn item_id(&self) -> &str {
        match self {
            Self::Assigned { item_id, .. }
            | Self::Phase { item_id, .. }
            | Self::Completed { item_id, .. }
            | Self::Failed { item_id, .. }
            | Self::Cancelled { item_id } => item_id,
        }
    }

    /// Whether this is the last event for its item.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }

    /// One-line rendering for terminals.
    pub fn summary_line(&self) -> String {
        match self {
            Self::Assigned { item_id, worker, title } => {
                format!("[{item_id}] assigned to {worker}: {title}")
            }
            Self::Phase {
                item_id,
                status,
                progress,
                message,
            } => format!("[{item_id}] {status} {progress}% {message}"),
            Self::Completed { item_id, summary } => format!("[{item_id}] completed: {summary}"),
            Self::Failed { item_id, error } => format!("[{item_id}] failed: {error}"),
            Self::Cancelled { item_id } => format!("[{item_id}] cancelled"),
        }
    }
}
