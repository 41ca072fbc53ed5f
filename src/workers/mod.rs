//! Workers — named executors that advance a work item.
//!
//! Core components:
//! - `Worker` — capability trait: `start(item)` yields a stream of `ProgressEvent`
//! - `registry` — static roster of `available` and `todo` workers
//! - `phased` — built-in workers that walk planning → building → deploying → completed

pub mod phased;
pub mod registry;

pub use phased::{PhasedWorker, WorkerProfile};
pub use registry::{WorkerAvailability, WorkerRegistry};

use futures::stream::BoxStream;

use crate::error::WorkerError;
use crate::work::model::{WorkItem, WorkOutputs, WorkStatus};

/// One step of progress reported by a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Phase the item is entering.
    pub phase: WorkStatus,
    /// 0–100.
    pub progress: u8,
    pub message: String,
    /// Set on the final `Completed` event.
    pub outputs: Option<WorkOutputs>,
}

impl ProgressEvent {
    pub fn new(phase: WorkStatus, progress: u8, message: impl Into<String>) -> Self {
        Self {
            phase,
            progress,
            message: message.into(),
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: WorkOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }
}

/// A named executor.
///
/// The stream ends after a `Completed` event or the first error. Dropping
/// the stream stops the worker.
pub trait Worker: Send + Sync {
    fn name(&self) -> &str;

    fn start(&self, item: &WorkItem) -> BoxStream<'static, Result<ProgressEvent, WorkerError>>;
}
