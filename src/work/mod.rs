//! Work items — model, store, orchestration and lifecycle commands.
//!
//! Core components:
//! - `model` — `WorkItem`, `WorkStatus`, `Priority`, `WorkItemPatch`
//! - `store` — in-memory map with write-through persistence and target lookup
//! - `repository` — persistence seam (`json_file`, `libsql_backend`)
//! - `orchestrator` — dispatches items to workers and applies their progress
//! - `commands` — cancel / pause / resume / status / history
//! - `activity` — broadcast events emitted during orchestration

pub mod activity;
pub mod commands;
pub mod json_file;
pub mod libsql_backend;
pub mod model;
pub mod orchestrator;
pub mod repository;
pub mod store;

pub use activity::WorkActivity;
pub use commands::{CommandResponse, LifecycleCommandHandler, ManageAction};
pub use json_file::JsonFileRepository;
pub use libsql_backend::LibSqlRepository;
pub use model::{NewWorkItem, Priority, WorkItem, WorkItemPatch, WorkOutputs, WorkStatus};
pub use orchestrator::{ExecutionReport, WorkOrchestrator};
pub use repository::{NullRepository, WorkItemRepository};
pub use store::WorkItemStore;
