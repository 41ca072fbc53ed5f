//! Work Router — routes free-text requests to tracked, worker-executed work.

pub mod config;
pub mod conversation;
pub mod error;
pub mod intent;
pub mod llm;
pub mod notify;
pub mod router;
pub mod work;
pub mod workers;
