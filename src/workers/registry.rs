//! Worker registry — closed roster of known workers.
//!
//! Unimplemented workers are registered as `Todo` rather than left out, so a
//! request naming them fails with an explicit message instead of routing to
//! a default handler.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::workers::Worker;
use crate::workers::phased::{PhasedWorker, WorkerProfile};

/// Worker names registered as not yet implemented.
pub const TODO_WORKERS: [&str; 4] = ["devops", "database", "mobile", "security"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerAvailability {
    Available,
    Todo,
}

enum Entry {
    Available(Arc<dyn Worker>),
    Todo,
}

pub struct WorkerRegistry {
    entries: BTreeMap<String, Entry>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The built-in roster: phased `frontend`, `backend`, `analyst`, and the
    /// `todo` workers.
    pub fn with_defaults(phase_delay: Duration) -> Self {
        let mut registry = Self::new();
        for profile in WorkerProfile::ALL {
            registry.register(Arc::new(PhasedWorker::new(profile, phase_delay)));
        }
        for name in TODO_WORKERS {
            registry.register_todo(name);
        }
        registry
    }

    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        self.entries
            .insert(worker.name().to_lowercase(), Entry::Available(worker));
    }

    pub fn register_todo(&mut self, name: &str) {
        self.entries.insert(name.to_lowercase(), Entry::Todo);
    }

    pub fn availability(&self, name: &str) -> Option<WorkerAvailability> {
        self.entries
            .get(&name.to_lowercase())
            .map(|entry| match entry {
                Entry::Available(_) => WorkerAvailability::Available,
                Entry::Todo => WorkerAvailability::Todo,
            })
    }

    /// The worker for `name`, if it is available.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Worker>> {
        match self.entries.get(&name.to_lowercase()) {
            Some(Entry::Available(worker)) => Some(Arc::clone(worker)),
            _ => None,
        }
    }

    /// Check that every name is registered and available.
    ///
    /// Returns the `todo` or unknown names, in input order, on failure.
    pub fn check(&self, names: &[String]) -> Result<(), Vec<String>> {
        let unavailable: Vec<String> = names
            .iter()
            .filter(|name| self.availability(name) != Some(WorkerAvailability::Available))
            .cloned()
            .collect();
        if unavailable.is_empty() {
            Ok(())
        } else {
            Err(unavailable)
        }
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Names of available workers, sorted.
    pub fn available_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::Available(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::with_defaults(Duration::from_millis(1500))
    }
}
