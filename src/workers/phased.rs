//! Built-in workers that walk an item through fixed phases.
//!
//! Each phase is reported after `phase_delay`. The final event carries the
//! worker's outputs.

use std::time::Duration;

use futures::StreamExt;
use futures::stream::{self, BoxStream};

use crate::error::WorkerError;
use crate::work::model::{WorkItem, WorkOutputs, WorkStatus};
use crate::workers::{ProgressEvent, Worker};

/// Which kind of built-in worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerProfile {
    Frontend,
    Backend,
    Analyst,
}

impl WorkerProfile {
    pub const ALL: [WorkerProfile; 3] = [Self::Frontend, Self::Backend, Self::Analyst];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Analyst => "analyst",
        }
    }

    /// Phase messages for planning, building, deploying.
    fn phase_messages(&self) -> [&'static str; 3] {
        match self {
            Self::Frontend => [
                "Sketching component structure",
                "Writing components and styles",
                "Publishing preview build",
            ],
            Self::Backend => [
                "Designing endpoints and data model",
                "Implementing handlers",
                "Deploying service",
            ],
            Self::Analyst => [
                "Collecting sources",
                "Running analysis",
                "Writing up findings",
            ],
        }
    }

    fn outputs(&self, item: &WorkItem) -> WorkOutputs {
        let slug = slugify(&item.title);
        match self {
            Self::Frontend => WorkOutputs {
                files: vec![
                    format!("src/components/{slug}.tsx"),
                    format!("src/components/{slug}.css"),
                ],
                preview_url: Some(format!("https://preview.local/{}", item.id)),
                ..WorkOutputs::default()
            },
            Self::Backend => WorkOutputs {
                files: vec![format!("src/api/{slug}.rs")],
                deployment_url: Some(format!("https://api.local/{slug}")),
                ..WorkOutputs::default()
            },
            Self::Analyst => WorkOutputs {
                files: vec![format!("reports/{slug}.md")],
                ..WorkOutputs::default()
            },
        }
    }
}

/// A worker that reports planning → building → deploying → completed.
pub struct PhasedWorker {
    profile: WorkerProfile,
    phase_delay: Duration,
}

impl PhasedWorker {
    pub fn new(profile: WorkerProfile, phase_delay: Duration) -> Self {
        Self {
            profile,
            phase_delay,
        }
    }
}

impl Worker for PhasedWorker {
    fn name(&self) -> &str {
        self.profile.name()
    }

    fn start(&self, item: &WorkItem) -> BoxStream<'static, Result<ProgressEvent, WorkerError>> {
        let [planning, building, deploying] = self.profile.phase_messages();
        let events = vec![
            ProgressEvent::new(WorkStatus::Planning, 25, planning),
            ProgressEvent::new(WorkStatus::Building, 60, building),
            ProgressEvent::new(WorkStatus::Deploying, 85, deploying),
            ProgressEvent::new(WorkStatus::Completed, 100, format!("{} finished", item.title))
                .with_outputs(self.profile.outputs(item)),
        ];

        let delay = self.phase_delay;
        stream::iter(events)
            .then(move |event| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, WorkerError>(event)
            })
            .boxed()
    }
}

/// Lowercase, ASCII alphanumerics, runs of anything else collapsed to `-`.
fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() { "work".to_string() } else { slug }
}
