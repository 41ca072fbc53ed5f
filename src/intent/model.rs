//! Intent data model.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level intent category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentCategory {
    Build,
    Modify,
    Analyze,
    Manage,
    Question,
    Conversation,
}

impl IntentCategory {
    pub const ALL: [IntentCategory; 6] = [
        Self::Build,
        Self::Modify,
        Self::Analyze,
        Self::Manage,
        Self::Question,
        Self::Conversation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Modify => "modify",
            Self::Analyze => "analyze",
            Self::Manage => "manage",
            Self::Question => "question",
            Self::Conversation => "conversation",
        }
    }

    /// Categories that turn into a work item.
    pub fn produces_work(&self) -> bool {
        matches!(self, Self::Build | Self::Modify | Self::Analyze)
    }
}

impl std::fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Coarse sizing bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
    Enterprise,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Complex => "complex",
            Self::Enterprise => "enterprise",
        }
    }

    /// Rough wall-clock estimate used for `estimated_completion`.
    pub fn estimated_duration(&self) -> Duration {
        let minutes = match self {
            Self::Simple => 5,
            Self::Medium => 15,
            Self::Complex => 45,
            Self::Enterprise => 120,
        };
        Duration::from_secs(minutes * 60)
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "medium" => Ok(Self::Medium),
            "complex" => Ok(Self::Complex),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(format!("unknown complexity '{other}'")),
        }
    }
}

/// Free-form parameters attached to an intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentParameters {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

/// Structured classification of one user message.
///
/// Created fresh per input and consumed immediately; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub category: IntentCategory,
    pub subcategory: String,
    pub specific: String,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    /// Diagnostic only.
    pub reasoning: String,
    /// Ordered, duplicate-free.
    pub required_workers: Vec<String>,
    pub complexity: Complexity,
    pub parameters: IntentParameters,
}
