//! Deterministic local classifier used when the service path is unavailable.
//!
//! Rules are checked in order; the first match wins.

use crate::intent::model::{Complexity, Intent, IntentCategory, IntentParameters};

const BUILD_WORDS: [&str; 3] = ["build", "create", "make"];

/// Classify `input` without calling out.
pub fn classify(input: &str) -> Intent {
    let lower = input.to_lowercase();
    let description = input.trim().to_string();

    if BUILD_WORDS.iter().any(|w| lower.contains(w)) {
        return Intent {
            category: IntentCategory::Build,
            subcategory: "build-ui".into(),
            specific: "ui-component".into(),
            confidence: 0.7,
            reasoning: "Local fallback: the request asks to build, create or make something".into(),
            required_workers: vec!["frontend".into()],
            complexity: Complexity::Simple,
            parameters: IntentParameters {
                description,
                ..IntentParameters::default()
            },
        };
    }

    Intent {
        category: IntentCategory::Conversation,
        subcategory: "conversation-unclear".into(),
        specific: "needs-clarification".into(),
        confidence: 0.6,
        reasoning: "Local fallback: could not tell what is being asked".into(),
        required_workers: Vec::new(),
        complexity: Complexity::Simple,
        parameters: IntentParameters {
            description,
            ..IntentParameters::default()
        },
    }
}
