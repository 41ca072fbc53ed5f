//! Intent classifier — service path with validation, local fallback.
//!
//! Flow:
//! 1. Ask the classification service for a JSON intent
//! 2. Extract the first well-formed JSON object from the reply
//! 3. Validate every required field (`ClassificationOutcome`)
//! 4. On transport failure or `Invalid`, use the heuristic classifier
//!
//! `classify` never returns an error.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::conversation::ConversationContext;
use crate::intent::heuristics;
use crate::intent::model::{Complexity, Intent, IntentCategory, IntentParameters};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Max chars of user input sent to the service.
const INPUT_PREVIEW_CHARS: usize = 2000;

/// Max chars per context message sent to the service.
const CONTEXT_PREVIEW_CHARS: usize = 200;

/// Result of validating a service reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Valid(Intent),
    Invalid(String),
}

/// Where an intent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSource {
    Service,
    Heuristic,
}

/// A classified intent plus its provenance.
#[derive(Debug, Clone)]
pub struct Classification {
    pub intent: Intent,
    pub source: IntentSource,
}

/// Converts raw text into an `Intent`.
pub struct IntentClassifier {
    llm: Option<Arc<dyn LlmProvider>>,
    known_workers: Vec<String>,
    max_tokens: u32,
    temperature: f32,
}

impl IntentClassifier {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self {
            llm,
            known_workers: Vec::new(),
            max_tokens: 1024,
            temperature: 0.1,
        }
    }

    /// Classifier that only uses the local heuristic.
    pub fn heuristic_only() -> Self {
        Self::new(None)
    }

    /// Worker names advertised to the service in the prompt.
    pub fn with_known_workers(mut self, workers: Vec<String>) -> Self {
        self.known_workers = workers;
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Classify `input`. Falls back to the heuristic on any service failure.
    pub async fn classify(&self, input: &str, context: &ConversationContext) -> Classification {
        let Some(llm) = &self.llm else {
            return self.fallback(input, "no classification service configured");
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt(&self.known_workers)),
            ChatMessage::user(build_user_prompt(input, context)),
        ])
        .with_max_tokens(self.max_tokens)
        .with_temperature(self.temperature);

        let response = match llm.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Classification call failed");
                return self.fallback(input, "service call failed");
            }
        };

        match parse_classification(&response.content) {
            ClassificationOutcome::Valid(intent) => {
                info!(
                    category = %intent.category,
                    subcategory = %intent.subcategory,
                    confidence = intent.confidence,
                    "Intent classified by service"
                );
                Classification {
                    intent,
                    source: IntentSource::Service,
                }
            }
            ClassificationOutcome::Invalid(reason) => {
                warn!(
                    reason = %reason,
                    raw_response = %response.content.chars().take(300).collect::<String>(),
                    "Rejected classification payload"
                );
                self.fallback(input, "invalid service payload")
            }
        }
    }

    fn fallback(&self, input: &str, why: &str) -> Classification {
        let intent = heuristics::classify(input);
        debug!(
            why,
            category = %intent.category,
            confidence = intent.confidence,
            "Using heuristic classification"
        );
        Classification {
            intent,
            source: IntentSource::Heuristic,
        }
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_system_prompt(known_workers: &[String]) -> String {
    let workers = if known_workers.is_empty() {
        "frontend, backend, analyst".to_string()
    } else {
        known_workers.join(", ")
    };

    format!(
        r#"You classify requests sent to a software build assistant.

Reply with ONE JSON object and nothing else:
{{
  "category": "build" | "modify" | "analyze" | "manage" | "question" | "conversation",
  "subcategory": "<short kebab-case refinement, e.g. build-ui>",
  "specific": "<most specific label; for manage use cancel | pause | resume | status | history>",
  "confidence": <number between 0 and 1>,
  "reasoning": "<one sentence>",
  "requiredWorkers": ["<worker name>", ...],
  "complexity": "simple" | "medium" | "complex" | "enterprise",
  "parameters": {{
    "description": "<what should be done>",
    "target": "<work item id or title the user refers to, if any>",
    "context": "<extra context or reason, if any>",
    "requirements": ["<explicit requirement>", ...]
  }}
}}

Known workers: {workers}
Use "manage" only for requests about existing work (cancel, pause, resume, status, history)."#
    )
}

fn build_user_prompt(input: &str, context: &ConversationContext) -> String {
    let mut prompt = String::new();

    if !context.topics.is_empty() {
        prompt.push_str(&format!("Topics so far: {}\n", context.topics.join(", ")));
    }
    if !context.pending_requests.is_empty() {
        prompt.push_str("Open requests:\n");
        for request in &context.pending_requests {
            let preview: String = request.chars().take(CONTEXT_PREVIEW_CHARS).collect();
            prompt.push_str(&format!("  - {preview}\n"));
        }
    }
    if !context.recent.is_empty() {
        prompt.push_str("Recent conversation:\n");
        for msg in &context.recent {
            let preview: String = msg.content.chars().take(CONTEXT_PREVIEW_CHARS).collect();
            let role = match msg.role {
                crate::conversation::Role::User => "user",
                crate::conversation::Role::Assistant => "assistant",
            };
            prompt.push_str(&format!("  [{role}] {preview}\n"));
        }
    }

    let input_preview: String = input.chars().take(INPUT_PREVIEW_CHARS).collect();
    prompt.push_str(&format!("\nRequest:\n{input_preview}"));
    prompt
}

// ── Response parsing ────────────────────────────────────────────────

/// Service payload before validation. Every field is optional here so that
/// missing fields become a validation failure, not a serde error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIntent {
    category: Option<String>,
    subcategory: Option<String>,
    specific: Option<String>,
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(alias = "required_workers")]
    required_workers: Option<Vec<String>>,
    complexity: Option<String>,
    parameters: Option<RawParameters>,
}

#[derive(Debug, Deserialize)]
struct RawParameters {
    description: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    requirements: Vec<String>,
}

/// Parse and validate a service reply.
pub fn parse_classification(raw: &str) -> ClassificationOutcome {
    let Some(json) = extract_json_object(raw) else {
        return ClassificationOutcome::Invalid("no JSON object in response".into());
    };
    let parsed: RawIntent = match serde_json::from_str(json) {
        Ok(parsed) => parsed,
        Err(e) => return ClassificationOutcome::Invalid(format!("JSON parse error: {e}")),
    };
    match validate(parsed) {
        Ok(intent) => ClassificationOutcome::Valid(intent),
        Err(reason) => ClassificationOutcome::Invalid(reason),
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("missing field '{field}'"))
}

fn validate(raw: RawIntent) -> Result<Intent, String> {
    let category: IntentCategory = required(raw.category, "category")?.parse()?;

    let subcategory = required(raw.subcategory, "subcategory")?;
    if subcategory.trim().is_empty() {
        return Err("empty field 'subcategory'".into());
    }
    let specific = required(raw.specific, "specific")?;

    let confidence = required(raw.confidence, "confidence")?;
    if !confidence.is_finite() {
        return Err("confidence is not a finite number".into());
    }

    let complexity: Complexity = required(raw.complexity, "complexity")?.parse()?;

    let mut required_workers: Vec<String> = Vec::new();
    for name in required(raw.required_workers, "requiredWorkers")? {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !required_workers.contains(&name) {
            required_workers.push(name);
        }
    }

    let params = required(raw.parameters, "parameters")?;
    let description = required(params.description, "parameters.description")?;

    Ok(Intent {
        category,
        subcategory: subcategory.trim().to_string(),
        specific: specific.trim().to_lowercase(),
        confidence: confidence.clamp(0.0, 1.0) as f32,
        reasoning: raw.reasoning.unwrap_or_default(),
        required_workers,
        complexity,
        parameters: IntentParameters {
            description,
            target: params.target.filter(|t| !t.trim().is_empty()),
            context: params.context.filter(|c| !c.trim().is_empty()),
            requirements: params.requirements,
        },
    })
}

/// Find the first balanced `{...}` block in `text` that parses as JSON.
///
/// Handles markdown fences and prose around the object; braces inside
/// string literals are ignored.
fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        let mut end = None;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }

        // An unclosed brace can still be followed by a real object.
        if let Some(end) = end {
            let candidate = &text[start..=end];
            if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                return Some(candidate);
            }
        }
        search_from = start + 1;
    }

    None
}
