//! Reply formatting through the generation service.

use std::sync::Arc;

use tracing::debug;

use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};

const VOICE_MAX_TOKENS: u32 = 400;
const VOICE_TEMPERATURE: f32 = 0.6;

const VOICE_SYSTEM_PROMPT: &str = "You rewrite status messages from a software build assistant \
so they read naturally in chat. Keep every fact, id, number and URL exactly as given. \
Do not add new information. Reply with the rewritten message only.";

/// Rewrites outgoing replies in the assistant's voice.
///
/// Without a provider, or when the call fails, text passes through unchanged.
#[derive(Clone)]
pub struct VoiceFormatter {
    llm: Option<Arc<dyn LlmProvider>>,
}

impl VoiceFormatter {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { llm }
    }

    /// Formatter that never calls out.
    pub fn passthrough() -> Self {
        Self { llm: None }
    }

    /// Rewrite `text`, steering tone with `hint` (e.g. "apologetic", "upbeat").
    pub async fn format(&self, text: &str, hint: &str) -> String {
        let Some(llm) = &self.llm else {
            return text.to_string();
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(VOICE_SYSTEM_PROMPT),
            ChatMessage::user(format!("Tone: {hint}\n\nMessage:\n{text}")),
        ])
        .with_max_tokens(VOICE_MAX_TOKENS)
        .with_temperature(VOICE_TEMPERATURE);

        match llm.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => response.content.trim().to_string(),
            Ok(_) => text.to_string(),
            Err(e) => {
                debug!(error = %e, "Voice formatting failed, sending original text");
                text.to_string()
            }
        }
    }
}
