//! Intent router — end-to-end handling of one user message.
//!
//! Flow:
//! 1. Snapshot the user's conversation context, then record the message
//! 2. Classify (service path or heuristic fallback)
//! 3. `manage` → lifecycle commands; `build`/`modify`/`analyze` → orchestrator;
//!    anything else → a conversational reply
//! 4. Record the assistant reply in the thread

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::RouterConfig;
use crate::conversation::{ConversationManager, Role};
use crate::intent::{Intent, IntentCategory, IntentClassifier, IntentSource};
use crate::llm::{LlmProvider, VoiceFormatter};
use crate::work::{LifecycleCommandHandler, WorkOrchestrator};

/// How a message was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteKind {
    /// A lifecycle command ran against existing work.
    Command,
    /// A work item was created and executed.
    Work { item_id: String, success: bool },
    /// The request was too unclear to act on.
    Clarification,
    /// A question or small talk.
    Conversation,
}

/// Result of `IntentRouter::handle`.
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub reply: String,
    pub kind: RouteKind,
    pub intent: Intent,
    pub source: IntentSource,
}

pub struct IntentRouter {
    conversations: ConversationManager,
    classifier: IntentClassifier,
    orchestrator: Arc<WorkOrchestrator>,
    commands: LifecycleCommandHandler,
    voice: VoiceFormatter,
    min_confidence: f32,
}

impl IntentRouter {
    pub fn new(
        config: &RouterConfig,
        llm: Option<Arc<dyn LlmProvider>>,
        orchestrator: Arc<WorkOrchestrator>,
    ) -> Self {
        let classifier = IntentClassifier::new(llm.clone())
            .with_known_workers(orchestrator.registry().names())
            .with_sampling(config.llm.max_tokens, config.llm.temperature);
        let commands = LifecycleCommandHandler::new(Arc::clone(orchestrator.store()));
        Self {
            conversations: ConversationManager::new(config.history_limit),
            classifier,
            orchestrator,
            commands,
            voice: VoiceFormatter::new(llm),
            min_confidence: config.min_confidence,
        }
    }

    pub fn orchestrator(&self) -> &Arc<WorkOrchestrator> {
        &self.orchestrator
    }

    pub fn conversations(&self) -> &ConversationManager {
        &self.conversations
    }

    /// Handle one message from `user`.
    pub async fn handle(&self, user: &str, text: &str) -> RouteOutcome {
        let context = self.conversations.context(user).await;
        self.conversations
            .add_message(user, Role::User, text, Utc::now())
            .await;

        let classification = self.classifier.classify(text, &context).await;
        let intent = classification.intent;
        info!(
            user,
            category = %intent.category,
            subcategory = %intent.subcategory,
            confidence = intent.confidence,
            source = ?classification.source,
            "Message classified"
        );

        let (reply, kind) = match intent.category {
            IntentCategory::Manage => {
                let response = self.commands.handle(&intent, user, text).await;
                (response.text(), RouteKind::Command)
            }
            category if category.produces_work() => {
                if intent.confidence < self.min_confidence {
                    (clarification(&intent), RouteKind::Clarification)
                } else {
                    self.run_work(&intent, user, text).await
                }
            }
            _ if intent.subcategory == "conversation-unclear" => {
                (clarification(&intent), RouteKind::Clarification)
            }
            _ => {
                let reply = self.voice.format(&conversation_reply(&intent), "friendly").await;
                (reply, RouteKind::Conversation)
            }
        };

        self.conversations
            .add_message(user, Role::Assistant, reply.clone(), Utc::now())
            .await;

        RouteOutcome {
            reply,
            kind,
            intent,
            source: classification.source,
        }
    }

    async fn run_work(&self, intent: &Intent, user: &str, text: &str) -> (String, RouteKind) {
        let item = self.orchestrator.create_from_intent(intent, user, text).await;
        let report = self.orchestrator.execute_work(&item.id).await;

        let reply = if report.success {
            self.voice.format(&report.message, "upbeat").await
        } else {
            warn!(item_id = %item.id, message = %report.message, "Work did not complete");
            let text = format!(
                "I couldn't finish '{}': {}\nTry a narrower request, or say 'status' to check on it.",
                item.title, report.message
            );
            self.voice.format(&text, "apologetic").await
        };

        (
            reply,
            RouteKind::Work {
                item_id: item.id,
                success: report.success,
            },
        )
    }
}

fn clarification(intent: &Intent) -> String {
    let about = intent.parameters.description.trim();
    if about.is_empty() {
        "I'm not sure what you'd like me to do. Could you describe what to build, change or analyze?"
            .to_string()
    } else {
        format!(
            "I'm not sure what you'd like me to do with \"{about}\". Could you say what to build, change or analyze, or ask about existing work?"
        )
    }
}

fn conversation_reply(intent: &Intent) -> String {
    match intent.category {
        IntentCategory::Question => format!(
            "You asked: \"{}\". I build, change and analyze things on request, and can report on work in progress. Say 'status' to see what's running.",
            intent.parameters.description.trim()
        ),
        _ => "Happy to help. Tell me what you'd like built, changed or analyzed.".to_string(),
    }
}
