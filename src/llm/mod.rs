//! Classification / generation service boundary.
//!
//! The router only needs plain text completions: the classifier asks for a
//! JSON block and validates it, the voice formatter rewrites replies.

pub mod anthropic;
pub mod provider;
pub mod voice;

pub use anthropic::AnthropicProvider;
pub use provider::*;
pub use voice::VoiceFormatter;

use std::sync::Arc;

use crate::config::LlmSettings;

/// Create a provider from settings. Returns `None` when no API key is configured.
pub fn create_provider(settings: &LlmSettings) -> Option<Arc<dyn LlmProvider>> {
    let api_key = settings.api_key.clone()?;
    tracing::info!("Using Anthropic (model: {})", settings.model);
    Some(Arc::new(AnthropicProvider::new(api_key, &settings.model)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_key_means_no_provider() {
        assert!(create_provider(&LlmSettings::default()).is_none());
    }

    #[test]
    fn key_builds_provider() {
        let settings = LlmSettings {
            api_key: Some(secrecy::SecretString::from("test-key")),
            model: "claude-3-5-sonnet-latest".to_string(),
            ..LlmSettings::default()
        };
        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.model_name(), "claude-3-5-sonnet-latest");
    }
}
