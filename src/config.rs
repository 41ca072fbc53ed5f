//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Hard cap on the per-user conversation window.
pub const MAX_HISTORY: usize = 50;

/// Which backend persists work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Single JSON document rewritten on every mutation.
    JsonFile,
    /// Embedded libSQL database, one row per work item.
    LibSql,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" | "file" => Ok(Self::JsonFile),
            "libsql" | "sqlite" => Ok(Self::LibSql),
            other => Err(ConfigError::InvalidValue {
                key: "WORK_ROUTER_STORE_BACKEND".into(),
                message: format!("unknown backend '{other}' (expected json or libsql)"),
            }),
        }
    }
}

/// Settings for the classification / generation service.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// API key. `None` means heuristic-only classification.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            temperature: 0.1,
        }
    }
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Where work items are persisted.
    pub store_path: PathBuf,
    pub store_backend: StoreBackend,
    /// Simulated duration of each worker phase.
    pub phase_delay: Duration,
    /// Work-producing intents below this confidence get a clarification reply.
    pub min_confidence: f32,
    /// Per-user conversation window (at most `MAX_HISTORY`).
    pub history_limit: usize,
    pub llm: LlmSettings,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("./data/work-items.json"),
            store_backend: StoreBackend::JsonFile,
            phase_delay: Duration::from_millis(1500),
            min_confidence: 0.5,
            history_limit: MAX_HISTORY,
            llm: LlmSettings::default(),
        }
    }
}

impl RouterConfig {
    /// Build configuration from `WORK_ROUTER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let store_path = std::env::var("WORK_ROUTER_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);

        let store_backend = match std::env::var("WORK_ROUTER_STORE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.store_backend,
        };

        let phase_delay = std::env::var("WORK_ROUTER_PHASE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.phase_delay);

        let min_confidence = std::env::var("WORK_ROUTER_MIN_CONFIDENCE")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(defaults.min_confidence);

        let history_limit = std::env::var("WORK_ROUTER_HISTORY_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|v| v.clamp(1, MAX_HISTORY))
            .unwrap_or(defaults.history_limit);

        let llm = LlmSettings {
            api_key: std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            model: std::env::var("WORK_ROUTER_MODEL").unwrap_or(defaults.llm.model),
            max_tokens: std::env::var("WORK_ROUTER_LLM_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.llm.max_tokens),
            temperature: std::env::var("WORK_ROUTER_LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.llm.temperature),
        };

        Ok(Self {
            store_path,
            store_backend,
            phase_delay,
            min_confidence,
            history_limit,
            llm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = RouterConfig::default();
        assert_eq!(config.history_limit, MAX_HISTORY);
        assert_eq!(config.store_backend, StoreBackend::JsonFile);
        assert!(config.llm.api_key.is_none());
        assert!((0.0..=1.0).contains(&config.min_confidence));
    }

    #[test]
    fn store_backend_parses_aliases() {
        assert_eq!("json".parse::<StoreBackend>().unwrap(), StoreBackend::JsonFile);
        assert_eq!("LibSQL".parse::<StoreBackend>().unwrap(), StoreBackend::LibSql);
        assert_eq!("sqlite".parse::<StoreBackend>().unwrap(), StoreBackend::LibSql);
    }

    #[test]
    fn store_backend_rejects_unknown() {
        let err = "postgres".parse::<StoreBackend>().unwrap_err();
        assert!(err.to_string().contains("postgres"));
    }
}
