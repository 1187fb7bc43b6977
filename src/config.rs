//! Loading agent configuration (assistant identity + per-task failure policy) from TOML.
//!
//! See `AgentConfig` for the expected schema:
//!
//! ```toml
//! [identity]
//! assistant_name = "ThinkyAI"
//! creator = "Lyriqon Innovations"
//!
//! [failure_policy]
//! explanation = true   # degrade: return a readable error text instead of failing
//! quiz = false         # propagate: the caller gets an explicit error
//! ```

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::TaskKind;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read { path: String, #[source] source: std::io::Error },
  #[error("failed to parse {path}: {source}")]
  Parse { path: String, #[source] source: toml::de::Error },
}

#[derive(Clone, Debug, Deserialize, Default, PartialEq)]
pub struct AgentConfig {
  #[serde(default)]
  pub identity: Identity,
  #[serde(default)]
  pub failure_policy: FailurePolicy,
}

/// Who the assistant says it is. The creator is only disclosed when explicitly asked.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Identity {
  pub assistant_name: String,
  pub creator: String,
}

impl Default for Identity {
  fn default() -> Self {
    Self {
      assistant_name: "ThinkyAI".into(),
      creator: "Lyriqon Innovations".into(),
    }
  }
}

/// Whether a failed generation degrades into a placeholder result (`true`) or surfaces
/// as an explicit error (`false`). Explanation, flashcards and reasoning degrade while
/// quiz and translation propagate; the split is a product decision, keep it configurable.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FailurePolicy {
  pub explanation: bool,
  pub quiz: bool,
  pub flashcards: bool,
  pub reasoning: bool,
  pub translation: bool,
}

impl Default for FailurePolicy {
  fn default() -> Self {
    Self { explanation: true, quiz: false, flashcards: true, reasoning: true, translation: false }
  }
}

impl FailurePolicy {
  pub fn degrade_on_failure(&self, kind: TaskKind) -> bool {
    match kind {
      TaskKind::Explanation => self.explanation,
      TaskKind::Quiz => self.quiz,
      TaskKind::Flashcards => self.flashcards,
      TaskKind::Reasoning => self.reasoning,
      TaskKind::Translation => self.translation,
    }
  }
}

pub fn parse_agent_config(path: &str, raw: &str) -> Result<AgentConfig, ConfigError> {
  toml::from_str::<AgentConfig>(raw).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
}

pub fn load_agent_config(path: &str) -> Result<AgentConfig, ConfigError> {
  let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_string(), source })?;
  parse_agent_config(path, &raw)
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns defaults.
pub fn load_agent_config_from_env() -> AgentConfig {
  let Ok(path) = std::env::var("AGENT_CONFIG_PATH") else {
    return AgentConfig::default();
  };
  match load_agent_config(&path) {
    Ok(cfg) => {
      info!(target: "learnai_backend", %path, "Loaded agent config (TOML)");
      cfg
    }
    Err(e) => {
      error!(target: "learnai_backend", %path, error = %e, "Failed to load agent config; using defaults");
      AgentConfig::default()
    }
  }
}
