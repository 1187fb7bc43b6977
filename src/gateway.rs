//! Generation gateway: the single choke point between typed task requests and the
//! external generation service.
//!
//! The service is treated as returning an untyped text blob. The gateway parses it as
//! JSON, checks it against the prompt's declared schema, deserializes it into the task's
//! output type and runs the task's semantic checks. Failures are typed; whether they
//! degrade into a placeholder result or propagate is decided per task by [`FailurePolicy`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::config::FailurePolicy;
use crate::domain::{Explanation, Flashcards, Quiz, Reasoning, TaskKind, Translation};
use crate::schema::{OutputSchema, SchemaViolation};
use crate::templates::Prompt;
use crate::util::trunc_for_log;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
  #[error("generation service unavailable: {0}")]
  Unavailable(String),
  #[error("request to generation service failed: {0}")]
  Transport(String),
  #[error("generation service HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("generation service returned no content")]
  EmptyResponse,
}

/// The external text/structured-data generation service.
#[async_trait]
pub trait GenerationService: Send + Sync {
  /// Send the prompt and return the raw content produced by the model.
  async fn generate(&self, prompt: &Prompt) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
  #[error(transparent)]
  Service(#[from] ServiceError),
  #[error("malformed output: {0}")]
  Malformed(String),
  #[error("output does not match schema: {0}")]
  Schema(#[from] SchemaViolation),
}

/// Typed result of one task kind.
pub trait TaskOutput: DeserializeOwned + Send + Sized {
  const KIND: TaskKind;

  /// Semantic checks beyond the schema; may normalize fields in place.
  fn validate(&mut self) -> Result<(), SchemaViolation> {
    Ok(())
  }

  /// Placeholder returned instead of an error when the task degrades on failure.
  fn degraded(_err: &GenerationError) -> Option<Self> {
    None
  }
}

impl TaskOutput for Explanation {
  const KIND: TaskKind = TaskKind::Explanation;

  fn degraded(err: &GenerationError) -> Option<Self> {
    Some(Explanation {
      explanation: format!("Sorry, I encountered an error trying to generate an explanation. The error was: {err}"),
    })
  }
}

impl TaskOutput for Quiz {
  const KIND: TaskKind = TaskKind::Quiz;

  fn validate(&mut self) -> Result<(), SchemaViolation> {
    for (i, q) in self.questions.iter_mut().enumerate() {
      let wanted = q.correct_answer.trim();
      match q.options.iter().find(|o| o.trim() == wanted) {
        Some(option) => q.correct_answer = option.clone(),
        None => return Err(SchemaViolation::AnswerNotInOptions { index: i + 1, answer: q.correct_answer.clone() }),
      }
    }
    Ok(())
  }
}

impl TaskOutput for Flashcards {
  const KIND: TaskKind = TaskKind::Flashcards;

  fn degraded(_err: &GenerationError) -> Option<Self> {
    Some(Flashcards { flashcards: Vec::new() })
  }
}

impl TaskOutput for Reasoning {
  const KIND: TaskKind = TaskKind::Reasoning;

  fn degraded(err: &GenerationError) -> Option<Self> {
    Some(Reasoning { answer: format!("Sorry, I encountered an error trying to answer that. The error was: {err}") })
  }
}

impl TaskOutput for Translation {
  const KIND: TaskKind = TaskKind::Translation;
}

/// Strip a surrounding ```json fence some models add even in JSON mode.
fn strip_code_fence(raw: &str) -> &str {
  let s = raw.trim();
  let Some(inner) = s.strip_prefix("```") else { return s };
  let inner = inner.strip_suffix("```").unwrap_or(inner);
  match inner.split_once('\n') {
    Some((lang, body)) if !lang.trim_start().starts_with('{') => body.trim(),
    _ => inner.trim(),
  }
}

/// Parse + validate raw service output into a typed task result.
pub fn parse_output<T: TaskOutput>(raw: &str, schema: &OutputSchema) -> Result<T, GenerationError> {
  let body = strip_code_fence(raw);
  if body.is_empty() {
    return Err(GenerationError::Malformed("empty output".into()));
  }
  let value: serde_json::Value =
    serde_json::from_str(body).map_err(|e| GenerationError::Malformed(format!("JSON parse error: {e}")))?;
  schema.validate(&value)?;
  let mut out: T = serde_json::from_value(value).map_err(|e| GenerationError::Malformed(e.to_string()))?;
  out.validate()?;
  Ok(out)
}

#[derive(Clone)]
pub struct Gateway {
  service: Arc<dyn GenerationService>,
  policy: FailurePolicy,
}

impl Gateway {
  pub fn new(service: Arc<dyn GenerationService>, policy: FailurePolicy) -> Self {
    Self { service, policy }
  }

  /// Call the service and validate its output. Never degrades.
  #[instrument(level = "info", skip(self, prompt), fields(task = %prompt.task, tier = ?prompt.tier, has_image = prompt.image.is_some()))]
  pub async fn invoke<T: TaskOutput>(&self, prompt: &Prompt) -> Result<T, GenerationError> {
    debug_assert_eq!(prompt.task, T::KIND, "prompt built for a different task");
    let start = Instant::now();
    let raw = self.service.generate(prompt).await?;
    let elapsed = start.elapsed();
    debug!(target: "generation", ?elapsed, raw_len = raw.len(), preview = %trunc_for_log(&raw, 80), "Service replied");

    let out = parse_output::<T>(&raw, &prompt.schema);
    match &out {
      Ok(_) => info!(target: "generation", task = %T::KIND, ?elapsed, "Generation validated"),
      Err(e) => warn!(target: "generation", task = %T::KIND, ?elapsed, error = %e, "Generation output rejected"),
    }
    out
  }

  /// Like [`Gateway::invoke`], but applies the failure policy of the task kind.
  pub async fn generate<T: TaskOutput>(&self, prompt: &Prompt) -> Result<T, GenerationError> {
    match self.invoke::<T>(prompt).await {
      Ok(out) => Ok(out),
      Err(e) if self.policy.degrade_on_failure(T::KIND) => match T::degraded(&e) {
        Some(placeholder) => {
          warn!(target: "generation", task = %T::KIND, error = %e, "Generation failed; returning degraded result");
          Ok(placeholder)
        }
        None => Err(e),
      },
      Err(e) => Err(e),
    }
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  use super::*;

  /// In-memory service that replays scripted replies and records every prompt.
  #[derive(Default)]
  pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<String, ServiceError>>>,
    prompts: Mutex<Vec<Prompt>>,
    calls: AtomicUsize,
  }

  impl ScriptedService {
    pub fn new() -> Self {
      Self::default()
    }

    pub fn reply(self, raw: impl Into<String>) -> Self {
      self.replies.lock().unwrap().push_back(Ok(raw.into()));
      self
    }

    pub fn reply_json(self, value: serde_json::Value) -> Self {
      self.reply(value.to_string())
    }

    pub fn fail(self, err: ServiceError) -> Self {
      self.replies.lock().unwrap().push_back(Err(err));
      self
    }

    pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
      self.prompts.lock().unwrap().last().cloned()
    }
  }

  #[async_trait]
  impl GenerationService for ScriptedService {
    async fn generate(&self, prompt: &Prompt) -> Result<String, ServiceError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.prompts.lock().unwrap().push(prompt.clone());
      self
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(ServiceError::Unavailable("no scripted reply left".into())))
    }
  }
}
