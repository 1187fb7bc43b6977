//! Domain models: topics, task kinds, attached images and the typed outputs of each task.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Minimum trimmed length of a topic.
pub const MIN_TOPIC_CHARS: usize = 3;

/// What the caller asked the generation service to do.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
  Explanation,
  Quiz,
  Flashcards,
  Reasoning,
  Translation,
}

impl TaskKind {
  pub fn as_str(self) -> &'static str {
    match self {
      TaskKind::Explanation => "explanation",
      TaskKind::Quiz => "quiz",
      TaskKind::Flashcards => "flashcards",
      TaskKind::Reasoning => "reasoning",
      TaskKind::Translation => "translation",
    }
  }
}

impl std::fmt::Display for TaskKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
  #[error("topic must be at least {MIN_TOPIC_CHARS} characters after trimming")]
  TooShort,
}

/// A submitted topic. Only constructed through [`Topic::parse`], so it always holds
/// at least three non-whitespace-padded characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
  pub fn parse(raw: &str) -> Result<Self, TopicError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() < MIN_TOPIC_CHARS {
      return Err(TopicError::TooShort);
    }
    Ok(Self(trimmed.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for Topic {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
  #[error("image must be a data URI of the form data:<mimetype>;base64,<data>")]
  NotDataUri,
  #[error("unsupported image MIME type '{0}'")]
  UnsupportedMime(String),
  #[error("image payload is not valid base64")]
  InvalidBase64,
}

/// An image attached to an explanation request, kept as the original data URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageData {
  mime: String,
  data_uri: String,
}

impl ImageData {
  /// Parse `data:<mime>;base64,<payload>`. The payload is decoded once to reject garbage early.
  pub fn parse(data_uri: &str) -> Result<Self, ImageError> {
    let rest = data_uri.trim().strip_prefix("data:").ok_or(ImageError::NotDataUri)?;
    let (meta, payload) = rest.split_once(',').ok_or(ImageError::NotDataUri)?;
    let mime = meta.strip_suffix(";base64").ok_or(ImageError::NotDataUri)?;
    if !mime.starts_with("image/") || mime.len() <= "image/".len() {
      return Err(ImageError::UnsupportedMime(mime.to_string()));
    }
    if payload.is_empty() || STANDARD.decode(payload).is_err() {
      return Err(ImageError::InvalidBase64);
    }
    Ok(Self { mime: mime.to_string(), data_uri: data_uri.trim().to_string() })
  }

  pub fn mime(&self) -> &str {
    &self.mime
  }

  pub fn data_uri(&self) -> &str {
    &self.data_uri
  }
}

// --- Task outputs, as returned by the generation service ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Explanation {
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub question: String,
  pub options: Vec<String>,
  pub correct_answer: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
  pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Flashcard {
  pub front: String,
  pub back: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Flashcards {
  pub flashcards: Vec<Flashcard>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Reasoning {
  pub answer: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Translation {
  pub translation: String,
}
