//! Orchestration layer: one operation per task kind, shared by HTTP and WebSocket handlers.
//!
//! Each operation validates its input before any call to the generation service, runs
//! the matching template through the gateway and resolves every outcome into a plain
//! `Result<_, FlowError>` carrying a short user-facing message. Operations share no
//! mutable state; chaining (explanation, then flashcards) is left to the caller, who
//! passes earlier results back in as arguments.

use tracing::{debug, error, info, instrument, warn};

use crate::domain::{Explanation, Flashcard, Flashcards, ImageData, Question, Quiz, Reasoning, Topic, Translation};
use crate::gateway::Gateway;
use crate::templates::{
  ExplanationInput, ExplanationMode, FlashcardsInput, QuizInput, ReasoningInput, Templates, TranslationInput,
  FLASHCARD_COUNT,
};

/// Minimum trimmed length of a follow-up question.
pub const MIN_QUESTION_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
  /// Bad caller input, detected before any external call.
  #[error("{0}")]
  Validation(String),
  /// The service answered but produced nothing usable.
  #[error("{0}")]
  EmptyResult(String),
  /// The service call failed and the task does not degrade.
  #[error("{0}")]
  Generation(String),
}

impl FlowError {
  pub fn kind(&self) -> &'static str {
    match self {
      FlowError::Validation(_) => "validation",
      FlowError::EmptyResult(_) => "empty_result",
      FlowError::Generation(_) => "generation",
    }
  }
}

fn invalid(msg: &str) -> FlowError {
  FlowError::Validation(msg.to_string())
}

#[derive(Clone)]
pub struct Orchestrator {
  gateway: Gateway,
  templates: Templates,
}

impl Orchestrator {
  pub fn new(gateway: Gateway, templates: Templates) -> Self {
    Self { gateway, templates }
  }

  #[instrument(level = "info", skip_all, fields(topic_len = topic.len(), has_image = image.is_some(), %deep_think))]
  pub async fn get_explanation(&self, topic: &str, image: Option<&str>, deep_think: bool) -> Result<String, FlowError> {
    let topic = Topic::parse(topic).map_err(|_| invalid("Please enter a valid topic (at least 3 characters)."))?;
    let image = image
      .filter(|s| !s.trim().is_empty())
      .map(ImageData::parse)
      .transpose()
      .map_err(|e| FlowError::Validation(format!("Invalid image: {e}.")))?;
    if let Some(img) = &image {
      debug!(target: "generation", mime = %img.mime(), "Explanation includes an image");
    }

    let prompt = self.templates.explanation(&ExplanationInput {
      topic: &topic,
      image: image.as_ref(),
      mode: ExplanationMode::from_flag(deep_think),
    });

    match self.gateway.generate::<Explanation>(&prompt).await {
      Ok(out) if out.explanation.trim().is_empty() => {
        warn!(target: "generation", %topic, "Empty explanation");
        Err(FlowError::EmptyResult("Failed to generate an explanation for this topic.".into()))
      }
      Ok(out) => {
        info!(target: "generation", %topic, len = out.explanation.len(), "Explanation ready");
        Ok(out.explanation)
      }
      Err(e) => {
        error!(target: "generation", %topic, error = %e, "Explanation generation failed");
        Err(FlowError::Generation("An unexpected error occurred while generating content. Please try again later.".into()))
      }
    }
  }

  #[instrument(level = "info", skip_all, fields(topic_len = topic.len(), %count))]
  pub async fn get_quiz(&self, topic: &str, count: i64) -> Result<Vec<Question>, FlowError> {
    let topic = Topic::parse(topic).map_err(|_| invalid("Invalid topic."))?;
    let count = u32::try_from(count)
      .ok()
      .filter(|c| *c >= 1)
      .ok_or_else(|| invalid("Number of questions must be at least 1."))?;

    let prompt = self.templates.quiz(&QuizInput { topic: &topic, count });
    match self.gateway.generate::<Quiz>(&prompt).await {
      Ok(Quiz { questions }) if questions.is_empty() => {
        warn!(target: "generation", %topic, "Quiz came back empty");
        Err(FlowError::EmptyResult("Failed to generate quiz. Please try a different topic.".into()))
      }
      Ok(Quiz { mut questions }) => {
        if questions.len() != count as usize {
          warn!(target: "generation", %topic, requested = count, got = questions.len(), "Quiz size differs from request");
        }
        questions.truncate(count as usize);
        Ok(questions)
      }
      Err(e) => {
        error!(target: "generation", %topic, error = %e, "Quiz generation failed");
        Err(FlowError::Generation("An unexpected error occurred while generating quiz. Please try again later.".into()))
      }
    }
  }

  #[instrument(level = "info", skip_all, fields(topic_len = topic.len(), explanation_len = explanation.len()))]
  pub async fn get_flashcards(&self, topic: &str, explanation: &str) -> Result<Vec<Flashcard>, FlowError> {
    let topic = Topic::parse(topic).map_err(|_| invalid("Invalid topic."))?;
    if explanation.trim().is_empty() {
      return Err(invalid("Explanation is required to generate flashcards."));
    }

    let prompt = self.templates.flashcards(&FlashcardsInput { topic: &topic, explanation });
    match self.gateway.generate::<Flashcards>(&prompt).await {
      Ok(Flashcards { flashcards }) if flashcards.is_empty() => {
        warn!(target: "generation", %topic, "No flashcards produced");
        Err(FlowError::EmptyResult("Failed to generate flashcards. Please try a different topic.".into()))
      }
      Ok(Flashcards { mut flashcards }) => {
        flashcards.truncate(FLASHCARD_COUNT);
        Ok(flashcards)
      }
      Err(e) => {
        error!(target: "generation", %topic, error = %e, "Flashcard generation failed");
        Err(FlowError::Generation("An unexpected error occurred while generating flashcards. Please try again later.".into()))
      }
    }
  }

  #[instrument(level = "info", skip_all, fields(context_len = context.len(), question_len = question.len()))]
  pub async fn get_reasoning(&self, topic: &str, context: &str, question: &str) -> Result<String, FlowError> {
    let topic = Topic::parse(topic).map_err(|_| invalid("A valid topic is required to answer follow-up questions."))?;
    if context.trim().is_empty() {
      return Err(invalid("Conversation context is required to answer follow-up questions."));
    }
    let question = question.trim();
    if question.chars().count() < MIN_QUESTION_CHARS {
      return Err(invalid("Please enter a question (at least 2 characters)."));
    }

    let prompt = self.templates.reasoning(&ReasoningInput { topic: topic.as_str(), context, question });
    match self.gateway.generate::<Reasoning>(&prompt).await {
      Ok(out) if out.answer.trim().is_empty() => {
        Err(FlowError::EmptyResult("Failed to answer that question. Please try rephrasing it.".into()))
      }
      Ok(out) => Ok(out.answer),
      Err(e) => {
        error!(target: "generation", %topic, error = %e, "Reasoning failed");
        Err(FlowError::Generation("An unexpected error occurred while answering. Please try again later.".into()))
      }
    }
  }

  #[instrument(level = "info", skip_all, fields(text_len = text.len(), %language))]
  pub async fn get_translation(&self, text: &str, language: &str) -> Result<String, FlowError> {
    let language = language.trim();
    if text.trim().is_empty() || language.is_empty() {
      return Err(invalid("Text and target language are required for translation."));
    }

    let prompt = self.templates.translation(&TranslationInput { text, language });
    match self.gateway.generate::<Translation>(&prompt).await {
      Ok(out) if out.translation.trim().is_empty() => {
        Err(FlowError::EmptyResult("Failed to translate the text. Please try again.".into()))
      }
      Ok(out) => Ok(out.translation),
      Err(e) => {
        error!(target: "generation", %language, error = %e, "Translation failed");
        Err(FlowError::Generation("Translation failed. Please try again later.".into()))
      }
    }
  }
}
