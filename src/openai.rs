//! Minimal OpenAI-compatible client implementing [`GenerationService`].
//!
//! We only call chat.completions and always ask for a JSON object shaped by the prompt's
//! output schema (`response_format: json_schema`). Attached images are sent as
//! `image_url` content parts carrying the original data URI.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key or prompt bodies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::gateway::{GenerationService, ServiceError};
use crate::templates::{ModelTier, Prompt};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());
    let timeout = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), fast_model, strong_model })
  }

  pub fn model_for(&self, tier: ModelTier) -> &str {
    match tier {
      ModelTier::Fast => &self.fast_model,
      ModelTier::Strong => &self.strong_model,
    }
  }
}

/// Build the chat.completions body for a prompt.
fn build_request(model: &str, prompt: &Prompt) -> ChatCompletionRequest {
  let user = match &prompt.image {
    None => MessageContent::Text(prompt.user.clone()),
    Some(img) => MessageContent::Parts(vec![
      ContentPart::Text { text: prompt.user.clone() },
      ContentPart::ImageUrl { image_url: ImageUrl { url: img.data_uri().to_string() } },
    ]),
  };
  ChatCompletionRequest {
    model: model.to_string(),
    messages: vec![
      ChatMessageReq { role: "system".into(), content: MessageContent::Text(prompt.system.clone()) },
      ChatMessageReq { role: "user".into(), content: user },
    ],
    temperature: prompt.temperature,
    response_format: ResponseFormat {
      r#type: "json_schema".into(),
      json_schema: JsonSchemaFormat {
        name: prompt.schema.name.to_string(),
        schema: prompt.schema.to_json_schema(),
        strict: false,
      },
    },
  }
}

#[async_trait]
impl GenerationService for OpenAI {
  #[instrument(level = "info", skip(self, prompt), fields(task = %prompt.task, model = %self.model_for(prompt.tier)))]
  async fn generate(&self, prompt: &Prompt) -> Result<String, ServiceError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = build_request(self.model_for(prompt.tier), prompt);

    let res = self.client.post(&url)
      .header(USER_AGENT, "learnai-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| ServiceError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(ServiceError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| ServiceError::Transport(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .filter(|t| !t.trim().is_empty())
      .ok_or(ServiceError::EmptyResponse)
  }
}

/// Stand-in used when no API key is configured: every call fails with `Unavailable`,
/// which the gateway's failure policy then degrades or propagates.
pub struct Disabled;

#[async_trait]
impl GenerationService for Disabled {
  async fn generate(&self, _prompt: &Prompt) -> Result<String, ServiceError> {
    Err(ServiceError::Unavailable("OPENAI_API_KEY is not set".into()))
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  response_format: ResponseFormat,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: MessageContent }
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
  Text(String),
  Parts(Vec<ContentPart>),
}
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
  Text { text: String },
  ImageUrl { image_url: ImageUrl },
}
#[derive(Serialize)]
struct ImageUrl { url: String }
#[derive(Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")] r#type: String,
  json_schema: JsonSchemaFormat,
}
#[derive(Serialize)]
struct JsonSchemaFormat { name: String, schema: serde_json::Value, strict: bool }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::config::Identity;
  use crate::domain::{ImageData, Topic};
  use crate::templates::{ExplanationInput, ExplanationMode, Templates};

  fn prompt(image: Option<&ImageData>) -> Prompt {
    let topic = Topic::parse("Volcanoes").unwrap();
    Templates::new(Identity::default()).explanation(&ExplanationInput { topic: &topic, image, mode: ExplanationMode::Standard })
  }

  #[test]
  fn text_only_request_shape() {
    let body = serde_json::to_value(build_request("gpt-4o-mini", &prompt(None))).unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "Topic: Volcanoes");
    assert_eq!(body["response_format"]["type"], "json_schema");
    assert_eq!(body["response_format"]["json_schema"]["name"], "explanation");
    assert_eq!(body["response_format"]["json_schema"]["schema"]["required"], json!(["explanation"]));
  }

  #[test]
  fn image_is_sent_as_content_part() {
    let img = ImageData::parse("data:image/png;base64,iVBORw0KGgo=").unwrap();
    let body = serde_json::to_value(build_request("gpt-4o", &prompt(Some(&img)))).unwrap();
    let parts = &body["messages"][1]["content"];
    assert_eq!(parts[0]["type"], "text");
    assert_eq!(parts[1]["type"], "image_url");
    assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,iVBORw0KGgo=");
  }

  #[test]
  fn extracts_provider_error_message() {
    let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Invalid API key"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  #[tokio::test]
  async fn disabled_service_reports_unavailable() {
    let err = Disabled.generate(&prompt(None)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));
  }
}
