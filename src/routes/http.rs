//! HTTP endpoint handlers. These are thin wrappers that forward to the orchestrator or
//! to the client-scoped access/history helpers. Each handler is instrumented with
//! basic parameter info.

use std::sync::Arc;
use axum::{
  extract::State,
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::auth::{before_user_created, check_signup_email, interpret_provider_error};
use crate::logic::FlowError;
use crate::protocol::*;
use crate::session::Conversation;
use crate::state::AppState;

use super::client_id;

/// FlowError as an HTTP response: caller mistakes are 400, upstream trouble is 502.
pub struct ApiError(FlowError);

impl From<FlowError> for ApiError {
  fn from(e: FlowError) -> Self {
    ApiError(e)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match self.0 {
      FlowError::Validation(_) => StatusCode::BAD_REQUEST,
      FlowError::EmptyResult(_) | FlowError::Generation(_) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
      warn!(target: "learnai_backend", kind = self.0.kind(), error = %self.0, "Request failed upstream");
    }
    (status, Json(ErrorOut { error: self.0.to_string(), kind: self.0.kind() })).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, body), fields(topic_len = body.topic.len(), has_image = body.image_data_uri.is_some(), deep_think = body.deep_think))]
pub async fn http_post_explanation(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ExplanationIn>,
) -> Result<Json<ExplanationOut>, ApiError> {
  let explanation = state
    .orchestrator
    .get_explanation(&body.topic, body.image_data_uri.as_deref(), body.deep_think)
    .await?;
  Ok(Json(ExplanationOut { explanation }))
}

#[instrument(level = "info", skip(state, body), fields(topic_len = body.topic.len(), count = body.count))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  Json(body): Json<QuizIn>,
) -> Result<Json<QuizOut>, ApiError> {
  let questions = state.orchestrator.get_quiz(&body.topic, body.count).await?;
  info!(target: "learnai_backend", n = questions.len(), "HTTP quiz served");
  Ok(Json(QuizOut { questions }))
}

#[instrument(level = "info", skip(state, body), fields(topic_len = body.topic.len(), explanation_len = body.explanation.len()))]
pub async fn http_post_flashcards(
  State(state): State<Arc<AppState>>,
  Json(body): Json<FlashcardsIn>,
) -> Result<Json<FlashcardsOut>, ApiError> {
  let flashcards = state.orchestrator.get_flashcards(&body.topic, &body.explanation).await?;
  Ok(Json(FlashcardsOut { flashcards }))
}

#[instrument(level = "info", skip(state, body), fields(topic_len = body.topic.len(), question_len = body.question.len(), history = body.messages.len()))]
pub async fn http_post_reasoning(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ReasoningIn>,
) -> Result<Json<ReasoningOut>, ApiError> {
  let context = match body.context {
    Some(c) => c,
    None => Conversation::from(body.messages).context_for(&body.explanation),
  };
  let answer = state.orchestrator.get_reasoning(&body.topic, &context, &body.question).await?;
  Ok(Json(ReasoningOut { answer }))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len(), language = %body.language))]
pub async fn http_post_translate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TranslateIn>,
) -> Result<Json<TranslateOut>, ApiError> {
  let translation = state.orchestrator.get_translation(&body.text, &body.language).await?;
  Ok(Json(TranslateOut { translation }))
}

//
// Access gate
//

#[instrument(level = "info", skip_all)]
pub async fn http_get_access(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
  Json(state.access(&client_id(&headers)).status().await)
}

#[instrument(level = "info", skip_all)]
pub async fn http_post_access_increment(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
  let gate = state.access(&client_id(&headers));
  gate.increment().await;
  Json(gate.status().await)
}

#[instrument(level = "info", skip_all)]
pub async fn http_post_access_reset(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
  let gate = state.access(&client_id(&headers));
  gate.reset().await;
  Json(gate.status().await)
}

//
// Topic history
//

#[instrument(level = "info", skip_all)]
pub async fn http_get_history(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
  let topics = state.history(&client_id(&headers)).list().await;
  Json(HistoryOut { topics })
}

#[instrument(level = "info", skip_all, fields(topic_len = body.topic.len()))]
pub async fn http_post_history(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<HistoryIn>,
) -> impl IntoResponse {
  let topics = state.history(&client_id(&headers)).add(&body.topic).await;
  Json(HistoryOut { topics })
}

#[instrument(level = "info", skip_all)]
pub async fn http_delete_history(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
  state.history(&client_id(&headers)).clear().await;
  Json(HistoryOut { topics: Vec::new() })
}

#[instrument(level = "info", skip_all, fields(topic_len = body.topic.len()))]
pub async fn http_delete_history_item(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<HistoryIn>,
) -> impl IntoResponse {
  let topics = state.history(&client_id(&headers)).remove(&body.topic).await;
  Json(HistoryOut { topics })
}

//
// Identity boundary
//

#[instrument(level = "info", skip_all)]
pub async fn http_post_check_email(Json(body): Json<EmailIn>) -> impl IntoResponse {
  match check_signup_email(body.email.as_deref().unwrap_or_default()) {
    Ok(()) => Json(EmailCheckOut { allowed: true, message: None }),
    Err(e) => Json(EmailCheckOut { allowed: false, message: Some(e.to_string()) }),
  }
}

#[instrument(level = "info", skip_all)]
pub async fn http_post_before_create(Json(body): Json<EmailIn>) -> Response {
  match before_user_created(body.email.as_deref()) {
    Ok(()) => Json(EmailCheckOut { allowed: true, message: None }).into_response(),
    Err(e) => (StatusCode::BAD_REQUEST, Json(e)).into_response(),
  }
}

#[instrument(level = "info", skip_all, fields(code = %body.code))]
pub async fn http_post_interpret_error(Json(body): Json<ProviderErrorIn>) -> impl IntoResponse {
  let failure = interpret_provider_error(&body.code, &body.message);
  info!(target: "auth", mapped = %failure.message(), "Provider error interpreted");
  Json(failure)
}
