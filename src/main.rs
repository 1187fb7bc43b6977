//! LearnAI backend
//!
//! - Axum HTTP + WebSocket API for topic explanations, quizzes, flashcards,
//!   follow-up reasoning and translation
//! - OpenAI-compatible generation service (disabled without an API key)
//! - Client-local access counter and topic history, keyed by `x-client-id`
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables (a `.env` file is read first if present):
//!   PORT                : u16 (default 3000)
//!   OPENAI_API_KEY      : enables generation if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL   : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL : default "gpt-4o" (deep-think explanations)
//!   OPENAI_TIMEOUT_SECS : request timeout, default 60
//!   AGENT_CONFIG_PATH   : TOML with [identity] and [failure_policy]
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod access;
mod auth;
mod config;
mod domain;
mod gateway;
mod history;
mod logic;
mod openai;
mod protocol;
mod routes;
mod schema;
mod session;
mod state;
mod store;
mod telemetry;
mod templates;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let dotenv = dotenvy::dotenv();
  telemetry::init_tracing();
  if let Ok(path) = dotenv {
    info!(target: "learnai_backend", path = %path.display(), "Loaded .env");
  }

  let state = Arc::new(AppState::new());
  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "learnai_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "learnai_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "learnai_backend", "Shutdown signal received");
}
