//! WebSocket upgrade + message loop.
//!
//! The socket is split: a writer task drains an mpsc channel into the sink while the
//! reader dispatches client messages. Generation work runs in spawned tasks so a slow
//! explanation never blocks a quiz or a translation. Every session-bound reply goes
//! through [`Outbox::send_for`], which drops it if a newer `submit_topic` superseded
//! the session it was produced for.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::{Conversation, Role, SessionTicket, SessionTracker};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "learnai_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Per-connection view of the current topic.
#[derive(Default)]
struct Current {
  ticket: Option<SessionTicket>,
  explanation: String,
  conversation: Conversation,
}

#[derive(Default)]
struct WsSession {
  tracker: SessionTracker,
  current: Mutex<Current>,
}

#[derive(Clone)]
struct Outbox {
  tx: mpsc::UnboundedSender<ServerWsMessage>,
  session: Arc<WsSession>,
}

impl Outbox {
  fn send(&self, msg: ServerWsMessage) {
    // Receiver only goes away once the connection is closing.
    let _ = self.tx.send(msg);
  }

  /// Deliver only while `ticket` is still the current session.
  fn send_for(&self, ticket: &SessionTicket, msg: ServerWsMessage) -> bool {
    if !self.session.tracker.is_current(ticket) {
      debug!(target: "learnai_backend", session = ticket.id, "Dropping result for superseded session");
      return false;
    }
    self.send(msg);
    true
  }
}

#[instrument(level = "info", skip(socket, state), fields(conn = %Uuid::new_v4()))]
async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
  info!(target: "learnai_backend", "WebSocket connected");
  let (mut sink, mut stream) = socket.split();
  let (tx, mut rx) = mpsc::unbounded_channel::<ServerWsMessage>();

  let writer = tokio::spawn(async move {
    while let Some(msg) = rx.recv().await {
      let out = serde_json::to_string(&msg).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "kind": "internal", "message": format!("Serialization error: {}", e) }).to_string()
      });
      if let Err(e) = sink.send(Message::Text(out)).await {
        error!(target: "learnai_backend", error = %e, "WS send error");
        break;
      }
    }
  });

  let outbox = Outbox { tx, session: Arc::new(WsSession::default()) };
  while let Some(Ok(msg)) = stream.next().await {
    match msg {
      Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
        Ok(incoming) => {
          debug!(target: "learnai_backend", "WS received: {:?}", &incoming);
          dispatch(incoming, &state, &outbox).await;
        }
        Err(e) => outbox.send(ServerWsMessage::Error {
          session_id: None,
          kind: "validation".into(),
          message: format!("Invalid JSON: {}", e),
        }),
      },
      Message::Close(_) => break,
      _ => {}
    }
  }

  writer.abort();
  info!(target: "learnai_backend", "WebSocket disconnected");
}

fn no_session() -> ServerWsMessage {
  ServerWsMessage::Error {
    session_id: None,
    kind: "validation".into(),
    message: "Submit a topic first.".into(),
  }
}

async fn dispatch(msg: ClientWsMessage, state: &Arc<AppState>, outbox: &Outbox) {
  match msg {
    ClientWsMessage::Ping => outbox.send(ServerWsMessage::Pong),

    ClientWsMessage::SubmitTopic { topic, image_data_uri, deep_think } => {
      let ticket = outbox.session.tracker.begin(&topic);
      *outbox.session.current.lock().await = Current { ticket: Some(ticket.clone()), ..Current::default() };
      outbox.send(ServerWsMessage::Session { session_id: ticket.id, topic: ticket.topic.clone() });
      info!(target: "learnai_backend", session = ticket.id, "WS session started");

      let (state, outbox) = (state.clone(), outbox.clone());
      tokio::spawn(async move {
        run_topic(&state, &outbox, &ticket, image_data_uri.as_deref(), deep_think).await;
      });
    }

    ClientWsMessage::Quiz { count } => {
      let (ticket, has_explanation) = {
        let cur = outbox.session.current.lock().await;
        (cur.ticket.clone(), !cur.explanation.trim().is_empty())
      };
      let Some(ticket) = ticket else {
        return outbox.send(no_session());
      };
      if !has_explanation {
        return outbox.send(ServerWsMessage::Error {
          session_id: Some(ticket.id),
          kind: "validation".into(),
          message: "Wait for the explanation first.".into(),
        });
      }
      let (state, outbox) = (state.clone(), outbox.clone());
      tokio::spawn(async move {
        let reply = match state.orchestrator.get_quiz(&ticket.topic, count).await {
          Ok(questions) => ServerWsMessage::Quiz { session_id: ticket.id, questions },
          Err(e) => ServerWsMessage::flow_error(Some(ticket.id), &e),
        };
        outbox.send_for(&ticket, reply);
      });
    }

    ClientWsMessage::Flashcards => {
      let (ticket, explanation) = {
        let cur = outbox.session.current.lock().await;
        (cur.ticket.clone(), cur.explanation.clone())
      };
      let Some(ticket) = ticket else {
        return outbox.send(no_session());
      };
      let (state, outbox) = (state.clone(), outbox.clone());
      tokio::spawn(async move {
        let reply = match state.orchestrator.get_flashcards(&ticket.topic, &explanation).await {
          Ok(flashcards) => ServerWsMessage::Flashcards { session_id: ticket.id, flashcards },
          Err(e) => ServerWsMessage::flow_error(Some(ticket.id), &e),
        };
        outbox.send_for(&ticket, reply);
      });
    }

    ClientWsMessage::Reasoning { question } => {
      let (ticket, context) = {
        let cur = outbox.session.current.lock().await;
        (cur.ticket.clone(), cur.conversation.context_for(&cur.explanation))
      };
      let Some(ticket) = ticket else {
        return outbox.send(no_session());
      };
      let (state, outbox) = (state.clone(), outbox.clone());
      tokio::spawn(async move {
        match state.orchestrator.get_reasoning(&ticket.topic, &context, &question).await {
          Ok(answer) => {
            {
              let mut cur = outbox.session.current.lock().await;
              if cur.ticket.as_ref() == Some(&ticket) {
                cur.conversation.push(Role::User, question.trim());
                cur.conversation.push(Role::Assistant, answer.clone());
              }
            }
            outbox.send_for(&ticket, ServerWsMessage::Answer { session_id: ticket.id, question, answer });
          }
          Err(e) => {
            outbox.send_for(&ticket, ServerWsMessage::flow_error(Some(ticket.id), &e));
          }
        }
      });
    }

    ClientWsMessage::Translate { text, language } => {
      let ticket = outbox.session.current.lock().await.ticket.clone();
      let (state, outbox) = (state.clone(), outbox.clone());
      tokio::spawn(async move {
        let session_id = ticket.as_ref().map(|t| t.id);
        let reply = match state.orchestrator.get_translation(&text, &language).await {
          Ok(translation) => ServerWsMessage::Translation { session_id, text, translation },
          Err(e) => ServerWsMessage::flow_error(session_id, &e),
        };
        match ticket {
          Some(t) => {
            outbox.send_for(&t, reply);
          }
          None => outbox.send(reply),
        }
      });
    }
  }
}

/// Explanation first, then flashcards built from it. Stops as soon as the session is
/// superseded.
async fn run_topic(state: &AppState, outbox: &Outbox, ticket: &SessionTicket, image: Option<&str>, deep_think: bool) {
  let explanation = match state.orchestrator.get_explanation(&ticket.topic, image, deep_think).await {
    Ok(text) => text,
    Err(e) => {
      outbox.send_for(ticket, ServerWsMessage::flow_error(Some(ticket.id), &e));
      return;
    }
  };

  {
    let mut cur = outbox.session.current.lock().await;
    if cur.ticket.as_ref() != Some(ticket) {
      return;
    }
    cur.explanation = explanation.clone();
  }
  if !outbox.send_for(ticket, ServerWsMessage::Explanation { session_id: ticket.id, explanation: explanation.clone() }) {
    return;
  }

  let reply = match state.orchestrator.get_flashcards(&ticket.topic, &explanation).await {
    Ok(flashcards) => ServerWsMessage::Flashcards { session_id: ticket.id, flashcards },
    Err(e) => ServerWsMessage::flow_error(Some(ticket.id), &e),
  };
  outbox.send_for(ticket, reply);
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::config::AgentConfig;
  use crate::gateway::testing::ScriptedService;

  fn outbox() -> (Outbox, mpsc::UnboundedReceiver<ServerWsMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbox { tx, session: Arc::new(WsSession::default()) }, rx)
  }

  fn to_json(msg: &ServerWsMessage) -> serde_json::Value {
    serde_json::to_value(msg).unwrap()
  }

  #[tokio::test]
  async fn superseded_session_results_are_dropped() {
    let (outbox, mut rx) = outbox();
    let first = outbox.session.tracker.begin("Photosynthesis");
    let second = outbox.session.tracker.begin("Gravity");

    assert!(!outbox.send_for(&first, ServerWsMessage::Pong));
    assert!(outbox.send_for(&second, ServerWsMessage::Pong));
    assert!(matches!(rx.try_recv(), Ok(ServerWsMessage::Pong)));
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn topic_run_sends_explanation_then_flashcards() {
    let svc = Arc::new(
      ScriptedService::new()
        .reply_json(json!({ "explanation": "Plants turn light into sugar." }))
        .reply_json(json!({ "flashcards": [{ "front": "Input?", "back": "Light" }] })),
    );
    let state = AppState::with_service(svc.clone(), AgentConfig::default());
    let (outbox, mut rx) = outbox();
    let ticket = outbox.session.tracker.begin("Photosynthesis");
    outbox.session.current.lock().await.ticket = Some(ticket.clone());

    run_topic(&state, &outbox, &ticket, None, false).await;

    let first = to_json(&rx.try_recv().unwrap());
    assert_eq!(first["type"], "explanation");
    assert_eq!(first["sessionId"], ticket.id);
    let second = to_json(&rx.try_recv().unwrap());
    assert_eq!(second["type"], "flashcards");
    assert_eq!(second["flashcards"][0]["back"], "Light");
    assert_eq!(outbox.session.current.lock().await.explanation, "Plants turn light into sugar.");
    assert_eq!(svc.calls(), 2);
  }

  #[tokio::test]
  async fn topic_run_for_stale_ticket_skips_flashcards() {
    let svc = Arc::new(ScriptedService::new().reply_json(json!({ "explanation": "Old topic." })));
    let state = AppState::with_service(svc.clone(), AgentConfig::default());
    let (outbox, mut rx) = outbox();
    let stale = outbox.session.tracker.begin("Photosynthesis");
    let fresh = outbox.session.tracker.begin("Gravity");
    outbox.session.current.lock().await.ticket = Some(fresh);

    run_topic(&state, &outbox, &stale, None, false).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(svc.calls(), 1);
    assert_eq!(outbox.session.current.lock().await.explanation, "");
  }

  #[tokio::test]
  async fn session_bound_requests_need_a_topic() {
    let state = Arc::new(AppState::with_service(Arc::new(ScriptedService::new()), AgentConfig::default()));
    let (outbox, mut rx) = outbox();

    dispatch(ClientWsMessage::Quiz { count: 3 }, &state, &outbox).await;

    let msg = to_json(&rx.try_recv().unwrap());
    assert_eq!(msg["type"], "error");
    assert_eq!(msg["kind"], "validation");
    assert!(msg.get("sessionId").is_none());
  }

  #[tokio::test]
  async fn quiz_waits_for_the_explanation() {
    let svc = Arc::new(ScriptedService::new());
    let state = Arc::new(AppState::with_service(svc.clone(), AgentConfig::default()));
    let (outbox, mut rx) = outbox();
    let ticket = outbox.session.tracker.begin("Photosynthesis");
    outbox.session.current.lock().await.ticket = Some(ticket.clone());

    dispatch(ClientWsMessage::Quiz { count: 1 }, &state, &outbox).await;

    let msg = to_json(&rx.try_recv().unwrap());
    assert_eq!(msg["type"], "error");
    assert_eq!(msg["kind"], "validation");
    assert_eq!(msg["sessionId"], ticket.id);
    assert_eq!(msg["message"], "Wait for the explanation first.");
    assert!(rx.try_recv().is_err());
    assert_eq!(svc.calls(), 0);
  }

  #[test]
  fn client_messages_parse_from_wire_names() {
    let msg: ClientWsMessage =
      serde_json::from_str(r#"{"type":"submit_topic","topic":"Gravity","deepThink":true}"#).unwrap();
    assert!(matches!(msg, ClientWsMessage::SubmitTopic { deep_think: true, image_data_uri: None, .. }));
    let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"quiz"}"#).unwrap();
    assert!(matches!(msg, ClientWsMessage::Quiz { count: 3 }));
  }
}
