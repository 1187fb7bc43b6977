//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Flashcard, Question};
use crate::logic::FlowError;
use crate::session::ConversationMessage;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    /// Start a new session: explanation, then flashcards.
    SubmitTopic {
        topic: String,
        #[serde(rename = "imageDataUri", default)]
        image_data_uri: Option<String>,
        #[serde(rename = "deepThink", default)]
        deep_think: bool,
    },
    Quiz {
        #[serde(default = "default_quiz_count")]
        count: i64,
    },
    /// Regenerate flashcards for the current explanation.
    Flashcards,
    /// Follow-up question about the current topic.
    Reasoning {
        question: String,
    },
    Translate {
        text: String,
        language: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        #[serde(rename = "sessionId")]
        session_id: u64,
        topic: String,
    },
    Explanation {
        #[serde(rename = "sessionId")]
        session_id: u64,
        explanation: String,
    },
    Quiz {
        #[serde(rename = "sessionId")]
        session_id: u64,
        questions: Vec<Question>,
    },
    Flashcards {
        #[serde(rename = "sessionId")]
        session_id: u64,
        flashcards: Vec<Flashcard>,
    },
    Answer {
        #[serde(rename = "sessionId")]
        session_id: u64,
        question: String,
        answer: String,
    },
    Translation {
        #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
        session_id: Option<u64>,
        text: String,
        translation: String,
    },
    Error {
        #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
        session_id: Option<u64>,
        kind: String,
        message: String,
    },
}

impl ServerWsMessage {
    pub fn flow_error(session_id: Option<u64>, e: &FlowError) -> Self {
        ServerWsMessage::Error { session_id, kind: e.kind().into(), message: e.to_string() }
    }
}

pub fn default_quiz_count() -> i64 {
    3
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationIn {
    pub topic: String,
    #[serde(default)]
    pub image_data_uri: Option<String>,
    #[serde(default)]
    pub deep_think: bool,
}
#[derive(Serialize)]
pub struct ExplanationOut {
    pub explanation: String,
}

#[derive(Debug, Deserialize)]
pub struct QuizIn {
    pub topic: String,
    #[serde(default = "default_quiz_count")]
    pub count: i64,
}
#[derive(Serialize)]
pub struct QuizOut {
    pub questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
pub struct FlashcardsIn {
    pub topic: String,
    pub explanation: String,
}
#[derive(Serialize)]
pub struct FlashcardsOut {
    pub flashcards: Vec<Flashcard>,
}

/// Either a ready-made `context`, or the explanation plus the conversation so far.
#[derive(Debug, Deserialize)]
pub struct ReasoningIn {
    pub topic: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    pub question: String,
}
#[derive(Serialize)]
pub struct ReasoningOut {
    pub answer: String,
}

#[derive(Deserialize)]
pub struct TranslateIn {
    pub text: String,
    pub language: String,
}
#[derive(Serialize)]
pub struct TranslateOut {
    pub translation: String,
}

#[derive(Deserialize)]
pub struct HistoryIn {
    pub topic: String,
}
#[derive(Serialize)]
pub struct HistoryOut {
    pub topics: Vec<String>,
}

#[derive(Deserialize)]
pub struct EmailIn {
    #[serde(default)]
    pub email: Option<String>,
}
#[derive(Serialize)]
pub struct EmailCheckOut {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct ProviderErrorIn {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
    pub kind: &'static str,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
