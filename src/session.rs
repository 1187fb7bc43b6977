//! Ephemeral per-session state: the follow-up conversation and the current topic ticket.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

/// Append-only follow-up conversation about one topic.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
}

impl From<Vec<ConversationMessage>> for Conversation {
    fn from(messages: Vec<ConversationMessage>) -> Self {
        Self { messages }
    }
}

impl Conversation {
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ConversationMessage { role, content: content.into() });
    }

    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| match m.role {
                Role::User => format!("User: {}", m.content),
                Role::Assistant => format!("Assistant: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Context handed to the reasoning template: the original explanation followed by the
    /// transcript so far. Empty when there is neither.
    pub fn context_for(&self, explanation: &str) -> String {
        let explanation = explanation.trim();
        let transcript = self.transcript();
        match (explanation.is_empty(), transcript.is_empty()) {
            (true, true) => String::new(),
            (false, true) => format!("Explanation:\n{explanation}"),
            (true, false) => transcript,
            (false, false) => format!("Explanation:\n{explanation}\n\n{transcript}"),
        }
    }
}

/// Identifies the topic a result was generated for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTicket {
    pub id: u64,
    pub topic: String,
}

/// Tracks which topic submission is current. Starting a new one supersedes the old
/// ticket, so results still in flight for it can be recognised and dropped.
#[derive(Debug, Default)]
pub struct SessionTracker {
    current: AtomicU64,
}

impl SessionTracker {
    pub fn begin(&self, topic: &str) -> SessionTicket {
        let id = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        SessionTicket { id, topic: topic.trim().to_string() }
    }

    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        self.current.load(Ordering::SeqCst) == ticket.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_topic_supersedes_previous_ticket() {
        let tracker = SessionTracker::default();
        let first = tracker.begin("Photosynthesis");
        assert!(tracker.is_current(&first));
        let second = tracker.begin("Gravity");
        assert!(!tracker.is_current(&first));
        assert!(tracker.is_current(&second));
        assert_eq!(second.topic, "Gravity");
    }

    #[test]
    fn context_combines_explanation_and_transcript() {
        let mut convo = Conversation::default();
        assert_eq!(convo.context_for("  "), "");
        assert_eq!(convo.context_for("Plants make sugar."), "Explanation:\nPlants make sugar.");

        convo.push(Role::User, "Why green?");
        convo.push(Role::Assistant, "Chlorophyll.");
        assert_eq!(
            convo.context_for("Plants make sugar."),
            "Explanation:\nPlants make sugar.\n\nUser: Why green?\n\nAssistant: Chlorophyll."
        );
    }

    #[test]
    fn messages_deserialize_from_wire_roles() {
        let msgs: Vec<ConversationMessage> =
            serde_json::from_str(r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#).unwrap();
        assert_eq!(Conversation::from(msgs).transcript(), "User: hi\n\nAssistant: hello");
    }
}
