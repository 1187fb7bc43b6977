//! Recent-topics history kept in client-local storage.

use tracing::{instrument, warn};

use crate::store::ClientScope;

pub const HISTORY_KEY: &str = "learnai.history";
pub const MAX_HISTORY: usize = 20;

/// Put `topic` first, dropping any earlier case-insensitive duplicate, and cap the list.
pub fn push_recent(mut items: Vec<String>, topic: &str, max: usize) -> Vec<String> {
  let topic = topic.trim();
  if topic.is_empty() {
    return items;
  }
  let needle = topic.to_lowercase();
  items.retain(|t| t.to_lowercase() != needle);
  items.insert(0, topic.to_string());
  items.truncate(max);
  items
}

pub struct TopicHistory {
  scope: ClientScope,
}

impl TopicHistory {
  pub fn new(scope: ClientScope) -> Self {
    Self { scope }
  }

  /// Newest first. Unreadable stored data is treated as an empty history.
  pub async fn list(&self) -> Vec<String> {
    let Some(raw) = self.scope.get_item(HISTORY_KEY).await else {
      return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
      Ok(items) => items,
      Err(e) => {
        warn!(target: "history", client = %self.scope.client_id(), error = %e, "Discarding unreadable history");
        Vec::new()
      }
    }
  }

  async fn save(&self, items: &[String]) -> Vec<String> {
    match serde_json::to_string(items) {
      Ok(raw) => self.scope.set_item(HISTORY_KEY, raw).await,
      Err(e) => warn!(target: "history", error = %e, "Failed to serialize history"),
    }
    items.to_vec()
  }

  #[instrument(level = "debug", skip(self, topic), fields(client = %self.scope.client_id()))]
  pub async fn add(&self, topic: &str) -> Vec<String> {
    let items = push_recent(self.list().await, topic, MAX_HISTORY);
    self.save(&items).await
  }

  #[instrument(level = "debug", skip(self, topic), fields(client = %self.scope.client_id()))]
  pub async fn remove(&self, topic: &str) -> Vec<String> {
    let needle = topic.trim().to_lowercase();
    let mut items = self.list().await;
    items.retain(|t| t.to_lowercase() != needle);
    self.save(&items).await
  }

  pub async fn clear(&self) {
    self.scope.remove_item(HISTORY_KEY).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::LocalStore;

  fn history() -> TopicHistory {
    TopicHistory::new(LocalStore::new().scope("anon"))
  }

  #[tokio::test]
  async fn case_insensitive_duplicates_collapse_to_newest() {
    let h = history();
    h.add("Photosynthesis").await;
    let items = h.add("photosynthesis").await;
    assert_eq!(items, vec!["photosynthesis".to_string()]);
    assert_eq!(h.list().await, items);
  }

  #[tokio::test]
  async fn newest_first_and_capped() {
    let h = history();
    for i in 0..25 {
      h.add(&format!("Topic {i}")).await;
    }
    let items = h.list().await;
    assert_eq!(items.len(), MAX_HISTORY);
    assert_eq!(items[0], "Topic 24");
    assert_eq!(items[MAX_HISTORY - 1], "Topic 5");
  }

  #[tokio::test]
  async fn re_adding_moves_to_front() {
    let h = history();
    h.add("Gravity").await;
    h.add("Magnetism").await;
    assert_eq!(h.add("GRAVITY").await, vec!["GRAVITY".to_string(), "Magnetism".to_string()]);
  }

  #[tokio::test]
  async fn remove_and_clear() {
    let h = history();
    h.add("Gravity").await;
    h.add("Magnetism").await;
    assert_eq!(h.remove("gravity").await, vec!["Magnetism".to_string()]);
    h.clear().await;
    assert!(h.list().await.is_empty());
  }

  #[test]
  fn blank_topics_are_ignored() {
    assert_eq!(push_recent(vec!["A".into()], "   ", 20), vec!["A".to_string()]);
  }
}
