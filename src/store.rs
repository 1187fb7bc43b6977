//! Client-local key/value storage.
//!
//! Stands in for the browser's local storage: string keys to string values, one
//! namespace per client id, held in memory only and gone on restart. Nothing user
//! authored is written anywhere else.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Clone, Default)]
pub struct LocalStore {
    clients: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// View of the store restricted to one client.
    pub fn scope(&self, client_id: &str) -> ClientScope {
        ClientScope { store: self.clone(), client_id: client_id.to_string() }
    }
}

#[derive(Clone)]
pub struct ClientScope {
    store: LocalStore,
    client_id: String,
}

impl ClientScope {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub async fn get_item(&self, key: &str) -> Option<String> {
        let clients = self.store.clients.read().await;
        clients.get(&self.client_id).and_then(|m| m.get(key)).cloned()
    }

    #[instrument(level = "debug", skip(self, value), fields(client = %self.client_id, value_len = value.len()))]
    pub async fn set_item(&self, key: &str, value: String) {
        let mut clients = self.store.clients.write().await;
        clients.entry(self.client_id.clone()).or_default().insert(key.to_string(), value);
    }

    #[instrument(level = "debug", skip(self), fields(client = %self.client_id))]
    pub async fn remove_item(&self, key: &str) {
        let mut clients = self.store.clients.write().await;
        if let Some(m) = clients.get_mut(&self.client_id) {
            m.remove(key);
            if m.is_empty() {
                clients.remove(&self.client_id);
                debug!(target: "learnai_backend", client = %self.client_id, "Client storage emptied");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scopes_are_isolated() {
        let store = LocalStore::new();
        let a = store.scope("a");
        let b = store.scope("b");
        a.set_item("k", "1".into()).await;
        assert_eq!(a.get_item("k").await.as_deref(), Some("1"));
        assert_eq!(b.get_item("k").await, None);
    }

    #[tokio::test]
    async fn remove_drops_the_value() {
        let store = LocalStore::new();
        let a = store.scope("a");
        a.set_item("k", "1".into()).await;
        a.remove_item("k").await;
        a.remove_item("missing").await;
        assert_eq!(a.get_item("k").await, None);
        assert!(store.clients.read().await.is_empty());
    }
}
