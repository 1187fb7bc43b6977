//! Rate/access gate for anonymous callers.
//!
//! Counts generations performed without an account. Once the count reaches
//! [`ACCESS_LIMIT`] the presentation layer must stop offering generation and ask the
//! user to sign in. The counter only goes up; it is reset once the external identity
//! provider reports a successful sign-in. The gate itself knows nothing about identity.

use serde::Serialize;
use tracing::{info, instrument};

use crate::store::ClientScope;

pub const ACCESS_LIMIT: u32 = 3;
pub const ACCESS_COUNT_KEY: &str = "learnai.accessCount";

pub fn has_reached_limit(count: u32) -> bool {
  count >= ACCESS_LIMIT
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessStatus {
  pub count: u32,
  pub limit: u32,
  pub limit_reached: bool,
}

impl AccessStatus {
  fn from_count(count: u32) -> Self {
    Self { count, limit: ACCESS_LIMIT, limit_reached: has_reached_limit(count) }
  }
}

pub struct AccessGate {
  scope: ClientScope,
}

impl AccessGate {
  pub fn new(scope: ClientScope) -> Self {
    Self { scope }
  }

  /// Current count; a missing or unreadable value counts as zero.
  pub async fn count(&self) -> u32 {
    self.scope
      .get_item(ACCESS_COUNT_KEY)
      .await
      .and_then(|v| v.trim().parse::<u32>().ok())
      .unwrap_or(0)
  }

  /// Read, add one, write back. Two near-simultaneous calls may both read the same
  /// value and under-count; acceptable for a client-local counter.
  #[instrument(level = "info", skip(self), fields(client = %self.scope.client_id()))]
  pub async fn increment(&self) -> u32 {
    let next = self.count().await.saturating_add(1);
    self.scope.set_item(ACCESS_COUNT_KEY, next.to_string()).await;
    if has_reached_limit(next) {
      info!(target: "access", client = %self.scope.client_id(), count = next, "Anonymous limit reached");
    }
    next
  }

  /// Called after the identity provider signs the caller in.
  #[instrument(level = "info", skip(self), fields(client = %self.scope.client_id()))]
  pub async fn reset(&self) {
    self.scope.remove_item(ACCESS_COUNT_KEY).await;
  }

  pub async fn status(&self) -> AccessStatus {
    AccessStatus::from_count(self.count().await)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::LocalStore;

  #[test]
  fn limit_is_three() {
    assert!(!has_reached_limit(0));
    assert!(!has_reached_limit(2));
    assert!(has_reached_limit(3));
    assert!(has_reached_limit(7));
  }

  #[tokio::test]
  async fn three_increments_reach_the_limit() {
    let gate = AccessGate::new(LocalStore::new().scope("anon"));
    assert_eq!(gate.count().await, 0);
    assert_eq!(gate.increment().await, 1);
    assert_eq!(gate.increment().await, 2);
    assert_eq!(gate.increment().await, 3);
    assert_eq!(gate.status().await, AccessStatus { count: 3, limit: 3, limit_reached: true });
  }

  #[tokio::test]
  async fn reset_starts_over() {
    let gate = AccessGate::new(LocalStore::new().scope("anon"));
    gate.increment().await;
    gate.increment().await;
    gate.reset().await;
    assert_eq!(gate.count().await, 0);
    assert_eq!(gate.increment().await, 1);
  }

  #[tokio::test]
  async fn garbage_value_reads_as_zero() {
    let scope = LocalStore::new().scope("anon");
    scope.set_item(ACCESS_COUNT_KEY, "lots".into()).await;
    assert_eq!(AccessGate::new(scope).count().await, 0);
  }
}
