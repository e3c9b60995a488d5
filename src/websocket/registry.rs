//! Client Registry
//!
//! The authoritative set of connected clients and their registration
//! contexts.
//!
//! Membership and registration state are guarded by one `RwLock`. Mutations
//! (`add`, `remove`, `mark_registered`) take the write lock; broadcasters take
//! a [`snapshot`](Registry::snapshot) under the read lock and deliver after
//! releasing it.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::client::{ClientHandle, ClientId, ClientState};

/// One registry entry, as seen by a broadcaster
#[derive(Debug, Clone)]
pub struct Member {
    pub client: Arc<ClientHandle>,
    /// Registration context, `None` until the client registers
    pub context: Option<Arc<Value>>,
}

impl Member {
    pub fn is_registered(&self) -> bool {
        self.context.is_some()
    }
}

/// Registry of connected clients
#[derive(Debug, Default)]
pub struct Registry {
    members: RwLock<HashMap<ClientId, Member>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly accepted client
    pub async fn add(&self, client: Arc<ClientHandle>) {
        let id = client.id().to_string();
        let mut members = self.members.write().await;
        members.insert(
            id.clone(),
            Member {
                client,
                context: None,
            },
        );

        tracing::info!(client_id = %id, connected = members.len(), "Client open");
    }

    /// Remove a client and close its outbound queue
    ///
    /// Idempotent: returns false if the client was not a member.
    pub async fn remove(&self, id: &str) -> bool {
        let mut members = self.members.write().await;
        let Some(member) = members.remove(id) else {
            return false;
        };

        member.client.close_outbound();
        member.client.advance(ClientState::Closed);

        tracing::info!(
            client_id = %id,
            registered = member.is_registered(),
            connected = members.len(),
            "Client close"
        );
        true
    }

    /// Store the registration context of a client
    ///
    /// The first context stored wins and is returned on every later call.
    /// Returns `None` if the client is no longer a member.
    pub async fn mark_registered(&self, id: &str, context: Value) -> Option<Arc<Value>> {
        let mut members = self.members.write().await;
        let member = members.get_mut(id)?;

        if member.context.is_none() {
            member.context = Some(Arc::new(context));
            member.client.advance(ClientState::Registered);
            tracing::info!(client_id = %id, "Client registered");
        }

        member.context.clone()
    }

    /// Registration context of a client, if it is a registered member
    pub async fn registration(&self, id: &str) -> Option<Arc<Value>> {
        self.members
            .read()
            .await
            .get(id)
            .and_then(|member| member.context.clone())
    }

    pub async fn is_registered(&self, id: &str) -> bool {
        self.registration(id).await.is_some()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.members.read().await.contains_key(id)
    }

    /// Consistent copy of the current membership
    pub async fn snapshot(&self) -> Vec<Member> {
        self.members.read().await.values().cloned().collect()
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.members.read().await.len()
    }

    /// Get the number of registered clients
    pub async fn registered_count(&self) -> usize {
        self.members
            .read()
            .await
            .values()
            .filter(|member| member.is_registered())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_add_remove() {
        let registry = Registry::new();
        let (client, _rx) = ClientHandle::new(4);

        registry.add(Arc::clone(&client)).await;
        assert_eq!(registry.connection_count().await, 1);
        assert!(registry.contains(client.id()).await);

        assert!(registry.remove(client.id()).await);
        assert_eq!(registry.connection_count().await, 0);
        assert!(client.is_outbound_closed());
        assert_eq!(client.state(), ClientState::Closed);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = Registry::new();
        let (client, mut rx) = ClientHandle::new(4);
        registry.add(Arc::clone(&client)).await;

        assert!(registry.remove(client.id()).await);
        assert!(!registry.remove(client.id()).await);
        assert!(!registry.remove("unknown").await);

        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_mark_registered_first_context_wins() {
        let registry = Registry::new();
        let (client, _rx) = ClientHandle::new(4);
        registry.add(Arc::clone(&client)).await;

        assert!(!registry.is_registered(client.id()).await);

        let stored = registry
            .mark_registered(client.id(), json!({"room": "a"}))
            .await
            .unwrap();
        assert_eq!(*stored, json!({"room": "a"}));
        assert_eq!(client.state(), ClientState::Registered);

        let stored = registry
            .mark_registered(client.id(), json!({"room": "b"}))
            .await
            .unwrap();
        assert_eq!(*stored, json!({"room": "a"}));
        assert_eq!(registry.registered_count().await, 1);
    }

    #[tokio::test]
    async fn test_mark_registered_unknown_client() {
        let registry = Registry::new();
        assert!(registry.mark_registered("gone", Value::Null).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_captures_registration() {
        let registry = Registry::new();
        let (a, _rx_a) = ClientHandle::new(4);
        let (b, _rx_b) = ClientHandle::new(4);
        registry.add(Arc::clone(&a)).await;
        registry.add(Arc::clone(&b)).await;
        registry.mark_registered(a.id(), Value::Null).await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);

        let registered: Vec<_> = snapshot
            .iter()
            .filter(|m| m.is_registered())
            .map(|m| m.client.id().to_string())
            .collect();
        assert_eq!(registered, vec![a.id().to_string()]);

        // Later changes do not affect an existing snapshot
        registry.mark_registered(b.id(), Value::Null).await;
        registry.remove(a.id()).await;
        assert_eq!(snapshot.iter().filter(|m| m.is_registered()).count(), 1);
    }
}
