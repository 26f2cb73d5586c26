//! Registry of WebSocket clients waiting for live positions.
//!
//! Clients are keyed by connection id and grouped by the owner whose devices
//! they watch. One owner may have any number of connections (several browser
//! tabs). A connection without a usable owner id is never registered and so
//! never receives pushes.

use crate::metrics::LIVE_CLIENTS;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Owner ids some front-end builds send before a user is selected
const PLACEHOLDER_OWNERS: [&str; 3] = ["()", "undefined", "null"];

/// Handle used to queue frames for one connection
#[derive(Debug, Clone)]
pub struct LiveClient {
    pub connection_id: ConnectionId,
    pub sender: mpsc::Sender<String>,
}

#[derive(Debug)]
struct Registration {
    owner_id: String,
    client: LiveClient,
}

#[derive(Debug, Default)]
pub struct LiveRegistry {
    clients: RwLock<HashMap<ConnectionId, Registration>>,
}

/// Trims the owner id and rejects empty or placeholder values
pub fn usable_owner(owner_id: Option<&str>) -> Option<&str> {
    let owner_id = owner_id?.trim();
    if owner_id.is_empty() || PLACEHOLDER_OWNERS.contains(&owner_id) {
        return None;
    }
    Some(owner_id)
}

impl LiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        owner_id: Option<&str>,
        sender: mpsc::Sender<String>,
    ) -> Option<ConnectionId> {
        let Some(owner_id) = usable_owner(owner_id) else {
            debug!("Connection without owner id, not registering for pushes");
            return None;
        };

        let connection_id = Uuid::new_v4();
        let mut clients = self.clients.write().await;
        clients.insert(
            connection_id,
            Registration {
                owner_id: owner_id.to_string(),
                client: LiveClient {
                    connection_id,
                    sender,
                },
            },
        );
        LIVE_CLIENTS.set(clients.len() as f64);

        info!(
            "Live client {} registered for owner {}",
            connection_id, owner_id
        );
        Some(connection_id)
    }

    /// Returns false if the id was not registered
    pub async fn unregister(&self, connection_id: ConnectionId) -> bool {
        let mut clients = self.clients.write().await;
        let removed = clients.remove(&connection_id).is_some();
        LIVE_CLIENTS.set(clients.len() as f64);

        if removed {
            info!("Live client {} unregistered", connection_id);
        }
        removed
    }

    /// Snapshot of the handles watching `owner_id`
    pub async fn clients_for(&self, owner_id: &str) -> Vec<LiveClient> {
        self.clients
            .read()
            .await
            .values()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.client.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_owner() {
        assert_eq!(usable_owner(Some("U1")), Some("U1"));
        assert_eq!(usable_owner(Some("  U1 ")), Some("U1"));
        assert_eq!(usable_owner(Some("")), None);
        assert_eq!(usable_owner(Some("() ")), None);
        assert_eq!(usable_owner(Some("undefined")), None);
        assert_eq!(usable_owner(None), None);
    }

    #[tokio::test]
    async fn test_register_groups_by_owner() {
        let registry = LiveRegistry::new();
        let (tx, _rx) = mpsc::channel(1);

        let a = registry.register(Some("U1"), tx.clone()).await.unwrap();
        let b = registry.register(Some("U1"), tx.clone()).await.unwrap();
        let c = registry.register(Some("U2"), tx).await.unwrap();

        let mut ids: Vec<_> = registry
            .clients_for("U1")
            .await
            .into_iter()
            .map(|c| c.connection_id)
            .collect();
        ids.sort();
        let mut expected = vec![a, b];
        expected.sort();

        assert_eq!(ids, expected);
        assert_eq!(registry.clients_for("U2").await[0].connection_id, c);
        assert!(registry.clients_for("U3").await.is_empty());
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_missing_owner_is_not_registered() {
        let registry = LiveRegistry::new();
        let (tx, _rx) = mpsc::channel(1);

        assert!(registry.register(None, tx.clone()).await.is_none());
        assert!(registry.register(Some(""), tx).await.is_none());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry = LiveRegistry::new();
        let (tx, _rx) = mpsc::channel(1);

        let id = registry.register(Some("U1"), tx).await.unwrap();
        assert!(registry.unregister(id).await);
        assert!(registry.clients_for("U1").await.is_empty());

        // Unknown and repeated ids are a no-op
        assert!(!registry.unregister(id).await);
        assert!(!registry.unregister(Uuid::new_v4()).await);
    }
}
