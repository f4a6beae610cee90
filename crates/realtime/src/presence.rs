//! Online-presence accounting.

use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::events::ServerEvent;

/// Identifier for one live socket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

#[derive(Default)]
struct PresenceInner {
    /// user id -> outbound sender per live connection
    connections: HashMap<i64, HashMap<ConnectionId, mpsc::Sender<ServerEvent>>>,
    /// stamped when the last connection of a user goes away
    last_seen: HashMap<i64, String>,
}

/// Tracks which users currently hold live connections.
///
/// A user is online iff at least one connection is recorded; a second tab
/// never evicts the first, and the user only goes offline when the last
/// connection is removed.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: Mutex<PresenceInner>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection. Returns true if the user just came online.
    pub async fn record(
        &self,
        user_id: i64,
        connection_id: ConnectionId,
        out_tx: mpsc::Sender<ServerEvent>,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        let connections = inner.connections.entry(user_id).or_default();
        let came_online = connections.is_empty();
        connections.insert(connection_id, out_tx);
        debug!(user_id, connection = connection_id.0, came_online, "presence recorded");
        came_online
    }

    /// Remove a connection.
    ///
    /// Returns the last-seen timestamp when this was the user's final
    /// connection, None while other connections remain.
    pub async fn remove(&self, user_id: i64, connection_id: ConnectionId) -> Option<String> {
        let mut inner = self.inner.lock().await;
        let Some(connections) = inner.connections.get_mut(&user_id) else {
            return None;
        };
        connections.remove(&connection_id);
        if !connections.is_empty() {
            return None;
        }

        inner.connections.remove(&user_id);
        let last_seen = chrono::Utc::now().to_rfc3339();
        inner.last_seen.insert(user_id, last_seen.clone());
        debug!(user_id, connection = connection_id.0, "user went offline");
        Some(last_seen)
    }

    pub async fn is_online(&self, user_id: i64) -> bool {
        self.inner
            .lock()
            .await
            .connections
            .get(&user_id)
            .is_some_and(|connections| !connections.is_empty())
    }

    pub async fn list_online(&self) -> Vec<i64> {
        self.inner.lock().await.connections.keys().copied().collect()
    }

    pub async fn last_seen(&self, user_id: i64) -> Option<String> {
        self.inner.lock().await.last_seen.get(&user_id).cloned()
    }

    /// Connection ids currently held by a user.
    pub async fn connections_of(&self, user_id: i64) -> Vec<ConnectionId> {
        self.inner
            .lock()
            .await
            .connections
            .get(&user_id)
            .map(|connections| connections.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Deliver an event to every live connection of a user.
    pub async fn send_to_user(&self, user_id: i64, event: &ServerEvent) {
        let inner = self.inner.lock().await;
        if let Some(connections) = inner.connections.get(&user_id) {
            for tx in connections.values() {
                // A full queue means a client that stopped draining; drop
                // the frame rather than stall everyone else.
                let _ = tx.try_send(event.clone());
            }
        }
    }
}
