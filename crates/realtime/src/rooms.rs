//! Live room membership and fan-out.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::events::ServerEvent;
use crate::presence::ConnectionId;

#[derive(Default)]
struct Room {
    /// joined connections and their outbound senders
    connections: HashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    /// serializes persist-then-relay cycles so delivery order matches
    /// persistence order within the chat
    relay_lock: Arc<Mutex<()>>,
}

/// Maps each chat to the set of connections currently joined to its room.
///
/// Joining is gated on persisted membership by the caller; this registry
/// only tracks the live state. Member removal evicts the user's
/// connections immediately so a removed member stops receiving relayed
/// events without waiting for a reconnect.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<i64, Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn join(
        &self,
        chat_db_id: i64,
        connection_id: ConnectionId,
        out_tx: mpsc::Sender<ServerEvent>,
    ) {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(chat_db_id)
            .or_default()
            .connections
            .insert(connection_id, out_tx);
    }

    /// Returns true if the connection was joined.
    pub async fn leave(&self, chat_db_id: i64, connection_id: ConnectionId) -> bool {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get_mut(&chat_db_id) else {
            return false;
        };
        let was_joined = room.connections.remove(&connection_id).is_some();
        if room.connections.is_empty() {
            rooms.remove(&chat_db_id);
        }
        was_joined
    }

    /// Drop a connection from every room it joined; returns the chats left.
    pub async fn leave_all(&self, connection_id: ConnectionId) -> Vec<i64> {
        let mut rooms = self.rooms.lock().await;
        let mut left = Vec::new();
        rooms.retain(|chat_db_id, room| {
            if room.connections.remove(&connection_id).is_some() {
                left.push(*chat_db_id);
            }
            !room.connections.is_empty()
        });
        left
    }

    /// Evict specific connections from one room (persisted-membership
    /// removal syncing live state).
    pub async fn evict(&self, chat_db_id: i64, connection_ids: &[ConnectionId]) {
        let mut rooms = self.rooms.lock().await;
        if let Some(room) = rooms.get_mut(&chat_db_id) {
            for connection_id in connection_ids {
                room.connections.remove(connection_id);
            }
            if room.connections.is_empty() {
                rooms.remove(&chat_db_id);
            }
        }
    }

    pub async fn is_joined(&self, chat_db_id: i64, connection_id: ConnectionId) -> bool {
        self.rooms
            .lock()
            .await
            .get(&chat_db_id)
            .is_some_and(|room| room.connections.contains_key(&connection_id))
    }

    /// Guard serializing message relay for one chat.
    ///
    /// Held across persist + broadcast so two concurrent senders cannot
    /// commit in one order and deliver in another.
    pub async fn relay_guard(&self, chat_db_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut rooms = self.rooms.lock().await;
            rooms.entry(chat_db_id).or_default().relay_lock.clone()
        };
        lock.lock_owned().await
    }

    /// Fan an event out to every joined connection.
    pub async fn broadcast(&self, chat_db_id: i64, event: &ServerEvent) {
        self.broadcast_filtered(chat_db_id, event, None).await;
    }

    /// Fan an event out to every joined connection except one.
    pub async fn broadcast_to_others(
        &self,
        chat_db_id: i64,
        except: ConnectionId,
        event: &ServerEvent,
    ) {
        self.broadcast_filtered(chat_db_id, event, Some(except)).await;
    }

    async fn broadcast_filtered(
        &self,
        chat_db_id: i64,
        event: &ServerEvent,
        except: Option<ConnectionId>,
    ) {
        let rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(&chat_db_id) else {
            return;
        };
        for (connection_id, tx) in &room.connections {
            if Some(*connection_id) == except {
                continue;
            }
            if tx.try_send(event.clone()).is_err() {
                // Queue full or receiver gone; the disconnect path will
                // clean the connection up.
                warn!(chat = chat_db_id, connection = connection_id.0, "dropping relay frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typing_event(chat_id: &str, user_id: i64) -> ServerEvent {
        ServerEvent::UserTyping {
            chat_id: chat_id.to_string(),
            user_id,
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_joined_connections_only() {
        let rooms = RoomRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);

        rooms.join(1, ConnectionId(1), tx_a).await;
        rooms.join(2, ConnectionId(2), tx_b).await;

        rooms.broadcast(1, &typing_event("c-1", 9)).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_others_skips_the_sender() {
        let rooms = RoomRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);

        rooms.join(1, ConnectionId(1), tx_a).await;
        rooms.join(1, ConnectionId(2), tx_b).await;

        rooms
            .broadcast_to_others(1, ConnectionId(1), &typing_event("c-1", 9))
            .await;

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn evicted_connections_stop_receiving() {
        let rooms = RoomRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(8);

        rooms.join(1, ConnectionId(1), tx_a).await;
        assert!(rooms.is_joined(1, ConnectionId(1)).await);

        rooms.evict(1, &[ConnectionId(1)]).await;
        assert!(!rooms.is_joined(1, ConnectionId(1)).await);

        rooms.broadcast(1, &typing_event("c-1", 9)).await;
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_all_reports_the_rooms_left() {
        let rooms = RoomRegistry::new();
        let (tx, _rx) = mpsc::channel(8);

        rooms.join(1, ConnectionId(1), tx.clone()).await;
        rooms.join(2, ConnectionId(1), tx.clone()).await;
        rooms.join(3, ConnectionId(2), tx).await;

        let mut left = rooms.leave_all(ConnectionId(1)).await;
        left.sort_unstable();
        assert_eq!(left, vec![1, 2]);
        assert!(rooms.is_joined(3, ConnectionId(2)).await);
    }
}
