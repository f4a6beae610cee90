//! Ephemeral typing indicators.

use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use crate::presence::ConnectionId;

/// Per-chat typing state, tracked per connection.
///
/// A user shows as typing while at least one of their connections does;
/// closing an idle second tab never clears an indicator the surviving
/// tab still holds. Never persisted. Entries are cleared by an explicit
/// stop, by the user's own message send, and on disconnect, so no
/// indicator can stick around after its user stopped producing events.
#[derive(Default)]
pub struct TypingTracker {
    chats: Mutex<HashMap<i64, HashMap<i64, HashSet<ConnectionId>>>>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the user was not already marked typing in the chat.
    pub async fn start(&self, chat_db_id: i64, user_id: i64, connection_id: ConnectionId) -> bool {
        let mut chats = self.chats.lock().await;
        let connections = chats
            .entry(chat_db_id)
            .or_default()
            .entry(user_id)
            .or_default();
        let newly_typing = connections.is_empty();
        connections.insert(connection_id);
        newly_typing
    }

    /// Returns true if this stop ended the user's indicator in the chat.
    pub async fn stop(&self, chat_db_id: i64, user_id: i64, connection_id: ConnectionId) -> bool {
        let mut chats = self.chats.lock().await;
        let Some(users) = chats.get_mut(&chat_db_id) else {
            return false;
        };
        let Some(connections) = users.get_mut(&user_id) else {
            return false;
        };
        connections.remove(&connection_id);
        if !connections.is_empty() {
            return false;
        }
        users.remove(&user_id);
        if users.is_empty() {
            chats.remove(&chat_db_id);
        }
        true
    }

    /// Clear the user's indicator in the chat across all their connections.
    ///
    /// Used when a send implicitly ends typing and when a member is
    /// removed. Returns true if the user was typing.
    pub async fn stop_user(&self, chat_db_id: i64, user_id: i64) -> bool {
        let mut chats = self.chats.lock().await;
        let Some(users) = chats.get_mut(&chat_db_id) else {
            return false;
        };
        let was_typing = users.remove(&user_id).is_some();
        if users.is_empty() {
            chats.remove(&chat_db_id);
        }
        was_typing
    }

    pub async fn is_typing(&self, chat_db_id: i64, user_id: i64) -> bool {
        self.chats
            .lock()
            .await
            .get(&chat_db_id)
            .is_some_and(|users| users.contains_key(&user_id))
    }

    /// Drop one connection from every chat; returns the chats where this
    /// ended the user's indicator.
    pub async fn clear_connection(&self, user_id: i64, connection_id: ConnectionId) -> Vec<i64> {
        let mut chats = self.chats.lock().await;
        let mut cleared = Vec::new();
        chats.retain(|chat_db_id, users| {
            let ended = match users.get_mut(&user_id) {
                Some(connections) => {
                    connections.remove(&connection_id);
                    connections.is_empty()
                }
                None => false,
            };
            if ended {
                users.remove(&user_id);
                cleared.push(*chat_db_id);
            }
            !users.is_empty()
        });
        cleared
    }
}
