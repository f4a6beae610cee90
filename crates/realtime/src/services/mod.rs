//! Persistence orchestration behind the event handlers.

pub mod chat;
pub mod member;
pub mod message;

use urlyn_database::{Chat, ChatMember};

use crate::error::{RealtimeError, RealtimeResult};
use crate::state::RealtimeState;

/// Resolve a chat by public ID and require the user to be a persisted
/// member. Every relayed action starts here.
pub(crate) async fn require_membership(
    state: &RealtimeState,
    chat_public_id: &str,
    user_id: i64,
) -> RealtimeResult<(Chat, ChatMember)> {
    let chat = state
        .chats()
        .find_by_public_id(chat_public_id)
        .await?
        .ok_or_else(|| RealtimeError::not_found(format!("Chat not found: {chat_public_id}")))?;

    let member = state
        .members()
        .find(chat.id, user_id)
        .await?
        .ok_or_else(|| RealtimeError::forbidden("Not a member of this chat"))?;

    Ok((chat, member))
}
