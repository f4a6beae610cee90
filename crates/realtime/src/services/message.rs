//! Message relay: persist, then fan out.

use tracing::info;
use urlyn_database::{ChatMessage, NewAttachment, NewMessage};

use crate::connection::ConnectionContext;
use crate::error::{RealtimeError, RealtimeResult};
use crate::events::ServerEvent;
use crate::services::require_membership;
use crate::state::RealtimeState;

/// Persist a message and relay it to the room.
///
/// The relay guard is held across persist + broadcast, so per-chat
/// delivery order always matches persistence order even with concurrent
/// senders.
pub async fn send_message(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    chat_public_id: &str,
    message: String,
    attachments: Vec<NewAttachment>,
    reply_to: Option<String>,
) -> RealtimeResult<()> {
    let (chat, _member) = require_membership(state, chat_public_id, ctx.user.id).await?;

    if !state.rooms.is_joined(chat.id, ctx.id).await {
        return Err(RealtimeError::forbidden("Join the chat before sending"));
    }

    let _relay = state.rooms.relay_guard(chat.id).await;

    let persisted = state
        .messages()
        .create(
            chat.id,
            ctx.user.id,
            NewMessage {
                content: message,
                message_type: None,
                attachments,
                reply_to,
            },
        )
        .await?;

    // A send always ends the sender's typing indicator
    if state.typing.stop_user(chat.id, ctx.user.id).await {
        state
            .rooms
            .broadcast_to_others(
                chat.id,
                ctx.id,
                &ServerEvent::UserStoppedTyping {
                    chat_id: chat.public_id.clone(),
                    user_id: ctx.user.id,
                },
            )
            .await;
    }

    state
        .rooms
        .broadcast(
            chat.id,
            &ServerEvent::NewMessage {
                chat_id: chat.public_id.clone(),
                message: persisted.clone(),
            },
        )
        .await;

    info!(chat = %chat.public_id, message = %persisted.public_id, sender = ctx.user.id, "relayed message");
    Ok(())
}

/// Edit one of the caller's own messages and re-broadcast it.
pub async fn edit_message(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    message_public_id: &str,
    new_content: String,
) -> RealtimeResult<()> {
    let message = find_message(state, message_public_id).await?;
    if message.sender_id != ctx.user.id {
        return Err(RealtimeError::forbidden("Only the author can edit a message"));
    }

    let edited = state.messages().edit(message.id, &new_content).await?;
    let chat_public_id = chat_public_id_of(state, message.chat_id).await?;

    state
        .rooms
        .broadcast(
            message.chat_id,
            &ServerEvent::MessageEdited {
                chat_id: chat_public_id,
                message: edited,
            },
        )
        .await;
    Ok(())
}

/// Soft-delete one of the caller's own messages and notify the room.
pub async fn delete_message(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    message_public_id: &str,
) -> RealtimeResult<()> {
    let message = find_message(state, message_public_id).await?;
    if message.sender_id != ctx.user.id {
        return Err(RealtimeError::forbidden(
            "Only the author can delete a message",
        ));
    }

    state.messages().soft_delete(message.id, ctx.user.id).await?;
    let chat_public_id = chat_public_id_of(state, message.chat_id).await?;

    state
        .rooms
        .broadcast(
            message.chat_id,
            &ServerEvent::MessageDeleted {
                chat_id: chat_public_id,
                message_id: message.public_id,
            },
        )
        .await;
    Ok(())
}

/// Toggle the caller's reaction on a message and notify the room.
pub async fn react_to_message(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    message_public_id: &str,
    reaction: &str,
) -> RealtimeResult<()> {
    let message = find_message(state, message_public_id).await?;

    let membership = state.members().find(message.chat_id, ctx.user.id).await?;
    if membership.is_none() {
        return Err(RealtimeError::forbidden("Not a member of this chat"));
    }

    let applied = state
        .messages()
        .toggle_reaction(message.id, ctx.user.id, reaction)
        .await?;
    let chat_public_id = chat_public_id_of(state, message.chat_id).await?;

    state
        .rooms
        .broadcast(
            message.chat_id,
            &ServerEvent::MessageReaction {
                chat_id: chat_public_id,
                message_id: message.public_id,
                user_id: ctx.user.id,
                reaction: applied.map(|r| r.reaction),
            },
        )
        .await;
    Ok(())
}

/// Record a read marker; idempotent per (user, message).
///
/// Only a first-time marker advances the member's last-read position and
/// produces a broadcast.
pub async fn mark_read(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    chat_public_id: &str,
    message_public_id: &str,
) -> RealtimeResult<()> {
    let (chat, _member) = require_membership(state, chat_public_id, ctx.user.id).await?;

    let message = find_message(state, message_public_id).await?;
    if message.chat_id != chat.id {
        return Err(RealtimeError::not_found(format!(
            "Message not found in this chat: {message_public_id}"
        )));
    }

    let newly_read = state.messages().mark_read(message.id, ctx.user.id).await?;
    if !newly_read {
        return Ok(());
    }

    let now = chrono::Utc::now().to_rfc3339();
    state
        .members()
        .update_last_read(chat.id, ctx.user.id, &now)
        .await?;

    let read_by = state.messages().read_receipts(message.id).await?;
    state
        .rooms
        .broadcast(
            chat.id,
            &ServerEvent::MessageRead {
                chat_id: chat.public_id.clone(),
                message_id: message.public_id,
                read_by,
            },
        )
        .await;
    Ok(())
}

async fn find_message(
    state: &RealtimeState,
    message_public_id: &str,
) -> RealtimeResult<ChatMessage> {
    state
        .messages()
        .find_by_public_id(message_public_id)
        .await?
        .ok_or_else(|| RealtimeError::not_found(format!("Message not found: {message_public_id}")))
}

async fn chat_public_id_of(state: &RealtimeState, chat_db_id: i64) -> RealtimeResult<String> {
    let chat = state
        .chats()
        .find_by_id(chat_db_id)
        .await?
        .ok_or_else(|| RealtimeError::not_found(format!("Chat not found: {chat_db_id}")))?;
    Ok(chat.public_id)
}
