//! Chat listing, room join/leave and chat creation.

use tracing::info;
use urlyn_database::{Chat, ChatType, NewGroupChat};

use crate::connection::ConnectionContext;
use crate::error::{RealtimeError, RealtimeResult};
use crate::events::ServerEvent;
use crate::services::require_membership;
use crate::state::RealtimeState;

/// Active chats for a user, most recently active first.
pub async fn list_chats(state: &RealtimeState, user_id: i64) -> RealtimeResult<Vec<Chat>> {
    Ok(state.chats().find_for_user(user_id).await?)
}

/// Join the chat's room and deliver recent history to the joiner.
///
/// The join is gated on persisted membership; a non-member gets a
/// forbidden error and no room mutation happens.
pub async fn join_chat(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    chat_public_id: &str,
) -> RealtimeResult<()> {
    let (chat, _member) = require_membership(state, chat_public_id, ctx.user.id).await?;

    state.rooms.join(chat.id, ctx.id, ctx.sender()).await;

    let messages = state
        .messages()
        .list_for_chat(chat.id, state.config.history_page_size)
        .await?;
    ctx.send(ServerEvent::ChatMessages {
        chat_id: chat.public_id.clone(),
        messages,
    })
    .await;

    info!(user = ctx.user.id, chat = %chat.public_id, "joined chat room");
    Ok(())
}

/// Leave the chat's room. Always succeeds for a joined connection.
pub async fn leave_chat(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    chat_public_id: &str,
) -> RealtimeResult<()> {
    let chat_db_id = state.chats().resolve_id(chat_public_id).await?;
    state.rooms.leave(chat_db_id, ctx.id).await;
    Ok(())
}

/// Fetch or create the direct chat between the requester and another user.
///
/// Idempotent per unordered pair: repeating the request returns the same
/// chat, reviving it if members had left in the meantime. The counterpart
/// is notified only when the chat is new or was just revived.
pub async fn create_direct_chat(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    other_user_id: i64,
) -> RealtimeResult<()> {
    if !state.users().exists(other_user_id).await? {
        return Err(RealtimeError::not_found(format!(
            "User not found: {other_user_id}"
        )));
    }

    let (chat, created) = state
        .chats()
        .get_or_create_direct(ctx.user.id, other_user_id)
        .await?;

    ctx.send(ServerEvent::NewChat { chat: chat.clone() }).await;
    if created {
        state
            .presence
            .send_to_user(other_user_id, &ServerEvent::NewChat { chat })
            .await;
    }
    Ok(())
}

/// Create a group chat (or an item-discussion chat when an item is linked).
pub async fn create_group_chat(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    name: String,
    description: Option<String>,
    members: Vec<i64>,
    item_id: Option<String>,
    item_type: Option<String>,
) -> RealtimeResult<()> {
    for user_id in &members {
        if !state.users().exists(*user_id).await? {
            return Err(RealtimeError::not_found(format!("User not found: {user_id}")));
        }
    }

    let chat_type = if item_id.is_some() {
        ChatType::Item
    } else {
        ChatType::Group
    };

    let chat = state
        .chats()
        .create_group(
            ctx.user.id,
            NewGroupChat {
                name,
                description,
                chat_type,
                item_id,
                item_type,
                member_ids: members.clone(),
            },
        )
        .await?;

    ctx.send(ServerEvent::NewChat { chat: chat.clone() }).await;
    for user_id in members {
        if user_id != ctx.user.id {
            state
                .presence
                .send_to_user(user_id, &ServerEvent::NewChat { chat: chat.clone() })
                .await;
        }
    }
    Ok(())
}
