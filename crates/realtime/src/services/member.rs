//! Persisted membership mutations and live-room synchronization.

use tracing::info;
use urlyn_database::MemberRole;

use crate::connection::ConnectionContext;
use crate::error::{RealtimeError, RealtimeResult};
use crate::events::ServerEvent;
use crate::services::require_membership;
use crate::state::RealtimeState;

/// Add a user to a group or item chat. Admin-only.
pub async fn add_member(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    chat_public_id: &str,
    user_id: i64,
) -> RealtimeResult<()> {
    let (chat, requester) = require_membership(state, chat_public_id, ctx.user.id).await?;

    if chat.is_direct() {
        return Err(RealtimeError::validation(
            "Direct chats have a fixed member pair",
        ));
    }
    if !requester.is_admin() {
        return Err(RealtimeError::forbidden("Only admins can add members"));
    }
    if !state.users().exists(user_id).await? {
        return Err(RealtimeError::not_found(format!("User not found: {user_id}")));
    }

    state
        .members()
        .add(chat.id, user_id, MemberRole::Member)
        .await?;

    state
        .rooms
        .broadcast(
            chat.id,
            &ServerEvent::UserJoinedChat {
                chat_id: chat.public_id.clone(),
                user_id,
            },
        )
        .await;
    // The new member learns about the chat on whichever connections they hold
    state
        .presence
        .send_to_user(user_id, &ServerEvent::NewChat { chat: chat.clone() })
        .await;

    info!(chat = %chat.public_id, user_id, added_by = ctx.user.id, "added chat member");
    Ok(())
}

/// Remove a member from a chat, keeping live room state in step.
///
/// Groups: admins may remove anyone; any member may remove themselves.
/// The last admin cannot be removed while other members remain. Direct
/// chats: either party may leave; an emptied chat is deactivated.
pub async fn remove_member(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    chat_public_id: &str,
    user_id: i64,
) -> RealtimeResult<()> {
    let (chat, requester) = require_membership(state, chat_public_id, ctx.user.id).await?;

    let target = state
        .members()
        .find(chat.id, user_id)
        .await?
        .ok_or_else(|| {
            RealtimeError::not_found(format!("User is not a member of this chat: {user_id}"))
        })?;

    let removing_self = user_id == ctx.user.id;
    if !chat.is_direct() && !requester.is_admin() && !removing_self {
        return Err(RealtimeError::forbidden("Only admins can remove members"));
    }

    if !chat.is_direct() && target.is_admin() {
        let admins = state.members().admin_count(chat.id).await?;
        let members = state.members().member_count(chat.id).await?;
        if admins == 1 && members > 1 {
            return Err(RealtimeError::validation(
                "Cannot remove the last admin while the chat has members",
            ));
        }
    }

    state.members().remove(chat.id, user_id).await?;

    // Evict the removed user's live connections so relayed events stop
    // immediately, without waiting for a reconnect.
    let connections = state.presence.connections_of(user_id).await;
    state.rooms.evict(chat.id, &connections).await;
    if state.typing.stop_user(chat.id, user_id).await {
        state
            .rooms
            .broadcast(
                chat.id,
                &ServerEvent::UserStoppedTyping {
                    chat_id: chat.public_id.clone(),
                    user_id,
                },
            )
            .await;
    }

    state
        .rooms
        .broadcast(
            chat.id,
            &ServerEvent::UserLeftChat {
                chat_id: chat.public_id.clone(),
                user_id,
            },
        )
        .await;

    if state.members().member_count(chat.id).await? == 0 {
        state.chats().deactivate(chat.id).await?;
    }

    info!(chat = %chat.public_id, user_id, removed_by = ctx.user.id, "removed chat member");
    Ok(())
}
