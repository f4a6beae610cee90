//! Per-connection lifecycle and event dispatch.
//!
//! The dispatcher is transport-agnostic: the socket layer (and the tests)
//! drive it with parsed [`ClientEvent`]s and read replies from the
//! connection's outbound channel.

use tokio::sync::mpsc;
use tracing::{info, warn};
use urlyn_database::User;

use crate::error::{AuthRejection, RealtimeError, RealtimeResult};
use crate::events::{ClientEvent, ServerEvent};
use crate::presence::ConnectionId;
use crate::services::{chat, member, message};
use crate::state::RealtimeState;

/// One authenticated connection.
#[derive(Debug)]
pub struct ConnectionContext {
    pub id: ConnectionId,
    pub user: User,
    out_tx: mpsc::Sender<ServerEvent>,
}

impl ConnectionContext {
    pub fn sender(&self) -> mpsc::Sender<ServerEvent> {
        self.out_tx.clone()
    }

    /// Deliver an event to this connection. A closed channel means the
    /// socket is already going away; the disconnect path cleans up.
    pub async fn send(&self, event: ServerEvent) {
        let _ = self.out_tx.send(event).await;
    }
}

/// Authenticate a connecting client and register its presence.
///
/// On success the connection receives its chat list, and members of the
/// user's chats see a status change if this was the user's first live
/// connection. No anonymous connections: a missing or bad token refuses
/// the connection before any room interaction is possible.
pub async fn connect(
    state: &RealtimeState,
    token: Option<&str>,
    out_tx: mpsc::Sender<ServerEvent>,
) -> RealtimeResult<ConnectionContext> {
    let token = token.ok_or(RealtimeError::Authentication(AuthRejection::MissingToken))?;
    let user = state.authenticator.authenticate(token).await?;

    let ctx = ConnectionContext {
        id: state.allocate_connection_id(),
        user,
        out_tx,
    };

    let came_online = state
        .presence
        .record(ctx.user.id, ctx.id, ctx.sender())
        .await;

    if came_online {
        broadcast_status_change(state, ctx.user.id, true, None).await?;
    }

    let chats = chat::list_chats(state, ctx.user.id).await?;
    ctx.send(ServerEvent::UserChats { chats }).await;

    info!(user = ctx.user.id, connection = ctx.id.0, "connection established");
    Ok(ctx)
}

/// Tear a connection down: clear typing state, leave all rooms, and
/// update presence. Runs for clean closes and abrupt drops alike.
pub async fn disconnect(state: &RealtimeState, ctx: &ConnectionContext) {
    for chat_db_id in state.typing.clear_connection(ctx.user.id, ctx.id).await {
        if let Ok(Some(chat)) = state.chats().find_by_id(chat_db_id).await {
            state
                .rooms
                .broadcast_to_others(
                    chat_db_id,
                    ctx.id,
                    &ServerEvent::UserStoppedTyping {
                        chat_id: chat.public_id,
                        user_id: ctx.user.id,
                    },
                )
                .await;
        }
    }

    state.rooms.leave_all(ctx.id).await;

    if let Some(last_seen) = state.presence.remove(ctx.user.id, ctx.id).await {
        if let Err(err) = broadcast_status_change(state, ctx.user.id, false, Some(last_seen)).await
        {
            warn!(user = ctx.user.id, error = %err, "failed to broadcast offline status");
        }
    }

    info!(user = ctx.user.id, connection = ctx.id.0, "connection closed");
}

/// Dispatch one inbound event.
///
/// Errors are returned to the caller, which reports them to the
/// originating connection only; the connection stays open.
pub async fn handle_client_event(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    event: ClientEvent,
) -> RealtimeResult<()> {
    event.validate()?;

    match event {
        ClientEvent::JoinChat { chat_id } => chat::join_chat(state, ctx, &chat_id).await,
        ClientEvent::LeaveChat { chat_id } => chat::leave_chat(state, ctx, &chat_id).await,
        ClientEvent::SendMessage {
            chat_id,
            message: body,
            attachments,
            reply_to,
        } => message::send_message(state, ctx, &chat_id, body, attachments, reply_to).await,
        ClientEvent::TypingStart { chat_id } => handle_typing(state, ctx, &chat_id, true).await,
        ClientEvent::TypingStop { chat_id } => handle_typing(state, ctx, &chat_id, false).await,
        ClientEvent::ReadMessage {
            chat_id,
            message_id,
        } => message::mark_read(state, ctx, &chat_id, &message_id).await,
        ClientEvent::ReactToMessage {
            message_id,
            reaction,
        } => message::react_to_message(state, ctx, &message_id, &reaction).await,
        ClientEvent::EditMessage {
            message_id,
            message: body,
        } => message::edit_message(state, ctx, &message_id, body).await,
        ClientEvent::DeleteMessage { message_id } => {
            message::delete_message(state, ctx, &message_id).await
        }
        ClientEvent::CreateDirectChat { user_id } => {
            chat::create_direct_chat(state, ctx, user_id).await
        }
        ClientEvent::CreateGroupChat {
            name,
            description,
            members,
            item_id,
            item_type,
        } => {
            chat::create_group_chat(state, ctx, name, description, members, item_id, item_type)
                .await
        }
        ClientEvent::AddMember { chat_id, user_id } => {
            member::add_member(state, ctx, &chat_id, user_id).await
        }
        ClientEvent::RemoveMember { chat_id, user_id } => {
            member::remove_member(state, ctx, &chat_id, user_id).await
        }
    }
}

/// Typing toggles relay to the other members of the room only.
async fn handle_typing(
    state: &RealtimeState,
    ctx: &ConnectionContext,
    chat_public_id: &str,
    start: bool,
) -> RealtimeResult<()> {
    let (chat, _member) =
        crate::services::require_membership(state, chat_public_id, ctx.user.id).await?;

    if !state.rooms.is_joined(chat.id, ctx.id).await {
        return Err(RealtimeError::forbidden("Join the chat before typing"));
    }

    let changed = if start {
        state.typing.start(chat.id, ctx.user.id, ctx.id).await
    } else {
        state.typing.stop(chat.id, ctx.user.id, ctx.id).await
    };
    if !changed {
        return Ok(());
    }

    let event = if start {
        ServerEvent::UserTyping {
            chat_id: chat.public_id.clone(),
            user_id: ctx.user.id,
        }
    } else {
        ServerEvent::UserStoppedTyping {
            chat_id: chat.public_id.clone(),
            user_id: ctx.user.id,
        }
    };
    state.rooms.broadcast_to_others(chat.id, ctx.id, &event).await;
    Ok(())
}

/// Presence changes are visible in every room of every chat the user
/// belongs to.
async fn broadcast_status_change(
    state: &RealtimeState,
    user_id: i64,
    is_online: bool,
    last_seen: Option<String>,
) -> RealtimeResult<()> {
    let event = ServerEvent::UserStatusChange {
        user_id,
        is_online,
        last_seen,
    };
    for chat_db_id in state.members().chat_ids_for_user(user_id).await? {
        state.rooms.broadcast(chat_db_id, &event).await;
    }
    Ok(())
}
