//! Wire protocol for the realtime socket.
//!
//! Every frame is a JSON object `{"type": "...", "data": {...}}`. Payload
//! keys are camelCase to match the web client.

use serde::{Deserialize, Serialize};
use urlyn_database::{Chat, ChatMessage, NewAttachment, ReadReceipt};

use crate::error::{RealtimeError, RealtimeResult};

/// Events a client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinChat {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    LeaveChat {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    SendMessage {
        #[serde(rename = "chatId")]
        chat_id: String,
        message: String,
        #[serde(default)]
        attachments: Vec<NewAttachment>,
        #[serde(rename = "replyTo", default)]
        reply_to: Option<String>,
    },
    TypingStart {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    TypingStop {
        #[serde(rename = "chatId")]
        chat_id: String,
    },
    ReadMessage {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "messageId")]
        message_id: String,
    },
    ReactToMessage {
        #[serde(rename = "messageId")]
        message_id: String,
        reaction: String,
    },
    EditMessage {
        #[serde(rename = "messageId")]
        message_id: String,
        message: String,
    },
    DeleteMessage {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    CreateDirectChat {
        #[serde(rename = "userId")]
        user_id: i64,
    },
    CreateGroupChat {
        name: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        members: Vec<i64>,
        #[serde(rename = "itemId", default)]
        item_id: Option<String>,
        #[serde(rename = "itemType", default)]
        item_type: Option<String>,
    },
    AddMember {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "userId")]
        user_id: i64,
    },
    RemoveMember {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "userId")]
        user_id: i64,
    },
}

impl ClientEvent {
    /// Boundary validation, before any handler or query runs.
    pub fn validate(&self) -> RealtimeResult<()> {
        match self {
            ClientEvent::JoinChat { chat_id }
            | ClientEvent::LeaveChat { chat_id }
            | ClientEvent::TypingStart { chat_id }
            | ClientEvent::TypingStop { chat_id } => require_id(chat_id, "chatId"),
            ClientEvent::SendMessage {
                chat_id,
                message,
                attachments,
                ..
            } => {
                require_id(chat_id, "chatId")?;
                if message.trim().is_empty() && attachments.is_empty() {
                    return Err(RealtimeError::validation(
                        "Message must contain text or attachments",
                    ));
                }
                Ok(())
            }
            ClientEvent::ReadMessage {
                chat_id,
                message_id,
            } => {
                require_id(chat_id, "chatId")?;
                require_id(message_id, "messageId")
            }
            ClientEvent::ReactToMessage {
                message_id,
                reaction,
            } => {
                require_id(message_id, "messageId")?;
                require_id(reaction, "reaction")
            }
            ClientEvent::EditMessage {
                message_id,
                message,
            } => {
                require_id(message_id, "messageId")?;
                if message.trim().is_empty() {
                    return Err(RealtimeError::validation("Edited message cannot be empty"));
                }
                Ok(())
            }
            ClientEvent::DeleteMessage { message_id } => require_id(message_id, "messageId"),
            ClientEvent::CreateDirectChat { .. } => Ok(()),
            ClientEvent::CreateGroupChat { name, .. } => {
                if name.trim().is_empty() {
                    return Err(RealtimeError::validation("Chat name cannot be empty"));
                }
                Ok(())
            }
            ClientEvent::AddMember { chat_id, .. }
            | ClientEvent::RemoveMember { chat_id, .. } => require_id(chat_id, "chatId"),
        }
    }
}

fn require_id(value: &str, field: &str) -> RealtimeResult<()> {
    if value.trim().is_empty() {
        return Err(RealtimeError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    UserChats {
        chats: Vec<Chat>,
    },
    ChatMessages {
        #[serde(rename = "chatId")]
        chat_id: String,
        messages: Vec<ChatMessage>,
    },
    NewMessage {
        #[serde(rename = "chatId")]
        chat_id: String,
        message: ChatMessage,
    },
    MessageEdited {
        #[serde(rename = "chatId")]
        chat_id: String,
        message: ChatMessage,
    },
    MessageDeleted {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "messageId")]
        message_id: String,
    },
    UserJoinedChat {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "userId")]
        user_id: i64,
    },
    UserLeftChat {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "userId")]
        user_id: i64,
    },
    UserTyping {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "userId")]
        user_id: i64,
    },
    UserStoppedTyping {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "userId")]
        user_id: i64,
    },
    MessageRead {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "readBy")]
        read_by: Vec<ReadReceipt>,
    },
    MessageReaction {
        #[serde(rename = "chatId")]
        chat_id: String,
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "userId")]
        user_id: i64,
        /// None when the toggle removed the reaction
        reaction: Option<String>,
    },
    UserStatusChange {
        #[serde(rename = "userId")]
        user_id: i64,
        #[serde(rename = "isOnline")]
        is_online: bool,
        #[serde(rename = "lastSeen", skip_serializing_if = "Option::is_none")]
        last_seen: Option<String>,
    },
    NewChat {
        chat: Chat,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ServerEvent {
    pub fn error(err: &RealtimeError) -> Self {
        ServerEvent::Error {
            message: err.client_message(),
            code: err.client_code().map(str::to_string),
        }
    }
}
