use serde::{Deserialize, Serialize};

/// A persisted chat message.
///
/// Immutable once sent apart from the edit/delete flags and the
/// reaction/read metadata kept in side tables.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Database primary key
    #[serde(skip_serializing)]
    pub id: i64,
    /// Publicly accessible UUID
    pub public_id: String,
    #[serde(skip_serializing)]
    pub chat_id: i64,
    pub sender_id: i64,
    pub content: String,
    /// text | attachment | system
    pub message_type: String,
    /// Public id of the replied-to message, if any
    pub reply_to: Option<String>,
    pub is_edited: bool,
    pub edited_at: Option<String>,
    /// Content as it was before the first edit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub deleted_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    /// Attachment rows, hydrated separately
    #[sqlx(skip)]
    #[serde(default)]
    pub attachments: Vec<MessageAttachment>,
}

/// Attachment reference carried by a message.
#[derive(Debug, Clone, Serialize, Deserialize, Default, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttachment {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(skip_serializing)]
    pub message_id: i64,
    pub url: String,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
}

/// Incoming attachment payload, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttachment {
    pub url: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

/// A (user, emoji) reaction on a message.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MessageReaction {
    #[serde(skip_serializing)]
    pub message_id: i64,
    pub user_id: i64,
    pub reaction: String,
    pub reacted_at: String,
}

/// A (user, timestamp) read marker on a message.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    #[serde(skip_serializing)]
    pub message_id: i64,
    pub user_id: i64,
    pub read_at: String,
}

/// Parameters for persisting a new message.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub content: String,
    pub message_type: Option<String>,
    pub attachments: Vec<NewAttachment>,
    pub reply_to: Option<String>,
}

impl NewMessage {
    /// A message must carry text or at least one attachment.
    pub fn validate(&self) -> Result<(), String> {
        if self.content.trim().is_empty() && self.attachments.is_empty() {
            return Err("Message must contain text or attachments".to_string());
        }
        if self.content.len() > 10_000 {
            return Err("Message too long (max 10000 characters)".to_string());
        }
        Ok(())
    }
}
