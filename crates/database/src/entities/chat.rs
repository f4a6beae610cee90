use serde::{Deserialize, Serialize};

/// Represents a chat conversation in the system.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Database primary key
    #[serde(skip_serializing)]
    pub id: i64,
    /// Publicly accessible UUID
    pub public_id: String,
    /// Type of chat (direct, group, item)
    pub chat_type: ChatType,
    /// Display name (groups and item chats)
    pub name: Option<String>,
    /// Optional description (groups)
    pub description: Option<String>,
    /// Linked item identifier for item-discussion chats
    pub item_id: Option<String>,
    /// Linked item kind (bookmark, note, task, ...)
    pub item_type: Option<String>,
    /// Creator user ID
    #[serde(skip_serializing)]
    pub created_by: i64,
    /// Soft-deactivation flag
    pub is_active: bool,
    /// Timestamp of the most recent message
    pub last_message_at: Option<String>,
    /// Running message counter, kept in step with the messages table
    pub message_count: i64,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

/// Chat type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ChatType {
    Direct,
    Group,
    Item,
}

impl From<&str> for ChatType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "group" => ChatType::Group,
            "item" => ChatType::Item,
            _ => ChatType::Direct,
        }
    }
}

impl From<ChatType> for String {
    fn from(chat_type: ChatType) -> Self {
        match chat_type {
            ChatType::Direct => "direct".to_string(),
            ChatType::Group => "group".to_string(),
            ChatType::Item => "item".to_string(),
        }
    }
}

/// Canonical uniqueness key for a direct chat between two users.
///
/// The pair is unordered, so the smaller id always comes first.
pub fn direct_key(user_a: i64, user_b: i64) -> String {
    let (lo, hi) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    format!("{lo}:{hi}")
}

impl Chat {
    /// Check if this is a group chat
    pub fn is_group(&self) -> bool {
        matches!(self.chat_type, ChatType::Group)
    }

    /// Check if this is a direct (two-party) chat
    pub fn is_direct(&self) -> bool {
        matches!(self.chat_type, ChatType::Direct)
    }
}

/// Parameters for creating a group or item-linked chat.
#[derive(Debug, Clone)]
pub struct NewGroupChat {
    pub name: String,
    pub description: Option<String>,
    pub chat_type: ChatType,
    pub item_id: Option<String>,
    pub item_type: Option<String>,
    /// Members beyond the creator; the creator is always added as admin.
    pub member_ids: Vec<i64>,
}

impl NewGroupChat {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Chat name cannot be empty".to_string());
        }
        if self.name.len() > 255 {
            return Err("Chat name too long (max 255 characters)".to_string());
        }
        if matches!(self.chat_type, ChatType::Direct) {
            return Err("Direct chats are created per user pair".to_string());
        }
        if matches!(self.chat_type, ChatType::Item)
            && (self.item_id.is_none() || self.item_type.is_none())
        {
            return Err("Item chats require item_id and item_type".to_string());
        }
        Ok(())
    }
}
