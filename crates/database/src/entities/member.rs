use serde::{Deserialize, Serialize};

/// Membership row linking a user to a chat.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMember {
    #[serde(skip_serializing)]
    pub chat_id: i64,
    pub user_id: i64,
    pub role: MemberRole,
    pub joined_at: String,
    pub last_read_at: Option<String>,
}

/// Member role enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

impl From<&str> for MemberRole {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => MemberRole::Admin,
            _ => MemberRole::Member,
        }
    }
}

impl From<MemberRole> for String {
    fn from(role: MemberRole) -> Self {
        match role {
            MemberRole::Admin => "admin".to_string(),
            MemberRole::Member => "member".to_string(),
        }
    }
}

impl ChatMember {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, MemberRole::Admin)
    }
}
