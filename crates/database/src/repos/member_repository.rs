//! Repository for chat membership operations.

use crate::entities::{ChatMember, MemberRole};
use crate::errors::StoreResult;
use sqlx::SqlitePool;

/// Repository for chat membership persistence
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Membership row for a user in a chat, if present
    pub async fn find(&self, chat_db_id: i64, user_id: i64) -> StoreResult<Option<ChatMember>> {
        let member = sqlx::query_as::<_, ChatMember>(
            "SELECT chat_id, user_id, role, joined_at, last_read_at \
             FROM chat_members WHERE chat_id = ? AND user_id = ?",
        )
        .bind(chat_db_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    /// All members of a chat, admins first
    pub async fn list(&self, chat_db_id: i64) -> StoreResult<Vec<ChatMember>> {
        let members = sqlx::query_as::<_, ChatMember>(
            "SELECT chat_id, user_id, role, joined_at, last_read_at \
             FROM chat_members WHERE chat_id = ? ORDER BY role ASC, joined_at ASC",
        )
        .bind(chat_db_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Just the user IDs of a chat's members
    pub async fn user_ids(&self, chat_db_id: i64) -> StoreResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM chat_members WHERE chat_id = ?",
        )
        .bind(chat_db_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Database IDs of every active chat the user belongs to
    pub async fn chat_ids_for_user(&self, user_id: i64) -> StoreResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT cm.chat_id FROM chat_members cm \
             JOIN chats c ON c.id = cm.chat_id \
             WHERE cm.user_id = ? AND c.is_active = 1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Add a member; a duplicate add is a no-op returning the existing row
    pub async fn add(
        &self,
        chat_db_id: i64,
        user_id: i64,
        role: MemberRole,
    ) -> StoreResult<ChatMember> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT OR IGNORE INTO chat_members (chat_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
        )
        .bind(chat_db_id)
        .bind(user_id)
        .bind(String::from(role))
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let member = self.find(chat_db_id, user_id).await?.ok_or_else(|| {
            crate::errors::StoreError::user_not_found(user_id.to_string())
        })?;
        Ok(member)
    }

    /// Remove a member; returns false if the user was not a member
    pub async fn remove(&self, chat_db_id: i64, user_id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM chat_members WHERE chat_id = ? AND user_id = ?")
            .bind(chat_db_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of admins currently in the chat
    pub async fn admin_count(&self, chat_db_id: i64) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_members WHERE chat_id = ? AND role = 'admin'",
        )
        .bind(chat_db_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Number of members currently in the chat
    pub async fn member_count(&self, chat_db_id: i64) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chat_members WHERE chat_id = ?")
                .bind(chat_db_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Advance a member's last-read marker
    pub async fn update_last_read(
        &self,
        chat_db_id: i64,
        user_id: i64,
        read_at: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE chat_members SET last_read_at = ? WHERE chat_id = ? AND user_id = ?",
        )
        .bind(read_at)
        .bind(chat_db_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
