//! Repository for chat data access operations.

use crate::entities::{direct_key, Chat, ChatType, MemberRole, NewGroupChat};
use crate::errors::{StoreError, StoreResult};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

const CHAT_COLUMNS: &str = "id, public_id, chat_type, name, description, item_id, item_type, \
     created_by, is_active, last_message_at, message_count, created_at, updated_at";

/// Repository for chat database operations
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find an active chat by public ID
    pub async fn find_by_public_id(&self, public_id: &str) -> StoreResult<Option<Chat>> {
        let chat = sqlx::query_as::<_, Chat>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE public_id = ? AND is_active = 1"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(chat)
    }

    /// Find an active chat by database ID
    pub async fn find_by_id(&self, chat_db_id: i64) -> StoreResult<Option<Chat>> {
        let chat = sqlx::query_as::<_, Chat>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE id = ? AND is_active = 1"
        ))
        .bind(chat_db_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(chat)
    }

    /// Resolve a public chat ID to its database ID, or fail with not-found
    pub async fn resolve_id(&self, public_id: &str) -> StoreResult<i64> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM chats WHERE public_id = ? AND is_active = 1")
                .bind(public_id)
                .fetch_optional(&self.pool)
                .await?;

        id.ok_or_else(|| StoreError::chat_not_found(public_id))
    }

    /// All active chats the user is a member of, most recently active first
    pub async fn find_for_user(&self, user_id: i64) -> StoreResult<Vec<Chat>> {
        let chats = sqlx::query_as::<_, Chat>(&format!(
            "SELECT c.{} FROM chats c \
             JOIN chat_members cm ON c.id = cm.chat_id \
             WHERE cm.user_id = ? AND c.is_active = 1 \
             ORDER BY COALESCE(c.last_message_at, c.created_at) DESC",
            CHAT_COLUMNS.replace(", ", ", c.")
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(chats)
    }

    /// Fetch the existing direct chat for the pair, or create it.
    ///
    /// Returns the chat and whether it was newly established for the pair.
    /// Uniqueness per unordered pair is enforced by the UNIQUE `direct_key`
    /// column, so a concurrent creation loses the insert race and falls
    /// back to the winner's row. The pair row outlives member removal and
    /// deactivation: requesting the chat again reactivates it and re-adds
    /// whichever members are missing, so a pair can always direct-chat.
    pub async fn get_or_create_direct(
        &self,
        user_a: i64,
        user_b: i64,
    ) -> StoreResult<(Chat, bool)> {
        if user_a == user_b {
            return Err(StoreError::validation(
                "Cannot open a direct chat with yourself",
            ));
        }

        let key = direct_key(user_a, user_b);

        if let Some(chat) = self.find_by_direct_key(&key).await? {
            let restored = self.restore_direct_pair(&chat, user_a, user_b).await?;
            let chat = self
                .find_by_public_id(&chat.public_id)
                .await?
                .ok_or_else(|| StoreError::chat_not_found(&chat.public_id))?;
            return Ok((chat, restored));
        }

        let public_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO chats (public_id, chat_type, direct_key, created_by, is_active, message_count, created_at, updated_at)
            VALUES (?, 'direct', ?, ?, 1, 0, ?, ?)
            "#,
        )
        .bind(&public_id)
        .bind(&key)
        .bind(user_a)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await;

        let chat_db_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                // Lost the race; the other creator's chat is authoritative.
                drop(tx);
                let chat = self
                    .find_by_direct_key(&key)
                    .await?
                    .ok_or_else(|| StoreError::chat_not_found(&key))?;
                let restored = self.restore_direct_pair(&chat, user_a, user_b).await?;
                let chat = self
                    .find_by_public_id(&chat.public_id)
                    .await?
                    .ok_or_else(|| StoreError::chat_not_found(&chat.public_id))?;
                return Ok((chat, restored));
            }
            Err(err) => return Err(err.into()),
        };

        for user_id in [user_a, user_b] {
            sqlx::query(
                "INSERT INTO chat_members (chat_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
            )
            .bind(chat_db_id)
            .bind(user_id)
            .bind(String::from(MemberRole::Member))
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(chat = %public_id, user_a, user_b, "created direct chat");

        let chat = self
            .find_by_public_id(&public_id)
            .await?
            .ok_or_else(|| StoreError::chat_not_found(&public_id))?;
        Ok((chat, true))
    }

    /// Create a group or item-linked chat with the creator as admin
    pub async fn create_group(&self, created_by: i64, request: NewGroupChat) -> StoreResult<Chat> {
        request.validate().map_err(StoreError::validation)?;

        let public_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let chat_db_id = sqlx::query(
            r#"
            INSERT INTO chats (public_id, chat_type, name, description, item_id, item_type, created_by, is_active, message_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, 0, ?, ?)
            "#,
        )
        .bind(&public_id)
        .bind(String::from(request.chat_type))
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.item_id)
        .bind(&request.item_type)
        .bind(created_by)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO chat_members (chat_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
        )
        .bind(chat_db_id)
        .bind(created_by)
        .bind(String::from(MemberRole::Admin))
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for user_id in request.member_ids.iter().filter(|id| **id != created_by) {
            sqlx::query(
                "INSERT OR IGNORE INTO chat_members (chat_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
            )
            .bind(chat_db_id)
            .bind(user_id)
            .bind(String::from(MemberRole::Member))
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(chat = %public_id, created_by, "created group chat");

        self.find_by_public_id(&public_id)
            .await?
            .ok_or_else(|| StoreError::chat_not_found(&public_id))
    }

    /// Soft-deactivate a chat; history is retained
    pub async fn deactivate(&self, chat_db_id: i64) -> StoreResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("UPDATE chats SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(chat_db_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The pair row, active or not; reactivation is the caller's concern.
    async fn find_by_direct_key(&self, key: &str) -> StoreResult<Option<Chat>> {
        let chat = sqlx::query_as::<_, Chat>(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE direct_key = ?"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(chat)
    }

    /// Reactivate a deactivated pair chat and re-add missing members.
    ///
    /// Returns true when anything had to be restored.
    async fn restore_direct_pair(
        &self,
        chat: &Chat,
        user_a: i64,
        user_b: i64,
    ) -> StoreResult<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let mut restored = false;

        if !chat.is_active {
            sqlx::query("UPDATE chats SET is_active = 1, updated_at = ? WHERE id = ?")
                .bind(&now)
                .bind(chat.id)
                .execute(&mut *tx)
                .await?;
            restored = true;
        }

        for user_id in [user_a, user_b] {
            let added = sqlx::query(
                "INSERT OR IGNORE INTO chat_members (chat_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
            )
            .bind(chat.id)
            .bind(user_id)
            .bind(String::from(MemberRole::Member))
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            if added.rows_affected() > 0 {
                restored = true;
            }
        }

        tx.commit().await?;

        if restored {
            info!(chat = %chat.public_id, user_a, user_b, "restored direct chat");
        }
        Ok(restored)
    }
}
