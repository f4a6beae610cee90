//! Repository for message persistence operations.

use crate::entities::{ChatMessage, MessageAttachment, MessageReaction, NewMessage, ReadReceipt};
use crate::errors::{StoreError, StoreResult};
use sqlx::SqlitePool;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "m.id, m.public_id, m.chat_id, m.sender_id, m.content, m.message_type, \
     (SELECT r.public_id FROM messages r WHERE r.id = m.reply_to_id) AS reply_to, \
     m.is_edited, m.edited_at, m.original_content, m.is_deleted, m.deleted_at, m.deleted_by, \
     m.created_at, m.updated_at";

/// Repository for message database operations
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a new message and bump the owning chat's counters.
    ///
    /// The insert and the `message_count`/`last_message_at` update share one
    /// transaction so the counter can never drift from the message table.
    pub async fn create(
        &self,
        chat_db_id: i64,
        sender_id: i64,
        request: NewMessage,
    ) -> StoreResult<ChatMessage> {
        request.validate().map_err(StoreError::validation)?;

        let public_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        // Resolve reply target inside the same chat only
        let reply_to_db_id = if let Some(reply_public_id) = &request.reply_to {
            let id: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM messages WHERE public_id = ? AND chat_id = ? AND is_deleted = 0",
            )
            .bind(reply_public_id)
            .bind(chat_db_id)
            .fetch_optional(&self.pool)
            .await?;
            Some(id.ok_or_else(|| StoreError::message_not_found(reply_public_id))?)
        } else {
            None
        };

        let message_type = request
            .message_type
            .clone()
            .unwrap_or_else(|| "text".to_string());

        let mut tx = self.pool.begin().await?;

        let message_db_id = sqlx::query(
            r#"
            INSERT INTO messages (public_id, chat_id, sender_id, content, message_type, reply_to_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&public_id)
        .bind(chat_db_id)
        .bind(sender_id)
        .bind(&request.content)
        .bind(&message_type)
        .bind(reply_to_db_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for attachment in &request.attachments {
            sqlx::query(
                "INSERT INTO message_attachments (message_id, url, file_name, file_type, file_size) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(message_db_id)
            .bind(&attachment.url)
            .bind(&attachment.file_name)
            .bind(&attachment.file_type)
            .bind(attachment.file_size)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE chats SET message_count = message_count + 1, last_message_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(chat_db_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_by_db_id(message_db_id)
            .await?
            .ok_or_else(|| StoreError::message_not_found(&public_id))
    }

    /// Look up a live (non-deleted) message by public ID
    pub async fn find_by_public_id(&self, public_id: &str) -> StoreResult<Option<ChatMessage>> {
        let message = sqlx::query_as::<_, ChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.public_id = ? AND m.is_deleted = 0"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        match message {
            Some(message) => Ok(Some(self.hydrate_attachments(message).await?)),
            None => Ok(None),
        }
    }

    /// Recent history for a chat, ascending by persistence order,
    /// soft-deleted messages excluded
    pub async fn list_for_chat(&self, chat_db_id: i64, limit: i64) -> StoreResult<Vec<ChatMessage>> {
        let mut messages = sqlx::query_as::<_, ChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM ( \
                SELECT * FROM messages WHERE chat_id = ? AND is_deleted = 0 \
                ORDER BY id DESC LIMIT ? \
             ) m ORDER BY m.id ASC"
        ))
        .bind(chat_db_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let attachments = sqlx::query_as::<_, MessageAttachment>(
            "SELECT a.id, a.message_id, a.url, a.file_name, a.file_type, a.file_size \
             FROM message_attachments a \
             JOIN messages m ON a.message_id = m.id \
             WHERE m.chat_id = ?",
        )
        .bind(chat_db_id)
        .fetch_all(&self.pool)
        .await?;

        for message in &mut messages {
            message.attachments = attachments
                .iter()
                .filter(|a| a.message_id == message.id)
                .cloned()
                .collect();
        }

        Ok(messages)
    }

    /// Apply an edit, keeping the pre-edit content from the first edit only
    pub async fn edit(&self, message_db_id: i64, new_content: &str) -> StoreResult<ChatMessage> {
        if new_content.trim().is_empty() {
            return Err(StoreError::validation("Edited message cannot be empty"));
        }

        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE messages
            SET original_content = COALESCE(original_content, content),
                content = ?, is_edited = 1, edited_at = ?, updated_at = ?
            WHERE id = ? AND is_deleted = 0
            "#,
        )
        .bind(new_content)
        .bind(&now)
        .bind(&now)
        .bind(message_db_id)
        .execute(&self.pool)
        .await?;

        self.find_by_db_id(message_db_id)
            .await?
            .ok_or_else(|| StoreError::message_not_found(message_db_id.to_string()))
    }

    /// Soft-delete; the row stays for audit but drops out of history
    pub async fn soft_delete(&self, message_db_id: i64, deleted_by: i64) -> StoreResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE messages SET is_deleted = 1, deleted_at = ?, deleted_by = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(deleted_by)
        .bind(&now)
        .bind(message_db_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Toggle a user's reaction.
    ///
    /// Same emoji again removes it (returns None); a different emoji
    /// replaces the previous one.
    pub async fn toggle_reaction(
        &self,
        message_db_id: i64,
        user_id: i64,
        reaction: &str,
    ) -> StoreResult<Option<MessageReaction>> {
        let existing: Option<String> = sqlx::query_scalar(
            "SELECT reaction FROM message_reactions WHERE message_id = ? AND user_id = ?",
        )
        .bind(message_db_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let now = chrono::Utc::now().to_rfc3339();

        match existing {
            Some(previous) if previous == reaction => {
                sqlx::query(
                    "DELETE FROM message_reactions WHERE message_id = ? AND user_id = ?",
                )
                .bind(message_db_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
                Ok(None)
            }
            Some(_) => {
                sqlx::query(
                    "UPDATE message_reactions SET reaction = ?, reacted_at = ? WHERE message_id = ? AND user_id = ?",
                )
                .bind(reaction)
                .bind(&now)
                .bind(message_db_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
                Ok(Some(MessageReaction {
                    message_id: message_db_id,
                    user_id,
                    reaction: reaction.to_string(),
                    reacted_at: now,
                }))
            }
            None => {
                sqlx::query(
                    "INSERT INTO message_reactions (message_id, user_id, reaction, reacted_at) VALUES (?, ?, ?, ?)",
                )
                .bind(message_db_id)
                .bind(user_id)
                .bind(reaction)
                .bind(&now)
                .execute(&self.pool)
                .await?;
                Ok(Some(MessageReaction {
                    message_id: message_db_id,
                    user_id,
                    reaction: reaction.to_string(),
                    reacted_at: now,
                }))
            }
        }
    }

    /// Record a read marker; repeated marks are ignored.
    ///
    /// Returns true if this call inserted the marker.
    pub async fn mark_read(&self, message_db_id: i64, user_id: i64) -> StoreResult<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at) VALUES (?, ?, ?)",
        )
        .bind(message_db_id)
        .bind(user_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All read markers on a message, oldest first
    pub async fn read_receipts(&self, message_db_id: i64) -> StoreResult<Vec<ReadReceipt>> {
        let receipts = sqlx::query_as::<_, ReadReceipt>(
            "SELECT message_id, user_id, read_at FROM message_reads WHERE message_id = ? ORDER BY read_at ASC",
        )
        .bind(message_db_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(receipts)
    }

    async fn find_by_db_id(&self, message_db_id: i64) -> StoreResult<Option<ChatMessage>> {
        let message = sqlx::query_as::<_, ChatMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?"
        ))
        .bind(message_db_id)
        .fetch_optional(&self.pool)
        .await?;

        match message {
            Some(message) => Ok(Some(self.hydrate_attachments(message).await?)),
            None => Ok(None),
        }
    }

    async fn hydrate_attachments(&self, mut message: ChatMessage) -> StoreResult<ChatMessage> {
        message.attachments = sqlx::query_as::<_, MessageAttachment>(
            "SELECT id, message_id, url, file_name, file_type, file_size \
             FROM message_attachments WHERE message_id = ?",
        )
        .bind(message.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(message)
    }
}
