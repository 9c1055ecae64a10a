use chrono::Utc;
use sqlx::SqlitePool;

use crate::domain::models::Message;

/// Repository for messages. The shared-inbox rule lives in the queries here:
/// director visibility joins on the counterpart's role, not their identity.
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        sender_id: i64,
        receiver_id: i64,
        subject: &str,
        body: &str,
    ) -> sqlx::Result<Message> {
        let result = sqlx::query(
            "INSERT INTO messages (sender_id, receiver_id, subject, body, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(subject)
        .bind(body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        sqlx::query_as("SELECT * FROM messages WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
    }

    /// A parent's conversation: rows where they are sender or receiver.
    pub async fn list_for_user(&self, user_id: i64) -> sqlx::Result<Vec<Message>> {
        sqlx::query_as(
            "SELECT * FROM messages WHERE sender_id = ? OR receiver_id = ? \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// A director's view: own messages plus every message whose sender or
    /// receiver holds the director role, regardless of which director account
    /// is the nominal counterpart.
    pub async fn list_shared_inbox(&self, user_id: i64) -> sqlx::Result<Vec<Message>> {
        sqlx::query_as(
            "SELECT m.* FROM messages m \
             JOIN users s ON s.id = m.sender_id \
             JOIN users r ON r.id = m.receiver_id \
             WHERE m.sender_id = ?1 OR m.receiver_id = ?1 \
                OR s.role = 'director' OR r.role = 'director' \
             ORDER BY m.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn unread_count_for_receiver(&self, user_id: i64) -> sqlx::Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Unread messages addressed to the administration as a whole.
    pub async fn unread_count_shared_inbox(&self) -> sqlx::Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages m JOIN users r ON r.id = m.receiver_id \
             WHERE r.role = 'director' AND m.is_read = 0",
        )
        .fetch_one(&self.pool)
        .await
    }

    pub async fn mark_read(&self, message_id: i64) -> sqlx::Result<()> {
        sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_all_read_for_receiver(&self, user_id: i64) -> sqlx::Result<u64> {
        let result =
            sqlx::query("UPDATE messages SET is_read = 1 WHERE receiver_id = ? AND is_read = 0")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Director scoped mark-read: everything this parent sent to any
    /// director account.
    pub async fn mark_all_read_from_sender_to_directors(
        &self,
        sender_id: i64,
    ) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE is_read = 0 AND sender_id = ? \
             AND receiver_id IN (SELECT id FROM users WHERE role = 'director')",
        )
        .bind(sender_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find(&self, id: i64) -> sqlx::Result<Option<Message>> {
        sqlx::query_as("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}
