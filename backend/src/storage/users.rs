use chrono::Utc;
use log::debug;
use sqlx::SqlitePool;

use crate::domain::models::{Role, User};

/// Repository for user accounts and their auth/reset tokens.
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        username: &str,
        role: Role,
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: Option<&str>,
        password_hash: &str,
    ) -> sqlx::Result<User> {
        let result = sqlx::query(
            "INSERT INTO users (username, role, first_name, last_name, email, phone, password_hash, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(role)
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(phone)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> sqlx::Result<User> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn find(&self, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_username(&self, username: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE email = ? LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn username_exists(&self, username: &str) -> sqlx::Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn list(&self) -> sqlx::Result<Vec<User>> {
        sqlx::query_as("SELECT * FROM users ORDER BY last_name, first_name, username")
            .fetch_all(&self.pool)
            .await
    }

    /// The canonical addressee for parent mail: the first director by stable
    /// username ordering. Which director is immaterial, visibility is
    /// role-based downstream.
    pub async fn first_director(&self) -> sqlx::Result<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE role = 'director' ORDER BY username LIMIT 1")
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn director_ids(&self) -> sqlx::Result<Vec<i64>> {
        sqlx::query_scalar("SELECT id FROM users WHERE role = 'director'")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn update_password(&self, user_id: i64, password_hash: &str) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_avatar(&self, user_id: i64, avatar: Option<&str>) -> sqlx::Result<()> {
        sqlx::query("UPDATE users SET avatar = ? WHERE id = ?")
            .bind(avatar)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_token(&self, token: &str, user_id: i64) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO auth_tokens (token, user_id, created_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_token(&self, token: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as(
            "SELECT u.* FROM users u JOIN auth_tokens t ON t.user_id = u.id WHERE t.token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete one bearer token. Returns false when the token was unknown.
    pub async fn delete_token(&self, token: &str) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        debug!("deleted {} auth token(s)", result.rows_affected());
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_reset_token(&self, token: &str, user_id: i64) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (token, user_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up and burn a reset token in one step.
    pub async fn consume_reset_token(&self, token: &str) -> sqlx::Result<Option<i64>> {
        let user_id: Option<i64> =
            sqlx::query_scalar("SELECT user_id FROM password_reset_tokens WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        if user_id.is_some() {
            sqlx::query("DELETE FROM password_reset_tokens WHERE token = ?")
                .bind(token)
                .execute(&self.pool)
                .await?;
        }
        Ok(user_id)
    }
}
