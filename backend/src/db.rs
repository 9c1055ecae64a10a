use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;

/// DbConnection manages the SQLite pool and schema.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Connect to (and if necessary create) the database at `url`, then make
    /// sure the schema exists.
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;
        Self::setup_schema(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize a test database with a unique in-memory name, so every test
    /// gets its own isolated store.
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().simple().to_string();
        let db_url = format!("sqlite:file:memdb_{}?mode=memory&cache=shared", test_id);
        Self::new(&db_url).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL CHECK (role IN ('director', 'parent')),
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT '',
                phone TEXT,
                avatar TEXT,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS auth_tokens (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS password_reset_tokens (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                teachers_info TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS children (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                date_of_birth TEXT NOT NULL,
                group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE RESTRICT,
                meal_rate REAL NOT NULL DEFAULT 0,
                medical_info TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS child_parents (
                child_id INTEGER NOT NULL REFERENCES children(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (child_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                child_id INTEGER NOT NULL REFERENCES children(id) ON DELETE CASCADE,
                date TEXT NOT NULL,
                UNIQUE (child_id, date)
            );

            CREATE TABLE IF NOT EXISTS facility_closures (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL UNIQUE,
                label TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS payments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                child_id INTEGER NOT NULL REFERENCES children(id) ON DELETE CASCADE,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                is_paid INTEGER NOT NULL DEFAULT 0,
                payment_date TEXT,
                payment_title TEXT NOT NULL UNIQUE,
                meal_period TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (child_id, meal_period)
            );

            CREATE TABLE IF NOT EXISTS recurring_payments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                child_id INTEGER NOT NULL REFERENCES children(id) ON DELETE CASCADE,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                frequency TEXT NOT NULL CHECK (frequency IN ('weekly', 'monthly', 'yearly')),
                next_due TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                receiver_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                image TEXT,
                target_group_id INTEGER REFERENCES groups(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS post_comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS post_likes (
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (post_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS comment_likes (
                comment_id INTEGER NOT NULL REFERENCES post_comments(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (comment_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS gallery_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                target_group_id INTEGER REFERENCES groups(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS gallery_images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                gallery_item_id INTEGER NOT NULL REFERENCES gallery_items(id) ON DELETE CASCADE,
                path TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS gallery_likes (
                gallery_item_id INTEGER NOT NULL REFERENCES gallery_items(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (gallery_item_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS special_activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                schedule TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS activity_groups (
                activity_id INTEGER NOT NULL REFERENCES special_activities(id) ON DELETE CASCADE,
                group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                PRIMARY KEY (activity_id, group_id)
            );

            CREATE TABLE IF NOT EXISTS daily_menus (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL UNIQUE,
                breakfast TEXT NOT NULL DEFAULT '',
                lunch TEXT NOT NULL DEFAULT '',
                snack TEXT NOT NULL DEFAULT ''
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_creates() {
        let db = DbConnection::init_test().await.expect("init test db");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await
            .expect("query users");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_attendance_unique_per_child_and_date() {
        let db = DbConnection::init_test().await.expect("init test db");
        sqlx::query("INSERT INTO groups (name) VALUES ('Bees')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO children (first_name, last_name, date_of_birth, group_id) \
             VALUES ('Anna', 'Nowak', '2020-01-01', 1)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        sqlx::query("INSERT INTO attendance (child_id, date) VALUES (1, '2025-03-10')")
            .execute(db.pool())
            .await
            .unwrap();
        let dup = sqlx::query("INSERT INTO attendance (child_id, date) VALUES (1, '2025-03-10')")
            .execute(db.pool())
            .await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_group_delete_restricted_while_children_exist() {
        let db = DbConnection::init_test().await.expect("init test db");
        sqlx::query("INSERT INTO groups (name) VALUES ('Bees')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO children (first_name, last_name, date_of_birth, group_id) \
             VALUES ('Anna', 'Nowak', '2020-01-01', 1)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let res = sqlx::query("DELETE FROM groups WHERE id = 1")
            .execute(db.pool())
            .await;
        assert!(res.is_err(), "restrict-delete should refuse");
    }
}
