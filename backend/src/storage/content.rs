use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::domain::models::{
    DailyMenu, GalleryImage, GalleryItem, Post, PostComment, SpecialActivity,
};
use crate::domain::visibility::ContentScope;

/// Repository for group-scoped content: posts, comments, likes, gallery
/// albums, special activities and daily menus.
#[derive(Clone)]
pub struct ContentRepository {
    pool: SqlitePool,
}

impl ContentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn scoped_query<'a>(
        base: &str,
        scope: &'a ContentScope,
        order: &str,
    ) -> Option<QueryBuilder<'a, Sqlite>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(base);
        match scope {
            ContentScope::All => {}
            ContentScope::GlobalOnly => {
                qb.push(" WHERE target_group_id IS NULL");
            }
            ContentScope::GroupsAndGlobal(ids) => {
                qb.push(" WHERE target_group_id IS NULL");
                if !ids.is_empty() {
                    qb.push(" OR target_group_id IN (");
                    let mut sep = qb.separated(", ");
                    for id in ids {
                        sep.push_bind(id);
                    }
                    qb.push(")");
                }
            }
            ContentScope::GroupsOnly(ids) => {
                if ids.is_empty() {
                    return None;
                }
                qb.push(" WHERE target_group_id IN (");
                let mut sep = qb.separated(", ");
                for id in ids {
                    sep.push_bind(id);
                }
                qb.push(")");
            }
        }
        qb.push(order);
        Some(qb)
    }

    // --- posts ---

    pub async fn create_post(
        &self,
        title: &str,
        content: &str,
        image: Option<&str>,
        target_group_id: Option<i64>,
    ) -> sqlx::Result<Post> {
        let result = sqlx::query(
            "INSERT INTO posts (title, content, image, target_group_id, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(title)
        .bind(content)
        .bind(image)
        .bind(target_group_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        self.get_post(result.last_insert_rowid()).await
    }

    pub async fn get_post(&self, id: i64) -> sqlx::Result<Post> {
        sqlx::query_as("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn find_post(&self, id: i64) -> sqlx::Result<Option<Post>> {
        sqlx::query_as("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_posts(&self, scope: &ContentScope) -> sqlx::Result<Vec<Post>> {
        let Some(mut qb) =
            Self::scoped_query("SELECT * FROM posts", scope, " ORDER BY created_at DESC")
        else {
            return Ok(Vec::new());
        };
        qb.build_query_as().fetch_all(&self.pool).await
    }

    pub async fn update_post(&self, post: &Post) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE posts SET title = ?, content = ?, image = ?, target_group_id = ? WHERE id = ?",
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.image)
        .bind(post.target_group_id)
        .bind(post.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_post(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- comments ---

    pub async fn create_comment(
        &self,
        post_id: i64,
        author_id: i64,
        content: &str,
    ) -> sqlx::Result<PostComment> {
        let result = sqlx::query(
            "INSERT INTO post_comments (post_id, author_id, content, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(content)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        sqlx::query_as("SELECT * FROM post_comments WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
    }

    pub async fn find_comment(&self, id: i64) -> sqlx::Result<Option<PostComment>> {
        sqlx::query_as("SELECT * FROM post_comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn comments_of_post(&self, post_id: i64) -> sqlx::Result<Vec<PostComment>> {
        sqlx::query_as("SELECT * FROM post_comments WHERE post_id = ? ORDER BY created_at")
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
    }

    // --- likes (toggle semantics) ---

    pub async fn toggle_post_like(&self, post_id: i64, user_id: i64) -> sqlx::Result<(bool, i64)> {
        self.toggle_like("post_likes", "post_id", post_id, user_id).await
    }

    pub async fn toggle_comment_like(
        &self,
        comment_id: i64,
        user_id: i64,
    ) -> sqlx::Result<(bool, i64)> {
        self.toggle_like("comment_likes", "comment_id", comment_id, user_id)
            .await
    }

    pub async fn toggle_gallery_like(
        &self,
        gallery_item_id: i64,
        user_id: i64,
    ) -> sqlx::Result<(bool, i64)> {
        self.toggle_like("gallery_likes", "gallery_item_id", gallery_item_id, user_id)
            .await
    }

    async fn toggle_like(
        &self,
        table: &str,
        key_column: &str,
        entity_id: i64,
        user_id: i64,
    ) -> sqlx::Result<(bool, i64)> {
        let deleted = sqlx::query(&format!(
            "DELETE FROM {table} WHERE {key_column} = ? AND user_id = ?"
        ))
        .bind(entity_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let liked = if deleted == 0 {
            sqlx::query(&format!(
                "INSERT INTO {table} ({key_column}, user_id) VALUES (?, ?)"
            ))
            .bind(entity_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
            true
        } else {
            false
        };

        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE {key_column} = ?"))
                .bind(entity_id)
                .fetch_one(&self.pool)
                .await?;
        Ok((liked, count))
    }

    pub async fn post_like_state(&self, post_id: i64, user_id: i64) -> sqlx::Result<(bool, i64)> {
        self.like_state("post_likes", "post_id", post_id, user_id).await
    }

    pub async fn comment_like_state(
        &self,
        comment_id: i64,
        user_id: i64,
    ) -> sqlx::Result<(bool, i64)> {
        self.like_state("comment_likes", "comment_id", comment_id, user_id)
            .await
    }

    pub async fn gallery_like_state(
        &self,
        gallery_item_id: i64,
        user_id: i64,
    ) -> sqlx::Result<(bool, i64)> {
        self.like_state("gallery_likes", "gallery_item_id", gallery_item_id, user_id)
            .await
    }

    async fn like_state(
        &self,
        table: &str,
        key_column: &str,
        entity_id: i64,
        user_id: i64,
    ) -> sqlx::Result<(bool, i64)> {
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE {key_column} = ?"))
                .bind(entity_id)
                .fetch_one(&self.pool)
                .await?;
        let mine: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} WHERE {key_column} = ? AND user_id = ?"
        ))
        .bind(entity_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((mine > 0, count))
    }

    // --- gallery ---

    pub async fn create_gallery_item(
        &self,
        title: &str,
        description: &str,
        target_group_id: Option<i64>,
    ) -> sqlx::Result<GalleryItem> {
        let result = sqlx::query(
            "INSERT INTO gallery_items (title, description, target_group_id, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(title)
        .bind(description)
        .bind(target_group_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        self.get_gallery_item(result.last_insert_rowid()).await
    }

    pub async fn get_gallery_item(&self, id: i64) -> sqlx::Result<GalleryItem> {
        sqlx::query_as("SELECT * FROM gallery_items WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn find_gallery_item(&self, id: i64) -> sqlx::Result<Option<GalleryItem>> {
        sqlx::query_as("SELECT * FROM gallery_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn update_gallery_item(&self, item: &GalleryItem) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE gallery_items SET title = ?, description = ?, target_group_id = ? WHERE id = ?",
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.target_group_id)
        .bind(item.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_gallery_items(&self, scope: &ContentScope) -> sqlx::Result<Vec<GalleryItem>> {
        let Some(mut qb) = Self::scoped_query(
            "SELECT * FROM gallery_items",
            scope,
            " ORDER BY created_at DESC",
        ) else {
            return Ok(Vec::new());
        };
        qb.build_query_as().fetch_all(&self.pool).await
    }

    pub async fn delete_gallery_item(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM gallery_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn add_gallery_image(
        &self,
        gallery_item_id: i64,
        path: &str,
    ) -> sqlx::Result<GalleryImage> {
        let result =
            sqlx::query("INSERT INTO gallery_images (gallery_item_id, path) VALUES (?, ?)")
                .bind(gallery_item_id)
                .bind(path)
                .execute(&self.pool)
                .await?;
        sqlx::query_as("SELECT * FROM gallery_images WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
    }

    pub async fn images_of_gallery_item(
        &self,
        gallery_item_id: i64,
    ) -> sqlx::Result<Vec<GalleryImage>> {
        sqlx::query_as("SELECT * FROM gallery_images WHERE gallery_item_id = ? ORDER BY id")
            .bind(gallery_item_id)
            .fetch_all(&self.pool)
            .await
    }

    /// Delete the listed images of an album, returning the removed blob
    /// paths so the caller can clean up the external store.
    pub async fn delete_gallery_images(
        &self,
        gallery_item_id: i64,
        image_ids: &[i64],
    ) -> sqlx::Result<Vec<String>> {
        let mut removed = Vec::new();
        for image_id in image_ids {
            let path: Option<String> = sqlx::query_scalar(
                "SELECT path FROM gallery_images WHERE id = ? AND gallery_item_id = ?",
            )
            .bind(image_id)
            .bind(gallery_item_id)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(path) = path {
                sqlx::query("DELETE FROM gallery_images WHERE id = ?")
                    .bind(image_id)
                    .execute(&self.pool)
                    .await?;
                removed.push(path);
            }
        }
        Ok(removed)
    }

    // --- special activities ---

    pub async fn create_activity(
        &self,
        name: &str,
        description: &str,
        schedule: &str,
        group_ids: &[i64],
    ) -> sqlx::Result<SpecialActivity> {
        let result = sqlx::query(
            "INSERT INTO special_activities (name, description, schedule) VALUES (?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(schedule)
        .execute(&self.pool)
        .await?;
        let id = result.last_insert_rowid();
        self.set_activity_groups(id, group_ids).await?;
        self.get_activity(id).await
    }

    pub async fn get_activity(&self, id: i64) -> sqlx::Result<SpecialActivity> {
        sqlx::query_as("SELECT * FROM special_activities WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn find_activity(&self, id: i64) -> sqlx::Result<Option<SpecialActivity>> {
        sqlx::query_as("SELECT * FROM special_activities WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn update_activity(
        &self,
        activity: &SpecialActivity,
        group_ids: &[i64],
    ) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE special_activities SET name = ?, description = ?, schedule = ? WHERE id = ?",
        )
        .bind(&activity.name)
        .bind(&activity.description)
        .bind(&activity.schedule)
        .bind(activity.id)
        .execute(&self.pool)
        .await?;
        self.set_activity_groups(activity.id, group_ids).await
    }

    async fn set_activity_groups(&self, activity_id: i64, group_ids: &[i64]) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM activity_groups WHERE activity_id = ?")
            .bind(activity_id)
            .execute(&self.pool)
            .await?;
        for group_id in group_ids {
            sqlx::query("INSERT INTO activity_groups (activity_id, group_id) VALUES (?, ?)")
                .bind(activity_id)
                .bind(group_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn groups_of_activity(&self, activity_id: i64) -> sqlx::Result<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT group_id FROM activity_groups WHERE activity_id = ? ORDER BY group_id",
        )
        .bind(activity_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn list_activities(&self) -> sqlx::Result<Vec<SpecialActivity>> {
        sqlx::query_as("SELECT * FROM special_activities ORDER BY name")
            .fetch_all(&self.pool)
            .await
    }

    /// Activities attached to any of the given groups, deduplicated.
    pub async fn list_activities_for_groups(
        &self,
        group_ids: &[i64],
    ) -> sqlx::Result<Vec<SpecialActivity>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT DISTINCT a.* FROM special_activities a \
             JOIN activity_groups ag ON ag.activity_id = a.id WHERE ag.group_id IN (",
        );
        let mut sep = qb.separated(", ");
        for id in group_ids {
            sep.push_bind(id);
        }
        qb.push(") ORDER BY a.name");
        qb.build_query_as().fetch_all(&self.pool).await
    }

    pub async fn delete_activity(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM special_activities WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- daily menus ---

    pub async fn upsert_menu(
        &self,
        date: NaiveDate,
        breakfast: &str,
        lunch: &str,
        snack: &str,
    ) -> sqlx::Result<DailyMenu> {
        sqlx::query(
            "INSERT INTO daily_menus (date, breakfast, lunch, snack) VALUES (?, ?, ?, ?) \
             ON CONFLICT(date) DO UPDATE SET breakfast = excluded.breakfast, \
             lunch = excluded.lunch, snack = excluded.snack",
        )
        .bind(date)
        .bind(breakfast)
        .bind(lunch)
        .bind(snack)
        .execute(&self.pool)
        .await?;
        sqlx::query_as("SELECT * FROM daily_menus WHERE date = ?")
            .bind(date)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn list_menus(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> sqlx::Result<Vec<DailyMenu>> {
        match (start, end) {
            (Some(start), Some(end)) => {
                sqlx::query_as(
                    "SELECT * FROM daily_menus WHERE date >= ? AND date <= ? ORDER BY date DESC",
                )
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await
            }
            _ => {
                sqlx::query_as("SELECT * FROM daily_menus ORDER BY date DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
    }

    pub async fn delete_menu(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM daily_menus WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
