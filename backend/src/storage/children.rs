use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::domain::models::{Child, Group};

/// Repository for groups, children and the parent link table.
#[derive(Clone)]
pub struct ChildRepository {
    pool: SqlitePool,
}

impl ChildRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_group(&self, name: &str, teachers_info: &str) -> sqlx::Result<Group> {
        let result = sqlx::query("INSERT INTO groups (name, teachers_info) VALUES (?, ?)")
            .bind(name)
            .bind(teachers_info)
            .execute(&self.pool)
            .await?;
        self.get_group(result.last_insert_rowid()).await
    }

    pub async fn get_group(&self, id: i64) -> sqlx::Result<Group> {
        sqlx::query_as("SELECT * FROM groups WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn find_group(&self, id: i64) -> sqlx::Result<Option<Group>> {
        sqlx::query_as("SELECT * FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_groups(&self) -> sqlx::Result<Vec<Group>> {
        sqlx::query_as("SELECT * FROM groups ORDER BY name")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn update_group(&self, group: &Group) -> sqlx::Result<()> {
        sqlx::query("UPDATE groups SET name = ?, teachers_info = ? WHERE id = ?")
            .bind(&group.name)
            .bind(&group.teachers_info)
            .bind(group.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_group(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn group_child_count(&self, group_id: i64) -> sqlx::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM children WHERE group_id = ?")
            .bind(group_id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn create_child(
        &self,
        first_name: &str,
        last_name: &str,
        date_of_birth: NaiveDate,
        group_id: i64,
        meal_rate: f64,
        medical_info: &str,
    ) -> sqlx::Result<Child> {
        let result = sqlx::query(
            "INSERT INTO children (first_name, last_name, date_of_birth, group_id, meal_rate, medical_info) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(date_of_birth)
        .bind(group_id)
        .bind(meal_rate)
        .bind(medical_info)
        .execute(&self.pool)
        .await?;
        self.get_child(result.last_insert_rowid()).await
    }

    pub async fn get_child(&self, id: i64) -> sqlx::Result<Child> {
        sqlx::query_as("SELECT * FROM children WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn find_child(&self, id: i64) -> sqlx::Result<Option<Child>> {
        sqlx::query_as("SELECT * FROM children WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn update_child(&self, child: &Child) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE children SET first_name = ?, last_name = ?, date_of_birth = ?, \
             group_id = ?, meal_rate = ?, medical_info = ? WHERE id = ?",
        )
        .bind(&child.first_name)
        .bind(&child.last_name)
        .bind(child.date_of_birth)
        .bind(child.group_id)
        .bind(child.meal_rate)
        .bind(&child.medical_info)
        .bind(child.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_child(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM children WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_children(&self) -> sqlx::Result<Vec<Child>> {
        sqlx::query_as("SELECT * FROM children ORDER BY last_name, first_name")
            .fetch_all(&self.pool)
            .await
    }

    /// Children linked to the given parent account.
    pub async fn children_of_parent(&self, user_id: i64) -> sqlx::Result<Vec<Child>> {
        sqlx::query_as(
            "SELECT c.* FROM children c \
             JOIN child_parents cp ON cp.child_id = c.id \
             WHERE cp.user_id = ? ORDER BY c.last_name, c.first_name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Distinct group ids of the parent's children; drives group-scoped
    /// content visibility.
    pub async fn group_ids_of_parent(&self, user_id: i64) -> sqlx::Result<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT DISTINCT c.group_id FROM children c \
             JOIN child_parents cp ON cp.child_id = c.id WHERE cp.user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn parent_ids_of_child(&self, child_id: i64) -> sqlx::Result<Vec<i64>> {
        sqlx::query_scalar("SELECT user_id FROM child_parents WHERE child_id = ? ORDER BY user_id")
            .bind(child_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn is_parent_of(&self, user_id: i64, child_id: i64) -> sqlx::Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM child_parents WHERE user_id = ? AND child_id = ?",
        )
        .bind(user_id)
        .bind(child_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn link_parent(&self, child_id: i64, user_id: i64) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO child_parents (child_id, user_id) VALUES (?, ?)")
            .bind(child_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn unlink_parent(&self, child_id: i64, user_id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM child_parents WHERE child_id = ? AND user_id = ?")
            .bind(child_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn child_count(&self) -> sqlx::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM children")
            .fetch_one(&self.pool)
            .await
    }
}
