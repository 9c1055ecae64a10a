use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::domain::models::{Attendance, FacilityClosure};

/// Repository for absence reports and facility closures.
#[derive(Clone)]
pub struct AttendanceRepository {
    pool: SqlitePool,
}

impl AttendanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an absence report. The (child, date) unique constraint rejects
    /// a second report for the same day.
    pub async fn create(&self, child_id: i64, date: NaiveDate) -> sqlx::Result<Attendance> {
        let result = sqlx::query("INSERT INTO attendance (child_id, date) VALUES (?, ?)")
            .bind(child_id)
            .bind(date)
            .execute(&self.pool)
            .await?;
        sqlx::query_as("SELECT * FROM attendance WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
    }

    pub async fn list_all(&self) -> sqlx::Result<Vec<Attendance>> {
        sqlx::query_as("SELECT * FROM attendance ORDER BY date DESC")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn list_for_parent(&self, user_id: i64) -> sqlx::Result<Vec<Attendance>> {
        sqlx::query_as(
            "SELECT a.* FROM attendance a \
             JOIN child_parents cp ON cp.child_id = a.child_id \
             WHERE cp.user_id = ? ORDER BY a.date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Reported absences for one child within [start, end].
    pub async fn count_absences(
        &self,
        child_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> sqlx::Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance WHERE child_id = ? AND date >= ? AND date <= ?",
        )
        .bind(child_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn count_absent_on(&self, date: NaiveDate) -> sqlx::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE date = ?")
            .bind(date)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn create_closure(
        &self,
        date: NaiveDate,
        label: &str,
    ) -> sqlx::Result<FacilityClosure> {
        let result = sqlx::query("INSERT INTO facility_closures (date, label) VALUES (?, ?)")
            .bind(date)
            .bind(label)
            .execute(&self.pool)
            .await?;
        sqlx::query_as("SELECT * FROM facility_closures WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await
    }

    pub async fn list_closures(&self) -> sqlx::Result<Vec<FacilityClosure>> {
        sqlx::query_as("SELECT * FROM facility_closures ORDER BY date")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn closures_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> sqlx::Result<Vec<NaiveDate>> {
        sqlx::query_scalar("SELECT date FROM facility_closures WHERE date >= ? AND date <= ?")
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn delete_closure(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM facility_closures WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
