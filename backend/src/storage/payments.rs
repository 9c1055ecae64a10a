use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::domain::models::{Frequency, Payment, RecurringPayment};

/// Repository for one-off payments and recurring templates.
#[derive(Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        child_id: i64,
        amount: f64,
        description: &str,
        payment_title: &str,
        meal_period: Option<&str>,
    ) -> sqlx::Result<Payment> {
        let result = sqlx::query(
            "INSERT INTO payments (child_id, amount, description, payment_title, meal_period, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(child_id)
        .bind(amount)
        .bind(description)
        .bind(payment_title)
        .bind(meal_period)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> sqlx::Result<Payment> {
        sqlx::query_as("SELECT * FROM payments WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn find(&self, id: i64) -> sqlx::Result<Option<Payment>> {
        sqlx::query_as("SELECT * FROM payments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_all(&self) -> sqlx::Result<Vec<Payment>> {
        sqlx::query_as("SELECT * FROM payments ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn list_for_parent(&self, user_id: i64) -> sqlx::Result<Vec<Payment>> {
        sqlx::query_as(
            "SELECT p.* FROM payments p \
             JOIN child_parents cp ON cp.child_id = p.child_id \
             WHERE cp.user_id = ? ORDER BY p.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Payments created in the month that contains `month_start`. Feeds the
    /// title ordinal: count-then-format.
    pub async fn count_created_in_month(
        &self,
        month_start: NaiveDate,
        next_month_start: NaiveDate,
    ) -> sqlx::Result<i64> {
        // created_at is stored as ISO text, so a date-prefix range compare
        // is correct.
        sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE created_at >= ? AND created_at < ?")
            .bind(month_start.to_string())
            .bind(next_month_start.to_string())
            .fetch_one(&self.pool)
            .await
    }

    /// Has this child already been billed for the given `YYYY-MM` meal
    /// period?
    pub async fn meal_period_billed(&self, child_id: i64, period: &str) -> sqlx::Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payments WHERE child_id = ? AND meal_period = ?",
        )
        .bind(child_id)
        .bind(period)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn update_amount_description(
        &self,
        id: i64,
        amount: f64,
        description: &str,
    ) -> sqlx::Result<()> {
        sqlx::query("UPDATE payments SET amount = ?, description = ? WHERE id = ?")
            .bind(amount)
            .bind(description)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Set or clear the paid state; `payment_date` moves with `is_paid` so
    /// the pair can never disagree.
    pub async fn set_paid(
        &self,
        id: i64,
        paid: bool,
        payment_date: Option<DateTime<Utc>>,
    ) -> sqlx::Result<()> {
        sqlx::query("UPDATE payments SET is_paid = ?, payment_date = ? WHERE id = ?")
            .bind(paid)
            .bind(payment_date)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM payments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_template(
        &self,
        child_id: i64,
        amount: f64,
        description: &str,
        frequency: Frequency,
        next_due: NaiveDate,
        is_active: bool,
    ) -> sqlx::Result<RecurringPayment> {
        let result = sqlx::query(
            "INSERT INTO recurring_payments (child_id, amount, description, frequency, next_due, is_active) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(child_id)
        .bind(amount)
        .bind(description)
        .bind(frequency)
        .bind(next_due)
        .bind(is_active)
        .execute(&self.pool)
        .await?;
        self.get_template(result.last_insert_rowid()).await
    }

    pub async fn get_template(&self, id: i64) -> sqlx::Result<RecurringPayment> {
        sqlx::query_as("SELECT * FROM recurring_payments WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn update_template(&self, template: &RecurringPayment) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE recurring_payments SET child_id = ?, amount = ?, description = ?, \
             frequency = ?, next_due = ?, is_active = ? WHERE id = ?",
        )
        .bind(template.child_id)
        .bind(template.amount)
        .bind(&template.description)
        .bind(template.frequency)
        .bind(template.next_due)
        .bind(template.is_active)
        .bind(template.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_template(&self, id: i64) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM recurring_payments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_templates(&self) -> sqlx::Result<Vec<RecurringPayment>> {
        sqlx::query_as("SELECT * FROM recurring_payments ORDER BY next_due")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn list_templates_for_parent(
        &self,
        user_id: i64,
    ) -> sqlx::Result<Vec<RecurringPayment>> {
        sqlx::query_as(
            "SELECT r.* FROM recurring_payments r \
             JOIN child_parents cp ON cp.child_id = r.child_id \
             WHERE cp.user_id = ? ORDER BY r.next_due",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Active templates whose due date has arrived.
    pub async fn due_templates(&self, today: NaiveDate) -> sqlx::Result<Vec<RecurringPayment>> {
        sqlx::query_as(
            "SELECT * FROM recurring_payments WHERE is_active = 1 AND next_due <= ? ORDER BY id",
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await
    }

    /// Spawn a concrete payment from a template and advance its due date,
    /// atomically. A failure between the two writes would double-bill on the
    /// next run, so both happen in one transaction.
    pub async fn spawn_from_template(
        &self,
        template: &RecurringPayment,
        payment_title: &str,
        next_due: NaiveDate,
    ) -> sqlx::Result<Payment> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO payments (child_id, amount, description, payment_title, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(template.child_id)
        .bind(template.amount)
        .bind(&template.description)
        .bind(payment_title)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        let payment_id = result.last_insert_rowid();

        sqlx::query("UPDATE recurring_payments SET next_due = ? WHERE id = ?")
            .bind(next_due)
            .bind(template.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get(payment_id).await
    }
}
