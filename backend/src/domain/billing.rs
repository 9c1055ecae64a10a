//! The billing engine: the monthly meal run and the recurring-template run.
//!
//! Both runs are safe to repeat. Meal billing keys each payment to a
//! `(child, period)` uniqueness guard, so a re-run skips already-billed
//! children instead of charging them twice. The recurring run advances each
//! template exactly one period per invocation; a template that fell behind
//! catches up over successive runs rather than flooding a family with
//! back-payments at once.

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use log::{info, warn};

use crate::domain::identity;
use crate::domain::models::{Child, User};
use crate::domain::visibility;
use crate::error::{AppError, AppResult};
use crate::storage::{AttendanceRepository, ChildRepository, PaymentRepository};

#[derive(Clone)]
pub struct BillingService {
    payments: PaymentRepository,
    children: ChildRepository,
    attendance: AttendanceRepository,
}

impl BillingService {
    pub fn new(
        payments: PaymentRepository,
        children: ChildRepository,
        attendance: AttendanceRepository,
    ) -> Self {
        Self {
            payments,
            children,
            attendance,
        }
    }

    /// Weekdays in [start, end] minus facility closures falling on weekdays.
    pub async fn business_days(&self, start: NaiveDate, end: NaiveDate) -> AppResult<u32> {
        let closures = self.attendance.closures_in_range(start, end).await?;
        let mut days = 0;
        let mut date = start;
        while date <= end {
            if is_weekday(date) && !closures.contains(&date) {
                days += 1;
            }
            date += Duration::days(1);
        }
        Ok(days)
    }

    /// Bill every child's meals for the given month.
    pub async fn run_meal_billing(
        &self,
        actor: &User,
        year: i32,
        month: u32,
    ) -> AppResult<shared::MealBillingReport> {
        visibility::ensure_director(actor)?;
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| AppError::validation("month", "not a valid month"))?;
        let (_, next_month) = identity::month_bounds(start);
        let end = next_month - Duration::days(1);
        let period = format!("{year:04}-{month:02}");

        // Title ordinals count within the month the run happens, which for a
        // typical run is not the billed month.
        let sequencing_date = Utc::now().date_naive();

        let business_days = self.business_days(start, end).await?;
        let mut report = shared::MealBillingReport {
            period: period.clone(),
            business_days,
            payments_created: 0,
            already_billed: 0,
            zero_amount: 0,
        };

        for child in self.children.list_children().await? {
            if self.payments.meal_period_billed(child.id, &period).await? {
                report.already_billed += 1;
                continue;
            }

            let absences = self.attendance.count_absences(child.id, start, end).await?;
            let billable = i64::from(business_days).saturating_sub(absences).max(0);
            let amount = billable as f64 * child.meal_rate;
            if amount == 0.0 {
                report.zero_amount += 1;
                continue;
            }

            let description = format!(
                "Meals for {}: {billable} days x {:.2}",
                start.format("%B %Y"),
                child.meal_rate
            );
            match self
                .create_with_title(&child, amount, &description, Some(&period), sequencing_date)
                .await
            {
                Ok(_) => report.payments_created += 1,
                // Lost a race with a concurrent run for the same period.
                Err(AppError::Conflict(_)) => report.already_billed += 1,
                Err(e) => return Err(e),
            }
        }

        info!(
            "meal billing for {period}: {} created, {} already billed, {} zero",
            report.payments_created, report.already_billed, report.zero_amount
        );
        Ok(report)
    }

    /// Spawn payments for every due template, advancing each by one period.
    pub async fn run_recurring_billing(
        &self,
        actor: &User,
        today: NaiveDate,
    ) -> AppResult<shared::RecurringBillingReport> {
        visibility::ensure_director(actor)?;
        let mut created = 0;

        for template in self.payments.due_templates(today).await? {
            let child = self.children.get_child(template.child_id).await?;
            let next_due = template.frequency.advance(template.next_due);
            let title = self.next_title(&child, today).await?;

            match self
                .payments
                .spawn_from_template(&template, &title, next_due)
                .await
            {
                Ok(_) => created += 1,
                Err(e) if is_unique_violation(&e) => {
                    warn!("title {title} collided, retrying template {}", template.id);
                    let title = self.next_title(&child, today).await?;
                    self.payments
                        .spawn_from_template(&template, &title, next_due)
                        .await?;
                    created += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!("recurring billing: {created} payments spawned");
        Ok(shared::RecurringBillingReport {
            payments_created: created,
        })
    }

    async fn next_title(&self, child: &Child, today: NaiveDate) -> AppResult<String> {
        let (start, next) = identity::month_bounds(today);
        let ordinal = self.payments.count_created_in_month(start, next).await? + 1;
        Ok(identity::payment_title(
            &child.first_name,
            &child.last_name,
            today,
            ordinal,
        ))
    }

    async fn create_with_title(
        &self,
        child: &Child,
        amount: f64,
        description: &str,
        meal_period: Option<&str>,
        today: NaiveDate,
    ) -> AppResult<()> {
        let title = self.next_title(child, today).await?;
        match self
            .payments
            .create(child.id, amount, description, &title, meal_period)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                let title = self.next_title(child, today).await?;
                self.payments
                    .create(child.id, amount, description, &title, meal_period)
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::domain::models::{Frequency, Role};
    use crate::storage::UserRepository;

    struct Fixture {
        db: DbConnection,
        service: BillingService,
        director: User,
        child_id: i64,
    }

    async fn setup_test() -> Fixture {
        let db = DbConnection::init_test().await.unwrap();
        let pool = db.pool().clone();
        let director = UserRepository::new(pool.clone())
            .create("boss", Role::Director, "M", "D", "", None, "x")
            .await
            .unwrap();

        let children = ChildRepository::new(pool.clone());
        let group = children.create_group("Bees", "").await.unwrap();
        let child = children
            .create_child("Zofia", "Kowalska", d(2020, 4, 12), group.id, 20.0, "")
            .await
            .unwrap();

        let service = BillingService::new(
            PaymentRepository::new(pool.clone()),
            children,
            AttendanceRepository::new(pool),
        );
        Fixture {
            db,
            service,
            director,
            child_id: child.id,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_business_days_skip_weekends_and_closures() {
        let f = setup_test().await;
        let attendance = AttendanceRepository::new(f.db.pool().clone());
        // January 2025 has 23 weekdays.
        assert_eq!(
            f.service
                .business_days(d(2025, 1, 1), d(2025, 1, 31))
                .await
                .unwrap(),
            23
        );

        attendance.create_closure(d(2025, 1, 6), "holiday").await.unwrap();
        // A Saturday closure changes nothing.
        attendance.create_closure(d(2025, 1, 4), "open day").await.unwrap();
        assert_eq!(
            f.service
                .business_days(d(2025, 1, 1), d(2025, 1, 31))
                .await
                .unwrap(),
            22
        );
    }

    #[tokio::test]
    async fn test_meal_billing_amount_and_idempotence() {
        let f = setup_test().await;
        let attendance = AttendanceRepository::new(f.db.pool().clone());
        // April 2025 has 22 weekdays; two closures leave 20 business days.
        attendance.create_closure(d(2025, 4, 21), "Easter Monday").await.unwrap();
        attendance.create_closure(d(2025, 4, 22), "staff day").await.unwrap();
        // Three reported absences leave 17 billable days.
        for day in [7, 8, 9] {
            attendance.create(f.child_id, d(2025, 4, day)).await.unwrap();
        }

        let report = f
            .service
            .run_meal_billing(&f.director, 2025, 4)
            .await
            .unwrap();
        assert_eq!(report.business_days, 20);
        assert_eq!(report.payments_created, 1);

        let payments = PaymentRepository::new(f.db.pool().clone());
        let all = payments.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].amount, 17.0 * 20.0);
        assert_eq!(all[0].meal_period.as_deref(), Some("2025-04"));
        assert!(all[0].description.contains("17 days"));

        // A second run is a per-child no-op.
        let rerun = f
            .service
            .run_meal_billing(&f.director, 2025, 4)
            .await
            .unwrap();
        assert_eq!(rerun.payments_created, 0);
        assert_eq!(rerun.already_billed, 1);
        assert_eq!(payments.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_meal_billing_gives_namesakes_distinct_titles() {
        let f = setup_test().await;
        let children = ChildRepository::new(f.db.pool().clone());
        let group = children.create_group("Ants", "").await.unwrap();
        // Same first and last name as the fixture child.
        children
            .create_child("Zofia", "Kowalska", d(2021, 2, 3), group.id, 20.0, "")
            .await
            .unwrap();

        let report = f
            .service
            .run_meal_billing(&f.director, 2025, 4)
            .await
            .unwrap();
        assert_eq!(report.payments_created, 2);
        assert_eq!(report.already_billed, 0);

        let all = PaymentRepository::new(f.db.pool().clone())
            .list_all()
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        let mut ordinals: Vec<&str> = all
            .iter()
            .map(|p| p.payment_title.rsplit('/').next().unwrap())
            .collect();
        ordinals.sort_unstable();
        assert_eq!(ordinals, vec!["001", "002"]);
    }

    #[tokio::test]
    async fn test_meal_billing_skips_fully_absent_child() {
        let f = setup_test().await;
        let attendance = AttendanceRepository::new(f.db.pool().clone());
        let mut date = d(2025, 1, 1);
        while date <= d(2025, 1, 31) {
            if is_weekday(date) {
                attendance.create(f.child_id, date).await.unwrap();
            }
            date += Duration::days(1);
        }

        let report = f
            .service
            .run_meal_billing(&f.director, 2025, 1)
            .await
            .unwrap();
        assert_eq!(report.payments_created, 0);
        assert_eq!(report.zero_amount, 1);
    }

    #[tokio::test]
    async fn test_recurring_run_advances_one_period() {
        let f = setup_test().await;
        let payments = PaymentRepository::new(f.db.pool().clone());
        let template = payments
            .create_template(f.child_id, 300.0, "tuition", Frequency::Monthly, d(2025, 1, 15), true)
            .await
            .unwrap();

        // Run a few days late: one payment, due date moves a single period.
        let report = f
            .service
            .run_recurring_billing(&f.director, d(2025, 1, 20))
            .await
            .unwrap();
        assert_eq!(report.payments_created, 1);

        let advanced = payments.get_template(template.id).await.unwrap();
        assert_eq!(advanced.next_due, d(2025, 2, 15));

        // Not due again until the new date arrives.
        let again = f
            .service
            .run_recurring_billing(&f.director, d(2025, 1, 21))
            .await
            .unwrap();
        assert_eq!(again.payments_created, 0);
    }

    #[tokio::test]
    async fn test_recurring_run_ignores_inactive_templates() {
        let f = setup_test().await;
        let payments = PaymentRepository::new(f.db.pool().clone());
        payments
            .create_template(f.child_id, 300.0, "tuition", Frequency::Monthly, d(2025, 1, 1), false)
            .await
            .unwrap();

        let report = f
            .service
            .run_recurring_billing(&f.director, d(2025, 2, 1))
            .await
            .unwrap();
        assert_eq!(report.payments_created, 0);
    }
}
