//! One-off payments and recurring templates: scoped reads, director-gated
//! writes, and the unique transfer-title allocation.

use chrono::{NaiveDate, Utc};
use log::{info, warn};

use crate::domain::identity;
use crate::domain::models::{Payment, RecurringPayment, User};
use crate::domain::visibility::{self, RecordScope};
use crate::error::{AppError, AppResult};
use crate::storage::{ChildRepository, PaymentRepository};

#[derive(Clone)]
pub struct PaymentService {
    payments: PaymentRepository,
    children: ChildRepository,
}

impl PaymentService {
    pub fn new(payments: PaymentRepository, children: ChildRepository) -> Self {
        Self { payments, children }
    }

    pub async fn list(&self, actor: &User) -> AppResult<Vec<Payment>> {
        match visibility::record_scope(actor) {
            RecordScope::All => Ok(self.payments.list_all().await?),
            RecordScope::OwnChildren(user_id) => {
                Ok(self.payments.list_for_parent(user_id).await?)
            }
        }
    }

    pub async fn get(&self, actor: &User, id: i64) -> AppResult<Payment> {
        let payment = self
            .payments
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found("payment"))?;
        if let RecordScope::OwnChildren(user_id) = visibility::record_scope(actor) {
            if !self.children.is_parent_of(user_id, payment.child_id).await? {
                return Err(AppError::not_found("payment"));
            }
        }
        Ok(payment)
    }

    /// Allocate the next transfer title for `child` in the month of `today`.
    async fn next_title(&self, child_id: i64, today: NaiveDate) -> AppResult<String> {
        let child = self.children.get_child(child_id).await?;
        let (start, next) = identity::month_bounds(today);
        let ordinal = self.payments.count_created_in_month(start, next).await? + 1;
        Ok(identity::payment_title(
            &child.first_name,
            &child.last_name,
            today,
            ordinal,
        ))
    }

    pub async fn create(
        &self,
        actor: &User,
        req: shared::CreatePaymentRequest,
        today: NaiveDate,
    ) -> AppResult<Payment> {
        visibility::ensure_director(actor)?;
        if req.amount <= 0.0 {
            return Err(AppError::validation("amount", "amount must be positive"));
        }
        if self.children.find_child(req.child_id).await?.is_none() {
            return Err(AppError::not_found("child"));
        }

        let title = self.next_title(req.child_id, today).await?;
        match self
            .payments
            .create(req.child_id, req.amount, &req.description, &title, None)
            .await
        {
            Ok(payment) => Ok(payment),
            // A concurrent insert can win the ordinal; recount and retry once.
            Err(e) if is_unique_violation(&e) => {
                warn!("payment title {title} collided, retrying with a fresh ordinal");
                let title = self.next_title(req.child_id, today).await?;
                Ok(self
                    .payments
                    .create(req.child_id, req.amount, &req.description, &title, None)
                    .await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Partial update. Parents keep read access through `get` but every
    /// mutable field they submit is stripped before anything is applied.
    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        req: shared::UpdatePaymentRequest,
    ) -> AppResult<Payment> {
        let payment = self.get(actor, id).await?;
        let req = visibility::sanitize_payment_update(actor.role, req);

        let amount = req.amount.unwrap_or(payment.amount);
        if amount <= 0.0 {
            return Err(AppError::validation("amount", "amount must be positive"));
        }
        let description = req.description.unwrap_or_else(|| payment.description.clone());
        self.payments
            .update_amount_description(id, amount, &description)
            .await?;

        if let Some(paid) = req.is_paid {
            if paid != payment.is_paid {
                let payment_date = paid.then(Utc::now);
                self.payments.set_paid(id, paid, payment_date).await?;
                info!("payment {id} marked {}", if paid { "paid" } else { "unpaid" });
            }
        }

        Ok(self.payments.get(id).await?)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> AppResult<()> {
        visibility::ensure_director(actor)?;
        if !self.payments.delete(id).await? {
            return Err(AppError::not_found("payment"));
        }
        Ok(())
    }

    // --- recurring templates ---

    pub async fn list_templates(&self, actor: &User) -> AppResult<Vec<RecurringPayment>> {
        match visibility::record_scope(actor) {
            RecordScope::All => Ok(self.payments.list_templates().await?),
            RecordScope::OwnChildren(user_id) => {
                Ok(self.payments.list_templates_for_parent(user_id).await?)
            }
        }
    }

    pub async fn create_template(
        &self,
        actor: &User,
        req: shared::UpsertRecurringPaymentRequest,
    ) -> AppResult<RecurringPayment> {
        visibility::ensure_director(actor)?;
        let next_due = super::children::parse_date("next_due", &req.next_due)?;
        if req.amount <= 0.0 {
            return Err(AppError::validation("amount", "amount must be positive"));
        }
        if self.children.find_child(req.child_id).await?.is_none() {
            return Err(AppError::not_found("child"));
        }
        Ok(self
            .payments
            .create_template(
                req.child_id,
                req.amount,
                &req.description,
                req.frequency.into(),
                next_due,
                req.is_active,
            )
            .await?)
    }

    pub async fn update_template(
        &self,
        actor: &User,
        id: i64,
        req: shared::UpsertRecurringPaymentRequest,
    ) -> AppResult<RecurringPayment> {
        visibility::ensure_director(actor)?;
        let mut template = self.payments.get_template(id).await?;
        template.child_id = req.child_id;
        template.amount = req.amount;
        template.description = req.description;
        template.frequency = req.frequency.into();
        template.next_due = super::children::parse_date("next_due", &req.next_due)?;
        template.is_active = req.is_active;
        self.payments.update_template(&template).await?;
        Ok(template)
    }

    pub async fn delete_template(&self, actor: &User, id: i64) -> AppResult<()> {
        visibility::ensure_director(actor)?;
        if !self.payments.delete_template(id).await? {
            return Err(AppError::not_found("recurring payment"));
        }
        Ok(())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::domain::models::Role;
    use crate::storage::UserRepository;

    async fn setup_test() -> (DbConnection, PaymentService, User, User, i64) {
        let db = DbConnection::init_test().await.unwrap();
        let pool = db.pool().clone();
        let users = UserRepository::new(pool.clone());
        let director = users
            .create("boss", Role::Director, "M", "D", "", None, "x")
            .await
            .unwrap();
        let parent = users
            .create("p00001m", Role::Parent, "J", "K", "", None, "x")
            .await
            .unwrap();

        let children = ChildRepository::new(pool.clone());
        let group = children.create_group("Bees", "").await.unwrap();
        let child = children
            .create_child(
                "Zofia",
                "Kowalska",
                NaiveDate::from_ymd_opt(2020, 4, 12).unwrap(),
                group.id,
                18.5,
                "",
            )
            .await
            .unwrap();
        children.link_parent(child.id, parent.id).await.unwrap();

        let service = PaymentService::new(PaymentRepository::new(pool.clone()), children);
        (db, service, director, parent, child.id)
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_titles_are_ordinal_within_month() {
        let (_db, service, director, _, child_id) = setup_test().await;
        let req = shared::CreatePaymentRequest {
            child_id,
            amount: 50.0,
            description: "trip".to_string(),
        };
        let first = service
            .create(&director, req.clone(), d(2025, 1, 10))
            .await
            .unwrap();
        let second = service
            .create(&director, req, d(2025, 1, 20))
            .await
            .unwrap();

        assert_eq!(first.payment_title, "Zofia/Kowalska/012025/001");
        assert_eq!(second.payment_title, "Zofia/Kowalska/012025/002");
    }

    #[tokio::test]
    async fn test_parent_cannot_create_or_flip_paid() {
        let (_db, service, director, parent, child_id) = setup_test().await;
        let err = service
            .create(
                &parent,
                shared::CreatePaymentRequest {
                    child_id,
                    amount: 1.0,
                    description: String::new(),
                },
                d(2025, 1, 10),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let payment = service
            .create(
                &director,
                shared::CreatePaymentRequest {
                    child_id,
                    amount: 120.0,
                    description: "meals".to_string(),
                },
                d(2025, 1, 10),
            )
            .await
            .unwrap();

        let after = service
            .update(
                &parent,
                payment.id,
                shared::UpdatePaymentRequest {
                    amount: Some(0.01),
                    is_paid: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(after.amount, 120.0);
        assert!(!after.is_paid);
        assert!(after.payment_date.is_none());
    }

    #[tokio::test]
    async fn test_paid_state_and_date_move_together() {
        let (_db, service, director, _, child_id) = setup_test().await;
        let payment = service
            .create(
                &director,
                shared::CreatePaymentRequest {
                    child_id,
                    amount: 75.0,
                    description: "supplies".to_string(),
                },
                d(2025, 2, 3),
            )
            .await
            .unwrap();

        let paid = service
            .update(
                &director,
                payment.id,
                shared::UpdatePaymentRequest {
                    is_paid: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(paid.is_paid && paid.payment_date.is_some());

        let unpaid = service
            .update(
                &director,
                payment.id,
                shared::UpdatePaymentRequest {
                    is_paid: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!unpaid.is_paid && unpaid.payment_date.is_none());
    }

    #[tokio::test]
    async fn test_parent_sees_only_own_payments() {
        let (db, service, director, parent, child_id) = setup_test().await;
        let children = ChildRepository::new(db.pool().clone());
        let group = children.create_group("Ants", "").await.unwrap();
        let other = children
            .create_child("Olaf", "Nowak", d(2021, 1, 1), group.id, 20.0, "")
            .await
            .unwrap();

        let mine = service
            .create(
                &director,
                shared::CreatePaymentRequest {
                    child_id,
                    amount: 10.0,
                    description: String::new(),
                },
                d(2025, 3, 1),
            )
            .await
            .unwrap();
        let foreign = service
            .create(
                &director,
                shared::CreatePaymentRequest {
                    child_id: other.id,
                    amount: 20.0,
                    description: String::new(),
                },
                d(2025, 3, 1),
            )
            .await
            .unwrap();

        let listed = service.list(&parent).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);

        let err = service.get(&parent, foreign.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
