use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A one-off billing record.
///
/// Invariant: `is_paid == true` exactly when `payment_date` is set. Both
/// fields change only together, and only through a director action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub child_id: i64,
    pub amount: f64,
    pub description: String,
    pub is_paid: bool,
    pub payment_date: Option<DateTime<Utc>>,
    /// Unique, human-readable transfer title.
    pub payment_title: String,
    /// Set only for meal-billing payments: the billed `YYYY-MM` period.
    /// Unique per child, which makes a duplicate billing run a no-op.
    pub meal_period: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn to_dto(&self) -> shared::PaymentDto {
        shared::PaymentDto {
            id: self.id,
            child_id: self.child_id,
            amount: self.amount,
            description: self.description.clone(),
            is_paid: self.is_paid,
            payment_date: self.payment_date.map(|d| d.to_rfc3339()),
            payment_title: self.payment_title.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// How often a recurring template fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Advance a due date by one period, calendar-aware: months and years
    /// clamp to the end of the target month rather than adding a fixed day
    /// count.
    pub fn advance(self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Weekly => date + Duration::weeks(1),
            Frequency::Monthly => date
                .checked_add_months(Months::new(1))
                .unwrap_or(date),
            Frequency::Yearly => date
                .checked_add_months(Months::new(12))
                .unwrap_or(date),
        }
    }
}

impl From<Frequency> for shared::Frequency {
    fn from(f: Frequency) -> Self {
        match f {
            Frequency::Weekly => shared::Frequency::Weekly,
            Frequency::Monthly => shared::Frequency::Monthly,
            Frequency::Yearly => shared::Frequency::Yearly,
        }
    }
}

impl From<shared::Frequency> for Frequency {
    fn from(f: shared::Frequency) -> Self {
        match f {
            shared::Frequency::Weekly => Frequency::Weekly,
            shared::Frequency::Monthly => Frequency::Monthly,
            shared::Frequency::Yearly => Frequency::Yearly,
        }
    }
}

/// A subscription-style template that spawns concrete [`Payment`]s and then
/// advances its own due date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecurringPayment {
    pub id: i64,
    pub child_id: i64,
    pub amount: f64,
    pub description: String,
    pub frequency: Frequency,
    pub next_due: NaiveDate,
    pub is_active: bool,
}

impl RecurringPayment {
    pub fn to_dto(&self) -> shared::RecurringPaymentDto {
        shared::RecurringPaymentDto {
            id: self.id,
            child_id: self.child_id,
            amount: self.amount,
            description: self.description.clone(),
            frequency: self.frequency.into(),
            next_due: self.next_due.to_string(),
            is_active: self.is_active,
        }
    }
}
