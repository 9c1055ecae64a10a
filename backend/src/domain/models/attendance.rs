use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A reported absence, one per (child, date). A missing row means the child
/// is presumed present; rows are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendance {
    pub id: i64,
    pub child_id: i64,
    pub date: NaiveDate,
}

impl Attendance {
    pub fn to_dto(&self) -> shared::AttendanceDto {
        shared::AttendanceDto {
            id: self.id,
            child_id: self.child_id,
            date: self.date.to_string(),
        }
    }
}

/// A calendar date the facility is closed; excluded from business-day
/// counting. Unique per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FacilityClosure {
    pub id: i64,
    pub date: NaiveDate,
    pub label: String,
}

impl FacilityClosure {
    pub fn to_dto(&self) -> shared::FacilityClosureDto {
        shared::FacilityClosureDto {
            id: self.id,
            date: self.date.to_string(),
            label: self.label.clone(),
        }
    }
}
