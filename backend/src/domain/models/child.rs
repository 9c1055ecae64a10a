use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A classroom group. Deleting a group is refused while children belong to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub teachers_info: String,
}

impl Group {
    pub fn to_dto(&self) -> shared::GroupDto {
        shared::GroupDto {
            id: self.id,
            name: self.name.clone(),
            teachers_info: self.teachers_info.clone(),
        }
    }
}

/// Domain model for an enrolled child. Linked to at most two parent accounts
/// through the `child_parents` join table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Child {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub group_id: i64,
    /// Daily meal rate used by the meal billing run.
    pub meal_rate: f64,
    /// Health notes; the one field a parent may edit themselves.
    pub medical_info: String,
}

impl Child {
    pub fn to_dto(&self, parent_ids: Vec<i64>) -> shared::ChildDto {
        shared::ChildDto {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: self.date_of_birth.to_string(),
            group_id: self.group_id,
            meal_rate: self.meal_rate,
            medical_info: self.medical_info.clone(),
            parent_ids,
        }
    }
}
