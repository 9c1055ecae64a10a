use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role. Exactly one per user; the old pair of independent
/// `is_director`/`is_parent` flags is unrepresentable by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Director,
    Parent,
}

impl Role {
    pub fn is_director(self) -> bool {
        matches!(self, Role::Director)
    }
}

impl From<Role> for shared::Role {
    fn from(role: Role) -> Self {
        match role {
            Role::Director => shared::Role::Director,
            Role::Parent => shared::Role::Parent,
        }
    }
}

impl From<shared::Role> for Role {
    fn from(role: shared::Role) -> Self {
        match role {
            shared::Role::Director => Role::Director,
            shared::Role::Parent => Role::Parent,
        }
    }
}

/// Domain model for a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        if self.first_name.is_empty() {
            self.username.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }

    pub fn to_dto(&self) -> shared::UserDto {
        shared::UserDto {
            id: self.id,
            username: self.username.clone(),
            role: self.role.into(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            avatar: self.avatar.clone(),
        }
    }
}
