use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A two-party message. The receiver is a nominal single account; for the
/// director role the visibility layer widens it to the shared inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn to_dto(&self, sender_name: String) -> shared::MessageDto {
        shared::MessageDto {
            id: self.id,
            sender_id: self.sender_id,
            sender_name,
            receiver_id: self.receiver_id,
            subject: self.subject.clone(),
            body: self.body.clone(),
            is_read: self.is_read,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
