//! Messaging between parents and the administration.
//!
//! Parents never address an individual: their mail is routed to a director
//! account, and every director reads the same shared inbox. Which director
//! account ends up as the nominal receiver is therefore an implementation
//! detail that visibility erases.

use std::collections::HashMap;

use log::info;

use crate::domain::models::{Message, Role, User};
use crate::error::{AppError, AppResult};
use crate::notify::Mailer;
use crate::storage::{MessageRepository, UserRepository};

#[derive(Clone)]
pub struct MessagingService {
    messages: MessageRepository,
    users: UserRepository,
    mailer: Mailer,
}

impl MessagingService {
    pub fn new(messages: MessageRepository, users: UserRepository, mailer: Mailer) -> Self {
        Self {
            messages,
            users,
            mailer,
        }
    }

    pub async fn send(&self, actor: &User, req: shared::SendMessageRequest) -> AppResult<Message> {
        if req.body.trim().is_empty() {
            return Err(AppError::validation("body", "message body is required"));
        }

        let receiver = match actor.role {
            Role::Parent => self.users.first_director().await?.ok_or_else(|| {
                AppError::Configuration("no director account exists to receive messages".to_string())
            })?,
            Role::Director => {
                let receiver_id = req.receiver_id.ok_or_else(|| {
                    AppError::validation("receiver_id", "receiver is required")
                })?;
                self.users
                    .find(receiver_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("receiver"))?
            }
        };

        let message = self
            .messages
            .create(actor.id, receiver.id, &req.subject, &req.body)
            .await?;
        info!("message {} from {} to {}", message.id, actor.id, receiver.id);

        if !receiver.email.is_empty() {
            self.mailer
                .notify_new_message(&receiver.email, &actor.display_name(), &message.subject);
        }
        Ok(message)
    }

    pub async fn list(&self, actor: &User) -> AppResult<Vec<shared::MessageDto>> {
        let messages = match actor.role {
            Role::Director => self.messages.list_shared_inbox(actor.id).await?,
            Role::Parent => self.messages.list_for_user(actor.id).await?,
        };

        let names: HashMap<i64, String> = self
            .users
            .list()
            .await?
            .into_iter()
            .map(|u| (u.id, u.display_name()))
            .collect();
        Ok(messages
            .into_iter()
            .map(|m| {
                let sender_name = names.get(&m.sender_id).cloned().unwrap_or_default();
                m.to_dto(sender_name)
            })
            .collect())
    }

    pub async fn unread_count(&self, actor: &User) -> AppResult<u32> {
        let count = match actor.role {
            Role::Director => self.messages.unread_count_shared_inbox().await?,
            Role::Parent => self.messages.unread_count_for_receiver(actor.id).await?,
        };
        Ok(count as u32)
    }

    pub async fn mark_read(&self, actor: &User, message_id: i64) -> AppResult<()> {
        let message = self
            .messages
            .find(message_id)
            .await?
            .ok_or_else(|| AppError::not_found("message"))?;
        let may_read = match actor.role {
            Role::Director => true,
            Role::Parent => message.receiver_id == actor.id,
        };
        if !may_read {
            return Err(AppError::not_found("message"));
        }
        self.messages.mark_read(message_id).await?;
        Ok(())
    }

    /// Mark everything in the caller's inbox read. A director may narrow to
    /// one parent's correspondence with `counterpart_id`, which then covers
    /// that parent's mail to any director account; unscoped, only messages
    /// nominally addressed to the caller are touched.
    pub async fn mark_all_read(
        &self,
        actor: &User,
        req: shared::MarkAllReadRequest,
    ) -> AppResult<u32> {
        let marked = match (actor.role, req.counterpart_id) {
            (Role::Director, Some(counterpart)) => {
                self.messages
                    .mark_all_read_from_sender_to_directors(counterpart)
                    .await?
            }
            _ => self.messages.mark_all_read_for_receiver(actor.id).await?,
        };
        Ok(marked as u32)
    }
}
