//! Account lifecycle: provisioning, login, password management and the
//! director dashboard numbers.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::NaiveDate;
use log::info;
use uuid::Uuid;

use crate::domain::models::{Role, User};
use crate::domain::{identity, visibility};
use crate::error::{AppError, AppResult};
use crate::notify::Mailer;
use crate::storage::{AttendanceRepository, ChildRepository, MessageRepository, UserRepository};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone)]
pub struct AccountService {
    users: UserRepository,
    children: ChildRepository,
    attendance: AttendanceRepository,
    messages: MessageRepository,
    mailer: Mailer,
}

impl AccountService {
    pub fn new(
        users: UserRepository,
        children: ChildRepository,
        attendance: AttendanceRepository,
        messages: MessageRepository,
        mailer: Mailer,
    ) -> Self {
        Self {
            users,
            children,
            attendance,
            messages,
            mailer,
        }
    }

    /// Create an account. With `auto_generate` the backend invents a
    /// `p<digits>m` username and a strong password, returned once to the
    /// director and mailed to the new user.
    pub async fn provision(
        &self,
        actor: &User,
        req: shared::ProvisionAccountRequest,
    ) -> AppResult<(User, Option<String>)> {
        visibility::ensure_director(actor)?;

        if req.first_name.trim().is_empty() {
            return Err(AppError::validation("first_name", "first name is required"));
        }

        let (username, password, generated) = if req.auto_generate {
            let username = identity::unique_username(&self.users).await?;
            let password = identity::generate_password(&mut rand::thread_rng());
            (username, password, true)
        } else {
            let username = req
                .username
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| AppError::validation("username", "username is required"))?;
            let password = req
                .password
                .ok_or_else(|| AppError::validation("password", "password is required"))?;
            if password.len() < MIN_PASSWORD_LEN {
                return Err(AppError::validation(
                    "password",
                    format!("password must be at least {MIN_PASSWORD_LEN} characters"),
                ));
            }
            if self.users.username_exists(&username).await? {
                return Err(AppError::Conflict(format!(
                    "username {username} is already taken"
                )));
            }
            (username, password, false)
        };

        let hash = hash_password(&password)?;
        let user = self
            .users
            .create(
                &username,
                req.role.into(),
                &req.first_name,
                &req.last_name,
                &req.email,
                req.phone.as_deref(),
                &hash,
            )
            .await?;
        info!("provisioned {:?} account {}", user.role, user.username);

        if generated && !user.email.is_empty() {
            self.mailer
                .notify_credentials(&user.email, &user.username, &password);
        }

        Ok((user, generated.then_some(password)))
    }

    /// Verify credentials and mint a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(invalid_credentials)?;
        if !verify_password(&user.password_hash, password)? {
            return Err(invalid_credentials());
        }

        let token = Uuid::new_v4().to_string();
        self.users.insert_token(&token, user.id).await?;
        Ok((token, user))
    }

    pub async fn logout(&self, token: &str) -> AppResult<bool> {
        Ok(self.users.delete_token(token).await?)
    }

    pub async fn authenticate(&self, token: &str) -> AppResult<Option<User>> {
        Ok(self.users.find_by_token(token).await?)
    }

    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        if !verify_password(&user.password_hash, old_password)? {
            return Err(AppError::validation(
                "old_password",
                "current password is incorrect",
            ));
        }
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(
                "new_password",
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        let hash = hash_password(new_password)?;
        self.users.update_password(user.id, &hash).await?;
        Ok(())
    }

    /// Always succeeds from the caller's point of view so the endpoint does
    /// not reveal which addresses have accounts.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        let Some(user) = self.users.find_by_email(email).await? else {
            info!("password reset requested for unknown address");
            return Ok(());
        };
        let token = Uuid::new_v4().to_string();
        self.users.insert_reset_token(&token, user.id).await?;
        self.mailer.send_password_reset(&user.email, &token)?;
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(
                "new_password",
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        let user_id = self
            .users
            .consume_reset_token(token)
            .await?
            .ok_or_else(|| AppError::not_found("reset token"))?;
        let hash = hash_password(new_password)?;
        self.users.update_password(user_id, &hash).await?;
        Ok(())
    }

    pub async fn list_users(&self, actor: &User) -> AppResult<Vec<User>> {
        visibility::ensure_director(actor)?;
        Ok(self.users.list().await?)
    }

    pub async fn director_stats(
        &self,
        actor: &User,
        today: NaiveDate,
    ) -> AppResult<shared::DirectorStats> {
        visibility::ensure_director(actor)?;
        let unread = self.messages.unread_count_shared_inbox().await?;
        let absent = self.attendance.count_absent_on(today).await?;
        let total = self.children.child_count().await?;
        Ok(shared::DirectorStats {
            unread_messages: unread as u32,
            absent_today: absent as u32,
            present_today: total.saturating_sub(absent) as u32,
            total_children: total as u32,
        })
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("stored hash is invalid: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn invalid_credentials() -> AppError {
    AppError::validation("username", "invalid username or password")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;

    async fn setup_test() -> (DbConnection, AccountService, User) {
        let db = DbConnection::init_test().await.unwrap();
        let pool = db.pool().clone();
        let service = AccountService::new(
            UserRepository::new(pool.clone()),
            ChildRepository::new(pool.clone()),
            AttendanceRepository::new(pool.clone()),
            MessageRepository::new(pool.clone()),
            Mailer::disabled(),
        );
        let hash = hash_password("director-pass").unwrap();
        let director = UserRepository::new(pool)
            .create(
                "boss",
                Role::Director,
                "Maria",
                "Dyrektor",
                "boss@nursery.local",
                None,
                &hash,
            )
            .await
            .unwrap();
        (db, service, director)
    }

    #[tokio::test]
    async fn test_provision_auto_generates_credentials() {
        let (_db, service, director) = setup_test().await;
        let (user, password) = service
            .provision(
                &director,
                shared::ProvisionAccountRequest {
                    role: shared::Role::Parent,
                    first_name: "Jan".to_string(),
                    last_name: "Kowalski".to_string(),
                    email: "jan@example.com".to_string(),
                    phone: None,
                    auto_generate: true,
                    username: None,
                    password: None,
                },
            )
            .await
            .unwrap();

        assert!(user.username.starts_with('p') && user.username.ends_with('m'));
        let password = password.expect("generated password returned once");
        assert_eq!(password.len(), 10);

        let (_, logged_in) = service.login(&user.username, &password).await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_provision_future_is_spawnable() {
        // Auto-provisioning runs inside axum handlers, so the whole future
        // has to be Send; tokio::spawn enforces that bound at compile time.
        let (_db, service, director) = setup_test().await;
        let handle = tokio::spawn(async move {
            service
                .provision(
                    &director,
                    shared::ProvisionAccountRequest {
                        role: shared::Role::Parent,
                        first_name: "Jan".to_string(),
                        last_name: "Kowalski".to_string(),
                        email: String::new(),
                        phone: None,
                        auto_generate: true,
                        username: None,
                        password: None,
                    },
                )
                .await
        });
        let (user, password) = handle.await.unwrap().unwrap();
        assert!(user.username.starts_with('p'));
        assert!(password.is_some());
    }

    #[tokio::test]
    async fn test_parent_cannot_provision() {
        let (_db, service, director) = setup_test().await;
        let (parent, _) = service
            .provision(
                &director,
                shared::ProvisionAccountRequest {
                    role: shared::Role::Parent,
                    first_name: "Jan".to_string(),
                    last_name: "Kowalski".to_string(),
                    email: String::new(),
                    phone: None,
                    auto_generate: true,
                    username: None,
                    password: None,
                },
            )
            .await
            .unwrap();

        let err = service
            .provision(
                &parent,
                shared::ProvisionAccountRequest {
                    role: shared::Role::Parent,
                    first_name: "Eve".to_string(),
                    last_name: "Smith".to_string(),
                    email: String::new(),
                    phone: None,
                    auto_generate: true,
                    username: None,
                    password: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let (_db, service, _) = setup_test().await;
        let err = service.login("boss", "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let (_db, service, _) = setup_test().await;
        let (token, _) = service.login("boss", "director-pass").await.unwrap();
        assert!(service.authenticate(&token).await.unwrap().is_some());
        assert!(service.logout(&token).await.unwrap());
        assert!(service.authenticate(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let (_db, service, director) = setup_test().await;
        let err = service
            .change_password(&director, "wrong", "new-password-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        service
            .change_password(&director, "director-pass", "new-password-1")
            .await
            .unwrap();
        service.login("boss", "new-password-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_password_burns_token() {
        let (db, service, director) = setup_test().await;
        service
            .request_password_reset("boss@nursery.local")
            .await
            .unwrap();
        // Fish the token out of storage; in production it only travels by mail.
        let db_token: String =
            sqlx::query_scalar("SELECT token FROM password_reset_tokens WHERE user_id = ?")
                .bind(director.id)
                .fetch_one(db.pool())
                .await
                .unwrap();

        service
            .reset_password(&db_token, "fresh-password")
            .await
            .unwrap();
        service.login("boss", "fresh-password").await.unwrap();

        let err = service
            .reset_password(&db_token, "another-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
