//! Outbound email. New-message pings are best effort and never fail the
//! action that triggered them; password-reset mail must actually go out, so
//! its errors propagate.

use anyhow::{anyhow, Context};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct Mailer {
    transport: Option<SmtpTransport>,
    from: String,
    reset_url_base: String,
}

impl Mailer {
    pub fn new(config: &Config) -> AppResult<Self> {
        let transport = match &config.smtp_server {
            Some(server) => {
                let builder = SmtpTransport::relay(server)
                    .map_err(|e| anyhow!("smtp relay setup failed: {e}"))?
                    .port(config.smtp_port);
                let builder = if config.smtp_username.is_empty() {
                    builder
                } else {
                    builder.credentials(Credentials::new(
                        config.smtp_username.clone(),
                        config.smtp_password.clone(),
                    ))
                };
                Some(builder.build())
            }
            None => {
                info!("SMTP_SERVER not set, outbound mail disabled");
                None
            }
        };
        Ok(Self {
            transport,
            from: config.mail_from.clone(),
            reset_url_base: config.reset_url_base.clone(),
        })
    }

    /// A mailer that drops everything. Keeps tests free of SMTP setup.
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self {
            transport: None,
            from: "noreply@nursery.local".to_string(),
            reset_url_base: "http://localhost/reset-password".to_string(),
        }
    }

    /// Notify a receiver about a new message. Failures are logged and
    /// swallowed; the message itself is already stored.
    pub fn notify_new_message(&self, to: &str, sender_name: &str, subject: &str) {
        let body = format!(
            "You have a new message from {sender_name}.\n\nSubject: {subject}\n\nLog in to read and reply."
        );
        if let Err(e) = self.send(to, "New message", &body) {
            warn!("new-message notification to {to} failed: {e:#}");
        }
    }

    /// Send the generated credentials to a freshly provisioned account.
    /// Best effort: the director also sees the password once in the response.
    pub fn notify_credentials(&self, to: &str, username: &str, password: &str) {
        let body = format!(
            "An account has been created for you.\n\nUsername: {username}\nPassword: {password}\n\nPlease change the password after your first login."
        );
        if let Err(e) = self.send(to, "Your nursery account", &body) {
            warn!("credentials mail to {to} failed: {e:#}");
        }
    }

    pub fn send_password_reset(&self, to: &str, token: &str) -> AppResult<()> {
        let link = format!("{}?token={}", self.reset_url_base, token);
        let body = format!(
            "A password reset was requested for your account.\n\n{link}\n\nIf you did not request this, ignore this message."
        );
        self.send(to, "Password reset", &body).map_err(|e| {
            warn!("password reset mail to {to} failed: {e:#}");
            AppError::Configuration("unable to send the reset email".to_string())
        })
    }

    fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let Some(transport) = &self.transport else {
            info!("mail disabled, skipping \"{subject}\" to {to}");
            return Ok(());
        };
        let from: Mailbox = self.from.parse().context("invalid sender address")?;
        let to: Mailbox = to.parse().context("invalid recipient address")?;
        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .context("building email")?;
        transport.send(&email).context("sending email")?;
        Ok(())
    }
}
