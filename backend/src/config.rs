use std::{env, fmt::Display, str::FromStr};

use tracing::info;

/// Runtime configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Hour of day (local time) after which parents can no longer report a
    /// same-day absence.
    pub attendance_cutoff_hour: u32,
    pub smtp_server: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub mail_from: String,
    /// Base URL the reset link points at.
    pub reset_url_base: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("NURSERY_PORT", "3000"),
            database_url: try_load("DATABASE_URL", "sqlite:nursery.db"),
            attendance_cutoff_hour: try_load("ATTENDANCE_CUTOFF_HOUR", "9"),
            smtp_server: env::var("SMTP_SERVER").ok(),
            smtp_port: try_load("SMTP_PORT", "587"),
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            mail_from: try_load("MAIL_FROM", "noreply@nursery.local"),
            reset_url_base: try_load("RESET_URL_BASE", "http://localhost:5173/reset-password"),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .unwrap_or_else(|e| panic!("invalid {key} value {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Only assert on keys the test environment does not set.
        let config = Config::load();
        assert_eq!(config.attendance_cutoff_hour, 9);
        assert_eq!(config.smtp_port, 587);
    }
}
