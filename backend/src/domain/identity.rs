//! Human-readable identifier generation: payment titles, auto-provisioned
//! usernames and passwords.
//!
//! Generation is a pure function of the persisted state it reads; nothing
//! here mutates state. Callers persist results and handle a uniqueness
//! conflict by regenerating. Payment titles are count-then-format, which can
//! race under concurrent creation in the same month; the unique constraint on
//! the title column catches the loser, and the billing paths retry once with
//! a recomputed ordinal.

use chrono::{Datelike, NaiveDate};
use log::warn;
use rand::Rng;

use crate::error::{AppError, AppResult};
use crate::storage::UserRepository;

const PASSWORD_LEN: usize = 10;
const PASSWORD_LETTERS_DIGITS: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const PASSWORD_SYMBOLS: &str = "!@#$%^&*";
const USERNAME_ATTEMPTS: u32 = 100;

/// Format a payment title: `<first>/<last>/<MMYYYY>/<NNN>` where `ordinal`
/// is one-based within the calendar month of `month`.
pub fn payment_title(first_name: &str, last_name: &str, month: NaiveDate, ordinal: i64) -> String {
    format!(
        "{}/{}/{:02}{}/{:03}",
        first_name,
        last_name,
        month.month(),
        month.year(),
        ordinal
    )
}

/// First day of the month containing `date`, and the first day of the next
/// month. Together they bound the title-ordinal count.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).expect("day 1 always exists");
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    }
    .expect("first of month always exists");
    (start, next)
}

/// Generate a candidate login of the form `p<5 digits>m`. Uniqueness is the
/// caller's problem; see [`unique_username`].
pub fn candidate_username<R: Rng>(rng: &mut R) -> String {
    let digits: u32 = rng.gen_range(0..100_000);
    format!("p{digits:05}m")
}

/// Sample usernames until one is free. The value space is ~100k so a handful
/// of attempts is plenty; a persistent failure means the namespace is nearly
/// exhausted and surfaces as a configuration error.
pub async fn unique_username(users: &UserRepository) -> AppResult<String> {
    for _ in 0..USERNAME_ATTEMPTS {
        // Re-obtained per iteration; ThreadRng is !Send and must not be
        // held across the existence check.
        let candidate = candidate_username(&mut rand::thread_rng());
        if !users.username_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    warn!("exhausted {USERNAME_ATTEMPTS} username candidates");
    Err(AppError::Configuration(
        "unable to allocate a free username".to_string(),
    ))
}

/// 10 characters from letters, digits and a small symbol set, rejection
/// sampled until at least one digit and one symbol are present.
pub fn generate_password<R: Rng>(rng: &mut R) -> String {
    let alphabet: Vec<char> = PASSWORD_LETTERS_DIGITS
        .chars()
        .chain(PASSWORD_SYMBOLS.chars())
        .collect();
    loop {
        let password: String = (0..PASSWORD_LEN)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect();
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        let has_symbol = password.chars().any(|c| PASSWORD_SYMBOLS.contains(c));
        if has_digit && has_symbol {
            return password;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::domain::models::Role;

    #[test]
    fn test_payment_title_format() {
        let month = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        assert_eq!(
            payment_title("Jan", "Kowalski", month, 1),
            "Jan/Kowalski/012025/001"
        );
        assert_eq!(
            payment_title("Jan", "Kowalski", month, 12),
            "Jan/Kowalski/012025/012"
        );
    }

    #[test]
    fn test_payment_title_pads_month_and_ordinal() {
        let month = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        assert_eq!(
            payment_title("Ala", "Nowak", month, 123),
            "Ala/Nowak/112025/123"
        );
    }

    #[test]
    fn test_month_bounds() {
        let (start, next) = month_bounds(NaiveDate::from_ymd_opt(2025, 12, 19).unwrap());
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    }

    #[test]
    fn test_candidate_username_shape() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let username = candidate_username(&mut rng);
            assert_eq!(username.len(), 7);
            assert!(username.starts_with('p'));
            assert!(username.ends_with('m'));
            assert!(username[1..6].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generated_password_strength() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let password = generate_password(&mut rng);
            assert_eq!(password.len(), PASSWORD_LEN);
            assert!(password.chars().any(|c| c.is_ascii_digit()));
            assert!(password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)));
        }
    }

    #[tokio::test]
    async fn test_unique_username_avoids_taken_names() {
        let db = DbConnection::init_test().await.unwrap();
        let users = UserRepository::new(db.pool().clone());

        let taken = unique_username(&users).await.unwrap();
        users
            .create(&taken, Role::Parent, "A", "B", "a@b.c", None, "hash")
            .await
            .unwrap();

        let next = unique_username(&users).await.unwrap();
        assert_ne!(taken, next);
    }
}
