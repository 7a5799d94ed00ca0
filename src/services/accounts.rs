//! Credential store: phone-keyed accounts with argon2-hashed 4-digit
//! PINs. Authentication fails closed — a missing account and a wrong
//! PIN are indistinguishable to the caller.

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use rand::Rng;
use sqlx::PgPool;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::db::models::{Account, EntryKind, LedgerEntry};
use crate::db::queries;
use crate::error::AppError;
use crate::phone;
use crate::services::ledger;

const REFERRAL_CODE_LEN: usize = 8;
const REFERRAL_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn welcome_bonus() -> BigDecimal {
    BigDecimal::from(500)
}

pub fn referral_bonus() -> BigDecimal {
    BigDecimal::from(100)
}

#[derive(Clone)]
pub struct AccountService {
    pool: PgPool,
}

impl AccountService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an account for the normalized phone identity. The welcome
    /// bonus credit and (when a referral code was presented) the
    /// referrer's bonus land in the same transaction as the insert.
    pub async fn register(
        &self,
        phone_raw: &str,
        pin: &str,
        referral_code: Option<&str>,
    ) -> Result<Account, AppError> {
        let phone_number = phone::normalize(phone_raw)?;
        validate_pin(pin)?;

        if queries::phone_exists(&self.pool, &phone_number).await? {
            return Err(AppError::DuplicateIdentity);
        }

        let referred_by = match referral_code {
            Some(code) => queries::get_account_by_referral_code(&self.pool, code)
                .await?
                .map(|referrer| referrer.id),
            None => None,
        };

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            phone_number,
            pin_hash: hash_pin(pin)?,
            balance: BigDecimal::from(0),
            total_earned: BigDecimal::from(0),
            is_premium: false,
            premium_activated_at: None,
            referral_code: self.generate_referral_code().await?,
            referred_by,
            surveys_completed: 0,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;

        let account = queries::insert_account(&mut tx, &account)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    AppError::DuplicateIdentity
                }
                _ => AppError::Database(e),
            })?;

        let welcome = LedgerEntry::new(
            account.id,
            welcome_bonus(),
            EntryKind::Bonus,
            "Welcome Bonus".to_string(),
        );
        ledger::apply_credit(&mut tx, &welcome).await?;

        if let Some(referrer_id) = referred_by {
            let referral = LedgerEntry::new(
                referrer_id,
                referral_bonus(),
                EntryKind::Referral,
                "Referral Bonus".to_string(),
            );
            ledger::apply_credit(&mut tx, &referral).await?;
        }

        tx.commit().await?;

        tracing::info!(account_id = %account.id, "account registered");
        Ok(queries::get_account(&self.pool, account.id).await?)
    }

    /// `None` for a missing account or a wrong PIN alike.
    pub async fn authenticate(
        &self,
        phone_raw: &str,
        pin: &str,
    ) -> Result<Option<Account>, AppError> {
        let phone_number = match phone::normalize(phone_raw) {
            Ok(phone_number) => phone_number,
            Err(_) => return Ok(None),
        };

        let Some(account) = queries::get_account_by_phone(&self.pool, &phone_number).await? else {
            return Ok(None);
        };

        if verify_pin(pin, &account.pin_hash) {
            Ok(Some(account))
        } else {
            Ok(None)
        }
    }

    async fn generate_referral_code(&self) -> Result<String, AppError> {
        loop {
            let code = random_referral_code();
            if !queries::referral_code_exists(&self.pool, &code).await? {
                return Ok(code);
            }
        }
    }
}

fn random_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| REFERRAL_CODE_CHARSET[rng.gen_range(0..REFERRAL_CODE_CHARSET.len())] as char)
        .collect()
}

pub fn validate_pin(pin: &str) -> Result<(), AppError> {
    if pin.len() == 4 && pin.chars().all(|ch| ch.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::InvalidPin)
    }
}

fn hash_pin(pin: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("PIN hashing failed: {e}")))
}

/// Constant-time verification via the password-hash machinery; never a
/// string comparison against the stored hash.
fn verify_pin(pin: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(pin.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exactly_four_digits() {
        assert!(validate_pin("0000").is_ok());
        assert!(validate_pin("1234").is_ok());
        assert!(validate_pin("9999").is_ok());
    }

    #[test]
    fn rejects_wrong_lengths_and_non_digits() {
        for pin in ["123", "12345", "", "12a4", "12.4", "١٢٣٤"] {
            assert!(matches!(validate_pin(pin), Err(AppError::InvalidPin)), "pin: {pin}");
        }
    }

    #[test]
    fn hash_round_trip() {
        let hash = hash_pin("1234").unwrap();
        assert_ne!(hash, "1234");
        assert!(verify_pin("1234", &hash));
        assert!(!verify_pin("1235", &hash));
        assert!(!verify_pin("", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let first = hash_pin("1234").unwrap();
        let second = hash_pin("1234").unwrap();
        assert_ne!(first, second);
        assert!(verify_pin("1234", &first));
        assert!(verify_pin("1234", &second));
    }

    #[test]
    fn garbage_stored_hash_fails_closed() {
        assert!(!verify_pin("1234", "not-a-hash"));
        assert!(!verify_pin("1234", ""));
    }

    #[test]
    fn referral_codes_use_expected_alphabet() {
        let code = random_referral_code();
        assert_eq!(code.len(), REFERRAL_CODE_LEN);
        assert!(code.chars().all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit()));
    }
}
