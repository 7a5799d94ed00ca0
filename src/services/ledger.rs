//! Wallet ledger: append-only entries plus the denormalized running
//! balance on the account row. Every mutation is one database
//! transaction; the account row lock serializes concurrent writers.

use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::db::models::{EntryKind, LedgerEntry};
use crate::db::queries;
use crate::error::AppError;

#[derive(Clone)]
pub struct LedgerService {
    pool: PgPool,
}

impl LedgerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Credit survey earnings: balance and total_earned both move.
    pub async fn record_earning(
        &self,
        account_id: Uuid,
        amount: BigDecimal,
        description: impl Into<String>,
    ) -> Result<LedgerEntry, AppError> {
        let entry = LedgerEntry::new(account_id, amount, EntryKind::Earning, description.into());
        self.record(entry).await
    }

    pub async fn record_bonus(
        &self,
        account_id: Uuid,
        amount: BigDecimal,
        description: impl Into<String>,
    ) -> Result<LedgerEntry, AppError> {
        let entry = LedgerEntry::new(account_id, amount, EntryKind::Bonus, description.into());
        self.record(entry).await
    }

    pub async fn record_referral(
        &self,
        account_id: Uuid,
        amount: BigDecimal,
        description: impl Into<String>,
    ) -> Result<LedgerEntry, AppError> {
        let entry = LedgerEntry::new(account_id, amount, EntryKind::Referral, description.into());
        self.record(entry).await
    }

    pub async fn record_premium(
        &self,
        account_id: Uuid,
        amount: BigDecimal,
        description: impl Into<String>,
    ) -> Result<LedgerEntry, AppError> {
        let entry = LedgerEntry::new(account_id, amount, EntryKind::Premium, description.into());
        self.record(entry).await
    }

    async fn record(&self, entry: LedgerEntry) -> Result<LedgerEntry, AppError> {
        let mut tx = self.pool.begin().await?;
        let entry = apply_credit(&mut tx, &entry).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Debit the balance. The insufficient-balance check happens under
    /// the row lock, in the same transaction as the ledger append.
    pub async fn withdraw(
        &self,
        account_id: Uuid,
        amount: BigDecimal,
        mpesa_phone: Option<String>,
    ) -> Result<LedgerEntry, AppError> {
        if amount <= BigDecimal::from(0) {
            return Err(AppError::InvalidFormat(
                "Withdrawal amount must be greater than zero".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let account = queries::lock_account(&mut tx, account_id).await?;

        if amount > account.balance {
            return Err(AppError::InsufficientBalance);
        }

        let balance = &account.balance - &amount;
        queries::update_account_balances(&mut tx, account.id, &balance, &account.total_earned)
            .await?;

        let mut entry = LedgerEntry::new(
            account_id,
            amount,
            EntryKind::Withdrawal,
            "M-Pesa Withdrawal".to_string(),
        );
        entry.mpesa_phone = mpesa_phone;
        let entry = queries::insert_ledger_entry(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(entry)
    }

    pub async fn history(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        Ok(queries::list_ledger_entries(&self.pool, account_id, limit, offset).await?)
    }
}

/// Append a credit entry and move the balance (and total_earned for
/// earnings) on the caller's transaction. The account row lock is taken
/// here so composed operations stay serialized.
pub(crate) async fn apply_credit(
    executor: &mut SqlxTransaction<'_, Postgres>,
    entry: &LedgerEntry,
) -> Result<LedgerEntry, sqlx::Error> {
    let account = queries::lock_account(executor, entry.account_id).await?;

    let balance = &account.balance + &entry.amount;
    let total_earned = if entry.kind == EntryKind::Earning.as_str() {
        &account.total_earned + &entry.amount
    } else {
        account.total_earned.clone()
    };
    queries::update_account_balances(executor, account.id, &balance, &total_earned).await?;

    queries::insert_ledger_entry(executor, entry).await
}

/// Append a record-only entry: no balance effect. Used for the premium
/// payment record, where the money moved on the provider's side.
pub(crate) async fn append_record(
    executor: &mut SqlxTransaction<'_, Postgres>,
    entry: &LedgerEntry,
) -> Result<LedgerEntry, sqlx::Error> {
    queries::insert_ledger_entry(executor, entry).await
}
