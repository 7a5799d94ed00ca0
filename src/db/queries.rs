use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use crate::db::models::{Account, LedgerEntry, MpesaPayment, Survey, SurveyAssignment};
use chrono::{DateTime, Utc};
use sqlx::types::BigDecimal;
use uuid::Uuid;

// --- Account Queries ---

pub async fn insert_account(
    executor: &mut SqlxTransaction<'_, Postgres>,
    account: &Account,
) -> Result<Account> {
    sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (
            id, phone_number, pin_hash, balance, total_earned, is_premium,
            premium_activated_at, referral_code, referred_by, surveys_completed,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(account.id)
    .bind(&account.phone_number)
    .bind(&account.pin_hash)
    .bind(&account.balance)
    .bind(&account.total_earned)
    .bind(account.is_premium)
    .bind(account.premium_activated_at)
    .bind(&account.referral_code)
    .bind(account.referred_by)
    .bind(account.surveys_completed)
    .bind(account.created_at)
    .bind(account.updated_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn get_account(pool: &PgPool, id: Uuid) -> Result<Account> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn get_account_by_phone(pool: &PgPool, phone_number: &str) -> Result<Option<Account>> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE phone_number = $1")
        .bind(phone_number)
        .fetch_optional(pool)
        .await
}

pub async fn get_account_by_referral_code(
    pool: &PgPool,
    referral_code: &str,
) -> Result<Option<Account>> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE referral_code = $1")
        .bind(referral_code)
        .fetch_optional(pool)
        .await
}

pub async fn phone_exists(pool: &PgPool, phone_number: &str) -> Result<bool> {
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM accounts WHERE phone_number = $1)")
            .bind(phone_number)
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}

pub async fn referral_code_exists(pool: &PgPool, referral_code: &str) -> Result<bool> {
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM accounts WHERE referral_code = $1)")
            .bind(referral_code)
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}

/// Take the account row lock. Every balance or premium-flag mutation
/// happens under this lock so concurrent requests for the same account
/// serialize at the store.
pub async fn lock_account(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Account> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_one(&mut **executor)
        .await
}

pub async fn update_account_balances(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    balance: &BigDecimal,
    total_earned: &BigDecimal,
) -> Result<()> {
    sqlx::query(
        "UPDATE accounts SET balance = $2, total_earned = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(balance)
    .bind(total_earned)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

pub async fn set_account_premium(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    activated_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE accounts
        SET is_premium = TRUE, premium_activated_at = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(activated_at)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

pub async fn increment_surveys_completed(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<()> {
    sqlx::query(
        "UPDATE accounts SET surveys_completed = surveys_completed + 1, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

// --- Ledger Queries ---

pub async fn insert_ledger_entry(
    executor: &mut SqlxTransaction<'_, Postgres>,
    entry: &LedgerEntry,
) -> Result<LedgerEntry> {
    sqlx::query_as::<_, LedgerEntry>(
        r#"
        INSERT INTO ledger_entries (
            id, account_id, amount, kind, description, status,
            mpesa_receipt, mpesa_phone, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(entry.id)
    .bind(entry.account_id)
    .bind(&entry.amount)
    .bind(&entry.kind)
    .bind(&entry.description)
    .bind(&entry.status)
    .bind(&entry.mpesa_receipt)
    .bind(&entry.mpesa_phone)
    .bind(entry.created_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn list_ledger_entries(
    pool: &PgPool,
    account_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<LedgerEntry>> {
    sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM ledger_entries WHERE account_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(account_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

// --- M-Pesa Payment Queries ---

pub async fn insert_mpesa_payment(pool: &PgPool, payment: &MpesaPayment) -> Result<MpesaPayment> {
    sqlx::query_as::<_, MpesaPayment>(
        r#"
        INSERT INTO mpesa_payments (
            id, account_id, phone_number, amount, checkout_request_id,
            merchant_request_id, mpesa_receipt, account_reference, transaction_desc,
            result_code, result_desc, status, transaction_date, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *
        "#,
    )
    .bind(payment.id)
    .bind(payment.account_id)
    .bind(&payment.phone_number)
    .bind(&payment.amount)
    .bind(&payment.checkout_request_id)
    .bind(&payment.merchant_request_id)
    .bind(&payment.mpesa_receipt)
    .bind(&payment.account_reference)
    .bind(&payment.transaction_desc)
    .bind(payment.result_code)
    .bind(&payment.result_desc)
    .bind(&payment.status)
    .bind(&payment.transaction_date)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn get_payment_by_checkout_id(
    pool: &PgPool,
    checkout_request_id: &str,
) -> Result<Option<MpesaPayment>> {
    sqlx::query_as::<_, MpesaPayment>(
        "SELECT * FROM mpesa_payments WHERE checkout_request_id = $1",
    )
    .bind(checkout_request_id)
    .fetch_optional(pool)
    .await
}

/// Same lookup, but holding the row lock for the rest of the
/// transaction. The reconciler re-checks status under this lock before
/// applying a terminal transition.
pub async fn lock_payment_by_checkout_id(
    executor: &mut SqlxTransaction<'_, Postgres>,
    checkout_request_id: &str,
) -> Result<Option<MpesaPayment>> {
    sqlx::query_as::<_, MpesaPayment>(
        "SELECT * FROM mpesa_payments WHERE checkout_request_id = $1 FOR UPDATE",
    )
    .bind(checkout_request_id)
    .fetch_optional(&mut **executor)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn mark_payment_completed(
    executor: &mut SqlxTransaction<'_, Postgres>,
    checkout_request_id: &str,
    result_code: i32,
    result_desc: Option<&str>,
    mpesa_receipt: Option<&str>,
    phone_number: Option<&str>,
    transaction_date: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE mpesa_payments
        SET status = 'COMPLETED',
            result_code = $2,
            result_desc = $3,
            mpesa_receipt = COALESCE($4, mpesa_receipt),
            phone_number = COALESCE($5, phone_number),
            transaction_date = COALESCE($6, transaction_date),
            updated_at = NOW()
        WHERE checkout_request_id = $1
        "#,
    )
    .bind(checkout_request_id)
    .bind(result_code)
    .bind(result_desc)
    .bind(mpesa_receipt)
    .bind(phone_number)
    .bind(transaction_date)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

pub async fn mark_payment_failed(
    executor: &mut SqlxTransaction<'_, Postgres>,
    checkout_request_id: &str,
    result_code: i32,
    result_desc: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE mpesa_payments
        SET status = 'FAILED', result_code = $2, result_desc = $3, updated_at = NOW()
        WHERE checkout_request_id = $1
        "#,
    )
    .bind(checkout_request_id)
    .bind(result_code)
    .bind(result_desc)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

// --- Survey Queries ---

pub async fn get_survey(pool: &PgPool, id: Uuid) -> Result<Survey> {
    sqlx::query_as::<_, Survey>("SELECT * FROM surveys WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

/// Active surveys the account has not yet started or completed.
/// Premium-only surveys are filtered out for non-premium accounts.
pub async fn list_available_surveys(
    pool: &PgPool,
    account_id: Uuid,
    include_premium: bool,
    limit: i64,
) -> Result<Vec<Survey>> {
    sqlx::query_as::<_, Survey>(
        r#"
        SELECT s.* FROM surveys s
        WHERE s.is_active = TRUE
        AND (s.is_premium_only = FALSE OR $2)
        AND NOT EXISTS (
            SELECT 1 FROM survey_assignments a
            WHERE a.survey_id = s.id
            AND a.account_id = $1
            AND a.status IN ('started', 'completed')
        )
        ORDER BY s.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(account_id)
    .bind(include_premium)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn get_assignment(
    pool: &PgPool,
    account_id: Uuid,
    survey_id: Uuid,
) -> Result<Option<SurveyAssignment>> {
    sqlx::query_as::<_, SurveyAssignment>(
        "SELECT * FROM survey_assignments WHERE account_id = $1 AND survey_id = $2",
    )
    .bind(account_id)
    .bind(survey_id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_assignment(
    pool: &PgPool,
    assignment: &SurveyAssignment,
) -> Result<SurveyAssignment> {
    sqlx::query_as::<_, SurveyAssignment>(
        r#"
        INSERT INTO survey_assignments (
            id, account_id, survey_id, status, earnings,
            assigned_at, started_at, completed_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(assignment.id)
    .bind(assignment.account_id)
    .bind(assignment.survey_id)
    .bind(&assignment.status)
    .bind(&assignment.earnings)
    .bind(assignment.assigned_at)
    .bind(assignment.started_at)
    .bind(assignment.completed_at)
    .fetch_one(pool)
    .await
}

pub async fn complete_assignment(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    earnings: &BigDecimal,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE survey_assignments
        SET status = 'completed', earnings = $2, completed_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(earnings)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

pub async fn count_completed_assignments(pool: &PgPool, account_id: Uuid) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM survey_assignments WHERE account_id = $1 AND status = 'completed'",
    )
    .bind(account_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}
