//! Payment reconciliation: owns a payment row from STK-push initiation
//! to its terminal state. The provider's asynchronous callback is the
//! only source of truth for success or failure; a callback that never
//! arrives leaves the row PENDING indefinitely, which is a represented
//! state, not a bug.

use serde::Serialize;
use sqlx::PgPool;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::db::models::{EntryKind, LedgerEntry, MpesaPayment, PaymentStatus};
use crate::db::queries;
use crate::error::AppError;
use crate::mpesa::DarajaClient;
use crate::mpesa::callback::StkCallback;
use crate::phone;
use crate::services::{ledger, membership};

const ACCOUNT_REFERENCE: &str = "TAJIRI";
const TRANSACTION_DESC: &str = "Premium Membership";

#[derive(Clone)]
pub struct PaymentReconciler {
    pool: PgPool,
    client: DarajaClient,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusReport {
    pub status: PaymentStatus,
    pub premium_active: bool,
    pub message: String,
}

impl PaymentReconciler {
    pub fn new(pool: PgPool, client: DarajaClient) -> Self {
        Self { pool, client }
    }

    /// Push the payment prompt and persist the PENDING row. A gateway
    /// failure is fail-fast: no row is created, nothing to reconcile.
    pub async fn initiate(
        &self,
        account_id: Uuid,
        phone_raw: &str,
        amount: i64,
    ) -> Result<MpesaPayment, AppError> {
        let account = queries::get_account(&self.pool, account_id)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => AppError::NotFound(format!("Account {account_id}")),
                other => AppError::Database(other),
            })?;

        let phone_number = phone::normalize(phone_raw)?;

        let acceptance = self
            .client
            .stk_push(&phone_number, amount, ACCOUNT_REFERENCE, TRANSACTION_DESC)
            .await?;

        let payment = MpesaPayment::new(
            account.id,
            phone_number,
            BigDecimal::from(amount),
            acceptance.checkout_request_id,
            acceptance.merchant_request_id,
            ACCOUNT_REFERENCE.to_string(),
            TRANSACTION_DESC.to_string(),
        );

        // checkout_request_id is unique; a duplicated acceptance from
        // the gateway cannot create a second trackable row.
        let payment = queries::insert_mpesa_payment(&self.pool, &payment).await?;

        tracing::info!(
            checkout_request_id = %payment.checkout_request_id,
            account_id = %account.id,
            amount = %payment.amount,
            "STK push accepted, payment pending"
        );

        Ok(payment)
    }

    /// Apply a provider callback. Duplicate and unknown callbacks are
    /// no-ops; the caller acknowledges the provider regardless.
    pub async fn apply_callback(&self, callback: &StkCallback) -> Result<(), AppError> {
        let checkout_request_id = callback.checkout_request_id.as_str();

        let Some(payment) =
            queries::get_payment_by_checkout_id(&self.pool, checkout_request_id).await?
        else {
            tracing::warn!(
                checkout_request_id = %checkout_request_id,
                "callback for unknown checkout request id, acknowledging anyway"
            );
            return Ok(());
        };

        if payment.payment_status().is_some_and(|s| s.is_terminal()) {
            tracing::info!(
                checkout_request_id = %checkout_request_id,
                status = %payment.status,
                "duplicate callback for settled payment ignored"
            );
            return Ok(());
        }

        if callback.is_success() {
            self.complete(callback).await
        } else {
            self.fail(callback).await
        }
    }

    /// First transition to COMPLETED: payment row update, payment
    /// ledger record, and the entitlement grant (when the account is
    /// not yet premium) are one transaction. The status re-check under
    /// the row lock is what makes a racing duplicate callback a no-op.
    async fn complete(&self, callback: &StkCallback) -> Result<(), AppError> {
        let checkout_request_id = callback.checkout_request_id.as_str();

        let mut tx = self.pool.begin().await?;

        let Some(payment) =
            queries::lock_payment_by_checkout_id(&mut tx, checkout_request_id).await?
        else {
            return Ok(());
        };
        if payment.payment_status().is_some_and(|s| s.is_terminal()) {
            return Ok(());
        }

        let receipt = callback.mpesa_receipt();
        let paid_phone = callback.phone_number();

        queries::mark_payment_completed(
            &mut tx,
            checkout_request_id,
            callback.result_code,
            callback.result_desc.as_deref(),
            receipt.as_deref(),
            paid_phone.as_deref(),
            callback.transaction_date().as_deref(),
        )
        .await?;

        let account = queries::lock_account(&mut tx, payment.account_id).await?;
        if !account.is_premium {
            membership::activate(&mut tx, account.id).await?;
        }

        let mut entry = LedgerEntry::new(
            payment.account_id,
            payment.amount.clone(),
            EntryKind::Premium,
            format!(
                "Premium Activation Payment - M-Pesa Receipt: {}",
                receipt.as_deref().unwrap_or("N/A")
            ),
        );
        entry.mpesa_receipt = receipt;
        entry.mpesa_phone = paid_phone;
        ledger::append_record(&mut tx, &entry).await?;

        tx.commit().await?;

        tracing::info!(
            checkout_request_id = %checkout_request_id,
            account_id = %payment.account_id,
            "payment completed"
        );
        Ok(())
    }

    async fn fail(&self, callback: &StkCallback) -> Result<(), AppError> {
        let checkout_request_id = callback.checkout_request_id.as_str();

        let mut tx = self.pool.begin().await?;

        let Some(payment) =
            queries::lock_payment_by_checkout_id(&mut tx, checkout_request_id).await?
        else {
            return Ok(());
        };
        if payment.payment_status().is_some_and(|s| s.is_terminal()) {
            return Ok(());
        }

        queries::mark_payment_failed(
            &mut tx,
            checkout_request_id,
            callback.result_code,
            callback.result_desc.as_deref(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            checkout_request_id = %checkout_request_id,
            result_code = callback.result_code,
            result_desc = callback.result_desc.as_deref().unwrap_or(""),
            "payment failed"
        );
        Ok(())
    }

    /// Client-facing status poll. The account's premium flag is
    /// authoritative: when a callback has raced ahead of the poll the
    /// flag reports COMPLETED even if the row read is stale.
    pub async fn check_status(
        &self,
        checkout_request_id: &str,
    ) -> Result<PaymentStatusReport, AppError> {
        let Some(payment) =
            queries::get_payment_by_checkout_id(&self.pool, checkout_request_id).await?
        else {
            return Err(AppError::TransactionNotFound(checkout_request_id.to_string()));
        };

        let account = queries::get_account(&self.pool, payment.account_id).await?;

        let status = if account.is_premium {
            PaymentStatus::Completed
        } else {
            payment.payment_status().unwrap_or(PaymentStatus::Pending)
        };

        let message = match status {
            PaymentStatus::Completed => {
                "Payment received. Premium membership is active.".to_string()
            }
            PaymentStatus::Pending => {
                "Awaiting confirmation. Check your phone to complete the payment.".to_string()
            }
            PaymentStatus::Failed => payment
                .result_desc
                .clone()
                .unwrap_or_else(|| "Payment failed.".to_string()),
            PaymentStatus::Cancelled => "Payment was cancelled.".to_string(),
        };

        Ok(PaymentStatusReport {
            status,
            premium_active: account.is_premium,
            message,
        })
    }
}
