use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::BigDecimal;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub pin_hash: String,
    pub balance: BigDecimal,
    pub total_earned: BigDecimal,
    pub is_premium: bool,
    pub premium_activated_at: Option<DateTime<Utc>>,
    pub referral_code: String,
    pub referred_by: Option<Uuid>,
    pub surveys_completed: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Balance-affecting event. Rows are append-only; nothing updates a
/// ledger entry after insertion.
#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: BigDecimal,
    pub kind: String,
    pub description: String,
    pub status: String,
    pub mpesa_receipt: Option<String>,
    pub mpesa_phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(account_id: Uuid, amount: BigDecimal, kind: EntryKind, description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount,
            kind: kind.to_string(),
            description,
            status: "completed".to_string(),
            mpesa_receipt: None,
            mpesa_phone: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Earning,
    Withdrawal,
    Bonus,
    Referral,
    Premium,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Earning => "earning",
            EntryKind::Withdrawal => "withdrawal",
            EntryKind::Bonus => "bonus",
            EntryKind::Referral => "referral",
            EntryKind::Premium => "premium",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mobile-money payment tracked from STK push initiation to the
/// provider callback. `checkout_request_id` is the correlation key.
#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct MpesaPayment {
    pub id: Uuid,
    pub account_id: Uuid,
    pub phone_number: String,
    pub amount: BigDecimal,
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub mpesa_receipt: Option<String>,
    pub account_reference: String,
    pub transaction_desc: String,
    pub result_code: Option<i32>,
    pub result_desc: Option<String>,
    pub status: String,
    pub transaction_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MpesaPayment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: Uuid,
        phone_number: String,
        amount: BigDecimal,
        checkout_request_id: String,
        merchant_request_id: String,
        account_reference: String,
        transaction_desc: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            phone_number,
            amount,
            checkout_request_id,
            merchant_request_id,
            mpesa_receipt: None,
            account_reference,
            transaction_desc,
            result_code: None,
            result_desc: None,
            status: PaymentStatus::Pending.to_string(),
            transaction_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn payment_status(&self) -> Option<PaymentStatus> {
        self.status.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct Survey {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub reward_amount: BigDecimal,
    pub estimated_minutes: i32,
    pub category: String,
    pub is_premium_only: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-account survey status: assigned -> started -> completed,
/// unique per (account, survey).
#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct SurveyAssignment {
    pub id: Uuid,
    pub account_id: Uuid,
    pub survey_id: Uuid,
    pub status: String,
    pub earnings: Option<BigDecimal>,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
