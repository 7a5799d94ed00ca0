use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::types::BigDecimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::AppState;
use crate::db::queries;
use crate::error::AppError;
use crate::services::ledger::LedgerService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub account_id: Uuid,
    pub amount: Value,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn parse_money(value: &Value) -> Result<BigDecimal, AppError> {
    let parsed = match value {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    };

    parsed.ok_or_else(|| AppError::InvalidFormat("Amount must be a number".into()))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Json(payload): Json<WithdrawRequest>,
) -> Result<impl IntoResponse, AppError> {
    let amount = parse_money(&payload.amount)?;

    let phone_number = match payload.phone_number {
        Some(raw) => Some(crate::phone::to_msisdn(&raw)?),
        None => None,
    };

    let entry = LedgerService::new(state.db.clone())
        .withdraw(payload.account_id, amount, phone_number)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Withdrawal request received",
        "transactionId": entry.id,
        "amount": entry.amount,
    })))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let limit = pagination.limit.unwrap_or(20);
    let offset = pagination.offset.unwrap_or(0);

    let entries = LedgerService::new(state.db.clone())
        .history(account_id, limit, offset)
        .await?;

    Ok(Json(entries))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let account = queries::get_account(&state.db, account_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => AppError::NotFound(format!("Account {account_id}")),
            other => AppError::Database(other),
        })?;

    let completed_surveys = queries::count_completed_assignments(&state.db, account_id).await?;

    Ok(Json(json!({
        "success": true,
        "phoneNumber": account.phone_number,
        "balance": account.balance,
        "totalEarned": account.total_earned,
        "completedSurveys": completed_surveys,
        "isPremium": account.is_premium,
        "referralCode": account.referral_code,
    })))
}
