use axum::{
    Json,
    extract::{Path, State},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::mpesa::callback::CallbackEnvelope;
use crate::services::membership::MembershipService;
use crate::services::reconciler::PaymentReconciler;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub account_id: Uuid,
    pub phone_number: String,
    pub amount: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusRequest {
    pub checkout_request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivatePremiumRequest {
    pub account_id: Uuid,
}

fn reconciler(state: &AppState) -> PaymentReconciler {
    PaymentReconciler::new(state.db.clone(), state.daraja_client.clone())
}

/// Amount arrives as whatever the client sent; anything that is not a
/// positive whole number is rejected before the gateway is touched.
fn parse_amount(value: &Value) -> Result<i64, AppError> {
    let amount = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match amount {
        Some(amount) if amount > 0 => Ok(amount),
        _ => Err(AppError::InvalidFormat(
            "Amount must be a positive whole number".into(),
        )),
    }
}

pub async fn initiate_premium_payment(
    State(state): State<AppState>,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let amount = parse_amount(&payload.amount)?;

    let payment = reconciler(&state)
        .initiate(payload.account_id, &payload.phone_number, amount)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Check your phone to complete the payment",
        "checkoutRequestId": payment.checkout_request_id,
        "merchantRequestId": payment.merchant_request_id,
    })))
}

/// Provider callback. The response code here is a provider contract:
/// apart from a bad secret (403) and unparseable JSON (400), the
/// provider always gets a success acknowledgment — even when local
/// processing failed, which is logged and may leave the payment row
/// non-terminal.
pub async fn mpesa_callback(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    payload: Result<Json<CallbackEnvelope>, JsonRejection>,
) -> Response {
    if secret != state.config.mpesa.callback_secret {
        tracing::warn!("callback with invalid secret rejected");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"success": false, "message": "Forbidden"})),
        )
            .into_response();
    }

    let Json(envelope) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return AppError::MalformedCallback(rejection.body_text()).into_response();
        }
    };

    let callback = envelope.body.stk_callback;
    if let Err(e) = reconciler(&state).apply_callback(&callback).await {
        tracing::error!(
            error = %e,
            checkout_request_id = %callback.checkout_request_id,
            "callback processing failed, acknowledging provider anyway"
        );
    }

    Json(json!({"ResultCode": 0, "ResultDesc": "Success"})).into_response()
}

pub async fn check_payment_status(
    State(state): State<AppState>,
    Json(payload): Json<PaymentStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let report = reconciler(&state)
        .check_status(&payload.checkout_request_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "status": report.status.as_str(),
        "premiumActive": report.premium_active,
        "message": report.message,
    })))
}

/// Direct activation path, guarded here on the current premium flag.
pub async fn activate_premium(
    State(state): State<AppState>,
    Json(payload): Json<ActivatePremiumRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = crate::db::queries::get_account(&state.db, payload.account_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                AppError::NotFound(format!("Account {}", payload.account_id))
            }
            other => AppError::Database(other),
        })?;

    if account.is_premium {
        return Err(AppError::Validation(
            "You are already a premium member!".into(),
        ));
    }

    MembershipService::new(state.db.clone())
        .activate_premium(account.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Premium membership activated successfully! You now have access to premium surveys.",
    })))
}
