use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::AppError;
use crate::services::accounts::AccountService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub phone_number: String,
    pub pin: String,
    pub confirm_pin: String,
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub phone_number: String,
    pub pin: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.pin != payload.confirm_pin {
        return Err(AppError::Validation("PINs do not match".into()));
    }

    let service = AccountService::new(state.db.clone());
    let account = service
        .register(
            &payload.phone_number,
            &payload.pin,
            payload.referral_code.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Registration successful! Ksh 500 bonus credited.",
        "accountId": account.id,
        "referralCode": account.referral_code,
    })))
}

/// One uniform failure message: a missing account and a wrong PIN are
/// not distinguishable from the response.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let service = AccountService::new(state.db.clone());

    match service.authenticate(&payload.phone_number, &payload.pin).await? {
        Some(account) => Ok(Json(json!({
            "success": true,
            "message": "Login successful!",
            "accountId": account.id,
        }))
        .into_response()),
        None => Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "success": false,
                "message": "Invalid phone number or PIN",
            })),
        )
            .into_response()),
    }
}
