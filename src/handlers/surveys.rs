use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::services::surveys::SurveyService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountQuery {
    pub account_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBody {
    pub account_id: Uuid,
}

pub async fn list_available(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
) -> Result<impl IntoResponse, AppError> {
    let surveys = SurveyService::new(state.db.clone())
        .available(query.account_id)
        .await?;

    Ok(Json(surveys))
}

pub async fn start_survey(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Json(payload): Json<AccountBody>,
) -> Result<impl IntoResponse, AppError> {
    let assignment = SurveyService::new(state.db.clone())
        .start(payload.account_id, survey_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "assignmentId": assignment.id,
        "status": assignment.status,
    })))
}

pub async fn complete_survey(
    State(state): State<AppState>,
    Path(survey_id): Path<Uuid>,
    Json(payload): Json<AccountBody>,
) -> Result<impl IntoResponse, AppError> {
    let entry = SurveyService::new(state.db.clone())
        .complete(payload.account_id, survey_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Survey completed! Ksh {} credited.", entry.amount),
        "earned": entry.amount,
    })))
}
