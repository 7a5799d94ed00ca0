//! Survey catalog and per-account assignment tracking
//! (assigned -> started -> completed). Completing a survey credits the
//! reward through the ledger.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{EntryKind, LedgerEntry, Survey, SurveyAssignment};
use crate::db::queries;
use crate::error::AppError;
use crate::services::ledger;

const AVAILABLE_SURVEYS_LIMIT: i64 = 5;

#[derive(Clone)]
pub struct SurveyService {
    pool: PgPool,
}

impl SurveyService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn available(&self, account_id: Uuid) -> Result<Vec<Survey>, AppError> {
        let account = queries::get_account(&self.pool, account_id)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => AppError::NotFound(format!("Account {account_id}")),
                other => AppError::Database(other),
            })?;

        Ok(queries::list_available_surveys(
            &self.pool,
            account.id,
            account.is_premium,
            AVAILABLE_SURVEYS_LIMIT,
        )
        .await?)
    }

    pub async fn start(
        &self,
        account_id: Uuid,
        survey_id: Uuid,
    ) -> Result<SurveyAssignment, AppError> {
        let survey = self.get_active_survey(survey_id).await?;

        let account = queries::get_account(&self.pool, account_id)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => AppError::NotFound(format!("Account {account_id}")),
                other => AppError::Database(other),
            })?;

        if survey.is_premium_only && !account.is_premium {
            return Err(AppError::Validation(
                "This survey is for premium members only".into(),
            ));
        }

        if let Some(assignment) = queries::get_assignment(&self.pool, account_id, survey_id).await? {
            return match assignment.status.as_str() {
                "completed" => Err(AppError::Validation("Survey already completed".into())),
                _ => Ok(assignment),
            };
        }

        let now = Utc::now();
        let assignment = SurveyAssignment {
            id: Uuid::new_v4(),
            account_id,
            survey_id,
            status: "started".to_string(),
            earnings: None,
            assigned_at: now,
            started_at: Some(now),
            completed_at: None,
        };

        Ok(queries::insert_assignment(&self.pool, &assignment).await?)
    }

    /// Mark the assignment completed and credit the reward. Assignment
    /// update, earnings credit and counter bump are one transaction.
    pub async fn complete(
        &self,
        account_id: Uuid,
        survey_id: Uuid,
    ) -> Result<LedgerEntry, AppError> {
        let survey = self.get_active_survey(survey_id).await?;

        let Some(assignment) = queries::get_assignment(&self.pool, account_id, survey_id).await?
        else {
            return Err(AppError::NotFound(format!(
                "No assignment for survey {survey_id}"
            )));
        };

        if assignment.status == "completed" {
            return Err(AppError::Validation("Survey already completed".into()));
        }

        let mut tx = self.pool.begin().await?;

        queries::complete_assignment(&mut tx, assignment.id, &survey.reward_amount).await?;
        queries::increment_surveys_completed(&mut tx, account_id).await?;

        let entry = LedgerEntry::new(
            account_id,
            survey.reward_amount.clone(),
            EntryKind::Earning,
            format!("Survey completion: {}", survey.title),
        );
        let entry = ledger::apply_credit(&mut tx, &entry).await?;

        tx.commit().await?;

        tracing::info!(
            account_id = %account_id,
            survey_id = %survey_id,
            reward = %survey.reward_amount,
            "survey completed, reward credited"
        );
        Ok(entry)
    }

    async fn get_active_survey(&self, survey_id: Uuid) -> Result<Survey, AppError> {
        let survey = queries::get_survey(&self.pool, survey_id)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => AppError::NotFound(format!("Survey {survey_id}")),
                other => AppError::Database(other),
            })?;

        if !survey.is_active {
            return Err(AppError::NotFound(format!("Survey {survey_id}")));
        }

        Ok(survey)
    }
}
