//! Premium entitlement grant. One unit of work: premium flag +
//! activation timestamp, the Ksh 500 bonus credit, and the two ledger
//! rows (bonus + zero-amount activation marker).

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::db::models::{EntryKind, LedgerEntry};
use crate::db::queries;
use crate::error::AppError;
use crate::services::ledger;

pub fn premium_bonus() -> BigDecimal {
    BigDecimal::from(500)
}

#[derive(Clone)]
pub struct MembershipService {
    pool: PgPool,
}

impl MembershipService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Standalone activation in its own transaction. The caller is
    /// responsible for the "already premium" guard.
    pub async fn activate_premium(&self, account_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        activate(&mut tx, account_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Grant the entitlement on the caller's transaction. Does not re-check
/// the premium flag; the reconciler owns that guard.
pub(crate) async fn activate(
    executor: &mut SqlxTransaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<(), AppError> {
    queries::set_account_premium(executor, account_id, Utc::now()).await?;

    let bonus = LedgerEntry::new(
        account_id,
        premium_bonus(),
        EntryKind::Bonus,
        "Premium Activation Bonus".to_string(),
    );
    ledger::apply_credit(executor, &bonus).await?;

    // The payment itself is settled on the provider's side; this row
    // only marks the activation event.
    let marker = LedgerEntry::new(
        account_id,
        BigDecimal::from(0),
        EntryKind::Premium,
        "Premium Membership Activation".to_string(),
    );
    ledger::append_record(executor, &marker).await?;

    tracing::info!(account_id = %account_id, "premium membership activated");
    Ok(())
}
