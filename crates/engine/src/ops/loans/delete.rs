use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, loans};

use super::super::{Engine, with_tx};

impl Engine {
    /// Soft-deletes a loan and all its ledger entries.
    ///
    /// Only the lender may delete; anyone else (the borrower included) sees
    /// the same `NotFound` as for a missing loan. Deleting an already-deleted
    /// loan reports `NotFound` and never cascades twice.
    pub async fn delete_loan(&self, loan_id: Uuid, acting_user_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = loans::Entity::find_by_id(loan_id.to_string())
                .filter(loans::Column::DeletedAt.is_null())
                .filter(loans::Column::LenderId.eq(acting_user_id.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("loan {loan_id} not found")))?;

            let now = Utc::now();
            let active = loans::ActiveModel {
                id: ActiveValue::Set(model.id),
                deleted_at: ActiveValue::Set(Some(now)),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            self.tombstone_loan_entries(&db_tx, loan_id, now).await?;
            Ok(())
        })
    }
}
