use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, loans, util::parse_uuid};

use super::super::{Engine, with_tx};

impl Engine {
    /// Soft-deletes a split loan: every live child and its entries first,
    /// then the parent and its own entries, atomically.
    ///
    /// Only the owning lender may delete; everyone else sees `NotFound`.
    pub async fn delete_split_loan(
        &self,
        loan_id: Uuid,
        acting_user_id: Uuid,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let parent_model = loans::Entity::find_by_id(loan_id.to_string())
                .filter(loans::Column::DeletedAt.is_null())
                .filter(loans::Column::LenderId.eq(acting_user_id.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("loan {loan_id} not found")))?;

            let now = Utc::now();

            let child_models = loans::Entity::find()
                .filter(loans::Column::ParentId.eq(loan_id.to_string()))
                .filter(loans::Column::DeletedAt.is_null())
                .all(&db_tx)
                .await?;
            for child_model in child_models {
                let child_id = parse_uuid(&child_model.id, "loan")?;
                let child_active = loans::ActiveModel {
                    id: ActiveValue::Set(child_model.id),
                    deleted_at: ActiveValue::Set(Some(now)),
                    ..Default::default()
                };
                child_active.update(&db_tx).await?;
                self.tombstone_loan_entries(&db_tx, child_id, now).await?;
            }

            let parent_active = loans::ActiveModel {
                id: ActiveValue::Set(parent_model.id),
                deleted_at: ActiveValue::Set(Some(now)),
                ..Default::default()
            };
            parent_active.update(&db_tx).await?;
            self.tombstone_loan_entries(&db_tx, loan_id, now).await?;

            Ok(())
        })
    }
}
