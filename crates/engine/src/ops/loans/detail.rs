use sea_orm::{DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{LoanDetails, LoanViewKind, ResultEngine, SplitDetail, loans};

use super::super::{Engine, with_tx};

impl Engine {
    /// Returns a loan hydrated with parties and live ledger entries; the
    /// split view additionally carries the live children.
    pub async fn loan_details(
        &self,
        loan_id: Uuid,
        view: LoanViewKind,
    ) -> ResultEngine<LoanDetails> {
        with_tx!(self, |db_tx| {
            let model = self.require_loan(&db_tx, loan_id).await?;
            match view {
                LoanViewKind::Single => Ok(LoanDetails::Single(
                    self.hydrate_loan(&db_tx, model).await?,
                )),
                LoanViewKind::Split => Ok(LoanDetails::Split(
                    self.split_detail_in_tx(&db_tx, model).await?,
                )),
            }
        })
    }

    pub(in crate::ops) async fn split_detail_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        parent_model: loans::Model,
    ) -> ResultEngine<SplitDetail> {
        let parent = self.hydrate_loan(db_tx, parent_model).await?;

        let child_models = loans::Entity::find()
            .filter(loans::Column::ParentId.eq(parent.loan.id.to_string()))
            .filter(loans::Column::DeletedAt.is_null())
            .all(db_tx)
            .await?;
        let mut splits = Vec::with_capacity(child_models.len());
        for child_model in child_models {
            splits.push(self.hydrate_loan(db_tx, child_model).await?);
        }

        Ok(SplitDetail { parent, splits })
    }
}
