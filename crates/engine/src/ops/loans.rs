use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, prelude::*, sea_query::Expr};
use uuid::Uuid;

use crate::{Direction, EngineError, ResultEngine, Transaction, transactions};

mod create;
mod delete;
mod detail;
mod transfer;
mod update;

/// `Loan from X to Y`.
pub(in crate::ops) fn loan_title(lender_name: &str, borrower_name: &str) -> String {
    format!("Loan from {lender_name} to {borrower_name}")
}

/// Ledger entry description for one side of a loan.
pub(in crate::ops) fn entry_description(direction: Direction, description: &str) -> String {
    match direction {
        Direction::Out => format!("Loan given: {description}"),
        Direction::In => format!("Loan received: {description}"),
    }
}

/// Surface store constraint violations as client errors instead of raw
/// database errors.
pub(in crate::ops) fn conflict_or_db(err: sea_orm::DbErr) -> EngineError {
    match err.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
            EngineError::Conflict("a unique constraint was violated".to_string())
        }
        Some(sea_orm::SqlErr::ForeignKeyConstraintViolation(_)) => {
            EngineError::Conflict("a foreign key constraint was violated".to_string())
        }
        _ => EngineError::Database(err),
    }
}

impl super::Engine {
    /// Writes one ledger entry for a loan side.
    #[allow(clippy::too_many_arguments)]
    pub(in crate::ops) async fn insert_loan_entry(
        &self,
        db: &DatabaseTransaction,
        loan_id: Uuid,
        direction: Direction,
        amount_minor: i64,
        description: &str,
        payer_id: Uuid,
        group_id: Option<Uuid>,
        title: &str,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Transaction> {
        let entry = Transaction::new(
            loan_id,
            direction,
            amount_minor,
            entry_description(direction, description),
            payer_id,
            group_id,
            title.to_string(),
            occurred_at,
        )?;
        transactions::ActiveModel::from(&entry)
            .insert(db)
            .await
            .map_err(conflict_or_db)?;
        Ok(entry)
    }

    /// Tombstones every live entry of a loan.
    pub(in crate::ops) async fn tombstone_loan_entries(
        &self,
        db: &DatabaseTransaction,
        loan_id: Uuid,
        at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        transactions::Entity::update_many()
            .col_expr(transactions::Column::DeletedAt, Expr::value(at))
            .filter(transactions::Column::LoanId.eq(loan_id.to_string()))
            .filter(transactions::Column::DeletedAt.is_null())
            .exec(db)
            .await?;
        Ok(())
    }

    /// Re-derives amount and description on every live entry of a loan.
    ///
    /// Descriptions keep their direction prefix, so both legs stay in step
    /// with the loan after any amount or wording change.
    pub(in crate::ops) async fn cascade_loan_entries(
        &self,
        db: &DatabaseTransaction,
        loan_id: Uuid,
        amount_minor: i64,
        description: &str,
    ) -> ResultEngine<()> {
        let entry_models = transactions::Entity::find()
            .filter(transactions::Column::LoanId.eq(loan_id.to_string()))
            .filter(transactions::Column::DeletedAt.is_null())
            .all(db)
            .await?;

        for model in entry_models {
            let direction = Direction::try_from(model.direction.as_str())?;
            let active = transactions::ActiveModel {
                id: ActiveValue::Set(model.id),
                amount_minor: ActiveValue::Set(amount_minor),
                description: ActiveValue::Set(entry_description(direction, description)),
                ..Default::default()
            };
            active.update(db).await?;
        }
        Ok(())
    }
}
