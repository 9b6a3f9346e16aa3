use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Direction, EngineError, Loan, LoanDetail, LoanStatus, ResultEngine, TransferLoanCmd, loans,
};

use super::super::{Engine, normalize_required_text, with_tx};
use super::conflict_or_db;

impl Engine {
    /// Moves a loan to a new registered borrower, or hands the acting user's
    /// own side to an external email contact.
    ///
    /// Stale ledger entries are tombstoned and fresh legs written, never
    /// mutated in place, so the ledger records who held which leg when.
    pub async fn transfer_loan(&self, cmd: TransferLoanCmd) -> ResultEngine<LoanDetail> {
        with_tx!(self, |db_tx| self.transfer_loan_in_tx(&db_tx, &cmd).await)
    }

    async fn transfer_loan_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &TransferLoanCmd,
    ) -> ResultEngine<LoanDetail> {
        let model = self.require_loan(db_tx, cmd.loan_id).await?;
        let loan = Loan::try_from(model)?;

        if loan.status == LoanStatus::Repaid {
            return Err(EngineError::Forbidden(
                "cannot transfer a repaid loan; create a new loan instead".to_string(),
            ));
        }

        match (cmd.new_borrower_id, cmd.new_party_email.as_deref()) {
            (Some(_), Some(_)) => Err(EngineError::Validation(
                "cannot transfer to both a registered user and an email; choose one".to_string(),
            )),
            (None, None) => Err(EngineError::Validation(
                "must provide either a new borrower id or a new party email".to_string(),
            )),
            (Some(new_borrower_id), None) => {
                self.transfer_to_registered(db_tx, &loan, new_borrower_id, cmd.acting_user_id)
                    .await
            }
            (None, Some(email)) => {
                self.transfer_to_email(db_tx, &loan, email, cmd.acting_user_id)
                    .await
            }
        }
    }

    async fn transfer_to_registered(
        &self,
        db_tx: &DatabaseTransaction,
        loan: &Loan,
        new_borrower_id: Uuid,
        acting_user_id: Uuid,
    ) -> ResultEngine<LoanDetail> {
        if loan.lender_user_id() != Some(acting_user_id) {
            return Err(EngineError::Unauthorized(
                "only the lender can transfer the loan to a registered borrower".to_string(),
            ));
        }

        let new_borrower = self.require_user(db_tx, new_borrower_id).await?;
        if loan.borrower_user_id() == Some(new_borrower_id) {
            return Err(EngineError::Validation(
                "loan is already assigned to this borrower".to_string(),
            ));
        }

        let lender_name = self.party_display_name(db_tx, loan.lender.as_ref()).await?;
        let now = Utc::now();

        self.tombstone_loan_entries(db_tx, loan.id, now).await?;
        self.insert_loan_entry(
            db_tx,
            loan.id,
            Direction::Out,
            loan.amount_minor,
            &loan.description,
            acting_user_id,
            loan.group_id,
            &format!("Loan given to {}", new_borrower.first_name),
            now,
        )
        .await?;
        self.insert_loan_entry(
            db_tx,
            loan.id,
            Direction::In,
            loan.amount_minor,
            &loan.description,
            new_borrower_id,
            loan.group_id,
            &format!("Loan received from {lender_name}"),
            now,
        )
        .await?;

        let active = loans::ActiveModel {
            id: ActiveValue::Set(loan.id.to_string()),
            borrower_id: ActiveValue::Set(Some(new_borrower_id.to_string())),
            borrower_email: ActiveValue::Set(None),
            lender_email: ActiveValue::Set(None),
            ..Default::default()
        };
        active.update(db_tx).await.map_err(conflict_or_db)?;

        let model = self.require_loan(db_tx, loan.id).await?;
        self.hydrate_loan(db_tx, model).await
    }

    async fn transfer_to_email(
        &self,
        db_tx: &DatabaseTransaction,
        loan: &Loan,
        email: &str,
        acting_user_id: Uuid,
    ) -> ResultEngine<LoanDetail> {
        let is_lender = loan.lender_user_id() == Some(acting_user_id);
        let is_borrower = loan.borrower_user_id() == Some(acting_user_id);
        if !is_lender && !is_borrower {
            return Err(EngineError::Unauthorized(
                "only the lender or current borrower can transfer the loan".to_string(),
            ));
        }

        let email = normalize_required_text(email, "email")?;
        let now = Utc::now();

        self.tombstone_loan_entries(db_tx, loan.id, now).await?;

        // One fresh leg for the side that stays registered; the other side
        // becomes an external contact.
        let (direction, title) = if is_lender {
            (Direction::Out, "Loan with new borrower contact")
        } else {
            (Direction::In, "Loan with new lender contact")
        };
        self.insert_loan_entry(
            db_tx,
            loan.id,
            direction,
            loan.amount_minor,
            &loan.description,
            acting_user_id,
            loan.group_id,
            title,
            now,
        )
        .await?;

        let active = if is_lender {
            loans::ActiveModel {
                id: ActiveValue::Set(loan.id.to_string()),
                borrower_id: ActiveValue::Set(None),
                borrower_email: ActiveValue::Set(Some(email)),
                lender_email: ActiveValue::Set(None),
                ..Default::default()
            }
        } else {
            loans::ActiveModel {
                id: ActiveValue::Set(loan.id.to_string()),
                lender_id: ActiveValue::Set(None),
                lender_email: ActiveValue::Set(Some(email)),
                borrower_email: ActiveValue::Set(None),
                ..Default::default()
            }
        };
        active.update(db_tx).await.map_err(conflict_or_db)?;

        let model = self.require_loan(db_tx, loan.id).await?;
        self.hydrate_loan(db_tx, model).await
    }
}
