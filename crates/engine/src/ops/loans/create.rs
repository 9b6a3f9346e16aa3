use chrono::Utc;
use sea_orm::{DatabaseTransaction, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Direction, EngineError, Loan, LoanCreateCmd, LoanDetail, LoanStatus, NotificationDraft,
    NotificationKind, Party, ResultEngine, loans,
};

use super::super::{Engine, normalize_required_text, with_tx};
use super::{conflict_or_db, loan_title};

impl Engine {
    /// Creates an individual loan with one ledger entry per registered side,
    /// then records a `loan_created` notification for every registered party.
    ///
    /// Notification recording happens after the commit and never fails the
    /// create.
    pub async fn create_loan(&self, cmd: LoanCreateCmd) -> ResultEngine<LoanDetail> {
        let (detail, drafts) =
            with_tx!(self, |db_tx| self.create_loan_in_tx(&db_tx, &cmd).await)?;
        self.emit_notifications(drafts).await;
        Ok(detail)
    }

    async fn create_loan_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &LoanCreateCmd,
    ) -> ResultEngine<(LoanDetail, Vec<NotificationDraft>)> {
        if cmd.amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }
        let description = normalize_required_text(&cmd.description, "description")?;
        if cmd.counterparty_id.is_some() && cmd.counterparty_email.is_some() {
            return Err(EngineError::Validation(
                "provide either a counterparty id or an email, not both".to_string(),
            ));
        }

        self.require_user(db_tx, cmd.acting_user_id).await?;
        if let Some(counterparty_id) = cmd.counterparty_id {
            self.require_user(db_tx, counterparty_id).await?;
        }

        let acting = Party::Registered {
            user_id: cmd.acting_user_id,
        };
        let counterparty = match (cmd.counterparty_id, cmd.counterparty_email.clone()) {
            (Some(user_id), _) => Some(Party::Registered { user_id }),
            (None, Some(email)) => Some(Party::External { email }),
            (None, None) => None,
        };

        let (lender, borrower) = match cmd.direction {
            Direction::Out => (Some(acting), counterparty),
            Direction::In => (counterparty, Some(acting)),
        };

        let lender_id = lender.as_ref().and_then(Party::user_id);
        let borrower_id = borrower.as_ref().and_then(Party::user_id);
        if lender_id.is_none() && borrower_id.is_none() {
            return Err(EngineError::Validation(
                "at least one party must be a registered user".to_string(),
            ));
        }

        let fully_registered = lender_id.is_some() && borrower_id.is_some();
        if cmd.group_id.is_some() && !fully_registered {
            return Err(EngineError::Validation(
                "cannot attach a group unless both parties are registered users".to_string(),
            ));
        }
        if let Some(group_id) = cmd.group_id {
            self.require_group(db_tx, group_id).await?;
        }

        let lender_name = self.party_display_name(db_tx, lender.as_ref()).await?;
        let borrower_name = self.party_display_name(db_tx, borrower.as_ref()).await?;
        let title = loan_title(&lender_name, &borrower_name);

        let now = Utc::now();
        let loan = Loan {
            id: Uuid::new_v4(),
            amount_minor: cmd.amount_minor,
            description: description.clone(),
            due_date: cmd.due_date,
            status: cmd.status.unwrap_or(LoanStatus::Active),
            is_acknowledged: fully_registered,
            lender,
            borrower,
            group_id: cmd.group_id,
            parent_id: None,
            deleted_at: None,
        };
        loans::ActiveModel::from(&loan)
            .insert(db_tx)
            .await
            .map_err(conflict_or_db)?;

        if let Some(payer_id) = loan.lender_user_id() {
            self.insert_loan_entry(
                db_tx,
                loan.id,
                Direction::Out,
                loan.amount_minor,
                &description,
                payer_id,
                loan.group_id,
                &title,
                now,
            )
            .await?;
        }
        if let Some(payer_id) = loan.borrower_user_id() {
            self.insert_loan_entry(
                db_tx,
                loan.id,
                Direction::In,
                loan.amount_minor,
                &description,
                payer_id,
                loan.group_id,
                &title,
                now,
            )
            .await?;
        }

        let recipients = loan.registered_party_ids();
        let mut drafts = Vec::new();
        if !recipients.is_empty() {
            drafts.push(NotificationDraft {
                kind: NotificationKind::LoanCreated,
                message: format!(
                    "A new loan has been created between {lender_name} and {borrower_name}"
                ),
                user_ids: recipients,
                payload: serde_json::json!({
                    "loan_id": loan.id,
                    "amount_minor": loan.amount_minor,
                    "lender_email": loan.lender.as_ref().and_then(Party::email),
                    "borrower_email": loan.borrower.as_ref().and_then(Party::email),
                }),
                loan_id: Some(loan.id),
                group_id: loan.group_id,
            });
        }

        let model = self.require_loan(db_tx, loan.id).await?;
        let detail = self.hydrate_loan(db_tx, model).await?;
        Ok((detail, drafts))
    }
}
