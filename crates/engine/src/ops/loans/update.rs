use sea_orm::{ActiveValue, DatabaseTransaction, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Loan, LoanDetail, LoanPatch, LoanStatus, NotificationDraft, NotificationKind,
    ResultEngine, loans, util::format_amount_minor,
};

use super::super::{Engine, normalize_required_text, with_tx};
use super::conflict_or_db;

impl Engine {
    /// Applies the fields present in `patch` to a loan the acting user is a
    /// party of, cascading amount/description changes to its live ledger
    /// entries in the same unit of work.
    pub async fn update_loan(
        &self,
        loan_id: Uuid,
        patch: LoanPatch,
        acting_user_id: Uuid,
    ) -> ResultEngine<LoanDetail> {
        let (detail, drafts) = with_tx!(self, |db_tx| {
            self.update_loan_in_tx(&db_tx, loan_id, &patch, acting_user_id)
                .await
        })?;
        self.emit_notifications(drafts).await;
        Ok(detail)
    }

    async fn update_loan_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        loan_id: Uuid,
        patch: &LoanPatch,
        acting_user_id: Uuid,
    ) -> ResultEngine<(LoanDetail, Vec<NotificationDraft>)> {
        let model = self.require_loan(db_tx, loan_id).await?;
        let loan = Loan::try_from(model)?;

        let lender_id = loan.lender_user_id();
        let borrower_id = loan.borrower_user_id();
        let is_lender = lender_id == Some(acting_user_id);
        let is_borrower = borrower_id == Some(acting_user_id);
        if !is_lender && !is_borrower {
            return Err(EngineError::Forbidden(
                "you are not authorized to update this loan".to_string(),
            ));
        }

        let lender_name = self.party_display_name(db_tx, loan.lender.as_ref()).await?;
        let borrower_name = self
            .party_display_name(db_tx, loan.borrower.as_ref())
            .await?;

        let mut active = loans::ActiveModel {
            id: ActiveValue::Set(loan.id.to_string()),
            ..Default::default()
        };
        let mut touched = false;

        if let Some(amount_minor) = patch.amount_minor {
            if amount_minor <= 0 {
                return Err(EngineError::Validation(
                    "amount_minor must be > 0".to_string(),
                ));
            }
            active.amount_minor = ActiveValue::Set(amount_minor);
            touched = true;
        }

        let description_after = match patch.description.as_deref() {
            Some(description) => {
                let description = normalize_required_text(description, "description")?;
                active.description = ActiveValue::Set(description.clone());
                touched = true;
                description
            }
            None => loan.description.clone(),
        };

        if let Some(due_date) = patch.due_date {
            active.due_date = ActiveValue::Set(due_date);
            touched = true;
        }

        // Both registered: either side may acknowledge. One side unregistered:
        // only the sole registered side may. Otherwise the change is ignored.
        if let Some(is_acknowledged) = patch.is_acknowledged {
            let may_acknowledge = (lender_id.is_some() && borrower_id.is_some())
                || (is_lender && borrower_id.is_none())
                || (is_borrower && lender_id.is_none());
            if may_acknowledge {
                active.is_acknowledged = ActiveValue::Set(is_acknowledged);
                touched = true;
            }
        }

        if let Some(status) = patch.status {
            active.status = ActiveValue::Set(status.as_str().to_string());
            touched = true;
        }

        let mut group_after = loan.group_id;
        if let Some(group_id) = patch.group_id
            && lender_id.is_some()
            && borrower_id.is_some()
        {
            self.require_group(db_tx, group_id).await?;
            active.group_id = ActiveValue::Set(Some(group_id.to_string()));
            group_after = Some(group_id);
            touched = true;
        }

        if touched {
            active.update(db_tx).await.map_err(conflict_or_db)?;
        }

        let amount_after = patch.amount_minor.unwrap_or(loan.amount_minor);
        if patch.amount_minor.is_some() || patch.description.is_some() {
            self.cascade_loan_entries(db_tx, loan.id, amount_after, &description_after)
                .await?;
        }

        let recipients = loan.registered_party_ids();
        let mut drafts = Vec::new();

        if let Some(new_status) = patch.status
            && new_status != loan.status
        {
            if new_status == LoanStatus::Repaid {
                let amount = format_amount_minor(amount_after);
                if let Some(lender_id) = lender_id {
                    drafts.push(NotificationDraft {
                        kind: NotificationKind::LoanRepaid,
                        message: format!("{borrower_name} has repaid the loan of {amount}"),
                        user_ids: vec![lender_id],
                        payload: serde_json::json!({
                            "loan_id": loan.id,
                            "amount_minor": amount_after,
                            "status": new_status,
                            "perspective": "lender",
                        }),
                        loan_id: Some(loan.id),
                        group_id: group_after,
                    });
                }
                if let Some(borrower_id) = borrower_id {
                    drafts.push(NotificationDraft {
                        kind: NotificationKind::LoanRepaid,
                        message: format!(
                            "You have repaid the loan of {amount} to {lender_name}"
                        ),
                        user_ids: vec![borrower_id],
                        payload: serde_json::json!({
                            "loan_id": loan.id,
                            "amount_minor": amount_after,
                            "status": new_status,
                            "perspective": "borrower",
                        }),
                        loan_id: Some(loan.id),
                        group_id: group_after,
                    });
                }
            } else if !recipients.is_empty() {
                drafts.push(NotificationDraft {
                    kind: NotificationKind::StatusChange,
                    message: format!(
                        "Loan status updated from {} to {}",
                        loan.status.as_str(),
                        new_status.as_str()
                    ),
                    user_ids: recipients.clone(),
                    payload: serde_json::json!({
                        "loan_id": loan.id,
                        "old_status": loan.status,
                        "new_status": new_status,
                    }),
                    loan_id: Some(loan.id),
                    group_id: group_after,
                });
            }
        }

        if let Some(new_amount) = patch.amount_minor
            && new_amount != loan.amount_minor
            && !recipients.is_empty()
        {
            drafts.push(NotificationDraft {
                kind: NotificationKind::BalanceUpdate,
                message: format!(
                    "Loan amount updated from {} to {}",
                    format_amount_minor(loan.amount_minor),
                    format_amount_minor(new_amount)
                ),
                user_ids: recipients,
                payload: serde_json::json!({
                    "loan_id": loan.id,
                    "old_amount_minor": loan.amount_minor,
                    "new_amount_minor": new_amount,
                    "amount_difference_minor": (loan.amount_minor - new_amount).abs(),
                }),
                loan_id: Some(loan.id),
                group_id: group_after,
            });
        }

        let model = self.require_loan(db_tx, loan.id).await?;
        let detail = self.hydrate_loan(db_tx, model).await?;
        Ok((detail, drafts))
    }
}
