use chrono::Utc;
use sea_orm::{DatabaseTransaction, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Direction, EngineError, Loan, LoanStatus, NotificationDraft, NotificationKind, Party,
    ResultEngine, SplitCreateCmd, SplitDetail, loans, util::format_amount_minor,
};

use super::super::{Engine, normalize_required_text, with_tx};
use super::super::loans::{conflict_or_db, loan_title};
use super::{group_total_description, split_total};

impl Engine {
    /// Creates a "group total" parent loan plus one child loan per split
    /// member, all in one unit of work.
    ///
    /// A split entry for the creator contributes to the total but produces no
    /// child loan. After the commit, a `loan_created` notification is
    /// recorded per child for the creator and that member.
    pub async fn create_split_loan(&self, cmd: SplitCreateCmd) -> ResultEngine<SplitDetail> {
        let (parent_id, drafts) =
            with_tx!(self, |db_tx| self.create_split_loan_in_tx(&db_tx, &cmd).await)?;
        self.emit_notifications(drafts).await;

        with_tx!(self, |db_tx| {
            let model = self.require_loan(&db_tx, parent_id).await?;
            self.split_detail_in_tx(&db_tx, model).await
        })
    }

    async fn create_split_loan_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        cmd: &SplitCreateCmd,
    ) -> ResultEngine<(Uuid, Vec<NotificationDraft>)> {
        let description = normalize_required_text(&cmd.description, "description")?;
        let total_amount = split_total(&cmd.member_splits)?;

        let members = self.active_member_ids(db_tx, cmd.group_id).await?;
        let invalid: Vec<String> = cmd
            .member_splits
            .iter()
            .filter(|split| !members.contains(&split.user_id))
            .map(|split| split.user_id.to_string())
            .collect();
        if !invalid.is_empty() {
            return Err(EngineError::NotFound(format!(
                "the following users are not active members of this group: {}",
                invalid.join(", ")
            )));
        }

        let creator = self.require_user(db_tx, cmd.creator_id).await?;
        let creator_name = creator.first_name;
        let now = Utc::now();

        let parent = Loan {
            id: Uuid::new_v4(),
            amount_minor: total_amount,
            description: group_total_description(&description),
            due_date: cmd.due_date,
            status: cmd.status.unwrap_or(LoanStatus::Active),
            is_acknowledged: false,
            lender: Some(Party::Registered {
                user_id: cmd.creator_id,
            }),
            borrower: None,
            group_id: Some(cmd.group_id),
            parent_id: None,
            deleted_at: None,
        };
        loans::ActiveModel::from(&parent)
            .insert(db_tx)
            .await
            .map_err(conflict_or_db)?;
        self.insert_loan_entry(
            db_tx,
            parent.id,
            Direction::Out,
            total_amount,
            &parent.description,
            cmd.creator_id,
            Some(cmd.group_id),
            &format!("Loan from {creator_name} to Group"),
            now,
        )
        .await?;

        let mut drafts = Vec::new();
        for split in cmd
            .member_splits
            .iter()
            .filter(|split| split.user_id != cmd.creator_id)
        {
            let member = self.require_user(db_tx, split.user_id).await?;
            let title = loan_title(&creator_name, &member.first_name);

            let child = Loan {
                id: Uuid::new_v4(),
                amount_minor: split.amount_minor,
                description: description.clone(),
                due_date: cmd.due_date,
                status: split.status.unwrap_or(LoanStatus::Active),
                is_acknowledged: false,
                lender: Some(Party::Registered {
                    user_id: cmd.creator_id,
                }),
                borrower: Some(Party::Registered {
                    user_id: split.user_id,
                }),
                group_id: Some(cmd.group_id),
                parent_id: Some(parent.id),
                deleted_at: None,
            };
            loans::ActiveModel::from(&child)
                .insert(db_tx)
                .await
                .map_err(conflict_or_db)?;
            self.insert_loan_entry(
                db_tx,
                child.id,
                Direction::In,
                split.amount_minor,
                &description,
                split.user_id,
                Some(cmd.group_id),
                &title,
                now,
            )
            .await?;

            drafts.push(NotificationDraft {
                kind: NotificationKind::LoanCreated,
                message: format!(
                    "A new loan of {} has been created between {creator_name} and {}",
                    format_amount_minor(split.amount_minor),
                    member.first_name
                ),
                user_ids: vec![cmd.creator_id, split.user_id],
                payload: serde_json::json!({
                    "loan_id": child.id,
                    "amount_minor": split.amount_minor,
                    "parent_loan_id": parent.id,
                }),
                loan_id: Some(child.id),
                group_id: Some(cmd.group_id),
            });
        }

        Ok((parent.id, drafts))
    }
}
