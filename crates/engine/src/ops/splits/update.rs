use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Direction, EngineError, Loan, LoanDetails, LoanStatus, ResultEngine, SplitDetail,
    SplitUpdateCmd, loans, util::parse_uuid,
};

use super::super::{Engine, normalize_required_text, with_tx};
use super::super::loans::{conflict_or_db, loan_title};
use super::{group_total_description, split_base_description, split_total};

impl Engine {
    /// Reconciles a split loan against a new member-split set.
    ///
    /// With no `member_splits`, this is a plain [`update_loan`]. Otherwise the
    /// parent amount becomes the new total, submitted children are updated or
    /// created, and any existing child whose borrower is absent from the new
    /// set is soft-deleted along with its entries.
    ///
    /// [`update_loan`]: Engine::update_loan
    pub async fn update_split_loan(
        &self,
        loan_id: Uuid,
        cmd: SplitUpdateCmd,
        creator_id: Uuid,
    ) -> ResultEngine<LoanDetails> {
        if cmd.member_splits.is_empty() {
            let detail = self.update_loan(loan_id, cmd.patch, creator_id).await?;
            return Ok(LoanDetails::Single(detail));
        }

        let split = with_tx!(self, |db_tx| {
            self.update_split_loan_in_tx(&db_tx, loan_id, &cmd, creator_id)
                .await
        })?;
        Ok(LoanDetails::Split(split))
    }

    async fn update_split_loan_in_tx(
        &self,
        db_tx: &DatabaseTransaction,
        loan_id: Uuid,
        cmd: &SplitUpdateCmd,
        creator_id: Uuid,
    ) -> ResultEngine<SplitDetail> {
        let parent_model = loans::Entity::find_by_id(loan_id.to_string())
            .filter(loans::Column::DeletedAt.is_null())
            .filter(loans::Column::LenderId.eq(creator_id.to_string()))
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("loan {loan_id} not found")))?;
        let parent = Loan::try_from(parent_model)?;
        let group_id = parent.group_id.ok_or_else(|| {
            EngineError::Validation("loan does not belong to a group".to_string())
        })?;

        let members = self.active_member_ids(db_tx, group_id).await?;
        let invalid: Vec<String> = cmd
            .member_splits
            .iter()
            .filter(|split| !members.contains(&split.user_id) || split.user_id == creator_id)
            .map(|split| split.user_id.to_string())
            .collect();
        if !invalid.is_empty() {
            return Err(EngineError::NotFound(format!(
                "the following users are not valid borrowers: {}",
                invalid.join(", ")
            )));
        }

        let total_amount = split_total(&cmd.member_splits)?;
        let creator_name = self
            .require_user(db_tx, creator_id)
            .await?
            .first_name;
        let now = Utc::now();

        let base_description = match cmd.patch.description.as_deref() {
            Some(description) => normalize_required_text(description, "description")?,
            None => split_base_description(&parent.description).to_string(),
        };
        let parent_description = group_total_description(&base_description);
        let due_date = cmd.patch.due_date.unwrap_or(parent.due_date);

        let parent_active = loans::ActiveModel {
            id: ActiveValue::Set(parent.id.to_string()),
            amount_minor: ActiveValue::Set(total_amount),
            description: ActiveValue::Set(parent_description.clone()),
            due_date: ActiveValue::Set(due_date),
            is_acknowledged: ActiveValue::Set(
                cmd.patch.is_acknowledged.unwrap_or(parent.is_acknowledged),
            ),
            status: ActiveValue::Set(
                cmd.patch.status.unwrap_or(parent.status).as_str().to_string(),
            ),
            ..Default::default()
        };
        parent_active.update(db_tx).await.map_err(conflict_or_db)?;
        self.cascade_loan_entries(db_tx, parent.id, total_amount, &parent_description)
            .await?;

        let child_models = loans::Entity::find()
            .filter(loans::Column::ParentId.eq(parent.id.to_string()))
            .filter(loans::Column::DeletedAt.is_null())
            .all(db_tx)
            .await?;
        let mut existing: HashMap<Uuid, loans::Model> = HashMap::with_capacity(child_models.len());
        for model in child_models {
            let borrower_id = model
                .borrower_id
                .as_deref()
                .map(|id| parse_uuid(id, "user"))
                .transpose()?
                .ok_or_else(|| {
                    EngineError::Validation("split child has no registered borrower".to_string())
                })?;
            existing.insert(borrower_id, model);
        }

        for split in &cmd.member_splits {
            match existing.get(&split.user_id) {
                Some(child_model) => {
                    let child_status = match split.status {
                        Some(status) => status,
                        None => LoanStatus::try_from(child_model.status.as_str())?,
                    };
                    let child_active = loans::ActiveModel {
                        id: ActiveValue::Set(child_model.id.clone()),
                        amount_minor: ActiveValue::Set(split.amount_minor),
                        description: ActiveValue::Set(base_description.clone()),
                        due_date: ActiveValue::Set(due_date),
                        is_acknowledged: ActiveValue::Set(
                            cmd.patch
                                .is_acknowledged
                                .unwrap_or(child_model.is_acknowledged),
                        ),
                        status: ActiveValue::Set(child_status.as_str().to_string()),
                        ..Default::default()
                    };
                    child_active.update(db_tx).await.map_err(conflict_or_db)?;

                    let child_id = parse_uuid(&child_model.id, "loan")?;
                    self.cascade_loan_entries(
                        db_tx,
                        child_id,
                        split.amount_minor,
                        &base_description,
                    )
                    .await?;
                }
                None => {
                    let member = self.require_user(db_tx, split.user_id).await?;
                    let title = loan_title(&creator_name, &member.first_name);

                    let child = Loan {
                        id: Uuid::new_v4(),
                        amount_minor: split.amount_minor,
                        description: base_description.clone(),
                        due_date,
                        status: split.status.unwrap_or(LoanStatus::Active),
                        is_acknowledged: false,
                        lender: Some(crate::Party::Registered {
                            user_id: creator_id,
                        }),
                        borrower: Some(crate::Party::Registered {
                            user_id: split.user_id,
                        }),
                        group_id: Some(group_id),
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
                        &base_description,
                        split.user_id,
                        Some(group_id),
                        &title,
                        now,
                    )
                    .await?;
                }
            }
        }

        // Explicit diff: children whose borrower is absent from the submitted
        // set are soft-deleted, entries included.
        let submitted: HashSet<Uuid> = cmd.member_splits.iter().map(|s| s.user_id).collect();
        for (borrower_id, child_model) in &existing {
            if submitted.contains(borrower_id) {
                continue;
            }
            let child_id = parse_uuid(&child_model.id, "loan")?;
            let child_active = loans::ActiveModel {
                id: ActiveValue::Set(child_model.id.clone()),
                deleted_at: ActiveValue::Set(Some(now)),
                ..Default::default()
            };
            child_active.update(db_tx).await?;
            self.tombstone_loan_entries(db_tx, child_id, now).await?;
        }

        let parent_model = self.require_loan(db_tx, parent.id).await?;
        self.split_detail_in_tx(db_tx, parent_model).await
    }
}
