use std::collections::HashSet;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Loan, LoanDetail, Party, ResultEngine, Transaction, UserSummary,
    group_memberships, groups, loans, transactions, users,
    util::{local_part, parse_uuid},
};

use super::Engine;

impl Engine {
    pub(super) async fn find_loan(
        &self,
        db: &DatabaseTransaction,
        loan_id: Uuid,
    ) -> ResultEngine<Option<loans::Model>> {
        loans::Entity::find_by_id(loan_id.to_string())
            .filter(loans::Column::DeletedAt.is_null())
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn require_loan(
        &self,
        db: &DatabaseTransaction,
        loan_id: Uuid,
    ) -> ResultEngine<loans::Model> {
        self.find_loan(db, loan_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("loan {loan_id} not found")))
    }

    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(user_id.to_string())
            .filter(users::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user {user_id} not found")))
    }

    /// First name for display. No tombstone filter: a party that was deleted
    /// after the loan was written still gets named in titles and messages.
    pub(super) async fn user_first_name(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<Option<String>> {
        let model = users::Entity::find_by_id(user_id.to_string()).one(db).await?;
        Ok(model.map(|m| m.first_name))
    }

    pub(super) async fn user_summary(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<Option<UserSummary>> {
        let model = users::Entity::find_by_id(user_id.to_string()).one(db).await?;
        model.map(UserSummary::try_from).transpose()
    }

    pub(super) async fn party_summary(
        &self,
        db: &DatabaseTransaction,
        party: Option<&Party>,
    ) -> ResultEngine<Option<UserSummary>> {
        match party {
            Some(Party::Registered { user_id }) => self.user_summary(db, *user_id).await,
            _ => Ok(None),
        }
    }

    /// Display name for one side of a loan: registered first name, email
    /// local-part, or "Unknown" when the side is absent.
    pub(super) async fn party_display_name(
        &self,
        db: &DatabaseTransaction,
        party: Option<&Party>,
    ) -> ResultEngine<String> {
        match party {
            Some(Party::Registered { user_id }) => Ok(self
                .user_first_name(db, *user_id)
                .await?
                .unwrap_or_else(|| "Unknown".to_string())),
            Some(Party::External { email }) => Ok(local_part(email).to_string()),
            None => Ok("Unknown".to_string()),
        }
    }

    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<groups::Model> {
        groups::Entity::find_by_id(group_id.to_string())
            .filter(groups::Column::DeletedAt.is_null())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("group {group_id} not found")))
    }

    /// Ids of the group's current, non-deleted members.
    pub(super) async fn active_member_ids(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<HashSet<Uuid>> {
        self.require_group(db, group_id).await?;

        let rows = group_memberships::Entity::find()
            .filter(group_memberships::Column::GroupId.eq(group_id.to_string()))
            .filter(group_memberships::Column::DeletedAt.is_null())
            .all(db)
            .await?;

        let mut ids = HashSet::with_capacity(rows.len());
        for row in rows {
            ids.insert(parse_uuid(&row.user_id, "user")?);
        }
        Ok(ids)
    }

    /// Loads party details and live ledger entries for a loan row.
    pub(super) async fn hydrate_loan(
        &self,
        db: &DatabaseTransaction,
        model: loans::Model,
    ) -> ResultEngine<LoanDetail> {
        let loan = Loan::try_from(model)?;
        let lender = self.party_summary(db, loan.lender.as_ref()).await?;
        let borrower = self.party_summary(db, loan.borrower.as_ref()).await?;

        let entry_models = transactions::Entity::find()
            .filter(transactions::Column::LoanId.eq(loan.id.to_string()))
            .filter(transactions::Column::DeletedAt.is_null())
            .order_by_asc(transactions::Column::OccurredAt)
            .all(db)
            .await?;
        let mut entries = Vec::with_capacity(entry_models.len());
        for entry_model in entry_models {
            entries.push(Transaction::try_from(entry_model)?);
        }

        Ok(LoanDetail {
            loan,
            lender,
            borrower,
            transactions: entries,
        })
    }
}
