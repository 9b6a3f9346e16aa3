use sea_orm::{Condition, JoinType, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ChildLoansQuery, EngineError, LoanDetail, ResultEngine, loans, users};

use super::super::{Engine, with_tx};

/// One page of a parent's children plus aggregates over the whole filtered
/// set, not just the page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChildLoansPage {
    pub child_loans: Vec<LoanDetail>,
    pub total_amount_minor: i64,
    pub total_count: u64,
}

impl Engine {
    /// Paginated listing of a parent's live children, optionally filtered by
    /// a case-insensitive substring of the borrower's name or email.
    pub async fn child_loans(
        &self,
        parent_id: Uuid,
        query: ChildLoansQuery,
    ) -> ResultEngine<ChildLoansPage> {
        if query.page == 0 || query.page_size == 0 {
            return Err(EngineError::Validation(
                "page and page_size must be >= 1".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            self.require_loan(&db_tx, parent_id).await?;

            let filtered = || {
                let mut select = loans::Entity::find()
                    .filter(loans::Column::ParentId.eq(parent_id.to_string()))
                    .filter(loans::Column::DeletedAt.is_null());
                if let Some(search) = query.search.as_deref() {
                    select = select
                        .join(JoinType::InnerJoin, loans::Relation::Borrower.def())
                        .filter(
                            Condition::any()
                                .add(users::Column::FirstName.contains(search))
                                .add(users::Column::LastName.contains(search))
                                .add(users::Column::Email.contains(search)),
                        );
                }
                select
            };

            let matching: Vec<loans::Model> = filtered().all(&db_tx).await?;
            let total_count = matching.len() as u64;
            let total_amount_minor = matching.iter().map(|m| m.amount_minor).sum();

            let page_models: Vec<loans::Model> = filtered()
                .order_by_asc(loans::Column::DueDate)
                .order_by_asc(loans::Column::Id)
                .limit(query.page_size)
                .offset((query.page - 1) * query.page_size)
                .all(&db_tx)
                .await?;

            let mut child_loans = Vec::with_capacity(page_models.len());
            for model in page_models {
                child_loans.push(self.hydrate_loan(&db_tx, model).await?);
            }

            Ok(ChildLoansPage {
                child_loans,
                total_amount_minor,
                total_count,
            })
        })
    }
}
