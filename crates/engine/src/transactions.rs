//! Ledger entry primitives.
//!
//! A [`Transaction`] is one directional accounting record tied to a loan and
//! attributed to a registered user: the lender holds the OUT leg, the
//! borrower the IN leg. Entries are never mutated in place when a party
//! changes; transfers tombstone the stale leg and write a replacement so the
//! ledger keeps a record of who held which leg when.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl TryFrom<&str> for Direction {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            other => Err(EngineError::Validation(format!(
                "invalid transaction direction: {other}"
            ))),
        }
    }
}

/// Ledger entry category. Loan bookkeeping only produces [`Loan`] entries.
///
/// [`Loan`]: TransactionCategory::Loan
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    Loan,
}

impl TransactionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loan => "loan",
        }
    }
}

impl TryFrom<&str> for TransactionCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "loan" => Ok(Self::Loan),
            other => Err(EngineError::Validation(format!(
                "invalid transaction category: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub amount_minor: i64,
    pub description: String,
    pub category: TransactionCategory,
    pub direction: Direction,
    pub occurred_at: DateTime<Utc>,
    pub payer_id: Uuid,
    pub group_id: Option<Uuid>,
    pub title: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        loan_id: Uuid,
        direction: Direction,
        amount_minor: i64,
        description: String,
        payer_id: Uuid,
        group_id: Option<Uuid>,
        title: String,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            loan_id,
            amount_minor,
            description,
            category: TransactionCategory::Loan,
            direction,
            occurred_at,
            payer_id,
            group_id,
            title,
            deleted_at: None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub loan_id: String,
    pub amount_minor: i64,
    pub description: String,
    pub category: String,
    pub direction: String,
    pub occurred_at: DateTimeUtc,
    pub payer_id: String,
    pub group_id: Option<String>,
    pub title: String,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::loans::Entity",
        from = "Column::LoanId",
        to = "super::loans::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Loans,
}

impl Related<super::loans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loans.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            loan_id: ActiveValue::Set(tx.loan_id.to_string()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            description: ActiveValue::Set(tx.description.clone()),
            category: ActiveValue::Set(tx.category.as_str().to_string()),
            direction: ActiveValue::Set(tx.direction.as_str().to_string()),
            occurred_at: ActiveValue::Set(tx.occurred_at),
            payer_id: ActiveValue::Set(tx.payer_id.to_string()),
            group_id: ActiveValue::Set(tx.group_id.map(|id| id.to_string())),
            title: ActiveValue::Set(tx.title.clone()),
            deleted_at: ActiveValue::Set(tx.deleted_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            loan_id: parse_uuid(&model.loan_id, "loan")?,
            amount_minor: model.amount_minor,
            description: model.description,
            category: TransactionCategory::try_from(model.category.as_str())?,
            direction: Direction::try_from(model.direction.as_str())?,
            occurred_at: model.occurred_at,
            payer_id: parse_uuid(&model.payer_id, "user")?,
            group_id: model
                .group_id
                .as_deref()
                .map(|id| parse_uuid(id, "group"))
                .transpose()?,
            title: model.title,
            deleted_at: model.deleted_at,
        })
    }
}
