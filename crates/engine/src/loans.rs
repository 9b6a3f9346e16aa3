//! Loan primitives.
//!
//! A [`Loan`] records money owed by a borrower to a lender. Each side is a
//! [`Party`]: either a registered user or an external contact known only by
//! email. A loan may belong to a group, and a split parent loan ("lender to
//! group") owns child loans via `parent_id`.
//!
//! Amounts are stored as strictly positive integer **minor units** (cents).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, UserSummary, transactions::Transaction, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Repaid,
}

impl LoanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Repaid => "repaid",
        }
    }
}

impl TryFrom<&str> for LoanStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "repaid" => Ok(Self::Repaid),
            other => Err(EngineError::Validation(format!(
                "invalid loan status: {other}"
            ))),
        }
    }
}

/// One side of a loan.
///
/// The tagged form keeps the "registered or email, never both" rule in the
/// type instead of spreading null checks over two sibling columns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "party", rename_all = "snake_case")]
pub enum Party {
    Registered { user_id: Uuid },
    External { email: String },
}

impl Party {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Registered { user_id } => Some(*user_id),
            Self::External { .. } => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Registered { .. } => None,
            Self::External { email } => Some(email),
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }
}

/// Split a side's storage columns into a [`Party`].
fn party_from_columns(id: Option<&str>, email: Option<String>) -> ResultEngine<Option<Party>> {
    match (id, email) {
        (Some(id), _) => Ok(Some(Party::Registered {
            user_id: parse_uuid(id, "user")?,
        })),
        (None, Some(email)) => Ok(Some(Party::External { email })),
        (None, None) => Ok(None),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: Uuid,
    pub amount_minor: i64,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub status: LoanStatus,
    pub is_acknowledged: bool,
    pub lender: Option<Party>,
    pub borrower: Option<Party>,
    pub group_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn lender_user_id(&self) -> Option<Uuid> {
        self.lender.as_ref().and_then(Party::user_id)
    }

    pub fn borrower_user_id(&self) -> Option<Uuid> {
        self.borrower.as_ref().and_then(Party::user_id)
    }

    /// True when both sides resolve to registered users.
    pub fn is_fully_registered(&self) -> bool {
        self.lender_user_id().is_some() && self.borrower_user_id().is_some()
    }

    /// Registered user ids on this loan, lender first.
    pub fn registered_party_ids(&self) -> Vec<Uuid> {
        [self.lender_user_id(), self.borrower_user_id()]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub amount_minor: i64,
    pub description: String,
    pub due_date: DateTimeUtc,
    pub status: String,
    pub is_acknowledged: bool,
    pub lender_id: Option<String>,
    pub lender_email: Option<String>,
    pub borrower_id: Option<String>,
    pub borrower_email: Option<String>,
    pub group_id: Option<String>,
    pub parent_id: Option<String>,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::LenderId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Lender,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::BorrowerId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Borrower,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Loan> for ActiveModel {
    fn from(loan: &Loan) -> Self {
        Self {
            id: ActiveValue::Set(loan.id.to_string()),
            amount_minor: ActiveValue::Set(loan.amount_minor),
            description: ActiveValue::Set(loan.description.clone()),
            due_date: ActiveValue::Set(loan.due_date),
            status: ActiveValue::Set(loan.status.as_str().to_string()),
            is_acknowledged: ActiveValue::Set(loan.is_acknowledged),
            lender_id: ActiveValue::Set(loan.lender_user_id().map(|id| id.to_string())),
            lender_email: ActiveValue::Set(
                loan.lender.as_ref().and_then(Party::email).map(String::from),
            ),
            borrower_id: ActiveValue::Set(loan.borrower_user_id().map(|id| id.to_string())),
            borrower_email: ActiveValue::Set(
                loan.borrower
                    .as_ref()
                    .and_then(Party::email)
                    .map(String::from),
            ),
            group_id: ActiveValue::Set(loan.group_id.map(|id| id.to_string())),
            parent_id: ActiveValue::Set(loan.parent_id.map(|id| id.to_string())),
            deleted_at: ActiveValue::Set(loan.deleted_at),
        }
    }
}

impl TryFrom<Model> for Loan {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "loan")?,
            amount_minor: model.amount_minor,
            description: model.description,
            due_date: model.due_date,
            status: LoanStatus::try_from(model.status.as_str())?,
            is_acknowledged: model.is_acknowledged,
            lender: party_from_columns(model.lender_id.as_deref(), model.lender_email)?,
            borrower: party_from_columns(model.borrower_id.as_deref(), model.borrower_email)?,
            group_id: model
                .group_id
                .as_deref()
                .map(|id| parse_uuid(id, "group"))
                .transpose()?,
            parent_id: model
                .parent_id
                .as_deref()
                .map(|id| parse_uuid(id, "loan"))
                .transpose()?,
            deleted_at: model.deleted_at,
        })
    }
}

/// Which relations to hydrate when reading a loan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoanViewKind {
    Single,
    Split,
}

/// A loan hydrated with party details and its live ledger entries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoanDetail {
    pub loan: Loan,
    pub lender: Option<UserSummary>,
    pub borrower: Option<UserSummary>,
    pub transactions: Vec<Transaction>,
}

/// A split parent together with its live children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitDetail {
    pub parent: LoanDetail,
    pub splits: Vec<LoanDetail>,
}

/// Result of a detail read, shaped by the requested [`LoanViewKind`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LoanDetails {
    Single(LoanDetail),
    Split(SplitDetail),
}
