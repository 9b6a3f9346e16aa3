//! Notification records produced by ledger events.
//!
//! The ledger is the producer: operations accumulate [`NotificationDraft`]s
//! inside their unit of work and the engine records them strictly after the
//! commit. Recording is best-effort; a failed draft is logged and never rolls
//! back or fails the ledger change that produced it.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LoanCreated,
    LoanRepaid,
    StatusChange,
    BalanceUpdate,
    LoanReminder,
    OverdueAlert,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoanCreated => "loan_created",
            Self::LoanRepaid => "loan_repaid",
            Self::StatusChange => "status_change",
            Self::BalanceUpdate => "balance_update",
            Self::LoanReminder => "loan_reminder",
            Self::OverdueAlert => "overdue_alert",
        }
    }
}

impl TryFrom<&str> for NotificationKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "loan_created" => Ok(Self::LoanCreated),
            "loan_repaid" => Ok(Self::LoanRepaid),
            "status_change" => Ok(Self::StatusChange),
            "balance_update" => Ok(Self::BalanceUpdate),
            "loan_reminder" => Ok(Self::LoanReminder),
            "overdue_alert" => Ok(Self::OverdueAlert),
            other => Err(EngineError::Validation(format!(
                "invalid notification kind: {other}"
            ))),
        }
    }
}

/// A notification waiting to be recorded, addressed to zero or more
/// registered users.
#[derive(Clone, Debug, PartialEq)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub message: String,
    pub user_ids: Vec<Uuid>,
    pub payload: serde_json::Value,
    pub loan_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub payload: serde_json::Value,
    pub loan_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Read state for the recipient a listing was produced for.
    pub is_read: bool,
}

/// One page of a recipient's notifications, newest first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub page: u64,
    pub page_size: u64,
    pub total_count: u64,
    pub total_pages: u64,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub message: String,
    pub payload: String,
    pub loan_id: Option<String>,
    pub group_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::notification_recipients::Entity")]
    Recipients,
}

impl Related<super::notification_recipients::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Notification {
    pub(crate) fn from_model(model: Model, is_read: bool) -> Result<Self, EngineError> {
        let payload = serde_json::from_str(&model.payload).unwrap_or(serde_json::Value::Null);
        Ok(Self {
            id: parse_uuid(&model.id, "notification")?,
            kind: NotificationKind::try_from(model.kind.as_str())?,
            message: model.message,
            payload,
            loan_id: model
                .loan_id
                .as_deref()
                .map(|id| parse_uuid(id, "loan"))
                .transpose()?,
            group_id: model
                .group_id
                .as_deref()
                .map(|id| parse_uuid(id, "group"))
                .transpose()?,
            created_at: model.created_at,
            is_read,
        })
    }
}

pub(crate) fn active_model_for_draft(
    id: Uuid,
    draft: &NotificationDraft,
    created_at: DateTime<Utc>,
) -> ActiveModel {
    ActiveModel {
        id: ActiveValue::Set(id.to_string()),
        kind: ActiveValue::Set(draft.kind.as_str().to_string()),
        message: ActiveValue::Set(draft.message.clone()),
        payload: ActiveValue::Set(draft.payload.to_string()),
        loan_id: ActiveValue::Set(draft.loan_id.map(|id| id.to_string())),
        group_id: ActiveValue::Set(draft.group_id.map(|id| id.to_string())),
        created_at: ActiveValue::Set(created_at),
        deleted_at: ActiveValue::Set(None),
    }
}
