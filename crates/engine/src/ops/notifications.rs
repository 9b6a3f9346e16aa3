use chrono::Utc;
use sea_orm::{
    ActiveValue, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, Notification, NotificationDraft, NotificationPage, ResultEngine,
    notification_recipients, notifications,
};

use super::loans::conflict_or_db;
use super::{Engine, with_tx};

impl Engine {
    /// Records a notification and one recipient row per addressed user.
    pub async fn create_notification(&self, draft: NotificationDraft) -> ResultEngine<Uuid> {
        with_tx!(self, |db_tx| {
            let id = Uuid::new_v4();
            notifications::active_model_for_draft(id, &draft, Utc::now())
                .insert(&db_tx)
                .await
                .map_err(conflict_or_db)?;

            for user_id in &draft.user_ids {
                let recipient = notification_recipients::ActiveModel {
                    notification_id: ActiveValue::Set(id.to_string()),
                    user_id: ActiveValue::Set(user_id.to_string()),
                    is_read: ActiveValue::Set(false),
                };
                recipient.insert(&db_tx).await.map_err(conflict_or_db)?;
            }
            Ok(id)
        })
    }

    /// Records each draft after a ledger commit. Failures are logged with
    /// loan/user context and never propagated; the committed ledger change
    /// stands regardless.
    pub(super) async fn emit_notifications(&self, drafts: Vec<NotificationDraft>) {
        for draft in drafts {
            let kind = draft.kind;
            let loan_id = draft.loan_id;
            let user_ids = draft.user_ids.clone();
            if let Err(err) = self.create_notification(draft).await {
                tracing::error!(
                    kind = kind.as_str(),
                    ?loan_id,
                    ?user_ids,
                    "failed to record notification: {err}"
                );
            }
        }
    }

    /// A recipient's notifications, newest first.
    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        page: u64,
        page_size: u64,
    ) -> ResultEngine<NotificationPage> {
        if page == 0 || page_size == 0 {
            return Err(EngineError::Validation(
                "page and page_size must be >= 1".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let total_count = notification_recipients::Entity::find()
                .filter(notification_recipients::Column::UserId.eq(user_id.to_string()))
                .join(
                    JoinType::InnerJoin,
                    notification_recipients::Relation::Notifications.def(),
                )
                .filter(notifications::Column::DeletedAt.is_null())
                .count(&db_tx)
                .await?;

            let rows: Vec<(notification_recipients::Model, Option<notifications::Model>)> =
                notification_recipients::Entity::find()
                    .filter(notification_recipients::Column::UserId.eq(user_id.to_string()))
                    .find_also_related(notifications::Entity)
                    .filter(notifications::Column::DeletedAt.is_null())
                    .order_by_desc(notifications::Column::CreatedAt)
                    .limit(page_size)
                    .offset((page - 1) * page_size)
                    .all(&db_tx)
                    .await?;

            let mut items = Vec::with_capacity(rows.len());
            for (recipient, model) in rows {
                let Some(model) = model else { continue };
                items.push(Notification::from_model(model, recipient.is_read)?);
            }

            Ok(NotificationPage {
                notifications: items,
                page,
                page_size,
                total_count,
                total_pages: total_count.div_ceil(page_size),
            })
        })
    }

    /// Marks one of the recipient's notifications as read.
    pub async fn mark_notification_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let visible = notifications::Entity::find_by_id(notification_id.to_string())
                .filter(notifications::Column::DeletedAt.is_null())
                .one(&db_tx)
                .await?
                .is_some();
            let recipient = notification_recipients::Entity::find_by_id((
                notification_id.to_string(),
                user_id.to_string(),
            ))
            .one(&db_tx)
            .await?;
            let Some(recipient) = recipient.filter(|_| visible) else {
                return Err(EngineError::NotFound(format!(
                    "notification {notification_id} not found"
                )));
            };

            let active = notification_recipients::ActiveModel {
                notification_id: ActiveValue::Set(recipient.notification_id),
                user_id: ActiveValue::Set(recipient.user_id),
                is_read: ActiveValue::Set(true),
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Marks every unread notification of the recipient as read, returning
    /// how many were flipped. `NotFound` when there was nothing unread.
    pub async fn mark_all_notifications_read(&self, user_id: Uuid) -> ResultEngine<u64> {
        with_tx!(self, |db_tx| {
            let unread: Vec<notification_recipients::Model> =
                notification_recipients::Entity::find()
                    .filter(notification_recipients::Column::UserId.eq(user_id.to_string()))
                    .filter(notification_recipients::Column::IsRead.eq(false))
                    .join(
                        JoinType::InnerJoin,
                        notification_recipients::Relation::Notifications.def(),
                    )
                    .filter(notifications::Column::DeletedAt.is_null())
                    .all(&db_tx)
                    .await?;

            if unread.is_empty() {
                return Err(EngineError::NotFound(
                    "no unread notifications found".to_string(),
                ));
            }

            let count = unread.len() as u64;
            for recipient in unread {
                let active = notification_recipients::ActiveModel {
                    notification_id: ActiveValue::Set(recipient.notification_id),
                    user_id: ActiveValue::Set(recipient.user_id),
                    is_read: ActiveValue::Set(true),
                };
                active.update(&db_tx).await?;
            }
            Ok(count)
        })
    }
}
