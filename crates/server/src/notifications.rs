//! Notification API endpoints

use api_types::notification::{
    MarkAllReadResponse, NotificationKind as ApiKind, NotificationListResponse, NotificationView,
    NotificationsGet,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::loans::user_uuid;
use crate::{ServerError, server::ServerState};
use engine::users;

fn map_kind(kind: engine::NotificationKind) -> ApiKind {
    match kind {
        engine::NotificationKind::LoanCreated => ApiKind::LoanCreated,
        engine::NotificationKind::LoanRepaid => ApiKind::LoanRepaid,
        engine::NotificationKind::StatusChange => ApiKind::StatusChange,
        engine::NotificationKind::BalanceUpdate => ApiKind::BalanceUpdate,
        engine::NotificationKind::LoanReminder => ApiKind::LoanReminder,
        engine::NotificationKind::OverdueAlert => ApiKind::OverdueAlert,
    }
}

fn map_notification(notification: engine::Notification) -> NotificationView {
    NotificationView {
        id: notification.id,
        kind: map_kind(notification.kind),
        message: notification.message,
        payload: notification.payload,
        loan_id: notification.loan_id,
        group_id: notification.group_id,
        created_at: notification.created_at.fixed_offset(),
        is_read: notification.is_read,
    }
}

pub async fn list(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Query(query): Query<NotificationsGet>,
) -> Result<Json<NotificationListResponse>, ServerError> {
    let page = state
        .engine
        .list_notifications(
            user_uuid(&user)?,
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(20),
        )
        .await?;

    Ok(Json(NotificationListResponse {
        notifications: page
            .notifications
            .into_iter()
            .map(map_notification)
            .collect(),
        page: page.page,
        page_size: page.page_size,
        total_count: page.total_count,
        total_pages: page.total_pages,
    }))
}

pub async fn mark_read(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .mark_notification_read(user_uuid(&user)?, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
) -> Result<Json<MarkAllReadResponse>, ServerError> {
    let updated = state
        .engine
        .mark_all_notifications_read(user_uuid(&user)?)
        .await?;
    Ok(Json(MarkAllReadResponse { updated }))
}
