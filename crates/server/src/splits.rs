//! Split loan API endpoints

use api_types::loan::LoanDetailsResponse;
use api_types::split::{ChildLoansGet, ChildLoansResponse, MemberSplitNew, SplitNew, SplitUpdate};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use crate::loans::{map_detail, map_patch, map_split, map_status, user_uuid};
use crate::{ServerError, server::ServerState};
use engine::users;

/// Resolves each split member's email to a registered user id. The engine
/// reports every unmatched email at once as `NotFound`.
async fn resolve_member_splits(
    state: &ServerState,
    splits: &[MemberSplitNew],
) -> Result<Vec<engine::MemberSplit>, ServerError> {
    let emails: Vec<String> = splits.iter().map(|split| split.email.clone()).collect();
    let ids = state.engine.user_ids_by_emails(&emails).await?;

    let mut out = Vec::with_capacity(splits.len());
    for split in splits {
        let Some(user_id) = ids.get(&split.email) else {
            return Err(ServerError::Generic(format!(
                "user not found for email: {}",
                split.email
            )));
        };
        let mut member = engine::MemberSplit::new(*user_id, split.amount_minor);
        if let Some(status) = split.status {
            member = member.status(map_status(status));
        }
        out.push(member);
    }
    Ok(out)
}

pub async fn create(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<SplitNew>,
) -> Result<(StatusCode, Json<LoanDetailsResponse>), ServerError> {
    let creator_id = user_uuid(&user)?;
    let member_splits = resolve_member_splits(&state, &payload.member_splits).await?;

    let mut cmd = engine::SplitCreateCmd::new(
        creator_id,
        payload.group_id,
        payload.description,
        payload.due_date.with_timezone(&Utc),
        member_splits,
    );
    if let Some(status) = payload.status {
        cmd = cmd.status(map_status(status));
    }

    let split = state.engine.create_split_loan(cmd).await?;
    Ok((StatusCode::CREATED, Json(map_split(split))))
}

pub async fn update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SplitUpdate>,
) -> Result<Json<LoanDetailsResponse>, ServerError> {
    let creator_id = user_uuid(&user)?;
    let member_splits = match payload.member_splits {
        Some(splits) if !splits.is_empty() => resolve_member_splits(&state, &splits).await?,
        _ => Vec::new(),
    };

    let cmd = engine::SplitUpdateCmd::default()
        .patch(map_patch(payload.patch))
        .member_splits(member_splits);

    match state.engine.update_split_loan(id, cmd, creator_id).await? {
        engine::LoanDetails::Single(detail) => Ok(Json(LoanDetailsResponse {
            loan: map_detail(detail),
            splits: None,
        })),
        engine::LoanDetails::Split(split) => Ok(Json(map_split(split))),
    }
}

pub async fn delete(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_split_loan(id, user_uuid(&user)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn children(
    Extension(_user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ChildLoansGet>,
) -> Result<Json<ChildLoansResponse>, ServerError> {
    let mut engine_query = engine::ChildLoansQuery::default();
    if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
        engine_query = engine_query.search(search);
    }
    if let Some(page) = query.page {
        engine_query = engine_query.page(page);
    }
    if let Some(page_size) = query.page_size {
        engine_query = engine_query.page_size(page_size);
    }

    let page = state.engine.child_loans(id, engine_query).await?;
    Ok(Json(ChildLoansResponse {
        child_loans: page.child_loans.into_iter().map(map_detail).collect(),
        total_amount_minor: page.total_amount_minor,
        count: page.total_count,
    }))
}
