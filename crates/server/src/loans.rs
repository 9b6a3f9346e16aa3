//! Loan API endpoints

use api_types::loan::{
    Direction as ApiDirection, LoanDetailResponse, LoanDetailsGet, LoanDetailsResponse, LoanNew,
    LoanStatus as ApiStatus, LoanTransfer, LoanUpdate, LoanView, PartyView, TransactionView,
    UserView, ViewKind,
};
use api_types::notification::ScanRunResponse;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{ServerError, server::ServerState};
use engine::users;

pub(crate) fn map_direction(direction: ApiDirection) -> engine::Direction {
    match direction {
        ApiDirection::In => engine::Direction::In,
        ApiDirection::Out => engine::Direction::Out,
    }
}

fn map_direction_back(direction: engine::Direction) -> ApiDirection {
    match direction {
        engine::Direction::In => ApiDirection::In,
        engine::Direction::Out => ApiDirection::Out,
    }
}

pub(crate) fn map_status(status: ApiStatus) -> engine::LoanStatus {
    match status {
        ApiStatus::Active => engine::LoanStatus::Active,
        ApiStatus::Repaid => engine::LoanStatus::Repaid,
    }
}

fn map_status_back(status: engine::LoanStatus) -> ApiStatus {
    match status {
        engine::LoanStatus::Active => ApiStatus::Active,
        engine::LoanStatus::Repaid => ApiStatus::Repaid,
    }
}

pub(crate) fn user_uuid(user: &users::Model) -> Result<Uuid, ServerError> {
    Uuid::parse_str(&user.id).map_err(|_| ServerError::Generic("invalid user id".to_string()))
}

fn map_party(party: engine::Party) -> PartyView {
    match party {
        engine::Party::Registered { user_id } => PartyView::Registered { user_id },
        engine::Party::External { email } => PartyView::External { email },
    }
}

fn map_user(user: engine::UserSummary) -> UserView {
    UserView {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
    }
}

fn map_transaction(tx: engine::Transaction) -> TransactionView {
    TransactionView {
        id: tx.id,
        amount_minor: tx.amount_minor,
        description: tx.description,
        direction: map_direction_back(tx.direction),
        occurred_at: tx.occurred_at.fixed_offset(),
        payer_id: tx.payer_id,
        group_id: tx.group_id,
        title: tx.title,
    }
}

fn map_loan(loan: engine::Loan) -> LoanView {
    LoanView {
        id: loan.id,
        amount_minor: loan.amount_minor,
        description: loan.description,
        due_date: loan.due_date.fixed_offset(),
        status: map_status_back(loan.status),
        is_acknowledged: loan.is_acknowledged,
        lender: loan.lender.map(map_party),
        borrower: loan.borrower.map(map_party),
        group_id: loan.group_id,
        parent_id: loan.parent_id,
    }
}

pub(crate) fn map_detail(detail: engine::LoanDetail) -> LoanDetailResponse {
    LoanDetailResponse {
        loan: map_loan(detail.loan),
        lender: detail.lender.map(map_user),
        borrower: detail.borrower.map(map_user),
        transactions: detail.transactions.into_iter().map(map_transaction).collect(),
    }
}

pub(crate) fn map_split(split: engine::SplitDetail) -> LoanDetailsResponse {
    LoanDetailsResponse {
        loan: map_detail(split.parent),
        splits: Some(split.splits.into_iter().map(map_detail).collect()),
    }
}

pub(crate) fn map_patch(payload: LoanUpdate) -> engine::LoanPatch {
    let mut patch = engine::LoanPatch::default();
    if let Some(amount_minor) = payload.amount_minor {
        patch = patch.amount_minor(amount_minor);
    }
    if let Some(description) = payload.description {
        patch = patch.description(description);
    }
    if let Some(due_date) = payload.due_date {
        patch = patch.due_date(due_date.with_timezone(&Utc));
    }
    if let Some(is_acknowledged) = payload.is_acknowledged {
        patch = patch.is_acknowledged(is_acknowledged);
    }
    if let Some(status) = payload.status {
        patch = patch.status(map_status(status));
    }
    if let Some(group_id) = payload.group_id {
        patch = patch.group_id(group_id);
    }
    patch
}

pub async fn create(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<LoanNew>,
) -> Result<(StatusCode, Json<LoanDetailResponse>), ServerError> {
    let acting_user_id = user_uuid(&user)?;
    let mut cmd = engine::LoanCreateCmd::new(
        acting_user_id,
        payload.amount_minor,
        payload.description,
        payload.due_date.with_timezone(&Utc),
        map_direction(payload.direction),
    );

    // Resolve the counterparty: a registered user when the email matches one,
    // otherwise the loan tracks the bare email.
    if let Some(email) = payload
        .other_party_email
        .as_deref()
        .filter(|email| !email.trim().is_empty())
    {
        match state.engine.find_user_by_email(email).await? {
            Some(counterparty) => cmd = cmd.counterparty_id(counterparty.id),
            None => cmd = cmd.counterparty_email(email),
        }
    }

    if let Some(group_id) = payload.group_id {
        if cmd.counterparty_id.is_none() {
            return Err(ServerError::Generic(
                "cannot link a loan to a group when the other party is not a registered user"
                    .to_string(),
            ));
        }
        cmd = cmd.group_id(group_id);
    }
    if let Some(status) = payload.status {
        cmd = cmd.status(map_status(status));
    }

    let detail = state.engine.create_loan(cmd).await?;
    Ok((StatusCode::CREATED, Json(map_detail(detail))))
}

pub async fn get_details(
    Extension(_user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LoanDetailsGet>,
) -> Result<Json<LoanDetailsResponse>, ServerError> {
    let view = match query.view {
        Some(ViewKind::Split) => engine::LoanViewKind::Split,
        _ => engine::LoanViewKind::Single,
    };

    match state.engine.loan_details(id, view).await? {
        engine::LoanDetails::Single(detail) => Ok(Json(LoanDetailsResponse {
            loan: map_detail(detail),
            splits: None,
        })),
        engine::LoanDetails::Split(split) => Ok(Json(map_split(split))),
    }
}

pub async fn update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LoanUpdate>,
) -> Result<Json<LoanDetailResponse>, ServerError> {
    let detail = state
        .engine
        .update_loan(id, map_patch(payload), user_uuid(&user)?)
        .await?;
    Ok(Json(map_detail(detail)))
}

pub async fn transfer(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LoanTransfer>,
) -> Result<Json<LoanDetailResponse>, ServerError> {
    let mut cmd = engine::TransferLoanCmd::new(id, user_uuid(&user)?);

    if let Some(email) = payload
        .new_borrower_email
        .as_deref()
        .filter(|email| !email.trim().is_empty())
        && let Some(borrower) = state.engine.find_user_by_email(email).await?
    {
        cmd = cmd.new_borrower_id(borrower.id);
    }
    if let Some(email) = payload.new_party_email {
        cmd = cmd.new_party_email(email);
    }

    let detail = state.engine.transfer_loan(cmd).await?;
    Ok(Json(map_detail(detail)))
}

pub async fn delete(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_loan(id, user_uuid(&user)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn run_reminders(
    State(state): State<ServerState>,
) -> Result<Json<ScanRunResponse>, ServerError> {
    let processed = state.engine.run_loan_reminders(Utc::now()).await?;
    Ok(Json(ScanRunResponse {
        processed: processed as u64,
    }))
}

pub async fn run_overdue(
    State(state): State<ServerState>,
) -> Result<Json<ScanRunResponse>, ServerError> {
    let processed = state.engine.run_overdue_scan(Utc::now()).await?;
    Ok(Json(ScanRunResponse {
        processed: processed as u64,
    }))
}
