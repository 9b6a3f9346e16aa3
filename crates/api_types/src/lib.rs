use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod loan {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Direction {
        In,
        Out,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum LoanStatus {
        Active,
        Repaid,
    }

    /// Which relations the detail endpoint hydrates.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ViewKind {
        Single,
        Split,
    }

    /// Request body for creating an individual loan.
    ///
    /// `direction` is from the caller's point of view: `out` means the caller
    /// lends. The counterparty email is resolved to a registered user when
    /// one exists; otherwise the loan tracks the bare email.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanNew {
        pub amount_minor: i64,
        pub description: String,
        pub due_date: DateTime<FixedOffset>,
        pub direction: Direction,
        pub other_party_email: Option<String>,
        pub group_id: Option<Uuid>,
        pub status: Option<LoanStatus>,
    }

    /// Partial update; absent fields are left untouched.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct LoanUpdate {
        pub amount_minor: Option<i64>,
        pub description: Option<String>,
        pub due_date: Option<DateTime<FixedOffset>>,
        pub is_acknowledged: Option<bool>,
        pub status: Option<LoanStatus>,
        pub group_id: Option<Uuid>,
    }

    /// Exactly one of the two targets must be set.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanTransfer {
        /// Email of a registered user to hand the borrower side to.
        pub new_borrower_email: Option<String>,
        /// External contact the acting user hands their own side to.
        pub new_party_email: Option<String>,
    }

    /// Query string for the detail endpoint.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanDetailsGet {
        pub view: Option<ViewKind>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub id: Uuid,
        pub first_name: String,
        pub last_name: Option<String>,
        pub email: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(tag = "party", rename_all = "snake_case")]
    pub enum PartyView {
        Registered { user_id: Uuid },
        External { email: String },
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub amount_minor: i64,
        pub description: String,
        pub direction: Direction,
        pub occurred_at: DateTime<FixedOffset>,
        pub payer_id: Uuid,
        pub group_id: Option<Uuid>,
        pub title: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanView {
        pub id: Uuid,
        pub amount_minor: i64,
        pub description: String,
        pub due_date: DateTime<FixedOffset>,
        pub status: LoanStatus,
        pub is_acknowledged: bool,
        pub lender: Option<PartyView>,
        pub borrower: Option<PartyView>,
        pub group_id: Option<Uuid>,
        pub parent_id: Option<Uuid>,
    }

    /// A loan hydrated with party details and live ledger entries.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanDetailResponse {
        pub loan: LoanView,
        pub lender: Option<UserView>,
        pub borrower: Option<UserView>,
        pub transactions: Vec<TransactionView>,
    }

    /// Detail endpoint response; `splits` is present for the split view.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoanDetailsResponse {
        pub loan: LoanDetailResponse,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub splits: Option<Vec<LoanDetailResponse>>,
    }
}

pub mod split {
    use super::*;
    use super::loan::{LoanDetailResponse, LoanStatus, LoanUpdate};

    /// One member's share, addressed by email.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberSplitNew {
        pub email: String,
        pub amount_minor: i64,
        pub status: Option<LoanStatus>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitNew {
        pub group_id: Uuid,
        pub description: String,
        pub due_date: DateTime<FixedOffset>,
        pub member_splits: Vec<MemberSplitNew>,
        pub status: Option<LoanStatus>,
    }

    /// Split update. Without `member_splits` this behaves as a plain loan
    /// update; with them the child set is reconciled against the list.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitUpdate {
        #[serde(flatten)]
        pub patch: LoanUpdate,
        pub member_splits: Option<Vec<MemberSplitNew>>,
    }

    /// Query string for the children listing.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ChildLoansGet {
        pub search: Option<String>,
        pub page: Option<u64>,
        pub page_size: Option<u64>,
    }

    /// A page of children plus aggregates over the whole filtered set.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ChildLoansResponse {
        pub child_loans: Vec<LoanDetailResponse>,
        pub total_amount_minor: i64,
        pub count: u64,
    }
}

pub mod notification {
    use super::*;

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

    #[derive(Debug, Serialize, Deserialize)]
    pub struct NotificationsGet {
        pub page: Option<u64>,
        pub page_size: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct NotificationView {
        pub id: Uuid,
        pub kind: NotificationKind,
        pub message: String,
        pub payload: serde_json::Value,
        pub loan_id: Option<Uuid>,
        pub group_id: Option<Uuid>,
        pub created_at: DateTime<FixedOffset>,
        pub is_read: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct NotificationListResponse {
        pub notifications: Vec<NotificationView>,
        pub page: u64,
        pub page_size: u64,
        pub total_count: u64,
        pub total_pages: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MarkAllReadResponse {
        pub updated: u64,
    }

    /// Response of the manual scan triggers.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ScanRunResponse {
        pub processed: u64,
    }
}
