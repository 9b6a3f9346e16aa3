//! Command structs for engine operations.
//!
//! These types group parameters for write operations (create/update/transfer
//! and the split variants), keeping call sites readable and avoiding long
//! argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Direction, LoanStatus};

/// Create an individual loan.
///
/// `direction` is from the acting user's point of view: `Out` means the
/// acting user lends, `In` means they borrow. The counterparty is either a
/// registered user id or a bare email, resolved by the caller.
#[derive(Clone, Debug)]
pub struct LoanCreateCmd {
    pub acting_user_id: Uuid,
    pub amount_minor: i64,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub direction: Direction,
    pub counterparty_id: Option<Uuid>,
    pub counterparty_email: Option<String>,
    pub group_id: Option<Uuid>,
    pub status: Option<LoanStatus>,
}

impl LoanCreateCmd {
    #[must_use]
    pub fn new(
        acting_user_id: Uuid,
        amount_minor: i64,
        description: impl Into<String>,
        due_date: DateTime<Utc>,
        direction: Direction,
    ) -> Self {
        Self {
            acting_user_id,
            amount_minor,
            description: description.into(),
            due_date,
            direction,
            counterparty_id: None,
            counterparty_email: None,
            group_id: None,
            status: None,
        }
    }

    #[must_use]
    pub fn counterparty_id(mut self, user_id: Uuid) -> Self {
        self.counterparty_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn counterparty_email(mut self, email: impl Into<String>) -> Self {
        self.counterparty_email = Some(email.into());
        self
    }

    #[must_use]
    pub fn group_id(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }

    #[must_use]
    pub fn status(mut self, status: LoanStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Partial update for a loan; only the present fields are applied.
#[derive(Clone, Debug, Default)]
pub struct LoanPatch {
    pub amount_minor: Option<i64>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub is_acknowledged: Option<bool>,
    pub status: Option<LoanStatus>,
    pub group_id: Option<Uuid>,
}

impl LoanPatch {
    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    #[must_use]
    pub fn is_acknowledged(mut self, is_acknowledged: bool) -> Self {
        self.is_acknowledged = Some(is_acknowledged);
        self
    }

    #[must_use]
    pub fn status(mut self, status: LoanStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn group_id(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }
}

/// Transfer a loan to a registered borrower, or hand one's own side to an
/// external contact. Exactly one of the two targets must be set.
#[derive(Clone, Debug)]
pub struct TransferLoanCmd {
    pub loan_id: Uuid,
    pub acting_user_id: Uuid,
    pub new_borrower_id: Option<Uuid>,
    pub new_party_email: Option<String>,
}

impl TransferLoanCmd {
    #[must_use]
    pub fn new(loan_id: Uuid, acting_user_id: Uuid) -> Self {
        Self {
            loan_id,
            acting_user_id,
            new_borrower_id: None,
            new_party_email: None,
        }
    }

    #[must_use]
    pub fn new_borrower_id(mut self, user_id: Uuid) -> Self {
        self.new_borrower_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn new_party_email(mut self, email: impl Into<String>) -> Self {
        self.new_party_email = Some(email.into());
        self
    }
}

/// One member's share of a split loan.
#[derive(Clone, Debug)]
pub struct MemberSplit {
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub status: Option<LoanStatus>,
}

impl MemberSplit {
    #[must_use]
    pub fn new(user_id: Uuid, amount_minor: i64) -> Self {
        Self {
            user_id,
            amount_minor,
            status: None,
        }
    }

    #[must_use]
    pub fn status(mut self, status: LoanStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Create a split loan: a group-total parent plus one child per member.
#[derive(Clone, Debug)]
pub struct SplitCreateCmd {
    pub creator_id: Uuid,
    pub group_id: Uuid,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub member_splits: Vec<MemberSplit>,
    pub status: Option<LoanStatus>,
}

impl SplitCreateCmd {
    #[must_use]
    pub fn new(
        creator_id: Uuid,
        group_id: Uuid,
        description: impl Into<String>,
        due_date: DateTime<Utc>,
        member_splits: Vec<MemberSplit>,
    ) -> Self {
        Self {
            creator_id,
            group_id,
            description: description.into(),
            due_date,
            member_splits,
            status: None,
        }
    }

    #[must_use]
    pub fn status(mut self, status: LoanStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Update a split loan. An empty `member_splits` delegates to the individual
/// loan update; otherwise the child set is reconciled against it.
#[derive(Clone, Debug, Default)]
pub struct SplitUpdateCmd {
    pub patch: LoanPatch,
    pub member_splits: Vec<MemberSplit>,
}

impl SplitUpdateCmd {
    #[must_use]
    pub fn patch(mut self, patch: LoanPatch) -> Self {
        self.patch = patch;
        self
    }

    #[must_use]
    pub fn member_splits(mut self, member_splits: Vec<MemberSplit>) -> Self {
        self.member_splits = member_splits;
        self
    }
}

/// Paged, optionally filtered listing of a parent's children.
#[derive(Clone, Debug)]
pub struct ChildLoansQuery {
    /// Case-insensitive substring matched against the borrower's first name,
    /// last name and email.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: u64,
    pub page_size: u64,
}

impl Default for ChildLoansQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            page_size: 10,
        }
    }
}

impl ChildLoansQuery {
    #[must_use]
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    #[must_use]
    pub fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }
}
