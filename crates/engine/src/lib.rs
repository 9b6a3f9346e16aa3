//! The loan ledger core.
//!
//! [`Engine`] owns every ledger mutation: individual loan lifecycle, split
//! loans, the reminder/overdue scans and the notification emitter. Users,
//! groups and memberships are external-owned and only ever read here.

pub use commands::{
    ChildLoansQuery, LoanCreateCmd, LoanPatch, MemberSplit, SplitCreateCmd, SplitUpdateCmd,
    TransferLoanCmd,
};
pub use error::EngineError;
pub use loans::{Loan, LoanDetail, LoanDetails, LoanStatus, LoanViewKind, Party, SplitDetail};
pub use notifications::{Notification, NotificationDraft, NotificationKind, NotificationPage};
pub use ops::{ChildLoansPage, Engine, EngineBuilder};
pub use transactions::{Direction, Transaction, TransactionCategory};
pub use users::UserSummary;

mod commands;
mod error;
mod ops;
mod util;

pub mod group_memberships;
pub mod groups;
pub mod loans;
pub mod notification_recipients;
pub mod notifications;
pub mod transactions;
pub mod users;

type ResultEngine<T> = Result<T, EngineError>;
