use std::collections::HashSet;

use crate::{EngineError, MemberSplit, ResultEngine};

mod children;
mod create;
mod delete;
mod update;

pub use children::ChildLoansPage;

/// Suffix marking a split parent's "group total" description.
pub(in crate::ops) const GROUP_TOTAL_SUFFIX: &str = " (Group Total)";

pub(in crate::ops) fn group_total_description(base: &str) -> String {
    format!("{base}{GROUP_TOTAL_SUFFIX}")
}

/// The plain description shared by a parent's children.
pub(in crate::ops) fn split_base_description(parent_description: &str) -> &str {
    parent_description
        .strip_suffix(GROUP_TOTAL_SUFFIX)
        .unwrap_or(parent_description)
}

/// Validates split shares and returns the parent total.
pub(in crate::ops) fn split_total(member_splits: &[MemberSplit]) -> ResultEngine<i64> {
    if member_splits.is_empty() {
        return Err(EngineError::Validation(
            "member_splits must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(member_splits.len());
    let mut total = 0i64;
    for split in member_splits {
        if split.amount_minor <= 0 {
            return Err(EngineError::Validation(
                "split amount_minor must be > 0".to_string(),
            ));
        }
        if !seen.insert(split.user_id) {
            return Err(EngineError::Validation(format!(
                "duplicate split entry for user {}",
                split.user_id
            )));
        }
        total += split.amount_minor;
    }
    Ok(total)
}
