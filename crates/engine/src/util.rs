//! Internal helpers for parsing, formatting and day arithmetic.
//!
//! These utilities are **not** part of the public API.

use chrono::{DateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::Validation(format!("invalid {label} id")))
}

/// The part of an email address before the `@`, used as a display name for
/// unregistered parties.
pub(crate) fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// Render minor units as a decimal amount, e.g. `50000` -> `"500.00"`.
///
/// Amounts in the ledger are strictly positive, so no sign handling.
pub(crate) fn format_amount_minor(amount_minor: i64) -> String {
    format!("{}.{:02}", amount_minor / 100, amount_minor % 100)
}

/// Midnight (inclusive lower bound) of the calendar day containing `at`.
pub(crate) fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Last representable millisecond of the calendar day containing `at`.
pub(crate) fn end_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    let end = at
        .date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_else(|| at.date_naive().and_time(NaiveTime::MIN));
    end.and_utc()
}

/// Whole calendar days from `from` to `to` (negative when `to` is earlier).
pub(crate) fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to.date_naive() - from.date_naive()).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_amount_renders_cents() {
        assert_eq!(format_amount_minor(50000), "500.00");
        assert_eq!(format_amount_minor(105), "1.05");
        assert_eq!(format_amount_minor(99), "0.99");
    }

    #[test]
    fn local_part_strips_domain() {
        assert_eq!(local_part("bob@x.com"), "bob");
        assert_eq!(local_part("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn day_bounds_cover_the_whole_day() {
        let at = "2026-03-10T15:30:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(start_of_day(at).to_rfc3339(), "2026-03-10T00:00:00+00:00");
        assert!(end_of_day(at) > at);
        assert_eq!(days_between(start_of_day(at), end_of_day(at)), 0);
    }
}
