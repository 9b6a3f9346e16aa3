use chrono::{DateTime, Duration, Utc};
use sea_orm::{QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    LoanStatus, NotificationDraft, NotificationKind, ResultEngine, loans,
    util::{days_between, end_of_day, format_amount_minor, start_of_day},
};

use super::Engine;

fn reminder_message(days_until_due: i64, amount_minor: i64) -> String {
    let amount = format_amount_minor(amount_minor);
    if days_until_due == 0 {
        return format!("Loan payment of ${amount} is due today!");
    }
    let plural = if days_until_due == 1 { "" } else { "s" };
    format!("Reminder: Loan payment of ${amount} is due in {days_until_due} day{plural}.")
}

fn overdue_message(days_overdue: i64, amount_minor: i64) -> String {
    let amount = format_amount_minor(amount_minor);
    let plural = if days_overdue == 1 { "" } else { "s" };
    format!("OVERDUE ALERT: Loan payment of ${amount} is {days_overdue} day{plural} past due.")
}

/// Scan notifications address whichever parties are registered, borrower
/// first; unregistered sides are silently skipped.
fn scan_draft(model: &loans::Model, kind: NotificationKind, message: String) -> NotificationDraft {
    let user_ids = [model.borrower_id.as_deref(), model.lender_id.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect();
    let loan_id = Uuid::parse_str(&model.id).ok();
    let group_id = model
        .group_id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok());

    NotificationDraft {
        kind,
        message,
        user_ids,
        payload: serde_json::json!({
            "loan_id": loan_id,
            "amount_minor": model.amount_minor,
        }),
        loan_id,
        group_id,
    }
}

impl Engine {
    /// Upcoming-due scan: active, live loans due between today and three days
    /// out get a `loan_reminder` for both registered parties.
    ///
    /// One loan's failure is logged and does not stop the scan. Returns the
    /// number of loans successfully processed.
    pub async fn run_loan_reminders(&self, now: DateTime<Utc>) -> ResultEngine<usize> {
        let models = loans::Entity::find()
            .filter(loans::Column::Status.eq(LoanStatus::Active.as_str()))
            .filter(loans::Column::DeletedAt.is_null())
            .filter(loans::Column::DueDate.gte(start_of_day(now)))
            .filter(loans::Column::DueDate.lte(end_of_day(now + Duration::days(3))))
            .all(&self.database)
            .await?;

        let mut processed = 0;
        for model in models {
            let days_until_due = days_between(now, model.due_date);
            let draft = scan_draft(
                &model,
                NotificationKind::LoanReminder,
                reminder_message(days_until_due, model.amount_minor),
            );
            match self.create_notification(draft).await {
                Ok(_) => processed += 1,
                Err(err) => {
                    tracing::error!(loan_id = %model.id, "failed to record loan reminder: {err}");
                }
            }
        }

        tracing::info!("processed {processed} loan reminders");
        Ok(processed)
    }

    /// Overdue scan: active, live loans past their due date get an
    /// `overdue_alert` for both registered parties.
    pub async fn run_overdue_scan(&self, now: DateTime<Utc>) -> ResultEngine<usize> {
        let models = loans::Entity::find()
            .filter(loans::Column::Status.eq(LoanStatus::Active.as_str()))
            .filter(loans::Column::DeletedAt.is_null())
            .filter(loans::Column::DueDate.lt(start_of_day(now)))
            .all(&self.database)
            .await?;

        let mut processed = 0;
        for model in models {
            let days_overdue = days_between(model.due_date, now);
            let draft = scan_draft(
                &model,
                NotificationKind::OverdueAlert,
                overdue_message(days_overdue, model.amount_minor),
            );
            match self.create_notification(draft).await {
                Ok(_) => processed += 1,
                Err(err) => {
                    tracing::error!(loan_id = %model.id, "failed to record overdue alert: {err}");
                }
            }
        }

        tracing::info!("processed {processed} overdue loans");
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_wording_handles_today_and_plurals() {
        assert_eq!(
            reminder_message(0, 50000),
            "Loan payment of $500.00 is due today!"
        );
        assert_eq!(
            reminder_message(1, 50000),
            "Reminder: Loan payment of $500.00 is due in 1 day."
        );
        assert_eq!(
            reminder_message(3, 50000),
            "Reminder: Loan payment of $500.00 is due in 3 days."
        );
    }

    #[test]
    fn overdue_wording_handles_plurals() {
        assert_eq!(
            overdue_message(1, 12550),
            "OVERDUE ALERT: Loan payment of $125.50 is 1 day past due."
        );
        assert_eq!(
            overdue_message(7, 12550),
            "OVERDUE ALERT: Loan payment of $125.50 is 7 days past due."
        );
    }
}
