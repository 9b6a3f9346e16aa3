//! Scheduled maintenance tasks.
//!
//! The two loan scans share one runner: each tick runs every registered task
//! and a task failure is logged without stopping the runner or the remaining
//! tasks. The scans themselves isolate per-loan failures, so a bad loan never
//! aborts a whole scan either.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use engine::{Engine, EngineError};

/// Tick period used by the app binary. The scans only care about the
/// calendar day, so time-of-day drift is harmless.
pub const DAILY: Duration = Duration::from_secs(24 * 60 * 60);

/// A recurring maintenance job driven by [`run_daily`].
pub trait ScheduledTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn run<'a>(
        &'a self,
        engine: &'a Engine,
    ) -> Pin<Box<dyn Future<Output = Result<usize, EngineError>> + Send + 'a>>;
}

/// Upcoming-due reminder scan.
pub struct LoanReminderTask;

impl ScheduledTask for LoanReminderTask {
    fn name(&self) -> &'static str {
        "loan_reminders"
    }

    fn run<'a>(
        &'a self,
        engine: &'a Engine,
    ) -> Pin<Box<dyn Future<Output = Result<usize, EngineError>> + Send + 'a>> {
        Box::pin(async move { engine.run_loan_reminders(Utc::now()).await })
    }
}

/// Overdue alert scan.
pub struct OverdueLoanTask;

impl ScheduledTask for OverdueLoanTask {
    fn name(&self) -> &'static str {
        "overdue_loans"
    }

    fn run<'a>(
        &'a self,
        engine: &'a Engine,
    ) -> Pin<Box<dyn Future<Output = Result<usize, EngineError>> + Send + 'a>> {
        Box::pin(async move { engine.run_overdue_scan(Utc::now()).await })
    }
}

/// Runs every task once per period tick, forever.
pub async fn run_daily(engine: Arc<Engine>, tasks: Vec<Box<dyn ScheduledTask>>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        for task in &tasks {
            match task.run(&engine).await {
                Ok(processed) => {
                    tracing::info!(task = task.name(), processed, "scheduled task finished");
                }
                Err(err) => {
                    tracing::error!(task = task.name(), "scheduled task failed: {err}");
                }
            }
        }
    }
}
