//! Scheduled jobs.
//!
//! # Jobs
//!
//! - `rotate-qr-codes` - Invalidate every outstanding QR code (daily)
//! - `send-due-notifications` - Remind assignees of chores due soon (every 15 min)
//! - `apply-repeat-rules` - Recurrence placeholder (daily, no-op)
//!
//! Each job is a plain async function over the store and transport. The
//! [`runner`] fires them in-process; `cb-cli run <job>` fires one once.
//! A failed run is logged and left for the next firing.

pub mod due_notifications;
pub mod repeat_rules;
pub mod rotate_qr;
pub mod runner;
pub mod schedule;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::StoreError;
use crate::notify::TransportError;
use crate::state::AppState;

pub use due_notifications::{DueNotificationReport, send_due_notifications};
pub use repeat_rules::{RepeatRulesReport, apply_repeat_rules};
pub use rotate_qr::{RotationReport, rotate_qr_codes};
pub use runner::{JOB_TIMEOUT, ScheduledJob, spawn_scheduler};
pub use schedule::Schedule;

/// Errors that end a job run.
#[derive(Debug, Error)]
pub enum JobError {
    /// A store read or write failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The push transport rejected the call.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The run did not finish within its budget.
    #[error("job did not finish within {0:?}")]
    TimedOut(std::time::Duration),
}

/// The scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    RotateQrCodes,
    SendDueNotifications,
    ApplyRepeatRules,
}

impl JobKind {
    /// Every job, in registration order.
    pub const ALL: [Self; 3] = [
        Self::RotateQrCodes,
        Self::SendDueNotifications,
        Self::ApplyRepeatRules,
    ];

    /// Job name as used on the command line and in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RotateQrCodes => "rotate-qr-codes",
            Self::SendDueNotifications => "send-due-notifications",
            Self::ApplyRepeatRules => "apply-repeat-rules",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown job: {s}"))
    }
}

/// Summary of one job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    RotateQrCodes(RotationReport),
    SendDueNotifications(DueNotificationReport),
    ApplyRepeatRules(RepeatRulesReport),
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RotateQrCodes(r) => write!(
                f,
                "rotated {} member tokens across {} households",
                r.members, r.households
            ),
            Self::SendDueNotifications(r) => write!(
                f,
                "{} chores due, {} skipped, {} tokens notified",
                r.chores_due, r.chores_skipped, r.tokens
            ),
            Self::ApplyRepeatRules(r) => write!(f, "{} repeat rules applied", r.applied),
        }
    }
}

/// Run one job once, as of `now`.
///
/// # Errors
///
/// Returns `JobError` if the job could not complete.
pub async fn run_job(
    kind: JobKind,
    state: &AppState,
    now: DateTime<Utc>,
) -> Result<JobReport, JobError> {
    match kind {
        JobKind::RotateQrCodes => rotate_qr_codes(state.store(), now)
            .await
            .map(JobReport::RotateQrCodes),
        JobKind::SendDueNotifications => {
            let lookahead =
                chrono::Duration::minutes(i64::from(state.config().schedule.due_soon_minutes));
            send_due_notifications(state.store(), state.transport(), lookahead, now)
                .await
                .map(JobReport::SendDueNotifications)
        }
        JobKind::ApplyRepeatRules => Ok(JobReport::ApplyRepeatRules(apply_repeat_rules(now))),
    }
}

/// Run one job once, abandoning it if it outlives `budget`.
///
/// # Errors
///
/// Returns `JobError::TimedOut` if the budget elapses first, otherwise
/// whatever the job returns.
pub async fn run_job_within(
    kind: JobKind,
    state: &AppState,
    now: DateTime<Utc>,
    budget: std::time::Duration,
) -> Result<JobReport, JobError> {
    tokio::time::timeout(budget, run_job(kind, state, now))
        .await
        .map_err(|_| JobError::TimedOut(budget))?
}
