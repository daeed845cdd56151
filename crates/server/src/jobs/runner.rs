//! In-process job scheduler.
//!
//! One tokio task per job sleeps until the job's next firing, runs it, logs
//! the outcome and goes back to sleep. A failed or overrunning run is not
//! retried before its next firing.

use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::state::AppState;

use super::{JobKind, Schedule, run_job_within};

/// Wall-clock budget for one scheduled run.
pub const JOB_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A job bound to its schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledJob {
    pub kind: JobKind,
    pub schedule: Schedule,
}

impl ScheduledJob {
    /// The job table for a configuration.
    #[must_use]
    pub fn all(config: &ScheduleConfig) -> Vec<Self> {
        vec![
            Self {
                kind: JobKind::RotateQrCodes,
                schedule: Schedule::daily_at(config.rotation_time),
            },
            Self {
                kind: JobKind::SendDueNotifications,
                schedule: Schedule::Every {
                    minutes: config.due_soon_minutes,
                },
            },
            Self {
                kind: JobKind::ApplyRepeatRules,
                schedule: Schedule::daily_at(config.repeat_rules_time),
            },
        ]
    }
}

/// Spawn one task per job. Abort the returned handles to stop them.
#[must_use]
pub fn spawn_scheduler(state: &AppState) -> Vec<JoinHandle<()>> {
    let config = &state.config().schedule;
    ScheduledJob::all(config)
        .into_iter()
        .map(|job| {
            info!(job = %job.kind, schedule = %job.schedule, timezone = %config.timezone, "Job scheduled");
            tokio::spawn(run_on_schedule(state.clone(), job, config.timezone, JOB_TIMEOUT))
        })
        .collect()
}

async fn run_on_schedule(state: AppState, job: ScheduledJob, tz: Tz, budget: Duration) {
    loop {
        let now = Utc::now();
        let Some(next) = job.schedule.next_after(now, tz) else {
            error!(job = %job.kind, schedule = %job.schedule, "Invalid schedule, job disabled");
            return;
        };
        let delay = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(delay).await;

        match run_job_within(job.kind, &state, Utc::now(), budget).await {
            Ok(report) => info!(job = %job.kind, %report, "Job finished"),
            Err(e) => warn!(job = %job.kind, error = %e, "Job failed, waiting for next firing"),
        }
    }
}
