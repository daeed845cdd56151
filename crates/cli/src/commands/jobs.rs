//! One-shot job runs.
//!
//! Uses the same configuration as the server, so `PUSH_ENDPOINT` and the
//! schedule settings apply.

use std::sync::Arc;

use chrono::Utc;

use choreboard_server::config::ServerConfig;
use choreboard_server::db::{PgStore, create_pool};
use choreboard_server::jobs::{JOB_TIMEOUT, JobKind, run_job_within};
use choreboard_server::state::AppState;

use super::CliError;

/// Run `kind` once against the configured database.
///
/// # Errors
///
/// Returns `CliError` if configuration is invalid, the database is
/// unreachable or the job fails or overruns its budget.
pub async fn run(kind: JobKind) -> Result<(), CliError> {
    let config = ServerConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    let state = AppState::new(config, Arc::new(PgStore::new(pool)));

    tracing::info!(job = %kind, "Running job");
    let report = run_job_within(kind, &state, Utc::now(), JOB_TIMEOUT).await?;
    tracing::info!(job = %kind, %report, "Job finished");
    Ok(())
}
