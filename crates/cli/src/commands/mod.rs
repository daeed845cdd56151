//! CLI subcommands.

pub mod households;
pub mod jobs;
pub mod migrate;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use choreboard_server::config::ConfigError;
use choreboard_server::error::AppError;
use choreboard_server::jobs::JobError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Server configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Provisioning or seeding was rejected.
    #[error("{0}")]
    App(#[from] AppError),

    /// A job run failed.
    #[error("Job failed: {0}")]
    Job(#[from] JobError),

    /// Output could not be rendered.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Database URL from `CHOREBOARD_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, CliError> {
    dotenvy::dotenv().ok();
    std::env::var("CHOREBOARD_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("CHOREBOARD_DATABASE_URL"))
}

/// Connect to the database named by the environment.
async fn connect() -> Result<PgPool, CliError> {
    tracing::info!("Connecting to database...");
    Ok(choreboard_server::db::create_pool(&database_url()?).await?)
}
