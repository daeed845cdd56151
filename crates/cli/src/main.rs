//! Choreboard CLI - Database migrations, provisioning and job runs.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! cb-cli migrate
//!
//! # Create a household with one parent member
//! cb-cli provision
//!
//! # Place a member with a known QR token
//! cb-cli seed -H household-1 -m member-1 -q abc123
//!
//! # Run one scheduled job now
//! cb-cli run rotate-qr-codes
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `provision` - Create a household and founding member
//! - `seed` - Upsert a household and member with a chosen QR token
//! - `run` - Run `rotate-qr-codes`, `send-due-notifications` or `apply-repeat-rules` once

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use choreboard_server::jobs::JobKind;

mod commands;

#[derive(Parser)]
#[command(name = "cb-cli")]
#[command(author, version, about = "Choreboard CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Create a household with one parent member and print its QR token
    Provision,
    /// Upsert a household and member with a known QR token
    Seed {
        /// Household id
        #[arg(short = 'H', long)]
        household_id: String,

        /// Member id
        #[arg(short, long)]
        member_id: String,

        /// QR token to store on the member
        #[arg(short, long)]
        qr_id: String,
    },
    /// Run one scheduled job immediately
    Run {
        /// Job name
        job: JobKind,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Provision => commands::households::provision().await?,
        Commands::Seed {
            household_id,
            member_id,
            qr_id,
        } => commands::households::seed(household_id, member_id, qr_id).await?,
        Commands::Run { job } => commands::jobs::run(job).await?,
    }
    Ok(())
}
