//! Household provisioning commands.
//!
//! Both commands print their result as JSON on stdout so scripts can pick
//! up the generated ids and QR token.

use choreboard_server::db::PgStore;
use choreboard_server::services::{ProvisioningService, SeedRequest};

use super::{CliError, connect};

/// Create a household with a founding parent member.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or the write fails.
pub async fn provision() -> Result<(), CliError> {
    let store = PgStore::new(connect().await?);
    let provisioned = ProvisioningService::new(&store)
        .provision_household()
        .await?;

    tracing::info!(
        household_id = %provisioned.household_id,
        member_id = %provisioned.member_id,
        "Household provisioned"
    );
    emit(&serde_json::to_string_pretty(&provisioned)?);
    Ok(())
}

/// Upsert a household and a member holding `qr_id`.
///
/// # Errors
///
/// Returns `CliError` if an id is invalid, the database is unreachable or
/// the write fails.
pub async fn seed(household_id: String, member_id: String, qr_id: String) -> Result<(), CliError> {
    let store = PgStore::new(connect().await?);
    let request = SeedRequest {
        household_id: Some(household_id),
        member_id: Some(member_id),
        qr_id: Some(qr_id),
    };
    let response = ProvisioningService::new(&store).seed_member(&request).await?;

    tracing::info!("Member seeded");
    emit(&serde_json::to_string(&response)?);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn emit(output: &str) {
    println!("{output}");
}
