//! Development provisioning endpoints.
//!
//! Mounted only when `CHOREBOARD_DEV_ENDPOINTS` is set. They create records
//! with known QR tokens, so they must stay off in production.

use axum::{Json, extract::State, extract::rejection::JsonRejection, http::StatusCode};

use crate::error::AppError;
use crate::services::{ProvisionedHousehold, ProvisioningService, SeedRequest, SeedResponse};
use crate::state::AppState;

/// Create a household with one parent member.
///
/// POST /v1/dev/households
///
/// # Errors
///
/// Returns `AppError::Internal` if the store write fails.
pub async fn provision(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ProvisionedHousehold>), AppError> {
    let provisioned = ProvisioningService::new(state.store())
        .provision_household()
        .await?;
    Ok((StatusCode::CREATED, Json(provisioned)))
}

/// Upsert a household and member with a caller-chosen QR token.
///
/// POST /v1/dev/seed
///
/// # Errors
///
/// Returns `AppError::InvalidArgument` for a missing field,
/// `AppError::Internal` if the store write fails.
pub async fn seed(
    State(state): State<AppState>,
    payload: Result<Json<SeedRequest>, JsonRejection>,
) -> Result<Json<SeedResponse>, AppError> {
    let Json(request) = payload?;
    let response = ProvisioningService::new(state.store())
        .seed_member(&request)
        .await?;
    Ok(Json(response))
}
