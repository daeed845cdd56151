//! Household chore routes.
//!
//! Every handler requires a credential issued for the household in the
//! path.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};

use choreboard_core::{ChoreId, HouseholdId, NewChore};

use crate::error::AppError;
use crate::middleware::RequireMember;
use crate::services::{ChoreService, ChoreView, ToggleResult};
use crate::state::AppState;

fn household(member: &RequireMember, raw: &str) -> Result<HouseholdId, AppError> {
    let household_id = HouseholdId::parse(raw)
        .map_err(|e| AppError::InvalidArgument(format!("householdId: {e}")))?;
    member.authorize(&household_id)?;
    Ok(household_id)
}

/// List the household's chores, earliest due first.
///
/// GET /v1/households/{h}/chores
///
/// # Errors
///
/// `Unauthenticated`/`PermissionDenied` for a missing or foreign credential.
pub async fn index(
    State(state): State<AppState>,
    member: RequireMember,
    Path(household_id): Path<String>,
) -> Result<Json<Vec<ChoreView>>, AppError> {
    let household_id = household(&member, &household_id)?;
    let chores = ChoreService::new(state.store()).list(&household_id).await?;
    Ok(Json(chores))
}

/// Create a chore. Unset fields default to the caller as sole assignee,
/// due now, worth one point.
///
/// POST /v1/households/{h}/chores
///
/// # Errors
///
/// `InvalidArgument` for a blank title or malformed body.
pub async fn create(
    State(state): State<AppState>,
    member: RequireMember,
    Path(household_id): Path<String>,
    payload: Result<Json<NewChore>, JsonRejection>,
) -> Result<(StatusCode, Json<ChoreView>), AppError> {
    let household_id = household(&member, &household_id)?;
    let Json(new) = payload?;
    let chore = ChoreService::new(state.store())
        .create(&household_id, member.member_id(), new)
        .await?;
    Ok((StatusCode::CREATED, Json(chore)))
}

/// Flip a chore between open and done.
///
/// POST /v1/households/{h}/chores/{c}/toggle
///
/// # Errors
///
/// `NotFound` if the chore does not exist.
pub async fn toggle(
    State(state): State<AppState>,
    member: RequireMember,
    Path((household_id, chore_id)): Path<(String, String)>,
) -> Result<Json<ToggleResult>, AppError> {
    let household_id = household(&member, &household_id)?;
    let chore_id =
        ChoreId::parse(&chore_id).map_err(|e| AppError::InvalidArgument(format!("choreId: {e}")))?;
    let result = ChoreService::new(state.store())
        .toggle(&household_id, &chore_id)
        .await?;
    Ok(Json(result))
}
