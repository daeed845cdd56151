//! QR sign-in.

use axum::{Json, extract::State, extract::rejection::JsonRejection};

use crate::error::AppError;
use crate::services::{ExchangeRequest, ExchangeResponse, QrExchangeService};
use crate::state::AppState;

/// Exchange a member's current QR token for a signed credential.
///
/// POST /v1/auth/qr-exchange
///
/// The token is single use: a successful exchange replaces it.
///
/// # Errors
///
/// `InvalidArgument` for a missing field, `NotFound` for an unknown member,
/// `PermissionDenied` for a stale or wrong token, `Internal` otherwise.
pub async fn qr_exchange(
    State(state): State<AppState>,
    payload: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Result<Json<ExchangeResponse>, AppError> {
    let Json(request) = payload?;
    let response = QrExchangeService::new(state.store(), state.identity())
        .exchange(&request)
        .await?;
    Ok(Json(response))
}
