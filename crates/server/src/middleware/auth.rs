//! Bearer credential extractor for the chore surface.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use choreboard_core::{HouseholdId, MemberId};

use crate::error::AppError;
use crate::identity::CredentialClaims;
use crate::state::AppState;

/// Extractor that requires a valid credential minted by the QR exchange.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(
///     member: RequireMember,
///     Path(household_id): Path<HouseholdId>,
/// ) -> Result<Json<..>, AppError> {
///     member.authorize(&household_id)?;
///     ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireMember(pub CredentialClaims);

impl RequireMember {
    /// The signed-in member.
    #[must_use]
    pub const fn member_id(&self) -> &MemberId {
        &self.0.sub
    }

    /// Check that the credential was issued for `household_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::PermissionDenied` for any other household.
    pub fn authorize(&self, household_id: &HouseholdId) -> Result<(), AppError> {
        if &self.0.household_id == household_id {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(
                "Credential is not valid for this household".to_string(),
            ))
        }
    }
}

impl FromRequestParts<AppState> for RequireMember {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthenticated("Bearer credential required".to_string()))?;

        let claims = state.identity().verify(token).map_err(|e| {
            debug!(error = %e, "Rejected credential");
            AppError::Unauthenticated("Invalid or expired credential".to_string())
        })?;

        Ok(Self(claims))
    }
}
