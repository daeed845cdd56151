//! Household provisioning and member seeding.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use choreboard_core::{Household, HouseholdId, Member, MemberId, MemberRole, QrToken};

use crate::db::DocumentStore;
use crate::error::AppError;

/// Display name given to a household's founding member.
pub const FOUNDER_DISPLAY_NAME: &str = "Test Member";

/// Identifiers of a freshly provisioned household.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedHousehold {
    pub household_id: HouseholdId,
    pub member_id: MemberId,
    /// The founder's first QR token.
    pub qr_id: String,
}

/// Seed request placing a member with a known QR token.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRequest {
    #[serde(default)]
    pub household_id: Option<String>,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub qr_id: Option<String>,
}

/// Seed acknowledgement.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SeedResponse {
    pub ok: bool,
}

/// Creates households and seeds members.
pub struct ProvisioningService<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> ProvisioningService<'a> {
    /// Create a new provisioning service.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Create a household with default settings and its founding member.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the store write fails.
    #[instrument(skip(self))]
    pub async fn provision_household(&self) -> Result<ProvisionedHousehold, AppError> {
        let now = Utc::now();
        let household = Household::with_defaults(HouseholdId::generate(), now);
        let founder = Member::new(
            household.id.clone(),
            MemberId::generate(),
            FOUNDER_DISPLAY_NAME,
            MemberRole::Parent,
            QrToken::generate(),
            now,
        );

        self.store.create_household(&household, &founder).await?;

        info!(
            household_id = %household.id,
            member_id = %founder.id,
            "Household provisioned"
        );

        Ok(ProvisionedHousehold {
            household_id: household.id,
            member_id: founder.id,
            qr_id: founder.qr_token.expose().to_owned(),
        })
    }

    /// Upsert a household and member so that the member's QR token is
    /// exactly `qrId`.
    ///
    /// Existing records keep every other field. A new household gets the
    /// provisioning defaults; a new member is a child named after its id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` if a field is missing or malformed,
    /// `AppError::Internal` if a store write fails.
    #[instrument(skip_all)]
    pub async fn seed_member(&self, request: &SeedRequest) -> Result<SeedResponse, AppError> {
        let (Some(household_id), Some(member_id), Some(qr_id)) = (
            non_empty(request.household_id.as_deref()),
            non_empty(request.member_id.as_deref()),
            non_empty(request.qr_id.as_deref()),
        ) else {
            return Err(AppError::InvalidArgument(
                "householdId, memberId and qrId are required".to_string(),
            ));
        };

        let household_id = HouseholdId::parse(household_id)
            .map_err(|e| AppError::InvalidArgument(format!("householdId: {e}")))?;
        let member_id = MemberId::parse(member_id)
            .map_err(|e| AppError::InvalidArgument(format!("memberId: {e}")))?;
        let qr_token =
            QrToken::parse(qr_id).map_err(|e| AppError::InvalidArgument(format!("qrId: {e}")))?;

        let now = Utc::now();
        self.store
            .upsert_household_merge(&Household::with_defaults(household_id.clone(), now))
            .await?;

        let display_name = member_id.as_str().to_owned();
        let member = Member::new(
            household_id.clone(),
            member_id,
            display_name,
            MemberRole::Child,
            qr_token,
            now,
        );
        self.store.upsert_member_merge(&member).await?;

        info!(
            household_id = %household_id,
            member_id = %member.id,
            "Member seeded"
        );

        Ok(SeedResponse { ok: true })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
