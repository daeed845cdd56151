//! QR sign-in exchange.
//!
//! A secondary device presents the token printed in a member's QR code. If
//! it matches the stored token, a credential is minted for the member and the
//! stored token is replaced, so the code stops working the moment it is used.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use choreboard_core::{HouseholdId, MemberId, QrToken};

use crate::db::{DocumentStore, StoreError};
use crate::error::AppError;
use crate::identity::IdentityExchange;

/// Exchange request as sent by the sign-in form.
///
/// Fields are optional on the wire so a missing field is reported as
/// `invalid-argument` rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    #[serde(default)]
    pub qr_id: Option<String>,
    #[serde(default)]
    pub household_id: Option<String>,
    #[serde(default)]
    pub member_id: Option<String>,
}

/// Successful exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub custom_token: String,
}

/// Validates QR tokens and trades them for credentials.
pub struct QrExchangeService<'a> {
    store: &'a dyn DocumentStore,
    identity: &'a dyn IdentityExchange,
}

impl<'a> QrExchangeService<'a> {
    /// Create a new exchange service.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore, identity: &'a dyn IdentityExchange) -> Self {
        Self { store, identity }
    }

    /// Trade a presented QR token for a credential.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidArgument` if a field is missing or malformed
    /// - `AppError::NotFound` if the member does not exist
    /// - `AppError::PermissionDenied` if the token does not match the stored one
    /// - `AppError::Internal` if the store or identity service fails
    #[instrument(skip_all)]
    pub async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeResponse, AppError> {
        let qr_id = required(request.qr_id.as_deref(), "qrId")?;
        let household_id = HouseholdId::parse(required(
            request.household_id.as_deref(),
            "householdId",
        )?)
        .map_err(|e| AppError::InvalidArgument(format!("householdId: {e}")))?;
        let member_id = MemberId::parse(required(request.member_id.as_deref(), "memberId")?)
            .map_err(|e| AppError::InvalidArgument(format!("memberId: {e}")))?;

        let member = self
            .store
            .get_member(&household_id, &member_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

        if !member.qr_token.matches(qr_id) {
            warn!(
                household_id = %household_id,
                member_id = %member_id,
                "QR token mismatch"
            );
            return Err(AppError::PermissionDenied(
                "QR code is no longer valid".to_string(),
            ));
        }

        let credential = self
            .identity
            .mint(&member.id, &household_id)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let next = QrToken::generate();
        self.store
            .rotate_member_qr(&household_id, &member_id, &member.qr_token, &next, Utc::now())
            .await
            .map_err(|e| match e {
                // Another exchange consumed the token between our read and write.
                StoreError::Conflict(_) => {
                    AppError::PermissionDenied("QR code is no longer valid".to_string())
                }
                other => AppError::from(other),
            })?;

        info!(
            household_id = %household_id,
            member_id = %member_id,
            "QR token exchanged"
        );

        Ok(ExchangeResponse {
            custom_token: credential.token,
        })
    }
}

fn required<'r>(value: Option<&'r str>, field: &str) -> Result<&'r str, AppError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidArgument(format!("{field} is required")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use choreboard_core::{DueWindow, Household, Member};

    use super::*;
    use crate::db::{MemoryStore, ScannedChore};
    use crate::identity::JwtIdentity;
    use crate::test_support::{FailingIdentity, household, identity, member};

    fn request(qr: &str, h: &str, m: &str) -> ExchangeRequest {
        ExchangeRequest {
            qr_id: Some(qr.to_owned()),
            household_id: Some(h.to_owned()),
            member_id: Some(m.to_owned()),
        }
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.put_household(household("H"));
        store.put_member(member("H", "M1", "abc123"));
        store
    }

    async fn stored_token(store: &MemoryStore) -> QrToken {
        store
            .get_member(
                &HouseholdId::parse("H").unwrap(),
                &MemberId::parse("M1").unwrap(),
            )
            .await
            .unwrap()
            .unwrap()
            .qr_token
    }

    #[tokio::test]
    async fn test_exchange_rotates_and_rejects_replay() {
        let store = seeded();
        let identity = identity();
        let service = QrExchangeService::new(&store, &identity);

        let response = service.exchange(&request("abc123", "H", "M1")).await.unwrap();
        let claims = identity.verify_at(&response.custom_token, Utc::now()).unwrap();
        assert_eq!(claims.sub.as_str(), "M1");
        assert_eq!(claims.household_id.as_str(), "H");

        let rotated = stored_token(&store).await;
        assert!(!rotated.matches("abc123"));
        assert_eq!(rotated.expose().len(), QrToken::GENERATED_LENGTH);

        let replay = service.exchange(&request("abc123", "H", "M1")).await;
        assert!(matches!(replay, Err(AppError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_exchange_stamps_last_use() {
        let store = seeded();
        let identity = identity();
        QrExchangeService::new(&store, &identity)
            .exchange(&request("abc123", "H", "M1"))
            .await
            .unwrap();

        let member = store
            .get_member(
                &HouseholdId::parse("H").unwrap(),
                &MemberId::parse("M1").unwrap(),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(member.last_qr_use_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_fields_are_invalid_argument() {
        let store = PanickingStore;
        let identity = identity();
        let service = QrExchangeService::new(&store, &identity);

        let cases = [
            ExchangeRequest::default(),
            ExchangeRequest {
                qr_id: None,
                ..request("x", "H", "M1")
            },
            ExchangeRequest {
                household_id: Some(String::new()),
                ..request("abc123", "H", "M1")
            },
            ExchangeRequest {
                member_id: None,
                ..request("abc123", "H", "M1")
            },
            request("abc123", "H/evil", "M1"),
        ];
        for case in cases {
            let result = service.exchange(&case).await;
            assert!(
                matches!(result, Err(AppError::InvalidArgument(_))),
                "expected InvalidArgument for {case:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_member_is_not_found() {
        let store = seeded();
        let identity = identity();
        let result = QrExchangeService::new(&store, &identity)
            .exchange(&request("abc123", "H", "nobody"))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_wrong_token_leaves_stored_token() {
        let store = seeded();
        let identity = identity();
        let result = QrExchangeService::new(&store, &identity)
            .exchange(&request("abc124", "H", "M1"))
            .await;
        assert!(matches!(result, Err(AppError::PermissionDenied(_))));
        assert!(stored_token(&store).await.matches("abc123"));
    }

    #[tokio::test]
    async fn test_identity_failure_is_internal_and_keeps_token() {
        let store = seeded();
        let result = QrExchangeService::new(&store, &FailingIdentity)
            .exchange(&request("abc123", "H", "M1"))
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert!(stored_token(&store).await.matches("abc123"));
    }

    #[tokio::test]
    async fn test_concurrent_exchanges_issue_one_credential() {
        let store = Arc::new(seeded());
        let identity = Arc::new(identity());

        let attempts = (0..8).map(|_| {
            let store = Arc::clone(&store);
            let identity: Arc<JwtIdentity> = Arc::clone(&identity);
            tokio::spawn(async move {
                QrExchangeService::new(store.as_ref(), identity.as_ref())
                    .exchange(&request("abc123", "H", "M1"))
                    .await
            })
        });
        let results = futures::future::join_all(attempts).await;

        let granted = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(granted, 1);
    }

    /// Store that fails the test if it is touched.
    struct PanickingStore;

    #[async_trait]
    impl DocumentStore for PanickingStore {
        async fn ping(&self) -> Result<(), StoreError> {
            panic!("store touched")
        }
        async fn get_household(&self, _: &HouseholdId) -> Result<Option<Household>, StoreError> {
            panic!("store touched")
        }
        async fn list_households(&self) -> Result<Vec<Household>, StoreError> {
            panic!("store touched")
        }
        async fn get_member(
            &self,
            _: &HouseholdId,
            _: &MemberId,
        ) -> Result<Option<Member>, StoreError> {
            panic!("store touched")
        }
        async fn list_all_members(&self) -> Result<Vec<Member>, StoreError> {
            panic!("store touched")
        }
        async fn query_members_by_uid_in(
            &self,
            _: &HouseholdId,
            _: &[MemberId],
        ) -> Result<Vec<Member>, StoreError> {
            panic!("store touched")
        }
        async fn rotate_member_qr(
            &self,
            _: &HouseholdId,
            _: &MemberId,
            _: &QrToken,
            _: &QrToken,
            _: chrono::DateTime<Utc>,
        ) -> Result<(), StoreError> {
            panic!("store touched")
        }
        async fn create_household(&self, _: &Household, _: &Member) -> Result<(), StoreError> {
            panic!("store touched")
        }
        async fn upsert_household_merge(&self, _: &Household) -> Result<(), StoreError> {
            panic!("store touched")
        }
        async fn upsert_member_merge(&self, _: &Member) -> Result<(), StoreError> {
            panic!("store touched")
        }
        async fn query_open_chores_due_between(
            &self,
            _: &DueWindow,
        ) -> Result<Vec<ScannedChore>, StoreError> {
            panic!("store touched")
        }
        async fn get_chore(
            &self,
            _: &HouseholdId,
            _: &choreboard_core::ChoreId,
        ) -> Result<Option<choreboard_core::Chore>, StoreError> {
            panic!("store touched")
        }
        async fn list_chores(
            &self,
            _: &HouseholdId,
        ) -> Result<Vec<(choreboard_core::ChoreId, choreboard_core::Chore)>, StoreError> {
            panic!("store touched")
        }
        async fn write_chore(
            &self,
            _: &HouseholdId,
            _: &choreboard_core::ChoreId,
            _: &choreboard_core::Chore,
        ) -> Result<crate::db::ChoreWrite, StoreError> {
            panic!("store touched")
        }
        async fn commit(&self, _: crate::db::WriteBatch) -> Result<(), StoreError> {
            panic!("store touched")
        }
        async fn apply_completion_award(
            &self,
            _: &crate::db::CompletionAward,
        ) -> Result<crate::db::AwardOutcome, StoreError> {
            panic!("store touched")
        }
    }
}
