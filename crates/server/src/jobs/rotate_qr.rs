//! Daily QR invalidation.
//!
//! Stamps every household's rotation marker and gives every member a fresh
//! QR token, all in one atomic batch. Devices holding an unused code must be
//! reprovisioned afterwards.

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use choreboard_core::QrToken;

use crate::db::{DocumentStore, WriteBatch, WriteOp};

use super::JobError;

/// Summary of one rotation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// Households stamped.
    pub households: usize,
    /// Member tokens replaced.
    pub members: usize,
}

/// Invalidate every outstanding QR token.
///
/// # Errors
///
/// Returns `JobError::Store` if a scan or the batch commit fails; a failed
/// commit leaves every record as it was.
#[instrument(skip(store))]
pub async fn rotate_qr_codes(
    store: &dyn DocumentStore,
    now: DateTime<Utc>,
) -> Result<RotationReport, JobError> {
    let households = store.list_households().await?;
    let members = store.list_all_members().await?;

    let mut batch = WriteBatch::new();
    for household in &households {
        batch.push(WriteOp::StampHouseholdRotation {
            household_id: household.id.clone(),
            at: now,
        });
    }
    for member in &members {
        batch.push(WriteOp::SetMemberQr {
            household_id: member.household_id.clone(),
            member_id: member.id.clone(),
            token: fresh_token(&member.qr_token),
        });
    }

    store.commit(batch).await?;

    let report = RotationReport {
        households: households.len(),
        members: members.len(),
    };
    info!(
        households = report.households,
        members = report.members,
        "QR tokens rotated"
    );
    Ok(report)
}

/// A generated token guaranteed to differ from `previous`.
fn fresh_token(previous: &QrToken) -> QrToken {
    loop {
        let token = QrToken::generate();
        if &token != previous {
            return token;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use choreboard_core::{Household, Member};

    use super::*;
    use crate::db::{MemoryStore, StoreError};
    use crate::test_support::{household, member};

    fn populated() -> MemoryStore {
        let store = MemoryStore::new();
        for h in ["H1", "H2"] {
            store.put_household(household(h));
            for m in ["a", "b", "c"] {
                store.put_member(member(h, m, &format!("{h}-{m}")));
            }
        }
        store
    }

    async fn snapshot(store: &MemoryStore) -> (Vec<Household>, HashMap<String, String>) {
        let households = store.list_households().await.unwrap();
        let tokens = store
            .list_all_members()
            .await
            .unwrap()
            .into_iter()
            .map(|m: Member| (m.path().to_string(), m.qr_token.expose().to_owned()))
            .collect();
        (households, tokens)
    }

    #[tokio::test]
    async fn test_every_token_and_marker_changes() {
        let store = populated();
        let (_, before) = snapshot(&store).await;
        let now = Utc::now();

        let report = rotate_qr_codes(&store, now).await.unwrap();
        assert_eq!(report, RotationReport { households: 2, members: 6 });

        let (households, after) = snapshot(&store).await;
        assert!(households.iter().all(|h| h.rotated_at == Some(now)));
        assert_eq!(after.len(), before.len());
        for (path, token) in &before {
            assert_ne!(after.get(path), Some(token), "{path} kept its token");
        }
    }

    #[tokio::test]
    async fn test_failed_batch_changes_nothing() {
        let store = populated();
        let (households_before, tokens_before) = snapshot(&store).await;

        // Fail after both household stamps and some member writes are staged.
        store.fail_next_batch_at(4);
        let result = rotate_qr_codes(&store, Utc::now()).await;
        assert!(matches!(
            result,
            Err(JobError::Store(StoreError::Unavailable(_)))
        ));

        let (households_after, tokens_after) = snapshot(&store).await;
        assert_eq!(households_after, households_before);
        assert_eq!(tokens_after, tokens_before);
        assert!(households_after.iter().all(|h| h.rotated_at.is_none()));
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryStore::new();
        let report = rotate_qr_codes(&store, Utc::now()).await.unwrap();
        assert_eq!(report, RotationReport::default());
    }

    #[test]
    fn test_fresh_token_differs() {
        let previous = QrToken::generate();
        assert_ne!(fresh_token(&previous), previous);
    }
}
