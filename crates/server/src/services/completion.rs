//! Chore completion reactor.
//!
//! Every chore write is handed here with the snapshots from before and
//! after the write. Points are awarded only on a strict `open` to `done`
//! edge, and the award is keyed in a completion ledger so a redelivered
//! event cannot pay out twice.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument, warn};

use choreboard_core::{Chore, ChoreId, ChoreStatus, HouseholdId, MemberId};

use crate::db::{AwardOutcome, CompletionAward, DocumentStore, StoreError};

/// What the reactor did with one write event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorOutcome {
    /// The write was not a completion.
    Ignored,
    /// Points were credited to this many existing members.
    Awarded { members: usize },
    /// This completion had already been awarded.
    Duplicate,
}

impl ReactorOutcome {
    /// Returns true if this invocation credited points.
    #[must_use]
    pub const fn awarded(self) -> bool {
        matches!(self, Self::Awarded { .. })
    }
}

/// Awards points when chores are completed.
pub struct CompletionReactor<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> CompletionReactor<'a> {
    /// Create a new reactor.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// React to one chore write.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the award could not be applied; nothing has
    /// been credited in that case.
    #[instrument(skip(self, before, after), fields(household_id = %household_id, chore_id = %chore_id))]
    pub async fn on_chore_written(
        &self,
        household_id: &HouseholdId,
        chore_id: &ChoreId,
        before: Option<&Chore>,
        after: Option<&Chore>,
    ) -> Result<ReactorOutcome, StoreError> {
        let previous = before.map(|c| c.status);
        let current = after.map(|c| c.status);
        let Some(after) = after.filter(|_| ChoreStatus::is_completion(previous, current)) else {
            debug!(?previous, ?current, "Not a completion edge");
            return Ok(ReactorOutcome::Ignored);
        };

        if after.completed_at.is_none() {
            warn!("Completed chore has no completedAt, awarding without duplicate guard");
        }

        let assignees: BTreeSet<&MemberId> = after.assignees.iter().collect();
        let award = CompletionAward {
            household_id: household_id.clone(),
            chore_id: chore_id.clone(),
            completed_at: after.completed_at,
            points: after.points,
            assignees: assignees.into_iter().cloned().collect(),
        };

        match self.store.apply_completion_award(&award).await? {
            AwardOutcome::Awarded { members } => {
                if members < award.assignees.len() {
                    warn!(
                        assignees = award.assignees.len(),
                        credited = members,
                        "Some assignees have no member record"
                    );
                }
                info!(points = award.points, members, "Completion awarded");
                Ok(ReactorOutcome::Awarded { members })
            }
            AwardOutcome::AlreadyApplied => {
                info!("Completion already awarded, ignoring redelivery");
                Ok(ReactorOutcome::Duplicate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use choreboard_core::Member;

    use super::*;
    use crate::db::MemoryStore;
    use crate::test_support::{done, hid, household, member, mid, open_chore};

    fn store_with(members: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        store.put_household(household("H"));
        for m in members {
            store.put_member(member("H", m, &format!("qr-{m}")));
        }
        store
    }

    async fn points(store: &MemoryStore, m: &str) -> i64 {
        let member: Member = store.get_member(&hid("H"), &mid(m)).await.unwrap().unwrap();
        member.points
    }

    fn chore_id() -> ChoreId {
        ChoreId::parse("c1").unwrap()
    }

    #[tokio::test]
    async fn test_open_to_done_awards_each_assignee() {
        let store = store_with(&["a", "b", "c"]);
        let before = open_chore(&["a", "b"], 3);
        let after = done(&before);

        let outcome = CompletionReactor::new(&store)
            .on_chore_written(&hid("H"), &chore_id(), Some(&before), Some(&after))
            .await
            .unwrap();

        assert_eq!(outcome, ReactorOutcome::Awarded { members: 2 });
        assert_eq!(points(&store, "a").await, 3);
        assert_eq!(points(&store, "b").await, 3);
        assert_eq!(points(&store, "c").await, 0);
    }

    #[tokio::test]
    async fn test_non_completion_edges_award_nothing() {
        let store = store_with(&["a"]);
        let reactor = CompletionReactor::new(&store);
        let open = open_chore(&["a"], 2);
        let closed = done(&open);

        let edges = [
            (Some(&closed), Some(&open)),
            (Some(&open), Some(&open)),
            (None, Some(&closed)),
            (Some(&closed), Some(&closed)),
            (Some(&open), None),
            (None, None),
        ];
        for (before, after) in edges {
            let outcome = reactor
                .on_chore_written(&hid("H"), &chore_id(), before, after)
                .await
                .unwrap();
            assert_eq!(outcome, ReactorOutcome::Ignored);
        }
        assert_eq!(points(&store, "a").await, 0);
    }

    #[tokio::test]
    async fn test_redelivery_awards_once() {
        let store = store_with(&["a"]);
        let reactor = CompletionReactor::new(&store);
        let before = open_chore(&["a"], 5);
        let after = done(&before);

        let first = reactor
            .on_chore_written(&hid("H"), &chore_id(), Some(&before), Some(&after))
            .await
            .unwrap();
        let second = reactor
            .on_chore_written(&hid("H"), &chore_id(), Some(&before), Some(&after))
            .await
            .unwrap();

        assert!(first.awarded());
        assert_eq!(second, ReactorOutcome::Duplicate);
        assert_eq!(points(&store, "a").await, 5);
        assert_eq!(store.completion_count(), 1);
    }

    #[tokio::test]
    async fn test_recompletion_after_undo_awards_again() {
        let store = store_with(&["a"]);
        let reactor = CompletionReactor::new(&store);
        let open = open_chore(&["a"], 1);

        let mut first = done(&open);
        first.completed_at = Some(chrono::Utc::now() - chrono::Duration::minutes(5));
        let second = done(&open);

        for after in [&first, &second] {
            reactor
                .on_chore_written(&hid("H"), &chore_id(), Some(&open), Some(after))
                .await
                .unwrap();
        }
        assert_eq!(points(&store, "a").await, 2);
    }

    #[tokio::test]
    async fn test_missing_and_duplicate_assignees() {
        let store = store_with(&["a"]);
        let before = open_chore(&["a", "a", "ghost"], 1);
        let after = done(&before);

        let outcome = CompletionReactor::new(&store)
            .on_chore_written(&hid("H"), &chore_id(), Some(&before), Some(&after))
            .await
            .unwrap();

        assert_eq!(outcome, ReactorOutcome::Awarded { members: 1 });
        assert_eq!(points(&store, "a").await, 1);
        assert!(store.get_member(&hid("H"), &mid("ghost")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_completion_without_timestamp_is_unguarded() {
        let store = store_with(&["a"]);
        let reactor = CompletionReactor::new(&store);
        let before = open_chore(&["a"], 1);
        let mut after = done(&before);
        after.completed_at = None;

        for _ in 0..2 {
            reactor
                .on_chore_written(&hid("H"), &chore_id(), Some(&before), Some(&after))
                .await
                .unwrap();
        }
        assert_eq!(points(&store, "a").await, 2);
        assert_eq!(store.completion_count(), 0);
    }
}
