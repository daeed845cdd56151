//! In-memory implementation of [`DocumentStore`].
//!
//! Holds every record behind one mutex so each operation is atomic. Batches
//! are applied to a copy that replaces the live state only when every write
//! succeeded. Test hooks record membership-filter sizes and can force a
//! batch to fail part-way through.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use choreboard_core::{
    Chore, ChoreId, ChoreSnapshot, ChoreStatus, DueWindow, Household, HouseholdId, Member,
    MemberId, QrToken,
};

use super::{
    AwardOutcome, ChoreWrite, CompletionAward, DocumentStore, ScannedChore, StoreError,
    WriteBatch, WriteOp, check_in_filter,
};

type MemberKey = (HouseholdId, MemberId);
type ChoreKey = (HouseholdId, ChoreId);
type LedgerKey = (HouseholdId, ChoreId, DateTime<Utc>);

#[derive(Debug, Clone, Default)]
struct Records {
    households: BTreeMap<HouseholdId, Household>,
    members: BTreeMap<MemberKey, Member>,
    chores: BTreeMap<ChoreKey, Chore>,
    completions: BTreeSet<LedgerKey>,
    /// Chores stored under paths outside the household layout.
    stray_chores: Vec<ChoreSnapshot>,
    /// Paths of records that fail to decode, with the reason.
    undecodable_chores: Vec<(String, String)>,
}

impl Records {
    fn apply(&mut self, op: &WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::StampHouseholdRotation { household_id, at } => {
                let household = self
                    .households
                    .get_mut(household_id)
                    .ok_or_else(|| StoreError::NotFound(format!("households/{household_id}")))?;
                household.rotated_at = Some(*at);
            }
            WriteOp::SetMemberQr {
                household_id,
                member_id,
                token,
            } => {
                let member = self
                    .members
                    .get_mut(&(household_id.clone(), member_id.clone()))
                    .ok_or_else(|| {
                        StoreError::NotFound(format!(
                            "households/{household_id}/members/{member_id}"
                        ))
                    })?;
                member.qr_token = token.clone();
            }
        }
        Ok(())
    }
}

/// Store holding all records in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Records>,
    in_filter_sizes: Mutex<Vec<usize>>,
    fail_batch_at: Mutex<Option<usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a household.
    pub fn put_household(&self, household: Household) {
        lock(&self.records)
            .households
            .insert(household.id.clone(), household);
    }

    /// Insert or replace a member.
    pub fn put_member(&self, member: Member) {
        lock(&self.records)
            .members
            .insert((member.household_id.clone(), member.id.clone()), member);
    }

    /// Insert or replace a chore without producing a write event.
    pub fn put_chore(&self, household_id: &HouseholdId, chore_id: &ChoreId, chore: Chore) {
        lock(&self.records)
            .chores
            .insert((household_id.clone(), chore_id.clone()), chore);
    }

    /// Store a chore under an arbitrary path, as a scan might encounter it.
    pub fn put_stray_chore(&self, path: impl Into<String>, chore: Chore) {
        lock(&self.records).stray_chores.push(ChoreSnapshot {
            path: path.into(),
            chore,
        });
    }

    /// Store a chore record that fails to decode. Every due scan reports it.
    pub fn put_undecodable_chore(&self, path: impl Into<String>, reason: impl Into<String>) {
        lock(&self.records)
            .undecodable_chores
            .push((path.into(), reason.into()));
    }

    /// Sizes of every membership filter issued so far, in order.
    #[must_use]
    pub fn in_filter_sizes(&self) -> Vec<usize> {
        lock(&self.in_filter_sizes).clone()
    }

    /// Make the next batch commit fail when it reaches the write at `index`.
    pub fn fail_next_batch_at(&self, index: usize) {
        *lock(&self.fail_batch_at) = Some(index);
    }

    /// Number of completions recorded in the ledger.
    #[must_use]
    pub fn completion_count(&self) -> usize {
        lock(&self.records).completions.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_household(&self, id: &HouseholdId) -> Result<Option<Household>, StoreError> {
        Ok(lock(&self.records).households.get(id).cloned())
    }

    async fn list_households(&self) -> Result<Vec<Household>, StoreError> {
        Ok(lock(&self.records).households.values().cloned().collect())
    }

    async fn get_member(
        &self,
        household_id: &HouseholdId,
        member_id: &MemberId,
    ) -> Result<Option<Member>, StoreError> {
        Ok(lock(&self.records)
            .members
            .get(&(household_id.clone(), member_id.clone()))
            .cloned())
    }

    async fn list_all_members(&self) -> Result<Vec<Member>, StoreError> {
        Ok(lock(&self.records).members.values().cloned().collect())
    }

    async fn query_members_by_uid_in(
        &self,
        household_id: &HouseholdId,
        ids: &[MemberId],
    ) -> Result<Vec<Member>, StoreError> {
        lock(&self.in_filter_sizes).push(ids.len());
        check_in_filter(ids.len())?;

        Ok(lock(&self.records)
            .members
            .values()
            .filter(|m| &m.household_id == household_id && ids.contains(&m.id))
            .cloned()
            .collect())
    }

    async fn rotate_member_qr(
        &self,
        household_id: &HouseholdId,
        member_id: &MemberId,
        current: &QrToken,
        next: &QrToken,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut records = lock(&self.records);
        let member = records
            .members
            .get_mut(&(household_id.clone(), member_id.clone()))
            .ok_or_else(|| {
                StoreError::NotFound(format!("households/{household_id}/members/{member_id}"))
            })?;
        if &member.qr_token != current {
            return Err(StoreError::Conflict(format!(
                "households/{household_id}/members/{member_id} qr token changed"
            )));
        }
        member.qr_token = next.clone();
        member.last_qr_use_at = Some(used_at);
        Ok(())
    }

    async fn create_household(
        &self,
        household: &Household,
        founder: &Member,
    ) -> Result<(), StoreError> {
        let mut records = lock(&self.records);
        if records.households.contains_key(&household.id) {
            return Err(StoreError::Conflict(format!(
                "household {} already exists",
                household.id
            )));
        }
        records
            .households
            .insert(household.id.clone(), household.clone());
        records.members.insert(
            (founder.household_id.clone(), founder.id.clone()),
            founder.clone(),
        );
        Ok(())
    }

    async fn upsert_household_merge(&self, household: &Household) -> Result<(), StoreError> {
        lock(&self.records)
            .households
            .entry(household.id.clone())
            .or_insert_with(|| household.clone());
        Ok(())
    }

    async fn upsert_member_merge(&self, member: &Member) -> Result<(), StoreError> {
        lock(&self.records)
            .members
            .entry((member.household_id.clone(), member.id.clone()))
            .and_modify(|existing| existing.qr_token = member.qr_token.clone())
            .or_insert_with(|| member.clone());
        Ok(())
    }

    async fn query_open_chores_due_between(
        &self,
        window: &DueWindow,
    ) -> Result<Vec<ScannedChore>, StoreError> {
        let records = lock(&self.records);
        let is_due = |chore: &Chore| chore.status == ChoreStatus::Open && window.contains(chore.due_at);

        let mut due: Vec<ChoreSnapshot> = records
            .chores
            .iter()
            .filter(|(_, chore)| is_due(chore))
            .map(|((h, c), chore)| ChoreSnapshot::at(h, c, chore.clone()))
            .chain(
                records
                    .stray_chores
                    .iter()
                    .filter(|s| is_due(&s.chore))
                    .cloned(),
            )
            .collect();
        due.sort_by_key(|s| s.chore.due_at);

        Ok(due
            .into_iter()
            .map(Ok)
            .chain(records.undecodable_chores.iter().map(|(path, reason)| {
                Err(StoreError::Decode(format!("{path}: {reason}")))
            }))
            .collect())
    }

    async fn get_chore(
        &self,
        household_id: &HouseholdId,
        chore_id: &ChoreId,
    ) -> Result<Option<Chore>, StoreError> {
        Ok(lock(&self.records)
            .chores
            .get(&(household_id.clone(), chore_id.clone()))
            .cloned())
    }

    async fn list_chores(
        &self,
        household_id: &HouseholdId,
    ) -> Result<Vec<(ChoreId, Chore)>, StoreError> {
        let mut chores: Vec<(ChoreId, Chore)> = lock(&self.records)
            .chores
            .iter()
            .filter(|((h, _), _)| h == household_id)
            .map(|((_, c), chore)| (c.clone(), chore.clone()))
            .collect();
        chores.sort_by(|a, b| a.1.due_at.cmp(&b.1.due_at).then_with(|| a.0.cmp(&b.0)));
        Ok(chores)
    }

    async fn write_chore(
        &self,
        household_id: &HouseholdId,
        chore_id: &ChoreId,
        chore: &Chore,
    ) -> Result<ChoreWrite, StoreError> {
        let before = lock(&self.records)
            .chores
            .insert((household_id.clone(), chore_id.clone()), chore.clone());
        Ok(ChoreWrite {
            before,
            after: chore.clone(),
        })
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let fail_at = lock(&self.fail_batch_at).take();
        let mut records = lock(&self.records);
        let mut staged = records.clone();

        for (index, op) in batch.ops().iter().enumerate() {
            if fail_at == Some(index) {
                return Err(StoreError::Unavailable(format!(
                    "injected failure at write {index}"
                )));
            }
            staged.apply(op)?;
        }

        *records = staged;
        Ok(())
    }

    async fn apply_completion_award(
        &self,
        award: &CompletionAward,
    ) -> Result<AwardOutcome, StoreError> {
        let mut records = lock(&self.records);

        if let Some(completed_at) = award.completed_at {
            let key = (
                award.household_id.clone(),
                award.chore_id.clone(),
                completed_at,
            );
            if !records.completions.insert(key) {
                return Ok(AwardOutcome::AlreadyApplied);
            }
        }

        let mut members = 0;
        for assignee in &award.assignees {
            if let Some(member) = records
                .members
                .get_mut(&(award.household_id.clone(), assignee.clone()))
            {
                member.points += i64::from(award.points);
                members += 1;
            }
        }
        Ok(AwardOutcome::Awarded { members })
    }
}
