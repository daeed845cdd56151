//! Document store access.
//!
//! # Store: households, members, chores
//!
//! All handlers reach the store through the [`DocumentStore`] trait. The
//! production implementation is [`PgStore`] (`PostgreSQL`); [`MemoryStore`]
//! implements the same contract in memory for tests and local runs.
//!
//! ## Tables
//!
//! - `households` - Tenant records and the QR rotation audit marker
//! - `members` - Household participants, QR tokens, device tokens, points
//! - `chores` - Chore records, scanned cross-household by `(status, due_at)`
//! - `chore_completions` - Completion ledger guarding points awards
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p choreboard-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use choreboard_core::{
    Chore, ChoreId, ChoreSnapshot, DueWindow, Household, HouseholdId, IN_FILTER_LIMIT, Member,
    MemberId, QrToken,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// One record from a cross-household scan.
pub type ScannedChore = Result<ChoreSnapshot, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored record does not fit its schema.
    #[error("decode error: {0}")]
    Decode(String),

    /// Requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate id).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A membership filter exceeded the store's value limit.
    #[error("membership filter has {len} values, limit is {max}")]
    InFilterTooLarge {
        /// Number of values requested.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// The store could not complete the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A single mutation inside an atomic [`WriteBatch`].
///
/// Both variants are updates: committing one against a record that does not
/// exist fails the whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Stamp a household's rotation audit marker.
    StampHouseholdRotation {
        household_id: HouseholdId,
        at: DateTime<Utc>,
    },
    /// Overwrite a member's QR token.
    SetMemberQr {
        household_id: HouseholdId,
        member_id: MemberId,
        token: QrToken,
    },
}

/// An all-or-nothing set of writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Queue a write.
    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    /// Queued writes in commit order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Number of queued writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Points owed for one observed chore completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionAward {
    pub household_id: HouseholdId,
    pub chore_id: ChoreId,
    /// Ledger key. `None` applies the award without the duplicate guard.
    pub completed_at: Option<DateTime<Utc>>,
    pub points: u32,
    pub assignees: Vec<MemberId>,
}

/// Result of [`DocumentStore::apply_completion_award`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardOutcome {
    /// Points were added to this many existing members.
    Awarded { members: usize },
    /// The ledger already holds this completion; nothing changed.
    AlreadyApplied,
}

/// Before/after snapshots of a chore write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoreWrite {
    pub before: Option<Chore>,
    pub after: Chore,
}

/// The document store contract.
///
/// Implementations must be safe under concurrent use from independent
/// handler invocations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Point lookup of a household.
    async fn get_household(&self, id: &HouseholdId) -> Result<Option<Household>, StoreError>;

    /// Every household.
    async fn list_households(&self) -> Result<Vec<Household>, StoreError>;

    /// Point lookup of a member at `households/{h}/members/{m}`.
    async fn get_member(
        &self,
        household_id: &HouseholdId,
        member_id: &MemberId,
    ) -> Result<Option<Member>, StoreError>;

    /// Every member store-wide, across households.
    async fn list_all_members(&self) -> Result<Vec<Member>, StoreError>;

    /// Members of one household whose id is one of `ids`.
    ///
    /// Fails with [`StoreError::InFilterTooLarge`] when `ids` holds more than
    /// [`IN_FILTER_LIMIT`] values; callers window their lists first.
    async fn query_members_by_uid_in(
        &self,
        household_id: &HouseholdId,
        ids: &[MemberId],
    ) -> Result<Vec<Member>, StoreError>;

    /// Replace a member's QR token and stamp its last use, in one update.
    ///
    /// The update applies only while the stored token still equals
    /// `current`; otherwise it fails with [`StoreError::Conflict`] and nothing
    /// changes.
    async fn rotate_member_qr(
        &self,
        household_id: &HouseholdId,
        member_id: &MemberId,
        current: &QrToken,
        next: &QrToken,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Create a household and its founding member atomically.
    async fn create_household(
        &self,
        household: &Household,
        founder: &Member,
    ) -> Result<(), StoreError>;

    /// Insert the household if absent; an existing record is left untouched.
    async fn upsert_household_merge(&self, household: &Household) -> Result<(), StoreError>;

    /// Insert the member if absent; otherwise only its QR token is replaced.
    async fn upsert_member_merge(&self, member: &Member) -> Result<(), StoreError>;

    /// Open chores, store-wide, with `due_at` inside `window` (bounds inclusive).
    ///
    /// The outer error fails the scan; a record that does not decode is
    /// returned in place as `Err(StoreError::Decode)`.
    async fn query_open_chores_due_between(
        &self,
        window: &DueWindow,
    ) -> Result<Vec<ScannedChore>, StoreError>;

    /// Point lookup of a chore.
    async fn get_chore(
        &self,
        household_id: &HouseholdId,
        chore_id: &ChoreId,
    ) -> Result<Option<Chore>, StoreError>;

    /// Chores of one household, ordered by due time ascending.
    async fn list_chores(
        &self,
        household_id: &HouseholdId,
    ) -> Result<Vec<(ChoreId, Chore)>, StoreError>;

    /// Create or replace a chore, returning the snapshots around the write.
    async fn write_chore(
        &self,
        household_id: &HouseholdId,
        chore_id: &ChoreId,
        chore: &Chore,
    ) -> Result<ChoreWrite, StoreError>;

    /// Apply every write in `batch`, or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Record the completion in the ledger and increment each existing
    /// assignee's points, in one transaction.
    async fn apply_completion_award(
        &self,
        award: &CompletionAward,
    ) -> Result<AwardOutcome, StoreError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Check a membership filter against the store limit.
pub(crate) const fn check_in_filter(len: usize) -> Result<(), StoreError> {
    if len > IN_FILTER_LIMIT {
        return Err(StoreError::InFilterTooLarge {
            len,
            max: IN_FILTER_LIMIT,
        });
    }
    Ok(())
}
