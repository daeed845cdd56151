//! `PostgreSQL` implementation of [`DocumentStore`].
//!
//! Rows are fetched into private row structs holding raw column values and
//! converted with `TryFrom` into core types. A row that does not decode fails
//! with [`StoreError::Decode`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use choreboard_core::{
    Chore, ChoreId, ChoreSnapshot, ChoreStatus, DueWindow, Household, HouseholdId, Member,
    MemberId, MemberRole, QrToken,
};

use super::{
    AwardOutcome, ChoreWrite, CompletionAward, DocumentStore, ScannedChore, StoreError,
    WriteBatch, WriteOp, check_in_filter,
};

const MEMBER_COLUMNS: &str = r"
    household_id, id, display_name, role::text AS role, qr_token,
    notification_tokens, points, last_qr_use_at, created_at
";

const CHORE_COLUMNS: &str = r"
    household_id, id, title, notes, assignees, due_at, repeat_rule, points,
    requires_proof, status::text AS status, created_by, created_at, completed_at
";

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Row types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct HouseholdRow {
    id: String,
    name: String,
    locale: String,
    timezone: String,
    max_members: i32,
    created_at: DateTime<Utc>,
    rotated_at: Option<DateTime<Utc>>,
}

impl TryFrom<HouseholdRow> for Household {
    type Error = StoreError;

    fn try_from(row: HouseholdRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: decode_id(&row.id, "households.id")?,
            max_members: u32::try_from(row.max_members).map_err(|_| {
                StoreError::Decode(format!("negative max_members in household {}", row.id))
            })?,
            name: row.name,
            locale: row.locale,
            timezone: row.timezone,
            created_at: row.created_at,
            rotated_at: row.rotated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    household_id: String,
    id: String,
    display_name: String,
    role: String,
    qr_token: String,
    notification_tokens: Vec<String>,
    points: i64,
    last_qr_use_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for Member {
    type Error = StoreError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<MemberRole>()
            .map_err(StoreError::Decode)?;
        let qr_token = QrToken::parse(&row.qr_token).map_err(|e| {
            StoreError::Decode(format!("invalid qr token for member {}: {e}", row.id))
        })?;

        Ok(Self {
            household_id: decode_id(&row.household_id, "members.household_id")?,
            id: decode_id(&row.id, "members.id")?,
            display_name: row.display_name,
            role,
            qr_token,
            notification_tokens: row.notification_tokens,
            points: row.points,
            last_qr_use_at: row.last_qr_use_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChoreRow {
    household_id: String,
    id: String,
    title: String,
    notes: Option<String>,
    assignees: Vec<String>,
    due_at: DateTime<Utc>,
    repeat_rule: Option<String>,
    points: i32,
    requires_proof: bool,
    status: String,
    created_by: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl ChoreRow {
    /// Build the snapshot path from the raw columns without validating them,
    /// so a malformed owner surfaces at path resolution.
    fn path(&self) -> String {
        format!("households/{}/chores/{}", self.household_id, self.id)
    }
}

impl TryFrom<ChoreRow> for Chore {
    type Error = StoreError;

    fn try_from(row: ChoreRow) -> Result<Self, Self::Error> {
        let assignees = row
            .assignees
            .iter()
            .map(|a| decode_id(a, "chores.assignees"))
            .collect::<Result<Vec<MemberId>, _>>()?;
        let status = row
            .status
            .parse::<ChoreStatus>()
            .map_err(StoreError::Decode)?;
        let points = u32::try_from(row.points)
            .map_err(|_| StoreError::Decode(format!("negative points on chore {}", row.id)))?;

        Ok(Self {
            title: row.title,
            notes: row.notes,
            assignees,
            due_at: row.due_at,
            repeat_rule: row.repeat_rule,
            points,
            requires_proof: row.requires_proof,
            status,
            created_by: decode_id(&row.created_by, "chores.created_by")?,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// Decode one scanned row, tagging a decode failure with the record path.
fn scan_row(row: ChoreRow) -> ScannedChore {
    let path = row.path();
    match Chore::try_from(row) {
        Ok(chore) => Ok(ChoreSnapshot { path, chore }),
        Err(StoreError::Decode(msg)) => Err(StoreError::Decode(format!("{path}: {msg}"))),
        Err(other) => Err(other),
    }
}

fn decode_id<T>(raw: &str, column: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = choreboard_core::IdError>,
{
    raw.parse::<T>()
        .map_err(|e| StoreError::Decode(format!("invalid id in {column}: {e}")))
}

fn id_strs<T: AsRef<str>>(ids: &[T]) -> Vec<&str> {
    ids.iter().map(AsRef::as_ref).collect()
}

fn points_i32(points: u32) -> Result<i32, StoreError> {
    i32::try_from(points)
        .map_err(|_| StoreError::Decode(format!("points {points} exceed the column range")))
}

async fn insert_member(
    tx: &mut Transaction<'_, Postgres>,
    member: &Member,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        INSERT INTO members (
            household_id, id, display_name, role, qr_token,
            notification_tokens, points, last_qr_use_at, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ",
    )
    .bind(&member.household_id)
    .bind(&member.id)
    .bind(&member.display_name)
    .bind(member.role)
    .bind(member.qr_token.expose())
    .bind(&member.notification_tokens)
    .bind(member.points)
    .bind(member.last_qr_use_at)
    .bind(member.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_household(&self, id: &HouseholdId) -> Result<Option<Household>, StoreError> {
        let row = sqlx::query_as::<_, HouseholdRow>(
            r"
            SELECT id, name, locale, timezone, max_members, created_at, rotated_at
            FROM households
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_households(&self) -> Result<Vec<Household>, StoreError> {
        let rows = sqlx::query_as::<_, HouseholdRow>(
            r"
            SELECT id, name, locale, timezone, max_members, created_at, rotated_at
            FROM households
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_member(
        &self,
        household_id: &HouseholdId,
        member_id: &MemberId,
    ) -> Result<Option<Member>, StoreError> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE household_id = $1 AND id = $2"
        ))
        .bind(household_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_all_members(&self) -> Result<Vec<Member>, StoreError> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members ORDER BY household_id, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self, ids), fields(household_id = %household_id, count = ids.len()))]
    async fn query_members_by_uid_in(
        &self,
        household_id: &HouseholdId,
        ids: &[MemberId],
    ) -> Result<Vec<Member>, StoreError> {
        check_in_filter(ids.len())?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE household_id = $1 AND id = ANY($2)"
        ))
        .bind(household_id)
        .bind(id_strs(ids))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn rotate_member_qr(
        &self,
        household_id: &HouseholdId,
        member_id: &MemberId,
        current: &QrToken,
        next: &QrToken,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE members
            SET qr_token = $4, last_qr_use_at = $5
            WHERE household_id = $1 AND id = $2 AND qr_token = $3
            ",
        )
        .bind(household_id)
        .bind(member_id)
        .bind(current.expose())
        .bind(next.expose())
        .bind(used_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "households/{household_id}/members/{member_id} qr token changed"
            )));
        }
        Ok(())
    }

    async fn create_household(
        &self,
        household: &Household,
        founder: &Member,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO households (id, name, locale, timezone, max_members, created_at, rotated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(&household.id)
        .bind(&household.name)
        .bind(&household.locale)
        .bind(&household.timezone)
        .bind(i32::try_from(household.max_members).unwrap_or(i32::MAX))
        .bind(household.created_at)
        .bind(household.rotated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict(format!("household {} already exists", household.id));
            }
            StoreError::Database(e)
        })?;

        insert_member(&mut tx, founder).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_household_merge(&self, household: &Household) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO households (id, name, locale, timezone, max_members, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(&household.id)
        .bind(&household.name)
        .bind(&household.locale)
        .bind(&household.timezone)
        .bind(i32::try_from(household.max_members).unwrap_or(i32::MAX))
        .bind(household.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_member_merge(&self, member: &Member) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO members (household_id, id, display_name, role, qr_token, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (household_id, id) DO UPDATE SET qr_token = EXCLUDED.qr_token
            ",
        )
        .bind(&member.household_id)
        .bind(&member.id)
        .bind(&member.display_name)
        .bind(member.role)
        .bind(member.qr_token.expose())
        .bind(member.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn query_open_chores_due_between(
        &self,
        window: &DueWindow,
    ) -> Result<Vec<ScannedChore>, StoreError> {
        let rows = sqlx::query_as::<_, ChoreRow>(&format!(
            r"
            SELECT {CHORE_COLUMNS}
            FROM chores
            WHERE status = 'open' AND due_at >= $1 AND due_at <= $2
            ORDER BY due_at
            "
        ))
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Fetched due-soon chores");

        Ok(rows.into_iter().map(scan_row).collect())
    }

    async fn get_chore(
        &self,
        household_id: &HouseholdId,
        chore_id: &ChoreId,
    ) -> Result<Option<Chore>, StoreError> {
        let row = sqlx::query_as::<_, ChoreRow>(&format!(
            "SELECT {CHORE_COLUMNS} FROM chores WHERE household_id = $1 AND id = $2"
        ))
        .bind(household_id)
        .bind(chore_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_chores(
        &self,
        household_id: &HouseholdId,
    ) -> Result<Vec<(ChoreId, Chore)>, StoreError> {
        let rows = sqlx::query_as::<_, ChoreRow>(&format!(
            "SELECT {CHORE_COLUMNS} FROM chores WHERE household_id = $1 ORDER BY due_at, id"
        ))
        .bind(household_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let id = decode_id::<ChoreId>(&row.id, "chores.id")?;
                Chore::try_from(row).map(|chore| (id, chore))
            })
            .collect()
    }

    #[instrument(skip(self, chore), fields(household_id = %household_id, chore_id = %chore_id))]
    async fn write_chore(
        &self,
        household_id: &HouseholdId,
        chore_id: &ChoreId,
        chore: &Chore,
    ) -> Result<ChoreWrite, StoreError> {
        let mut tx = self.pool.begin().await?;

        let before = sqlx::query_as::<_, ChoreRow>(&format!(
            "SELECT {CHORE_COLUMNS} FROM chores WHERE household_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(household_id)
        .bind(chore_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Chore::try_from)
        .transpose()?;

        sqlx::query(
            r"
            INSERT INTO chores (
                household_id, id, title, notes, assignees, due_at, repeat_rule,
                points, requires_proof, status, created_by, created_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (household_id, id) DO UPDATE SET
                title = EXCLUDED.title,
                notes = EXCLUDED.notes,
                assignees = EXCLUDED.assignees,
                due_at = EXCLUDED.due_at,
                repeat_rule = EXCLUDED.repeat_rule,
                points = EXCLUDED.points,
                requires_proof = EXCLUDED.requires_proof,
                status = EXCLUDED.status,
                completed_at = EXCLUDED.completed_at
            ",
        )
        .bind(household_id)
        .bind(chore_id)
        .bind(&chore.title)
        .bind(&chore.notes)
        .bind(id_strs(&chore.assignees))
        .bind(chore.due_at)
        .bind(&chore.repeat_rule)
        .bind(points_i32(chore.points)?)
        .bind(chore.requires_proof)
        .bind(chore.status)
        .bind(&chore.created_by)
        .bind(chore.created_at)
        .bind(chore.completed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ChoreWrite {
            before,
            after: chore.clone(),
        })
    }

    #[instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for op in batch.ops() {
            let (result, path) = match op {
                WriteOp::StampHouseholdRotation { household_id, at } => (
                    sqlx::query("UPDATE households SET rotated_at = $2 WHERE id = $1")
                        .bind(household_id)
                        .bind(*at)
                        .execute(&mut *tx)
                        .await?,
                    format!("households/{household_id}"),
                ),
                WriteOp::SetMemberQr {
                    household_id,
                    member_id,
                    token,
                } => (
                    sqlx::query(
                        "UPDATE members SET qr_token = $3 WHERE household_id = $1 AND id = $2",
                    )
                    .bind(household_id)
                    .bind(member_id)
                    .bind(token.expose())
                    .execute(&mut *tx)
                    .await?,
                    format!("households/{household_id}/members/{member_id}"),
                ),
            };

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back everything applied so far.
                return Err(StoreError::NotFound(path));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, award), fields(household_id = %award.household_id, chore_id = %award.chore_id))]
    async fn apply_completion_award(
        &self,
        award: &CompletionAward,
    ) -> Result<AwardOutcome, StoreError> {
        let points = i64::from(award.points);
        let mut tx = self.pool.begin().await?;

        if let Some(completed_at) = award.completed_at {
            let claimed = sqlx::query(
                r"
                INSERT INTO chore_completions (household_id, chore_id, completed_at, points, assignees)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(&award.household_id)
            .bind(&award.chore_id)
            .bind(completed_at)
            .bind(points_i32(award.points)?)
            .bind(id_strs(&award.assignees))
            .execute(&mut *tx)
            .await?;

            if claimed.rows_affected() == 0 {
                return Ok(AwardOutcome::AlreadyApplied);
            }
        }

        let mut members = 0;
        for assignee in &award.assignees {
            let result = sqlx::query(
                "UPDATE members SET points = points + $3 WHERE household_id = $1 AND id = $2",
            )
            .bind(&award.household_id)
            .bind(assignee)
            .bind(points)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                debug!(member_id = %assignee, "Assignee has no member record, skipping");
            } else {
                members += 1;
            }
        }

        tx.commit().await?;
        Ok(AwardOutcome::Awarded { members })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, assignees: &[&str]) -> ChoreRow {
        ChoreRow {
            household_id: "H".to_owned(),
            id: id.to_owned(),
            title: "Dishes".to_owned(),
            notes: None,
            assignees: assignees.iter().map(|a| (*a).to_owned()).collect(),
            due_at: Utc::now(),
            repeat_rule: None,
            points: 3,
            requires_proof: false,
            status: "open".to_owned(),
            created_by: "m1".to_owned(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn test_scan_row_keeps_path_on_success() {
        let snapshot = scan_row(row("c1", &["m1"])).unwrap();
        assert_eq!(snapshot.path, "households/H/chores/c1");
        assert_eq!(snapshot.chore.points, 3);
    }

    #[test]
    fn test_scan_row_tags_decode_failure_with_path() {
        let mut negative = row("c2", &["m1"]);
        negative.points = -1;
        for (bad, path) in [
            (row("c1", &["not an id"]), "households/H/chores/c1"),
            (negative, "households/H/chores/c2"),
        ] {
            match scan_row(bad) {
                Err(StoreError::Decode(msg)) => {
                    assert!(msg.starts_with(&format!("{path}: ")), "{msg}");
                }
                other => panic!("Expected Decode, got: {other:?}"),
            }
        }
    }

    #[test]
    fn test_points_beyond_column_range_is_decode_error() {
        assert_eq!(points_i32(7).unwrap(), 7);
        assert_eq!(points_i32(choreboard_core::MAX_CHORE_POINTS).unwrap(), i32::MAX);
        assert!(matches!(
            points_i32(choreboard_core::MAX_CHORE_POINTS + 1),
            Err(StoreError::Decode(_))
        ));
    }
}
