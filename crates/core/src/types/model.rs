//! Household, member and chore records.
//!
//! These are the explicit schemas for every record the store holds. Store
//! implementations decode into these types and fail with a typed error when
//! a stored shape does not fit, rather than coercing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ChoreId, HouseholdId, MemberId};
use super::path::DocumentPath;
use super::status::{ChoreStatus, MemberRole};
use super::token::QrToken;

/// Tenant boundary grouping members and chores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Household {
    pub id: HouseholdId,
    pub name: String,
    pub locale: String,
    pub timezone: String,
    /// Member capacity limit.
    pub max_members: u32,
    pub created_at: DateTime<Utc>,
    /// Audit marker stamped by the daily QR rotation.
    pub rotated_at: Option<DateTime<Utc>>,
}

impl Household {
    pub const DEFAULT_NAME: &'static str = "Dev Household";
    pub const DEFAULT_LOCALE: &'static str = "fi-FI";
    pub const DEFAULT_TIMEZONE: &'static str = "Europe/Helsinki";
    pub const DEFAULT_MAX_MEMBERS: u32 = 10;

    /// A household with the provisioning defaults.
    #[must_use]
    pub fn with_defaults(id: HouseholdId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: Self::DEFAULT_NAME.to_owned(),
            locale: Self::DEFAULT_LOCALE.to_owned(),
            timezone: Self::DEFAULT_TIMEZONE.to_owned(),
            max_members: Self::DEFAULT_MAX_MEMBERS,
            created_at,
            rotated_at: None,
        }
    }
}

/// A household participant.
///
/// The member id doubles as the identity subject for minted credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub household_id: HouseholdId,
    pub id: MemberId,
    pub display_name: String,
    pub role: MemberRole,
    /// Current single-use sign-in token.
    #[serde(skip_serializing)]
    pub qr_token: QrToken,
    /// Registered push device tokens.
    #[serde(default)]
    pub notification_tokens: Vec<String>,
    #[serde(default)]
    pub points: i64,
    pub last_qr_use_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// A new member with no devices and no points.
    #[must_use]
    pub fn new(
        household_id: HouseholdId,
        id: MemberId,
        display_name: impl Into<String>,
        role: MemberRole,
        qr_token: QrToken,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            household_id,
            id,
            display_name: display_name.into(),
            role,
            qr_token,
            notification_tokens: Vec::new(),
            points: 0,
            last_qr_use_at: None,
            created_at,
        }
    }

    /// Path of this member's record.
    #[must_use]
    pub fn path(&self) -> DocumentPath {
        DocumentPath::member(&self.household_id, &self.id)
    }
}

const fn default_points() -> u32 {
    1
}

/// Largest award a chore can carry. Point columns are signed 32-bit.
pub const MAX_CHORE_POINTS: u32 = 0x7FFF_FFFF;

/// A chore record as stored under `households/{h}/chores/{c}`.
///
/// The record carries no household field; the owner is part of its path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chore {
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Order is irrelevant.
    #[serde(default)]
    pub assignees: Vec<MemberId>,
    pub due_at: DateTime<Utc>,
    /// Recurrence rule, stored but not evaluated.
    #[serde(default)]
    pub repeat_rule: Option<String>,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default)]
    pub requires_proof: bool,
    pub status: ChoreStatus,
    pub created_by: MemberId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Chore {
    /// Build an open chore from creation input.
    #[must_use]
    pub fn from_new(new: NewChore, created_by: MemberId, now: DateTime<Utc>) -> Self {
        let assignees = if new.assignees.is_empty() {
            vec![created_by.clone()]
        } else {
            new.assignees
        };
        Self {
            title: new.title.trim().to_owned(),
            notes: new.notes,
            assignees,
            due_at: new.due_at.unwrap_or(now),
            repeat_rule: None,
            points: new.points.unwrap_or_else(default_points),
            requires_proof: new.requires_proof,
            status: ChoreStatus::Open,
            created_by,
            created_at: now,
            completed_at: None,
        }
    }

    /// Whether the award fits the stored range.
    #[must_use]
    pub const fn points_in_range(&self) -> bool {
        self.points <= MAX_CHORE_POINTS
    }

    /// Apply a completion toggle, stamping or clearing `completed_at`.
    #[must_use]
    pub fn toggled(&self, now: DateTime<Utc>) -> Self {
        let status = self.status.toggled();
        Self {
            status,
            completed_at: (status == ChoreStatus::Done).then_some(now),
            ..self.clone()
        }
    }
}

/// Input for creating a chore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChore {
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub assignees: Vec<MemberId>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub points: Option<u32>,
    #[serde(default)]
    pub requires_proof: bool,
}

/// A chore together with the path it was read from.
///
/// Cross-household scans return these; consumers resolve the owner from
/// `path` and skip records whose path does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoreSnapshot {
    pub path: String,
    pub chore: Chore,
}

impl ChoreSnapshot {
    /// Snapshot of a chore at its canonical path.
    #[must_use]
    pub fn at(household_id: &HouseholdId, chore_id: &ChoreId, chore: Chore) -> Self {
        Self {
            path: DocumentPath::chore(household_id, chore_id).to_string(),
            chore,
        }
    }

    /// Owning household and chore id, if the path is a chore path.
    #[must_use]
    pub fn location(&self) -> Option<(HouseholdId, ChoreId)> {
        match DocumentPath::parse(&self.path).ok()? {
            DocumentPath::Chore(h, c) => Some((h, c)),
            DocumentPath::Household(_) | DocumentPath::Member(..) => None,
        }
    }
}
