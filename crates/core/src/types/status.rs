//! Status enums for household entities.

use serde::{Deserialize, Serialize};

/// Chore lifecycle status.
///
/// Only two edges are modeled: `open -> done` (completion) and
/// `done -> open` (undo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "chore_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ChoreStatus {
    #[default]
    Open,
    Done,
}

impl ChoreStatus {
    /// The status a toggle moves to.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Open => Self::Done,
            Self::Done => Self::Open,
        }
    }

    /// Returns true only for the exact `open -> done` edge.
    ///
    /// A missing snapshot on either side (create, delete) never qualifies,
    /// and neither does `done -> done` from a duplicate delivery.
    #[must_use]
    pub const fn is_completion(before: Option<Self>, after: Option<Self>) -> bool {
        matches!((before, after), (Some(Self::Open), Some(Self::Done)))
    }
}

impl std::fmt::Display for ChoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl std::str::FromStr for ChoreStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "done" => Ok(Self::Done),
            _ => Err(format!("invalid chore status: {s}")),
        }
    }
}

/// Member role within a household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "member_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Can manage the household and its members.
    Parent,
    /// Regular participant.
    #[default]
    Child,
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parent => write!(f, "parent"),
            Self::Child => write!(f, "child"),
        }
    }
}

impl std::str::FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parent" => Ok(Self::Parent),
            "child" => Ok(Self::Child),
            _ => Err(format!("invalid member role: {s}")),
        }
    }
}
