//! Document path convention.
//!
//! Records are addressed as `households/{householdId}`,
//! `households/{householdId}/members/{memberId}` and
//! `households/{householdId}/chores/{choreId}`. Handlers that receive a
//! record without an explicit household field derive the owner from here.

use core::fmt;

use thiserror::Error;

use super::id::{ChoreId, HouseholdId, IdError, MemberId};

const HOUSEHOLDS: &str = "households";
const MEMBERS: &str = "members";
const CHORES: &str = "chores";

/// Errors that can occur when parsing a [`DocumentPath`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path does not follow the household layout.
    #[error("unrecognised document path: {0}")]
    Unrecognised(String),
    /// A path segment is not a valid id.
    #[error("invalid id in document path: {0}")]
    InvalidId(#[from] IdError),
}

/// A parsed document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentPath {
    /// `households/{h}`
    Household(HouseholdId),
    /// `households/{h}/members/{m}`
    Member(HouseholdId, MemberId),
    /// `households/{h}/chores/{c}`
    Chore(HouseholdId, ChoreId),
}

impl DocumentPath {
    /// Parse a slash-separated document path.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::Unrecognised`] for any layout other than the
    /// three above, and [`PathError::InvalidId`] for malformed segments.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            [HOUSEHOLDS, h] => Ok(Self::Household(HouseholdId::parse(h)?)),
            [HOUSEHOLDS, h, MEMBERS, m] => {
                Ok(Self::Member(HouseholdId::parse(h)?, MemberId::parse(m)?))
            }
            [HOUSEHOLDS, h, CHORES, c] => {
                Ok(Self::Chore(HouseholdId::parse(h)?, ChoreId::parse(c)?))
            }
            _ => Err(PathError::Unrecognised(path.to_owned())),
        }
    }

    /// Path of a chore record.
    #[must_use]
    pub fn chore(household_id: &HouseholdId, chore_id: &ChoreId) -> Self {
        Self::Chore(household_id.clone(), chore_id.clone())
    }

    /// Path of a member record.
    #[must_use]
    pub fn member(household_id: &HouseholdId, member_id: &MemberId) -> Self {
        Self::Member(household_id.clone(), member_id.clone())
    }

    /// The owning household, whatever the record type.
    #[must_use]
    pub const fn household_id(&self) -> &HouseholdId {
        match self {
            Self::Household(h) | Self::Member(h, _) | Self::Chore(h, _) => h,
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Household(h) => write!(f, "{HOUSEHOLDS}/{h}"),
            Self::Member(h, m) => write!(f, "{HOUSEHOLDS}/{h}/{MEMBERS}/{m}"),
            Self::Chore(h, c) => write!(f, "{HOUSEHOLDS}/{h}/{CHORES}/{c}"),
        }
    }
}
