//! Due-soon evaluation window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A closed interval `[start, end]` of due times.
///
/// Both bounds are inclusive: a chore due exactly at `end` is due soon, one
/// due a microsecond later is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueWindow {
    /// Evaluation instant.
    pub start: DateTime<Utc>,
    /// Lookahead horizon.
    pub end: DateTime<Utc>,
}

impl DueWindow {
    /// Window from `now` to `now + lookahead`.
    #[must_use]
    pub fn starting_at(now: DateTime<Utc>, lookahead: Duration) -> Self {
        Self {
            start: now,
            end: now + lookahead,
        }
    }

    /// Returns true if `due_at` falls inside the window, bounds included.
    #[must_use]
    pub fn contains(&self, due_at: DateTime<Utc>) -> bool {
        self.start <= due_at && due_at <= self.end
    }
}
