//! Recurring chore placeholder.
//!
//! Chores carry a `repeatRule` but nothing evaluates it yet. The job is
//! registered on its daily schedule so that an evaluator can be added here
//! without touching the runner.

use chrono::{DateTime, Utc};
use tracing::debug;

/// Summary of one repeat-rule run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepeatRulesReport {
    /// Chores re-opened or re-scheduled by a rule.
    pub applied: usize,
}

/// Apply recurrence rules. Currently does nothing.
#[must_use]
pub fn apply_repeat_rules(now: DateTime<Utc>) -> RepeatRulesReport {
    debug!(%now, "Repeat rules are not evaluated");
    RepeatRulesReport::default()
}
