//! Due-soon reminder fan-out.
//!
//! Each run scans every household for open chores due within the lookahead
//! window, resolves their assignees to device tokens, and sends one
//! multicast carrying every token found. The membership lookup is windowed
//! because the store accepts at most [`IN_FILTER_LIMIT`] ids per filter.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use tracing::{debug, error, info, instrument, warn};

use choreboard_core::{
    ChoreSnapshot, DueWindow, HouseholdId, IN_FILTER_LIMIT, MemberId, id_windows,
};

use crate::db::{DocumentStore, StoreError};
use crate::notify::{MulticastMessage, Notification, NotificationTransport};

use super::JobError;

/// Reminder title.
pub const DUE_SOON_TITLE: &str = "Tehtävä erääntyy pian";

/// Reminder body.
pub const DUE_SOON_BODY: &str = "Muistutus: tarkista tämän päivän tehtävät";

/// Summary of one reminder run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DueNotificationReport {
    /// Open chores found in the window, including undecodable records.
    pub chores_due: usize,
    /// Chores skipped: undecodable record, unresolvable path, no assignees,
    /// or a failed lookup.
    pub chores_skipped: usize,
    /// Distinct device tokens notified.
    pub tokens: usize,
}

/// Send one reminder to every device of every assignee of a chore due in
/// `[now, now + lookahead]`.
///
/// # Errors
///
/// Returns `JobError::Store` if the scan fails, `JobError::Transport` if the
/// multicast is rejected. Problems with a single chore are logged and that
/// chore is skipped.
#[instrument(skip(store, transport), fields(lookahead_minutes = lookahead.num_minutes()))]
pub async fn send_due_notifications(
    store: &dyn DocumentStore,
    transport: &dyn NotificationTransport,
    lookahead: Duration,
    now: DateTime<Utc>,
) -> Result<DueNotificationReport, JobError> {
    let window = DueWindow::starting_at(now, lookahead);
    let due = store.query_open_chores_due_between(&window).await?;

    let mut report = DueNotificationReport {
        chores_due: due.len(),
        ..DueNotificationReport::default()
    };
    let mut tokens = BTreeSet::new();

    for scanned in &due {
        let snapshot = match scanned {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "Undecodable chore in due scan, skipping");
                report.chores_skipped += 1;
                continue;
            }
        };
        match chore_tokens(store, snapshot).await {
            Ok(Some(found)) => tokens.extend(found),
            Ok(None) => report.chores_skipped += 1,
            Err(e) => {
                error!(path = %snapshot.path, error = %e, "Assignee lookup failed, skipping chore");
                report.chores_skipped += 1;
            }
        }
    }

    report.tokens = tokens.len();
    if tokens.is_empty() {
        debug!(chores = report.chores_due, "No device tokens to notify");
        return Ok(report);
    }

    let message = MulticastMessage {
        tokens: tokens.into_iter().collect(),
        notification: Notification {
            title: DUE_SOON_TITLE.to_owned(),
            body: DUE_SOON_BODY.to_owned(),
        },
    };
    transport.send_multicast(&message).await?;

    info!(
        chores = report.chores_due,
        skipped = report.chores_skipped,
        tokens = report.tokens,
        "Due-soon reminders sent"
    );
    Ok(report)
}

/// Device tokens of one chore's assignees; `None` if the chore is skipped.
async fn chore_tokens(
    store: &dyn DocumentStore,
    snapshot: &ChoreSnapshot,
) -> Result<Option<Vec<String>>, StoreError> {
    let Some((household_id, _)) = snapshot.location() else {
        warn!(path = %snapshot.path, "Chore path has no household, skipping");
        return Ok(None);
    };

    let assignees: Vec<MemberId> = snapshot
        .chore
        .assignees
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if assignees.is_empty() {
        debug!(path = %snapshot.path, "Chore has no assignees, skipping");
        return Ok(None);
    }

    Ok(Some(resolve_tokens(store, &household_id, &assignees).await?))
}

/// Look up members in windows of at most [`IN_FILTER_LIMIT`] ids and collect
/// their device tokens.
async fn resolve_tokens(
    store: &dyn DocumentStore,
    household_id: &HouseholdId,
    ids: &[MemberId],
) -> Result<Vec<String>, StoreError> {
    let lookups = id_windows(ids, IN_FILTER_LIMIT)
        .map(|window| store.query_members_by_uid_in(household_id, window));
    let members = try_join_all(lookups).await?;

    Ok(members
        .into_iter()
        .flatten()
        .flat_map(|member| member.notification_tokens)
        .collect())
}
