//! Chore listing, creation and completion toggling.
//!
//! Every write is passed to the [`CompletionReactor`] with the snapshots the
//! store returned, the same way an external write trigger would deliver it.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use choreboard_core::{Chore, ChoreId, HouseholdId, MAX_CHORE_POINTS, MemberId, NewChore};

use crate::db::DocumentStore;
use crate::error::AppError;

use super::completion::{CompletionReactor, ReactorOutcome};

/// A chore together with its id.
#[derive(Debug, Clone, Serialize)]
pub struct ChoreView {
    pub id: ChoreId,
    #[serde(flatten)]
    pub chore: Chore,
}

/// Result of toggling a chore.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResult {
    #[serde(flatten)]
    pub chore: ChoreView,
    /// Whether this toggle credited points.
    pub awarded: bool,
}

/// Household chore operations.
pub struct ChoreService<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> ChoreService<'a> {
    /// Create a new chore service.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// List a household's chores by due time, earliest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the store read fails.
    pub async fn list(&self, household_id: &HouseholdId) -> Result<Vec<ChoreView>, AppError> {
        let chores = self.store.list_chores(household_id).await?;
        Ok(chores
            .into_iter()
            .map(|(id, chore)| ChoreView { id, chore })
            .collect())
    }

    /// Create an open chore on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidArgument` if the title is blank or the points
    /// exceed [`MAX_CHORE_POINTS`], `AppError::Internal` if the store write fails.
    #[instrument(skip(self, new), fields(household_id = %household_id, caller = %caller))]
    pub async fn create(
        &self,
        household_id: &HouseholdId,
        caller: &MemberId,
        new: NewChore,
    ) -> Result<ChoreView, AppError> {
        if new.title.trim().is_empty() {
            return Err(AppError::InvalidArgument("title is required".to_string()));
        }
        if new.points.is_some_and(|p| p > MAX_CHORE_POINTS) {
            return Err(AppError::InvalidArgument(format!(
                "points must be at most {MAX_CHORE_POINTS}"
            )));
        }

        let id = ChoreId::generate();
        let chore = Chore::from_new(new, caller.clone(), Utc::now());
        let write = self.store.write_chore(household_id, &id, &chore).await?;
        self.react(household_id, &id, write.before.as_ref(), &write.after)
            .await?;

        info!(chore_id = %id, "Chore created");
        Ok(ChoreView {
            id,
            chore: write.after,
        })
    }

    /// Flip a chore between open and done.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the chore does not exist,
    /// `AppError::Internal` if a store operation fails.
    #[instrument(skip(self), fields(household_id = %household_id, chore_id = %chore_id))]
    pub async fn toggle(
        &self,
        household_id: &HouseholdId,
        chore_id: &ChoreId,
    ) -> Result<ToggleResult, AppError> {
        let current = self
            .store
            .get_chore(household_id, chore_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Chore not found".to_string()))?;

        let write = self
            .store
            .write_chore(household_id, chore_id, &current.toggled(Utc::now()))
            .await?;
        let outcome = self
            .react(household_id, chore_id, write.before.as_ref(), &write.after)
            .await?;

        info!(status = %write.after.status, "Chore toggled");
        Ok(ToggleResult {
            chore: ChoreView {
                id: chore_id.clone(),
                chore: write.after,
            },
            awarded: outcome.awarded(),
        })
    }

    async fn react(
        &self,
        household_id: &HouseholdId,
        chore_id: &ChoreId,
        before: Option<&Chore>,
        after: &Chore,
    ) -> Result<ReactorOutcome, AppError> {
        Ok(CompletionReactor::new(self.store)
            .on_chore_written(household_id, chore_id, before, Some(after))
            .await?)
    }
}
