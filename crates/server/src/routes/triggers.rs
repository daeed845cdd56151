//! Chore write trigger delivery.
//!
//! An external change feed posts every chore write here with the raw
//! documents from before and after it. Delivery may repeat; the reactor
//! pays each completion once.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use choreboard_core::{Chore, DocumentPath, MAX_CHORE_POINTS};

use crate::error::AppError;
use crate::services::{CompletionReactor, ReactorOutcome};
use crate::state::AppState;

/// One chore write event.
#[derive(Debug, Deserialize)]
pub struct ChoreWrittenEvent {
    /// `households/{h}/chores/{c}`
    pub path: String,
    /// Document before the write; absent for a create.
    #[serde(default)]
    pub before: Option<Value>,
    /// Document after the write; absent for a delete.
    #[serde(default)]
    pub after: Option<Value>,
}

/// What the reactor did.
#[derive(Debug, Serialize)]
pub struct ChoreWrittenResponse {
    pub awarded: bool,
    /// Members credited.
    pub assignees: usize,
}

fn decode(side: &str, value: Option<Value>) -> Result<Option<Chore>, AppError> {
    let chore = value
        .map(|v| {
            serde_json::from_value::<Chore>(v)
                .map_err(|e| AppError::InvalidArgument(format!("{side}: {e}")))
        })
        .transpose()?;
    if chore.as_ref().is_some_and(|c| !c.points_in_range()) {
        return Err(AppError::InvalidArgument(format!(
            "{side}: points must be at most {MAX_CHORE_POINTS}"
        )));
    }
    Ok(chore)
}

/// Run the completion reactor over one delivered event.
///
/// POST /v1/triggers/chore-written
///
/// # Errors
///
/// `InvalidArgument` for a path that is not a chore, an undecodable
/// snapshot or points beyond the stored range. `Internal` if the award fails.
pub async fn chore_written(
    State(state): State<AppState>,
    payload: Result<Json<ChoreWrittenEvent>, JsonRejection>,
) -> Result<Json<ChoreWrittenResponse>, AppError> {
    let Json(event) = payload?;

    let Ok(DocumentPath::Chore(household_id, chore_id)) = DocumentPath::parse(&event.path) else {
        return Err(AppError::InvalidArgument(format!(
            "not a chore path: {}",
            event.path
        )));
    };
    let before = decode("before", event.before)?;
    let after = decode("after", event.after)?;

    let outcome = CompletionReactor::new(state.store())
        .on_chore_written(&household_id, &chore_id, before.as_ref(), after.as_ref())
        .await?;

    let assignees = match outcome {
        ReactorOutcome::Awarded { members } => members,
        ReactorOutcome::Ignored | ReactorOutcome::Duplicate => 0,
    };
    Ok(Json(ChoreWrittenResponse {
        awarded: outcome.awarded(),
        assignees,
    }))
}
