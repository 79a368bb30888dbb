//! Flushing a finished session into workout history
//!
//! Mapping is best-effort: an entry that cannot be resolved against the
//! catalog is dropped, never the whole workout.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::workout::{
    AppendOutcome, CatalogExercise, ExerciseEntry, NewExerciseRecord, NewSetRecord,
    NewWorkoutRecord, WorkoutStore,
};
use crate::error::Result;

/// Summary of a completed finalization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizeReport {
    pub workout_id: Uuid,
    /// True when history already held this session and nothing new was written
    pub already_recorded: bool,
    /// Exercises written to history
    pub kept: usize,
    /// Names of exercises that did not resolve against the catalog
    pub dropped: Vec<String>,
}

/// Everything finalization needs from the live session
#[derive(Debug)]
pub(crate) struct FinishedSession<'a> {
    pub session_id: Uuid,
    pub user_id: &'a str,
    pub workout_name: &'a str,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub exercises: &'a [ExerciseEntry],
}

/// Find the catalog exercise for a roster entry
///
/// The stable catalog id wins when present; otherwise (or when that id is
/// gone) fall back to an exact, case-sensitive name match.
pub async fn resolve_catalog_entry(
    store: &dyn WorkoutStore,
    entry: &ExerciseEntry,
) -> Result<Option<CatalogExercise>> {
    if let Some(catalog_id) = entry.catalog_id {
        if let Some(found) = store.find_exercise_by_id(catalog_id).await? {
            return Ok(Some(found));
        }
        debug!(%catalog_id, name = %entry.name, "Catalog id not found, matching by name");
    }
    store.find_exercise_by_name(&entry.name).await
}

/// Build the history record, returning it with the names that were dropped
pub(crate) async fn build_record(
    store: &dyn WorkoutStore,
    session: &FinishedSession<'_>,
) -> Result<(NewWorkoutRecord, Vec<String>)> {
    let mut exercises = Vec::with_capacity(session.exercises.len());
    let mut dropped = Vec::new();

    for entry in session.exercises {
        let Some(catalog) = resolve_catalog_entry(store, entry).await? else {
            warn!(
                session_id = %session.session_id,
                exercise = %entry.name,
                "Exercise not in catalog, leaving it out of history"
            );
            dropped.push(entry.name.clone());
            continue;
        };

        exercises.push(NewExerciseRecord {
            catalog_id: catalog.id,
            exercise_name: catalog.name,
            order: u32::try_from(exercises.len()).unwrap_or(u32::MAX),
            completed: entry.is_completed(),
            rest_seconds: entry.rest_seconds,
            sets: entry
                .sets
                .iter()
                .map(|set| NewSetRecord {
                    reps: set.reps,
                    weight: set.weight,
                    completed: set.completed,
                })
                .collect(),
        });
    }

    let record = NewWorkoutRecord {
        session_id: session.session_id,
        user_id: session.user_id.to_string(),
        workout_name: session.workout_name.to_string(),
        start_time: session.start_time,
        end_time: session.end_time,
        duration_seconds: (session.end_time - session.start_time).num_seconds().max(0),
        exercises,
    };

    Ok((record, dropped))
}

/// Resolve, build, and append in one step
pub(crate) async fn finalize(
    store: &dyn WorkoutStore,
    session: &FinishedSession<'_>,
) -> Result<FinalizeReport> {
    let (record, dropped) = build_record(store, session).await?;
    let kept = record.exercises.len();
    let outcome = store.append(&record).await?;

    Ok(FinalizeReport {
        workout_id: outcome.workout_id(),
        already_recorded: matches!(outcome, AppendOutcome::AlreadyRecorded(_)),
        kept,
        dropped,
    })
}
