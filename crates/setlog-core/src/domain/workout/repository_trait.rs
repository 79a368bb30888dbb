//! Repository trait for workout history
//!
//! Abstracts the durable store a finished session is flushed into,
//! including the catalog lookups finalization needs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

use super::record::{AppendOutcome, CatalogExercise, NewWorkoutRecord};

/// Destination for finalized workouts
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    /// Look up a catalog exercise by exact, case-sensitive name
    async fn find_exercise_by_name(&self, name: &str) -> Result<Option<CatalogExercise>>;

    /// Look up a catalog exercise by its stable id
    async fn find_exercise_by_id(&self, id: Uuid) -> Result<Option<CatalogExercise>>;

    /// Append a finished workout with its exercises and sets
    ///
    /// Appending a record whose `session_id` is already stored must not
    /// create a second workout.
    async fn append(&self, record: &NewWorkoutRecord) -> Result<AppendOutcome>;
}
