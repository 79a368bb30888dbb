//! Durable workout history types
//!
//! `NewWorkoutRecord` is what finalization hands to a `WorkoutStore`; the
//! remaining types are read models for history screens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An exercise in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogExercise {
    pub id: Uuid,
    pub name: String,
    pub target_muscle: Option<String>,
    pub instructions: Option<String>,
    pub image_ref: Option<String>,
}

impl CatalogExercise {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            target_muscle: None,
            instructions: None,
            image_ref: None,
        }
    }

    pub fn target_muscle(mut self, muscle: impl Into<String>) -> Self {
        self.target_muscle = Some(muscle.into());
        self
    }
}

/// A finished workout ready to be written to history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkoutRecord {
    /// Session the record came from; duplicate appends are ignored
    pub session_id: Uuid,
    pub user_id: String,
    pub workout_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub exercises: Vec<NewExerciseRecord>,
}

/// One resolved exercise within a finished workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExerciseRecord {
    pub catalog_id: Uuid,
    pub exercise_name: String,
    pub order: u32,
    pub completed: bool,
    pub rest_seconds: u32,
    pub sets: Vec<NewSetRecord>,
}

/// One set within a finished exercise
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewSetRecord {
    pub reps: u32,
    pub weight: f64,
    pub completed: bool,
}

/// Outcome of a history append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new workout row was written
    Inserted(Uuid),
    /// The session was already in history; nothing was written
    AlreadyRecorded(Uuid),
}

impl AppendOutcome {
    pub fn workout_id(&self) -> Uuid {
        match self {
            Self::Inserted(id) | Self::AlreadyRecorded(id) => *id,
        }
    }
}

/// Lightweight workout info for history listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub id: Uuid,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub exercise_count: i64,
    pub set_count: i64,
    /// Sum of reps x weight over completed sets
    pub volume: f64,
}

/// A stored workout with its exercises and sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutDetail {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub exercises: Vec<NewExerciseRecord>,
}

/// Best completed set for an exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub exercise_name: String,
    pub weight: f64,
    pub reps: u32,
    pub achieved_at: DateTime<Utc>,
}

/// A logged body weight measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyWeightEntry {
    pub id: Uuid,
    pub weight: f64,
    pub recorded_at: DateTime<Utc>,
}
