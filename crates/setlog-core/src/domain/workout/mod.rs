//! Workout domain module
//!
//! The roster model a live session mutates, the templates it starts from,
//! and the durable history it is finalized into.
//!
//! # Architecture
//!
//! - **Entities**: `SetEntry`, `ExerciseEntry`, `WorkoutTemplate`
//! - **Records**: `NewWorkoutRecord` and the history read models
//! - **Repository**: `WorkoutStore` trait, `SqliteWorkoutStore` implementation

pub mod entry;
pub mod record;
pub mod repository;
pub mod repository_trait;
pub mod template;

// Re-export main types
pub use entry::{ExerciseEntry, SetEntry, MAX_SETS};
pub use record::{
    AppendOutcome, BodyWeightEntry, CatalogExercise, NewExerciseRecord, NewSetRecord,
    NewWorkoutRecord, PersonalRecord, WorkoutDetail, WorkoutSummary,
};
pub use repository::SqliteWorkoutStore;
pub use repository_trait::WorkoutStore;
pub use template::{TemplateExercise, WorkoutTemplate};
