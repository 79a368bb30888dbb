//! Setlog Core Library
//!
//! This crate provides the core functionality for Setlog, including:
//! - Live workout sessions that survive suspension and relaunch
//! - Roster editing (exercises, sets, ordering, focus)
//! - Rest countdowns and the elapsed-time clock
//! - Storage (SQLite session state, exercise catalog, workout history)
//! - Configuration

pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::session::{
        FinalizeReport, MemorySnapshotStore, SessionCoordinator, SessionHost, SessionSettings,
        SnapshotStore, SqliteSnapshotStore,
    };
    pub use crate::domain::timer::{
        format_rest_duration, Clock, ManualClock, ManualTicker, RestTimer, SystemClock, Ticker,
        TokioTicker,
    };
    pub use crate::domain::workout::{
        CatalogExercise, ExerciseEntry, SetEntry, SqliteWorkoutStore, WorkoutStore,
        WorkoutTemplate,
    };
    pub use crate::error::{Error, Result};
    pub use crate::storage::Database;
}
