//! Session domain module
//!
//! Owns the one in-progress workout and its durability.
//!
//! # Architecture
//!
//! - **Coordinator**: `SessionCoordinator`, created through a `SessionHost`
//!   that allows a single live owner
//! - **Snapshot**: `SessionSnapshot` and the durable session keys
//! - **Repository**: `SnapshotStore` trait, `SqliteSnapshotStore` and
//!   `MemorySnapshotStore` implementations
//! - **Finalizer**: maps the roster onto workout history at the end
//!
//! # Lifecycle
//!
//! ```ignore
//! use setlog_core::domain::session::SessionHost;
//!
//! let host = SessionHost::new();
//! let mut session = host.coordinator(store, clock, ticker)?.with_owner("me");
//!
//! // Relaunch: pick up whatever was in progress
//! session.resume_if_persisted().await?;
//! if !session.is_active() {
//!     session.start_empty().await?;
//! }
//!
//! session.add_exercise(ExerciseEntry::with_sets("Squat", 120, 3, 5, 100.0));
//! session.enter_background().await?;
//!
//! // Later
//! let report = session.end(&workouts).await?;
//! ```

pub mod coordinator;
pub mod finalizer;
pub mod owner;
pub mod reorder;
pub mod repository;
pub mod repository_trait;
pub mod snapshot;

// Re-export main types
pub use coordinator::{SessionCoordinator, SessionSettings, SessionState};
pub use finalizer::{resolve_catalog_entry, FinalizeReport};
pub use owner::{OwnerClaim, SessionHost};
pub use reorder::translate_index;
pub use repository::{MemorySnapshotStore, SqliteSnapshotStore};
pub use repository_trait::SnapshotStore;
pub use snapshot::{
    SessionSnapshot, KEY_ACTIVE, KEY_EXERCISES_SNAPSHOT, KEY_SESSION_ID, KEY_START_TIME,
    KEY_WORKOUT_NAME, SESSION_KEYS,
};
