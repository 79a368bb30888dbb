//! Durable session keys and the roster snapshot
//!
//! A live session is persisted as a handful of single-slot keys. The start
//! time is its own key and never part of the snapshot, so elapsed time can
//! always be recomputed from it after a relaunch.

use serde::{Deserialize, Serialize};

use crate::domain::workout::ExerciseEntry;
use crate::error::Result;

/// `"true"` while a session is in progress
pub const KEY_ACTIVE: &str = "session.active";

/// Session start time, RFC 3339
pub const KEY_START_TIME: &str = "session.startTime";

pub const KEY_WORKOUT_NAME: &str = "session.workoutName";

/// JSON-encoded [`SessionSnapshot`]
pub const KEY_EXERCISES_SNAPSHOT: &str = "session.exercisesSnapshot";

/// Session UUID, used to make finalization idempotent
pub const KEY_SESSION_ID: &str = "session.id";

/// Every key a session writes, in the order they are cleared when it ends
///
/// The start time goes first so a half-cleared session is no longer
/// resumable. The active flag goes last.
pub const SESSION_KEYS: [&str; 5] = [
    KEY_START_TIME,
    KEY_EXERCISES_SNAPSHOT,
    KEY_WORKOUT_NAME,
    KEY_SESSION_ID,
    KEY_ACTIVE,
];

/// Value stored under [`KEY_ACTIVE`]
pub const ACTIVE_FLAG: &str = "true";

/// Serialized roster of an in-progress workout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub workout_name: String,
    pub exercises: Vec<ExerciseEntry>,
}

impl SessionSnapshot {
    pub fn new(workout_name: impl Into<String>, exercises: Vec<ExerciseEntry>) -> Self {
        Self {
            workout_name: workout_name.into(),
            exercises,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip_preserves_roster() {
        let mut squat = ExerciseEntry::with_sets("Squat", 180, 3, 5, 100.0).target_muscle("Legs");
        squat.toggle_set(0);
        squat.sets[1].record(4, 102.5);
        let curl = ExerciseEntry::new("Curl", 0).instructions("Slow eccentric");

        let snapshot = SessionSnapshot::new("Leg Day", vec![squat, curl]);
        let json = snapshot.to_json().unwrap();
        let decoded = SessionSnapshot::from_json(&json).unwrap();

        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.exercises[0].name, "Squat");
        assert_eq!(decoded.exercises[1].name, "Curl");
        assert_eq!(decoded.exercises[0].id, snapshot.exercises[0].id);
    }

    #[test]
    fn test_decodes_entries_without_catalog_id() {
        let id = uuid::Uuid::new_v4();
        let json = format!(
            r#"{{"workout_name":"Old","exercises":[{{"id":"{}","name":"Row","target_muscle":null,"instructions":null,"image_ref":null,"rest_seconds":60,"sets":[{{"reps":10,"weight":40.0,"completed":true}}]}}]}}"#,
            id
        );

        let snapshot = SessionSnapshot::from_json(&json).unwrap();
        assert_eq!(snapshot.exercises[0].catalog_id, None);
        assert_eq!(snapshot.exercises[0].id, id);
        assert!(snapshot.exercises[0].is_completed());
    }

    #[test]
    fn test_garbage_is_a_serialization_error() {
        let err = SessionSnapshot::from_json("{not json").unwrap_err();
        assert_eq!(err.code(), "E402");
    }
}
