//! Roster entries for a live workout
//!
//! An `ExerciseEntry` owns its ordered `SetEntry` values. Entries carry a
//! stable identity so the session can keep track of the focused exercise
//! across reordering.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on sets created up front for one exercise
pub const MAX_SETS: usize = 100;

/// A single planned or performed set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub reps: u32,
    pub weight: f64,
    pub completed: bool,
}

impl SetEntry {
    /// Create a planned set at the given reps and weight, not yet completed
    pub fn planned(reps: u32, weight: f64) -> Self {
        Self {
            reps,
            weight: sanitize_weight(weight),
            completed: false,
        }
    }

    /// Record the performed reps and weight
    pub fn record(&mut self, reps: u32, weight: f64) {
        self.reps = reps;
        self.weight = sanitize_weight(weight);
    }

    /// Training volume of this set (reps x weight)
    pub fn volume(&self) -> f64 {
        f64::from(self.reps) * self.weight
    }
}

/// Weights are never negative and never NaN.
fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// One exercise in the session roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEntry {
    /// Identity assigned at creation, stable across reordering
    pub id: Uuid,

    /// Display name, also used for catalog resolution at finalization
    pub name: String,

    /// Catalog exercise this entry was built from, if known
    #[serde(default)]
    pub catalog_id: Option<Uuid>,

    pub target_muscle: Option<String>,
    pub instructions: Option<String>,
    pub image_ref: Option<String>,

    /// Rest between sets, in seconds
    pub rest_seconds: u32,

    /// Ordered sets
    pub sets: Vec<SetEntry>,
}

impl ExerciseEntry {
    /// Create an entry with no sets
    pub fn new(name: impl Into<String>, rest_seconds: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            catalog_id: None,
            target_muscle: None,
            instructions: None,
            image_ref: None,
            rest_seconds,
            sets: Vec::new(),
        }
    }

    /// Create an entry pre-populated with `count` planned sets
    ///
    /// `count` is clamped to `1..=MAX_SETS`.
    pub fn with_sets(name: impl Into<String>, rest_seconds: u32, count: usize, reps: u32, weight: f64) -> Self {
        let mut entry = Self::new(name, rest_seconds);
        entry.sets = vec![SetEntry::planned(reps, weight); count.clamp(1, MAX_SETS)];
        entry
    }

    pub fn catalog_id(mut self, id: Uuid) -> Self {
        self.catalog_id = Some(id);
        self
    }

    pub fn target_muscle(mut self, muscle: impl Into<String>) -> Self {
        self.target_muscle = Some(muscle.into());
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.instructions = Some(text.into());
        self
    }

    pub fn image_ref(mut self, image: impl Into<String>) -> Self {
        self.image_ref = Some(image.into());
        self
    }

    /// True iff every set is completed (vacuously true with no sets)
    pub fn is_completed(&self) -> bool {
        self.sets.iter().all(|set| set.completed)
    }

    /// Number of completed sets
    pub fn completed_sets(&self) -> usize {
        self.sets.iter().filter(|set| set.completed).count()
    }

    /// Append a set, copying reps and weight from the last one
    pub fn add_set(&mut self) {
        let next = self
            .sets
            .last()
            .map(|last| SetEntry::planned(last.reps, last.weight))
            .unwrap_or_default();
        self.sets.push(next);
    }

    /// Remove the set at `index`. Refuses to remove the last remaining set.
    pub fn remove_set(&mut self, index: usize) -> bool {
        if self.sets.len() <= 1 || index >= self.sets.len() {
            return false;
        }
        self.sets.remove(index);
        true
    }

    /// Flip a set's completion flag, returning the new state
    pub fn toggle_set(&mut self, index: usize) -> Option<bool> {
        let set = self.sets.get_mut(index)?;
        set.completed = !set.completed;
        Some(set.completed)
    }

    /// Total completed volume for the exercise
    pub fn completed_volume(&self) -> f64 {
        self.sets
            .iter()
            .filter(|set| set.completed)
            .map(SetEntry::volume)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_defaults_are_zero() {
        let set = SetEntry::default();
        assert_eq!(set.reps, 0);
        assert_eq!(set.weight, 0.0);
        assert!(!set.completed);
    }

    #[test]
    fn test_weight_is_sanitized() {
        assert_eq!(SetEntry::planned(5, -20.0).weight, 0.0);
        assert_eq!(SetEntry::planned(5, f64::NAN).weight, 0.0);

        let mut set = SetEntry::planned(5, 60.0);
        set.record(8, f64::INFINITY);
        assert_eq!(set.reps, 8);
        assert_eq!(set.weight, 0.0);
    }

    #[test]
    fn test_is_completed_tracks_every_set() {
        let mut entry = ExerciseEntry::with_sets("Squat", 120, 3, 5, 100.0);
        assert!(!entry.is_completed());

        for i in 0..3 {
            entry.toggle_set(i);
        }
        assert!(entry.is_completed());

        // Un-completing any one set flips the exercise back
        assert_eq!(entry.toggle_set(1), Some(false));
        assert!(!entry.is_completed());
        assert_eq!(entry.completed_sets(), 2);
    }

    #[test]
    fn test_empty_entry_is_vacuously_completed() {
        let entry = ExerciseEntry::new("Plank", 60);
        assert!(entry.is_completed());
    }

    #[test]
    fn test_with_sets_clamps_count() {
        assert_eq!(ExerciseEntry::with_sets("Row", 90, 0, 10, 40.0).sets.len(), 1);
        assert_eq!(ExerciseEntry::with_sets("Row", 90, 4, 10, 40.0).sets.len(), 4);
        assert_eq!(ExerciseEntry::with_sets("Row", 90, usize::MAX, 10, 40.0).sets.len(), MAX_SETS);
    }

    #[test]
    fn test_remove_last_set_is_refused() {
        let mut entry = ExerciseEntry::with_sets("Row", 90, 1, 10, 40.0);
        assert!(!entry.remove_set(0));
        assert_eq!(entry.sets.len(), 1);
    }

    #[test]
    fn test_remove_set_out_of_range() {
        let mut entry = ExerciseEntry::with_sets("Row", 90, 2, 10, 40.0);
        assert!(!entry.remove_set(5));
        assert!(entry.remove_set(1));
        assert_eq!(entry.sets.len(), 1);
    }

    #[test]
    fn test_add_set_copies_previous() {
        let mut entry = ExerciseEntry::with_sets("Bench Press", 90, 1, 8, 80.0);
        entry.sets[0].completed = true;
        entry.add_set();

        assert_eq!(entry.sets.len(), 2);
        assert_eq!(entry.sets[1].reps, 8);
        assert_eq!(entry.sets[1].weight, 80.0);
        assert!(!entry.sets[1].completed);

        let mut empty = ExerciseEntry::new("Dips", 60);
        empty.add_set();
        assert_eq!(empty.sets, vec![SetEntry::default()]);
    }

    #[test]
    fn test_completed_volume() {
        let mut entry = ExerciseEntry::with_sets("Deadlift", 180, 2, 5, 140.0);
        entry.toggle_set(0);
        assert_eq!(entry.completed_volume(), 700.0);
    }

    #[test]
    fn test_builder_fields() {
        let id = Uuid::new_v4();
        let entry = ExerciseEntry::new("Pull Up", 90)
            .catalog_id(id)
            .target_muscle("Back")
            .instructions("Chin over bar")
            .image_ref("pullup.png");

        assert_eq!(entry.catalog_id, Some(id));
        assert_eq!(entry.target_muscle.as_deref(), Some("Back"));
        assert_eq!(entry.instructions.as_deref(), Some("Chin over bar"));
        assert_eq!(entry.image_ref.as_deref(), Some("pullup.png"));
    }
}
