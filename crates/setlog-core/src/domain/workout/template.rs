//! Workout templates
//!
//! Templates are supplied by the host (routine builder, a TOML file in the
//! CLI) and turned into a fresh roster when a session starts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entry::ExerciseEntry;
use crate::error::{Error, Result};

/// A saved workout plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    /// Display name; the session falls back to a placeholder when absent
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub exercises: Vec<TemplateExercise>,
}

/// One configured exercise within a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExercise {
    /// Linked catalog exercise name; missing when the link is broken
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub catalog_id: Option<Uuid>,
    #[serde(default)]
    pub target_muscle: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default = "default_sets")]
    pub sets: usize,
    #[serde(default)]
    pub reps: u32,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub rest_seconds: u32,
}

fn default_sets() -> usize {
    1
}

impl WorkoutTemplate {
    /// Parse a template from TOML
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::TemplateInvalid(e.to_string()))
    }

    /// Build the roster for a new session
    ///
    /// Exercises whose catalog link is missing get `placeholder_name`
    /// instead of failing the whole start.
    pub fn to_roster(&self, placeholder_name: &str) -> Vec<ExerciseEntry> {
        self.exercises
            .iter()
            .map(|config| config.to_entry(placeholder_name))
            .collect()
    }
}

impl TemplateExercise {
    fn to_entry(&self, placeholder_name: &str) -> ExerciseEntry {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(placeholder_name);

        let mut entry = ExerciseEntry::with_sets(name, self.rest_seconds, self.sets, self.reps, self.weight);
        entry.catalog_id = self.catalog_id;
        entry.target_muscle = self.target_muscle.clone();
        entry.instructions = self.instructions.clone();
        entry.image_ref = self.image_ref.clone();
        entry
    }
}
