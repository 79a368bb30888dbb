//! Live workout session coordinator
//!
//! Owns the mutable state of the one in-progress workout: roster, focus
//! pointer, and the elapsed-time clock. The persisted start time is the
//! source of truth for elapsed time; `current_duration_seconds` is only a
//! cache of `now - start_time`, refreshed on ticks, on foreground, and on
//! resume.
//!
//! Roster operations are synchronous and apply immediately. Operations
//! that touch durable state are async. Everything except starting and
//! resuming is a silent no-op while idle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::finalizer::{self, FinalizeReport, FinishedSession};
use super::owner::{OwnerClaim, SessionHost};
use super::reorder::translate_index;
use super::repository_trait::SnapshotStore;
use super::snapshot::{
    SessionSnapshot, ACTIVE_FLAG, KEY_ACTIVE, KEY_EXERCISES_SNAPSHOT, KEY_SESSION_ID,
    KEY_START_TIME, KEY_WORKOUT_NAME, SESSION_KEYS,
};
use crate::domain::timer::{Clock, TickHandle, Ticker, ONE_SECOND};
use crate::domain::workout::{ExerciseEntry, WorkoutStore, WorkoutTemplate};
use crate::error::Result;

/// Naming and tick defaults for new sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Workout name used when a session starts without one
    pub default_workout_name: String,
    /// Name given to template exercises with a missing catalog link
    pub placeholder_exercise_name: String,
    /// Period of the elapsed-time clock
    pub tick_period: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_workout_name: "Workout".to_string(),
            placeholder_exercise_name: "Unknown Exercise".to_string(),
            tick_period: ONE_SECOND,
        }
    }
}

/// Observable session state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub is_active: bool,
    pub session_id: Option<Uuid>,
    pub workout_name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub current_duration_seconds: i64,
    pub exercises: Vec<ExerciseEntry>,
    pub current_exercise_index: usize,
}

impl SessionState {
    fn idle(workout_name: &str) -> Self {
        Self {
            is_active: false,
            session_id: None,
            workout_name: workout_name.to_string(),
            start_time: None,
            current_duration_seconds: 0,
            exercises: Vec::new(),
            current_exercise_index: 0,
        }
    }
}

/// The single owner of the in-progress workout
pub struct SessionCoordinator {
    _claim: OwnerClaim,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    ticker: Arc<dyn Ticker>,
    settings: SessionSettings,
    owner_id: Option<String>,
    state: SessionState,
    clock_ticks: Option<TickHandle>,
}

impl fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("settings", &self.settings)
            .field("owner_id", &self.owner_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SessionHost {
    /// Create the session coordinator, claiming ownership for its lifetime
    pub fn coordinator(
        &self,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        ticker: Arc<dyn Ticker>,
    ) -> Result<SessionCoordinator> {
        let claim = self.claim()?;
        Ok(SessionCoordinator::new(claim, store, clock, ticker))
    }
}

impl SessionCoordinator {
    pub fn new(
        claim: OwnerClaim,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        ticker: Arc<dyn Ticker>,
    ) -> Self {
        let settings = SessionSettings::default();
        Self {
            _claim: claim,
            store,
            clock,
            ticker,
            state: SessionState::idle(&settings.default_workout_name),
            settings,
            owner_id: None,
            clock_ticks: None,
        }
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        if !self.state.is_active {
            self.state.workout_name = settings.default_workout_name.clone();
        }
        self.settings = settings;
        self
    }

    /// Identity that finished workouts are recorded under
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn set_owner(&mut self, owner_id: Option<String>) {
        self.owner_id = owner_id;
    }

    // ========== Accessors ==========

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.state.session_id
    }

    pub fn workout_name(&self) -> &str {
        &self.state.workout_name
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.state.start_time
    }

    pub fn current_duration_seconds(&self) -> i64 {
        self.state.current_duration_seconds
    }

    pub fn exercises(&self) -> &[ExerciseEntry] {
        &self.state.exercises
    }

    pub fn current_exercise_index(&self) -> usize {
        self.state.current_exercise_index
    }

    /// The focused exercise, if any
    pub fn current_exercise(&self) -> Option<&ExerciseEntry> {
        if !self.state.is_active {
            return None;
        }
        self.state.exercises.get(self.state.current_exercise_index)
    }

    pub fn exercise(&self, id: Uuid) -> Option<&ExerciseEntry> {
        self.state.exercises.iter().find(|entry| entry.id == id)
    }

    // ========== Lifecycle ==========

    /// Start a session from a template; ignored while a session is active
    pub async fn start_from_template(&mut self, template: &WorkoutTemplate) -> Result<()> {
        if self.state.is_active {
            debug!(session_id = ?self.state.session_id, "Ignoring start: session already active");
            return Ok(());
        }

        let workout_name = template
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.settings.default_workout_name.as_str())
            .to_string();
        let roster = template.to_roster(&self.settings.placeholder_exercise_name);

        self.begin(workout_name, roster).await
    }

    /// Start a session with an empty roster; ignored while a session is active
    pub async fn start_empty(&mut self) -> Result<()> {
        if self.state.is_active {
            debug!(session_id = ?self.state.session_id, "Ignoring start: session already active");
            return Ok(());
        }

        let workout_name = self.settings.default_workout_name.clone();
        self.begin(workout_name, Vec::new()).await
    }

    async fn begin(&mut self, workout_name: String, exercises: Vec<ExerciseEntry>) -> Result<()> {
        let session_id = Uuid::new_v4();
        let start_time = self.clock.now();
        let snapshot = SessionSnapshot::new(workout_name.clone(), exercises);
        let json = snapshot.to_json()?;

        // The active flag goes last so a partial write is never resumed
        self.store.set(KEY_SESSION_ID, &session_id.to_string()).await?;
        self.store.set(KEY_START_TIME, &start_time.to_rfc3339()).await?;
        self.store.set(KEY_WORKOUT_NAME, &workout_name).await?;
        self.store.set(KEY_EXERCISES_SNAPSHOT, &json).await?;
        self.store.set(KEY_ACTIVE, ACTIVE_FLAG).await?;

        let exercise_count = snapshot.exercises.len();
        self.activate(session_id, workout_name, start_time, snapshot.exercises);

        info!(
            session_id = %session_id,
            workout_name = %self.state.workout_name,
            exercises = exercise_count,
            "Started workout session"
        );

        Ok(())
    }

    /// Restore a persisted session after a relaunch
    ///
    /// Returns whether a session is active afterwards. Missing or
    /// unreadable keys leave the coordinator idle; an unreadable roster is
    /// replaced by an empty one.
    pub async fn resume_if_persisted(&mut self) -> Result<bool> {
        if self.state.is_active {
            self.recompute_duration();
            return Ok(true);
        }

        if self.store.get(KEY_ACTIVE).await?.as_deref() != Some(ACTIVE_FLAG) {
            return Ok(false);
        }

        let Some(raw_start) = self.store.get(KEY_START_TIME).await? else {
            debug!("Active flag without a start time, nothing to resume");
            return Ok(false);
        };

        let start_time = match DateTime::parse_from_rfc3339(&raw_start) {
            Ok(time) => time.with_timezone(&Utc),
            Err(e) => {
                warn!(value = %raw_start, error = %e, "Unreadable session start time, not resuming");
                return Ok(false);
            }
        };

        let snapshot = match self.store.get(KEY_EXERCISES_SNAPSHOT).await? {
            Some(json) => SessionSnapshot::from_json(&json).unwrap_or_else(|e| {
                warn!(error = %e, "Exercise snapshot unreadable, resuming with an empty roster");
                SessionSnapshot::default()
            }),
            None => {
                warn!("Exercise snapshot missing, resuming with an empty roster");
                SessionSnapshot::default()
            }
        };

        let workout_name = self
            .store
            .get(KEY_WORKOUT_NAME)
            .await?
            .filter(|name| !name.trim().is_empty())
            .or_else(|| Some(snapshot.workout_name.clone()).filter(|name| !name.trim().is_empty()))
            .unwrap_or_else(|| self.settings.default_workout_name.clone());

        let stored_id = self
            .store
            .get(KEY_SESSION_ID)
            .await?
            .and_then(|raw| Uuid::parse_str(&raw).ok());
        let session_id = match stored_id {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                self.store.set(KEY_SESSION_ID, &id.to_string()).await?;
                id
            }
        };

        self.activate(session_id, workout_name, start_time, snapshot.exercises);

        info!(
            session_id = %session_id,
            elapsed_seconds = self.state.current_duration_seconds,
            exercises = self.state.exercises.len(),
            "Resumed workout session"
        );

        Ok(true)
    }

    fn activate(
        &mut self,
        session_id: Uuid,
        workout_name: String,
        start_time: DateTime<Utc>,
        exercises: Vec<ExerciseEntry>,
    ) {
        self.state = SessionState {
            is_active: true,
            session_id: Some(session_id),
            workout_name,
            start_time: Some(start_time),
            current_duration_seconds: 0,
            exercises,
            current_exercise_index: 0,
        };
        self.recompute_duration();
        self.clock_ticks = Some(self.ticker.schedule(self.settings.tick_period));
    }

    /// Persist the roster before the host is suspended
    ///
    /// Only the snapshot key is written; start time and the active flag are
    /// left alone.
    pub async fn enter_background(&mut self) -> Result<()> {
        if !self.state.is_active {
            return Ok(());
        }

        let snapshot = SessionSnapshot::new(self.state.workout_name.clone(), self.state.exercises.clone());
        self.store.set(KEY_EXERCISES_SNAPSHOT, &snapshot.to_json()?).await?;

        debug!(
            session_id = ?self.state.session_id,
            exercises = self.state.exercises.len(),
            "Saved session snapshot"
        );
        Ok(())
    }

    /// Catch the elapsed time up after the host comes back
    pub fn enter_foreground(&mut self) {
        if self.state.is_active {
            self.recompute_duration();
        }
    }

    /// Apply pending elapsed-time ticks; returns how many were drained
    pub fn pump_ticks(&mut self) -> usize {
        let mut drained = 0;
        while let Some(handle) = self.clock_ticks.as_mut() {
            if !handle.try_tick() {
                break;
            }
            drained += 1;
            if self.state.is_active {
                self.recompute_duration();
            }
        }
        drained
    }

    fn recompute_duration(&mut self) {
        if let Some(start_time) = self.state.start_time {
            self.state.current_duration_seconds = (self.clock.now() - start_time).num_seconds().max(0);
        }
    }

    /// Finish the session and write it to history
    ///
    /// Returns `None` when there is nothing to finish (idle, or no owner
    /// identity). On a storage error the session stays active with its
    /// durable keys intact, so calling `end` again is safe.
    pub async fn end(&mut self, workouts: &dyn WorkoutStore) -> Result<Option<FinalizeReport>> {
        if !self.state.is_active {
            debug!("Ignoring end: no active session");
            return Ok(None);
        }
        let Some(user_id) = self.owner_id.clone() else {
            debug!("Ignoring end: no owner identity");
            return Ok(None);
        };
        let (Some(session_id), Some(start_time)) = (self.state.session_id, self.state.start_time) else {
            warn!("Active session without identity, refusing to finalize");
            return Ok(None);
        };

        self.recompute_duration();
        let finished = FinishedSession {
            session_id,
            user_id: &user_id,
            workout_name: &self.state.workout_name,
            start_time,
            end_time: self.clock.now(),
            exercises: &self.state.exercises,
        };

        let report = finalizer::finalize(workouts, &finished)
            .await
            .inspect_err(|e| {
                warn!(session_id = %session_id, error = %e, "Finalization failed, session kept active");
            })?;

        for key in SESSION_KEYS {
            self.store.remove(key).await.inspect_err(|e| {
                warn!(session_id = %session_id, key, error = %e, "Clearing session keys failed, session kept active");
            })?;
        }
        self.reset();

        info!(
            session_id = %session_id,
            workout_id = %report.workout_id,
            kept = report.kept,
            dropped = report.dropped.len(),
            "Finished workout session"
        );

        Ok(Some(report))
    }

    fn reset(&mut self) {
        if let Some(mut handle) = self.clock_ticks.take() {
            handle.cancel();
        }
        self.state = SessionState::idle(&self.settings.default_workout_name);
    }

    // ========== Roster ==========

    fn ensure_active(&self, operation: &str) -> bool {
        if !self.state.is_active {
            debug!(operation, "Ignored while no session is active");
        }
        self.state.is_active
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.state.exercises.iter().position(|entry| entry.id == id)
    }

    fn entry_mut(&mut self, id: Uuid, operation: &str) -> Option<&mut ExerciseEntry> {
        if !self.ensure_active(operation) {
            return None;
        }
        let entry = self.state.exercises.iter_mut().find(|entry| entry.id == id);
        if entry.is_none() {
            debug!(operation, exercise_id = %id, "Unknown exercise");
        }
        entry
    }

    pub fn add_exercise(&mut self, entry: ExerciseEntry) -> bool {
        if !self.ensure_active("add_exercise") {
            return false;
        }
        debug!(exercise_id = %entry.id, name = %entry.name, "Added exercise");
        self.state.exercises.push(entry);
        true
    }

    /// Remove an exercise, keeping the pointer on the same item where possible
    pub fn remove_exercise(&mut self, id: Uuid) -> bool {
        if !self.ensure_active("remove_exercise") {
            return false;
        }
        let Some(removed) = self.position(id) else {
            return false;
        };

        self.state.exercises.remove(removed);
        let current = self.state.current_exercise_index;
        let len = self.state.exercises.len();
        self.state.current_exercise_index = if len == 0 {
            0
        } else if removed < current {
            current - 1
        } else {
            current.min(len - 1)
        };
        true
    }

    /// Move the exercise at `from` so it ends up at index `to`
    pub fn move_exercise(&mut self, from: usize, to: usize) -> bool {
        if !self.ensure_active("move_exercise") {
            return false;
        }
        let len = self.state.exercises.len();
        if from >= len || to >= len {
            debug!(from, to, len, "Move out of range");
            return false;
        }
        if from == to {
            return true;
        }

        let entry = self.state.exercises.remove(from);
        self.state.exercises.insert(to, entry);
        self.state.current_exercise_index = translate_index(self.state.current_exercise_index, from, to);
        true
    }

    pub fn add_set(&mut self, id: Uuid) -> bool {
        match self.entry_mut(id, "add_set") {
            Some(entry) => {
                entry.add_set();
                true
            }
            None => false,
        }
    }

    /// Remove a set; refused when it would leave the exercise with none
    pub fn remove_set(&mut self, id: Uuid, index: usize) -> bool {
        self.entry_mut(id, "remove_set")
            .is_some_and(|entry| entry.remove_set(index))
    }

    /// Flip a set's completion, returning the new state
    pub fn toggle_set_completion(&mut self, id: Uuid, index: usize) -> Option<bool> {
        self.entry_mut(id, "toggle_set_completion")?.toggle_set(index)
    }

    /// Record entered reps and weight for a set
    pub fn update_set(&mut self, id: Uuid, index: usize, reps: u32, weight: f64) -> bool {
        match self
            .entry_mut(id, "update_set")
            .and_then(|entry| entry.sets.get_mut(index))
        {
            Some(set) => {
                set.record(reps, weight);
                true
            }
            None => false,
        }
    }

    // ========== Navigation ==========

    pub fn advance_to_next(&mut self) -> bool {
        if !self.ensure_active("advance_to_next") {
            return false;
        }
        let next = self.state.current_exercise_index + 1;
        if next >= self.state.exercises.len() {
            return false;
        }
        self.state.current_exercise_index = next;
        true
    }

    pub fn advance_to_previous(&mut self) -> bool {
        if !self.ensure_active("advance_to_previous") || self.state.current_exercise_index == 0 {
            return false;
        }
        self.state.current_exercise_index -= 1;
        true
    }

    pub fn focus_exercise(&mut self, index: usize) -> bool {
        if !self.ensure_active("focus_exercise") || index >= self.state.exercises.len() {
            return false;
        }
        self.state.current_exercise_index = index;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::repository::MemorySnapshotStore;
    use crate::domain::timer::{ManualClock, ManualTicker};
    use crate::domain::workout::{
        AppendOutcome, CatalogExercise, NewWorkoutRecord, SqliteWorkoutStore, TemplateExercise,
    };
    use crate::error::Error;
    use crate::storage::Database;
    use async_trait::async_trait;

    struct Harness {
        host: SessionHost,
        store: MemorySnapshotStore,
        clock: ManualClock,
        ticker: ManualTicker,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                host: SessionHost::new(),
                store: MemorySnapshotStore::new(),
                clock: ManualClock::default(),
                ticker: ManualTicker::new(),
            }
        }

        fn coordinator(&self) -> SessionCoordinator {
            self.host
                .coordinator(
                    Arc::new(self.store.clone()),
                    Arc::new(self.clock.clone()),
                    Arc::new(self.ticker.clone()),
                )
                .unwrap()
                .with_owner("athlete")
        }

        async fn key(&self, key: &str) -> Option<String> {
            self.store.get(key).await.unwrap()
        }
    }

    async fn active(harness: &Harness) -> SessionCoordinator {
        let mut coordinator = harness.coordinator();
        coordinator.start_empty().await.unwrap();
        coordinator
    }

    fn push_day() -> WorkoutTemplate {
        WorkoutTemplate {
            name: Some("Push Day".to_string()),
            exercises: vec![
                TemplateExercise {
                    name: Some("Bench Press".to_string()),
                    catalog_id: None,
                    target_muscle: Some("Chest".to_string()),
                    instructions: None,
                    image_ref: None,
                    sets: 3,
                    reps: 8,
                    weight: 80.0,
                    rest_seconds: 120,
                },
                TemplateExercise {
                    name: None,
                    catalog_id: None,
                    target_muscle: None,
                    instructions: None,
                    image_ref: None,
                    sets: 2,
                    reps: 12,
                    weight: 0.0,
                    rest_seconds: 0,
                },
            ],
        }
    }

    /// Snapshot store whose writes always fail
    struct BrokenSnapshotStore;

    #[async_trait]
    impl SnapshotStore for BrokenSnapshotStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(Error::Storage("disk full".to_string()))
        }
    }

    /// Snapshot store that can be told to fail removing one key
    #[derive(Clone)]
    struct FlakySnapshotStore {
        inner: MemorySnapshotStore,
        failing_key: Arc<std::sync::Mutex<Option<&'static str>>>,
    }

    impl FlakySnapshotStore {
        fn new(inner: MemorySnapshotStore) -> Self {
            Self {
                inner,
                failing_key: Arc::default(),
            }
        }

        fn fail_removing(&self, key: Option<&'static str>) {
            *self.failing_key.lock().unwrap() = key;
        }
    }

    #[async_trait]
    impl SnapshotStore for FlakySnapshotStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            if *self.failing_key.lock().unwrap() == Some(key) {
                return Err(Error::Storage("database is locked".to_string()));
            }
            self.inner.remove(key).await
        }
    }

    /// Workout store that resolves every name but cannot append
    struct BrokenWorkoutStore;

    #[async_trait]
    impl WorkoutStore for BrokenWorkoutStore {
        async fn find_exercise_by_name(&self, name: &str) -> Result<Option<CatalogExercise>> {
            Ok(Some(CatalogExercise::new(name)))
        }

        async fn find_exercise_by_id(&self, _id: Uuid) -> Result<Option<CatalogExercise>> {
            Ok(None)
        }

        async fn append(&self, _record: &NewWorkoutRecord) -> Result<AppendOutcome> {
            Err(Error::Storage("database is locked".to_string()))
        }
    }

    async fn workout_store(catalog: &[&str]) -> SqliteWorkoutStore {
        let db = Database::in_memory().await.unwrap();
        let store = SqliteWorkoutStore::new(db.pool().clone());
        for name in catalog {
            store.add_catalog_exercise(&CatalogExercise::new(*name)).await.unwrap();
        }
        store
    }

    // ========== Lifecycle ==========

    #[tokio::test]
    async fn test_start_empty_persists_keys() {
        let harness = Harness::new();
        let coordinator = active(&harness).await;

        assert!(coordinator.is_active());
        assert_eq!(coordinator.workout_name(), "Workout");
        assert!(coordinator.exercises().is_empty());
        assert_eq!(coordinator.current_duration_seconds(), 0);

        assert_eq!(harness.key(KEY_ACTIVE).await.as_deref(), Some("true"));
        assert_eq!(harness.key(KEY_WORKOUT_NAME).await.as_deref(), Some("Workout"));
        assert_eq!(
            harness.key(KEY_START_TIME).await,
            coordinator.start_time().map(|t| t.to_rfc3339())
        );
        assert_eq!(
            harness.key(KEY_SESSION_ID).await,
            coordinator.session_id().map(|id| id.to_string())
        );
        assert!(harness.key(KEY_EXERCISES_SNAPSHOT).await.is_some());
    }

    #[tokio::test]
    async fn test_start_while_active_is_ignored() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;
        let session_id = coordinator.session_id();

        coordinator.start_from_template(&push_day()).await.unwrap();

        assert_eq!(coordinator.session_id(), session_id);
        assert_eq!(coordinator.workout_name(), "Workout");
        assert!(coordinator.exercises().is_empty());
    }

    #[tokio::test]
    async fn test_start_from_template_builds_roster() {
        let harness = Harness::new();
        let mut coordinator = harness.coordinator();

        coordinator.start_from_template(&push_day()).await.unwrap();

        assert_eq!(coordinator.workout_name(), "Push Day");
        let roster = coordinator.exercises();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].name, "Bench Press");
        assert_eq!(roster[0].sets.len(), 3);
        assert!(roster[0].sets.iter().all(|s| s.reps == 8 && s.weight == 80.0 && !s.completed));
        assert_eq!(roster[1].name, "Unknown Exercise");
        assert_eq!(roster[1].sets.len(), 2);
        assert_eq!(coordinator.current_exercise().map(|e| e.name.as_str()), Some("Bench Press"));
    }

    #[tokio::test]
    async fn test_unnamed_template_uses_default_name() {
        let harness = Harness::new();
        let settings = SessionSettings {
            default_workout_name: "Session".to_string(),
            placeholder_exercise_name: "???".to_string(),
            tick_period: ONE_SECOND,
        };
        let mut coordinator = harness.coordinator().with_settings(settings);
        let mut template = push_day();
        template.name = None;

        coordinator.start_from_template(&template).await.unwrap();

        assert_eq!(coordinator.workout_name(), "Session");
        assert_eq!(coordinator.exercises()[1].name, "???");
    }

    #[tokio::test]
    async fn test_start_failure_stays_idle() {
        let host = SessionHost::new();
        let mut coordinator = host
            .coordinator(
                Arc::new(BrokenSnapshotStore),
                Arc::new(ManualClock::default()),
                Arc::new(ManualTicker::new()),
            )
            .unwrap();

        let err = coordinator.start_empty().await.unwrap_err();

        assert_eq!(err.code(), "E401");
        assert!(!coordinator.is_active());
        assert_eq!(coordinator.session_id(), None);
    }

    #[tokio::test]
    async fn test_second_coordinator_is_rejected_until_drop() {
        let harness = Harness::new();
        let first = harness.coordinator();

        let err = harness
            .host
            .coordinator(
                Arc::new(harness.store.clone()),
                Arc::new(harness.clock.clone()),
                Arc::new(harness.ticker.clone()),
            )
            .unwrap_err();
        assert!(matches!(err, Error::SessionOwnerBusy));

        drop(first);
        let _second = harness.coordinator();
    }

    // ========== Background / foreground ==========

    #[tokio::test]
    async fn test_background_twice_writes_identical_snapshot() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;
        coordinator.add_exercise(ExerciseEntry::with_sets("Squat", 120, 3, 5, 100.0));

        coordinator.enter_background().await.unwrap();
        let first = harness.key(KEY_EXERCISES_SNAPSHOT).await;
        coordinator.enter_background().await.unwrap();
        let second = harness.key(KEY_EXERCISES_SNAPSHOT).await;

        assert_eq!(first, second);
        let snapshot = SessionSnapshot::from_json(&first.unwrap()).unwrap();
        assert_eq!(snapshot.exercises, coordinator.exercises());
    }

    #[tokio::test]
    async fn test_background_leaves_anchor_keys_alone() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;
        let start = harness.key(KEY_START_TIME).await;

        // A different value would show a rewrite
        harness.store.set(KEY_ACTIVE, "sentinel").await.unwrap();
        harness.clock.advance_secs(300);
        coordinator.enter_background().await.unwrap();

        assert_eq!(harness.key(KEY_START_TIME).await, start);
        assert_eq!(harness.key(KEY_ACTIVE).await.as_deref(), Some("sentinel"));
    }

    #[tokio::test]
    async fn test_foreground_recomputes_without_ticks() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;

        coordinator.enter_background().await.unwrap();
        harness.clock.advance_secs(600);
        coordinator.enter_foreground();

        assert_eq!(coordinator.current_duration_seconds(), 600);
    }

    #[tokio::test]
    async fn test_foreground_recomputes_after_some_ticks() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;

        harness.clock.advance_secs(3);
        harness.ticker.advance(3);
        assert_eq!(coordinator.pump_ticks(), 3);
        assert_eq!(coordinator.current_duration_seconds(), 3);

        // Backgrounded for a while; only a couple of ticks were delivered
        harness.clock.advance_secs(120);
        harness.ticker.advance(2);
        coordinator.pump_ticks();
        coordinator.enter_foreground();

        assert_eq!(coordinator.current_duration_seconds(), 123);
    }

    #[tokio::test]
    async fn test_clock_running_backwards_clamps_to_zero() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;

        harness.clock.advance_secs(-30);
        coordinator.enter_foreground();

        assert_eq!(coordinator.current_duration_seconds(), 0);
    }

    // ========== Resume ==========

    #[tokio::test]
    async fn test_resume_restores_session() {
        let harness = Harness::new();
        let (session_id, roster) = {
            let mut coordinator = harness.coordinator();
            coordinator.start_from_template(&push_day()).await.unwrap();
            let bench = coordinator.exercises()[0].id;
            coordinator.toggle_set_completion(bench, 0);
            coordinator.enter_background().await.unwrap();
            (coordinator.session_id(), coordinator.exercises().to_vec())
        };

        harness.clock.advance_secs(900);
        let mut relaunched = harness.coordinator();
        assert!(relaunched.resume_if_persisted().await.unwrap());

        assert!(relaunched.is_active());
        assert_eq!(relaunched.session_id(), session_id);
        assert_eq!(relaunched.workout_name(), "Push Day");
        assert_eq!(relaunched.exercises(), roster.as_slice());
        assert_eq!(relaunched.current_duration_seconds(), 900);
        assert!(relaunched.exercises()[0].sets[0].completed);
    }

    #[tokio::test]
    async fn test_resume_without_keys_does_nothing() {
        let harness = Harness::new();
        let mut coordinator = harness.coordinator();

        assert!(!coordinator.resume_if_persisted().await.unwrap());
        assert!(!coordinator.is_active());
        assert!(harness.store.is_empty());
    }

    #[tokio::test]
    async fn test_resume_requires_start_time() {
        let harness = Harness::new();
        harness.store.set(KEY_ACTIVE, "true").await.unwrap();

        let mut coordinator = harness.coordinator();
        assert!(!coordinator.resume_if_persisted().await.unwrap());
        assert!(!coordinator.is_active());
    }

    #[tokio::test]
    async fn test_resume_rejects_unparsable_start_time() {
        let harness = Harness::new();
        harness.store.set(KEY_ACTIVE, "true").await.unwrap();
        harness.store.set(KEY_START_TIME, "yesterday-ish").await.unwrap();

        let mut coordinator = harness.coordinator();
        assert!(!coordinator.resume_if_persisted().await.unwrap());
    }

    #[tokio::test]
    async fn test_resume_with_corrupt_snapshot_uses_empty_roster() {
        let harness = Harness::new();
        let start = harness.clock.now();
        harness.store.set(KEY_ACTIVE, "true").await.unwrap();
        harness.store.set(KEY_START_TIME, &start.to_rfc3339()).await.unwrap();
        harness.store.set(KEY_WORKOUT_NAME, "Legs").await.unwrap();
        harness.store.set(KEY_EXERCISES_SNAPSHOT, "{[oops").await.unwrap();
        harness.clock.advance_secs(42);

        let mut coordinator = harness.coordinator();
        assert!(coordinator.resume_if_persisted().await.unwrap());

        assert!(coordinator.exercises().is_empty());
        assert_eq!(coordinator.workout_name(), "Legs");
        assert_eq!(coordinator.current_duration_seconds(), 42);
        // A session id is assigned and persisted for sessions that predate it
        assert_eq!(
            harness.key(KEY_SESSION_ID).await,
            coordinator.session_id().map(|id| id.to_string())
        );
    }

    #[tokio::test]
    async fn test_resume_is_idempotent() {
        let harness = Harness::new();
        drop(active(&harness).await);

        let mut coordinator = harness.coordinator();
        assert!(coordinator.resume_if_persisted().await.unwrap());
        let first = coordinator.state().clone();
        assert!(coordinator.resume_if_persisted().await.unwrap());

        assert_eq!(coordinator.state(), &first);
        assert_eq!(harness.ticker.live_handles(), 1);
    }

    // ========== Roster ==========

    #[tokio::test]
    async fn test_operations_ignored_while_idle() {
        let harness = Harness::new();
        let mut coordinator = harness.coordinator();
        let entry = ExerciseEntry::with_sets("Row", 60, 2, 10, 50.0);
        let id = entry.id;

        assert!(!coordinator.add_exercise(entry));
        assert!(!coordinator.remove_exercise(id));
        assert!(!coordinator.move_exercise(0, 0));
        assert!(!coordinator.add_set(id));
        assert!(!coordinator.remove_set(id, 0));
        assert_eq!(coordinator.toggle_set_completion(id, 0), None);
        assert!(!coordinator.update_set(id, 0, 5, 10.0));
        assert!(!coordinator.advance_to_next());
        assert!(!coordinator.advance_to_previous());
        assert!(!coordinator.focus_exercise(0));
        coordinator.enter_background().await.unwrap();
        coordinator.enter_foreground();

        assert!(coordinator.exercises().is_empty());
        assert!(harness.store.is_empty());
        assert!(coordinator.end(&BrokenWorkoutStore).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_last_set_is_ignored() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;
        let entry = ExerciseEntry::with_sets("Plank", 30, 1, 1, 0.0);
        let id = entry.id;
        coordinator.add_exercise(entry);

        assert!(!coordinator.remove_set(id, 0));
        assert_eq!(coordinator.exercise(id).unwrap().sets.len(), 1);

        assert!(coordinator.add_set(id));
        assert!(coordinator.remove_set(id, 0));
        assert_eq!(coordinator.exercise(id).unwrap().sets.len(), 1);
    }

    #[tokio::test]
    async fn test_completion_tracks_every_set() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;
        let entry = ExerciseEntry::with_sets("Dip", 90, 3, 10, 0.0);
        let id = entry.id;
        coordinator.add_exercise(entry);

        assert_eq!(coordinator.toggle_set_completion(id, 0), Some(true));
        assert_eq!(coordinator.toggle_set_completion(id, 1), Some(true));
        assert!(!coordinator.exercise(id).unwrap().is_completed());

        assert_eq!(coordinator.toggle_set_completion(id, 2), Some(true));
        assert!(coordinator.exercise(id).unwrap().is_completed());

        assert_eq!(coordinator.toggle_set_completion(id, 1), Some(false));
        assert!(!coordinator.exercise(id).unwrap().is_completed());

        assert_eq!(coordinator.toggle_set_completion(id, 9), None);
    }

    #[tokio::test]
    async fn test_update_set_records_numbers() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;
        let entry = ExerciseEntry::with_sets("Press", 90, 2, 8, 40.0);
        let id = entry.id;
        coordinator.add_exercise(entry);

        assert!(coordinator.update_set(id, 1, 6, 42.5));
        assert!(coordinator.update_set(id, 0, 8, -5.0));
        assert!(!coordinator.update_set(id, 2, 1, 1.0));

        let sets = &coordinator.exercise(id).unwrap().sets;
        assert_eq!((sets[1].reps, sets[1].weight), (6, 42.5));
        assert_eq!(sets[0].weight, 0.0);
    }

    fn roster_of(coordinator: &mut SessionCoordinator, names: &[&str]) -> Vec<Uuid> {
        names
            .iter()
            .map(|name| {
                let entry = ExerciseEntry::with_sets(*name, 60, 1, 10, 0.0);
                let id = entry.id;
                coordinator.add_exercise(entry);
                id
            })
            .collect()
    }

    #[tokio::test]
    async fn test_move_keeps_pointer_on_focused_item() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;
        let ids = roster_of(&mut coordinator, &["A", "B", "C", "D"]);

        assert!(coordinator.focus_exercise(2));
        assert!(coordinator.move_exercise(0, 3));
        assert_eq!(coordinator.current_exercise().map(|e| e.id), Some(ids[2]));

        assert!(coordinator.move_exercise(1, 0));
        assert_eq!(coordinator.current_exercise().map(|e| e.id), Some(ids[2]));
        assert_eq!(coordinator.current_exercise_index(), 0);

        assert!(!coordinator.move_exercise(0, 4));
    }

    #[tokio::test]
    async fn test_move_keeps_focus_exhaustively() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;
        let names = ["A", "B", "C", "D", "E", "F"];

        for len in 1..=names.len() {
            while let Some(id) = coordinator.exercises().first().map(|e| e.id) {
                coordinator.remove_exercise(id);
            }
            roster_of(&mut coordinator, &names[..len]);

            for from in 0..len {
                for to in 0..len {
                    for current in 0..len {
                        assert!(coordinator.focus_exercise(current));
                        let focused = coordinator.current_exercise().map(|e| e.id);

                        assert!(coordinator.move_exercise(from, to));
                        assert_eq!(
                            coordinator.current_exercise().map(|e| e.id),
                            focused,
                            "len={} from={} to={} current={}",
                            len,
                            from,
                            to,
                            current
                        );

                        // Moving back restores the original order
                        assert!(coordinator.move_exercise(to, from));
                        assert_eq!(coordinator.current_exercise_index(), current);
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_remove_exercise_adjusts_pointer() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;
        let ids = roster_of(&mut coordinator, &["A", "B", "C", "D"]);

        coordinator.focus_exercise(2);
        assert!(coordinator.remove_exercise(ids[0]));
        assert_eq!(coordinator.current_exercise().map(|e| e.id), Some(ids[2]));

        // Removing the focused last item clamps to the new last item
        coordinator.focus_exercise(2);
        assert!(coordinator.remove_exercise(ids[3]));
        assert_eq!(coordinator.current_exercise_index(), 1);
        assert_eq!(coordinator.current_exercise().map(|e| e.id), Some(ids[2]));

        coordinator.remove_exercise(ids[1]);
        coordinator.remove_exercise(ids[2]);
        assert_eq!(coordinator.current_exercise_index(), 0);
        assert!(coordinator.current_exercise().is_none());
        assert!(!coordinator.remove_exercise(ids[2]));
    }

    #[tokio::test]
    async fn test_navigation_is_bounded() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;
        roster_of(&mut coordinator, &["A", "B"]);

        assert!(!coordinator.advance_to_previous());
        assert!(coordinator.advance_to_next());
        assert!(!coordinator.advance_to_next());
        assert_eq!(coordinator.current_exercise_index(), 1);
        assert!(coordinator.advance_to_previous());
        assert!(!coordinator.focus_exercise(2));
        assert_eq!(coordinator.current_exercise_index(), 0);
    }

    // ========== End ==========

    #[tokio::test]
    async fn test_end_to_end_single_exercise() {
        let harness = Harness::new();
        let workouts = workout_store(&["E1"]).await;
        let mut coordinator = active(&harness).await;

        let entry = ExerciseEntry::with_sets("E1", 60, 2, 10, 20.0);
        let id = entry.id;
        coordinator.add_exercise(entry);
        coordinator.toggle_set_completion(id, 0);
        coordinator.toggle_set_completion(id, 1);
        harness.clock.advance_secs(1500);

        let report = coordinator.end(&workouts).await.unwrap().unwrap();
        assert_eq!(report.kept, 1);
        assert!(report.dropped.is_empty());

        let detail = workouts.workout_detail(report.workout_id).await.unwrap().unwrap();
        assert_eq!(detail.user_id, "athlete");
        assert_eq!(detail.duration_seconds, 1500);
        assert_eq!(detail.exercises.len(), 1);
        assert_eq!(detail.exercises[0].exercise_name, "E1");
        assert!(detail.exercises[0].completed);
        assert_eq!(detail.exercises[0].sets.len(), 2);
        assert!(detail.exercises[0]
            .sets
            .iter()
            .all(|set| set.completed && set.reps == 10 && set.weight == 20.0));

        assert!(!coordinator.is_active());
        assert!(harness.store.is_empty());
        assert_eq!(harness.ticker.live_handles(), 0);
    }

    #[tokio::test]
    async fn test_end_requires_owner() {
        let harness = Harness::new();
        let workouts = workout_store(&[]).await;
        let mut coordinator = active(&harness).await;
        coordinator.set_owner(None);

        assert!(coordinator.end(&workouts).await.unwrap().is_none());
        assert!(coordinator.is_active());
        assert_eq!(harness.key(KEY_ACTIVE).await.as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_end_drops_unknown_exercises() {
        let harness = Harness::new();
        let workouts = workout_store(&["Squat"]).await;
        let mut coordinator = active(&harness).await;
        roster_of(&mut coordinator, &["Squat", "Jumping Jacks"]);

        let report = coordinator.end(&workouts).await.unwrap().unwrap();

        assert_eq!(report.kept, 1);
        assert_eq!(report.dropped, vec!["Jumping Jacks".to_string()]);
        assert!(!coordinator.is_active());
    }

    #[tokio::test]
    async fn test_end_failure_keeps_session() {
        let harness = Harness::new();
        let mut coordinator = active(&harness).await;
        roster_of(&mut coordinator, &["Squat"]);
        coordinator.enter_background().await.unwrap();
        let keys_before = harness.store.len();

        let err = coordinator.end(&BrokenWorkoutStore).await.unwrap_err();

        assert_eq!(err.code(), "E401");
        assert!(coordinator.is_active());
        assert_eq!(coordinator.exercises().len(), 1);
        assert_eq!(harness.store.len(), keys_before);
        assert_eq!(harness.key(KEY_ACTIVE).await.as_deref(), Some("true"));

        // Retrying against a working store succeeds
        let workouts = workout_store(&["Squat"]).await;
        assert!(coordinator.end(&workouts).await.unwrap().is_some());
        assert!(harness.store.is_empty());
    }

    #[tokio::test]
    async fn test_partial_key_clear_keeps_session_active() {
        let harness = Harness::new();
        let store = FlakySnapshotStore::new(harness.store.clone());
        let workouts = workout_store(&["Squat"]).await;
        let mut coordinator = harness
            .host
            .coordinator(
                Arc::new(store.clone()),
                Arc::new(harness.clock.clone()),
                Arc::new(harness.ticker.clone()),
            )
            .unwrap()
            .with_owner("athlete");
        coordinator.start_empty().await.unwrap();
        roster_of(&mut coordinator, &["Squat"]);

        store.fail_removing(Some(KEY_SESSION_ID));
        assert!(coordinator.end(&workouts).await.is_err());

        // History is written, but memory and disk both still say active
        assert!(coordinator.is_active());
        assert_eq!(harness.key(KEY_ACTIVE).await.as_deref(), Some("true"));
        assert_eq!(harness.key(KEY_START_TIME).await, None);

        // Without a start time a relaunch does not resume the half-cleared session
        let mut relaunched = SessionHost::new()
            .coordinator(
                Arc::new(harness.store.clone()),
                Arc::new(harness.clock.clone()),
                Arc::new(harness.ticker.clone()),
            )
            .unwrap();
        assert!(!relaunched.resume_if_persisted().await.unwrap());

        store.fail_removing(None);
        let report = coordinator.end(&workouts).await.unwrap().unwrap();
        assert!(report.already_recorded);
        assert!(!coordinator.is_active());
        assert!(harness.store.is_empty());
        assert_eq!(workouts.recent_workouts(None).await.unwrap().len(), 1);
    }
}
