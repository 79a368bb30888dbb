//! Workout repository for database operations
//!
//! Handles the exercise catalog, finished workouts with their exercises and
//! sets, personal records, and the body weight log.

use super::record::{
    AppendOutcome, BodyWeightEntry, CatalogExercise, NewExerciseRecord, NewSetRecord,
    NewWorkoutRecord, PersonalRecord, WorkoutDetail, WorkoutSummary,
};
use super::repository_trait::WorkoutStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

/// Repository for workout history database operations
#[derive(Debug, Clone)]
pub struct SqliteWorkoutStore {
    pool: SqlitePool,
}

impl SqliteWorkoutStore {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========== Catalog ==========

    /// Add an exercise to the catalog
    pub async fn add_catalog_exercise(&self, exercise: &CatalogExercise) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO exercises (id, name, target_muscle, instructions, image_ref)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(exercise.id.to_string())
        .bind(&exercise.name)
        .bind(&exercise.target_muscle)
        .bind(&exercise.instructions)
        .bind(&exercise.image_ref)
        .execute(&self.pool)
        .await?;

        debug!(exercise_id = %exercise.id, name = %exercise.name, "Added catalog exercise");
        Ok(())
    }

    /// List the catalog ordered by name
    pub async fn list_catalog(&self) -> Result<Vec<CatalogExercise>> {
        let rows: Vec<CatalogRow> = sqlx::query_as(
            r#"
            SELECT id, name, target_muscle, instructions, image_ref
            FROM exercises
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CatalogRow::into_exercise).collect()
    }

    // ========== History ==========

    /// List recent workouts, newest first
    pub async fn recent_workouts(&self, limit: Option<i64>) -> Result<Vec<WorkoutSummary>> {
        let limit = limit.unwrap_or(20);

        let rows: Vec<WorkoutSummaryRow> = sqlx::query_as(
            r#"
            SELECT
                w.id, w.name, w.start_time, w.duration_seconds,
                (SELECT COUNT(*) FROM workout_exercises we WHERE we.workout_id = w.id) AS exercise_count,
                (SELECT COUNT(*)
                   FROM workout_sets ws
                   JOIN workout_exercises we ON ws.workout_exercise_id = we.id
                  WHERE we.workout_id = w.id) AS set_count,
                (SELECT CAST(COALESCE(SUM(ws.reps * ws.weight), 0) AS REAL)
                   FROM workout_sets ws
                   JOIN workout_exercises we ON ws.workout_exercise_id = we.id
                  WHERE we.workout_id = w.id AND ws.completed = 1) AS volume
            FROM workouts w
            ORDER BY w.start_time DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WorkoutSummaryRow::into_summary).collect()
    }

    /// Load a workout with its exercises and sets in recorded order
    pub async fn workout_detail(&self, workout_id: Uuid) -> Result<Option<WorkoutDetail>> {
        let row: Option<WorkoutRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, user_id, name, start_time, end_time, duration_seconds
            FROM workouts
            WHERE id = ?
            "#,
        )
        .bind(workout_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let exercise_rows: Vec<WorkoutExerciseRow> = sqlx::query_as(
            r#"
            SELECT id, exercise_id, exercise_name, order_index, completed, rest_seconds
            FROM workout_exercises
            WHERE workout_id = ?
            ORDER BY order_index
            "#,
        )
        .bind(workout_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut exercises = Vec::with_capacity(exercise_rows.len());
        for exercise in exercise_rows {
            let sets: Vec<SetRow> = sqlx::query_as(
                r#"
                SELECT reps, weight, completed
                FROM workout_sets
                WHERE workout_exercise_id = ?
                ORDER BY set_index
                "#,
            )
            .bind(&exercise.id)
            .fetch_all(&self.pool)
            .await?;

            exercises.push(exercise.into_record(sets)?);
        }

        Ok(Some(row.into_detail(exercises)?))
    }

    /// Heaviest completed set per exercise; ties go to more reps, then the earliest
    pub async fn personal_records(&self) -> Result<Vec<PersonalRecord>> {
        let rows: Vec<PersonalRecordRow> = sqlx::query_as(
            r#"
            SELECT exercise_name, weight, reps, start_time
            FROM (
                SELECT
                    we.exercise_name, ws.weight, ws.reps, w.start_time,
                    ROW_NUMBER() OVER (
                        PARTITION BY we.exercise_id
                        ORDER BY ws.weight DESC, ws.reps DESC, w.start_time ASC
                    ) AS rn
                FROM workout_sets ws
                JOIN workout_exercises we ON ws.workout_exercise_id = we.id
                JOIN workouts w ON we.workout_id = w.id
                WHERE ws.completed = 1
            )
            WHERE rn = 1
            ORDER BY exercise_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PersonalRecordRow::into_record).collect())
    }

    /// Delete a workout and everything under it
    pub async fn delete_workout(&self, workout_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workouts WHERE id = ?")
            .bind(workout_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========== Body Weight ==========

    /// Log a body weight measurement
    pub async fn log_body_weight(&self, weight: f64, recorded_at: DateTime<Utc>) -> Result<BodyWeightEntry> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(Error::InvalidInput(format!("Body weight must be positive, got {}", weight)));
        }

        let entry = BodyWeightEntry {
            id: Uuid::new_v4(),
            weight,
            recorded_at,
        };

        sqlx::query("INSERT INTO body_weight_log (id, weight, recorded_at) VALUES (?, ?, ?)")
            .bind(entry.id.to_string())
            .bind(entry.weight)
            .bind(entry.recorded_at)
            .execute(&self.pool)
            .await?;

        info!(weight = weight, "Logged body weight");
        Ok(entry)
    }

    /// Body weight history, newest first
    pub async fn body_weight_history(&self, limit: Option<i64>) -> Result<Vec<BodyWeightEntry>> {
        let rows: Vec<BodyWeightRow> = sqlx::query_as(
            r#"
            SELECT id, weight, recorded_at
            FROM body_weight_log
            ORDER BY recorded_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit.unwrap_or(50))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BodyWeightRow::into_entry).collect()
    }

    async fn workout_id_for_session(&self, session_id: Uuid) -> Result<Option<Uuid>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM workouts WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(id,)| parse_uuid(&id, "workout")).transpose()
    }
}

#[async_trait]
impl WorkoutStore for SqliteWorkoutStore {
    async fn find_exercise_by_name(&self, name: &str) -> Result<Option<CatalogExercise>> {
        let row: Option<CatalogRow> = sqlx::query_as(
            r#"
            SELECT id, name, target_muscle, instructions, image_ref
            FROM exercises
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CatalogRow::into_exercise).transpose()
    }

    async fn find_exercise_by_id(&self, id: Uuid) -> Result<Option<CatalogExercise>> {
        let row: Option<CatalogRow> = sqlx::query_as(
            r#"
            SELECT id, name, target_muscle, instructions, image_ref
            FROM exercises
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CatalogRow::into_exercise).transpose()
    }

    async fn append(&self, record: &NewWorkoutRecord) -> Result<AppendOutcome> {
        let workout_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO workouts (id, session_id, user_id, name, start_time, end_time, duration_seconds)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO NOTHING
            "#,
        )
        .bind(workout_id.to_string())
        .bind(record.session_id.to_string())
        .bind(&record.user_id)
        .bind(&record.workout_name)
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(record.duration_seconds)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            let existing = self
                .workout_id_for_session(record.session_id)
                .await?
                .ok_or_else(|| Error::Storage(format!("Workout for session {} vanished", record.session_id)))?;
            info!(
                session_id = %record.session_id,
                workout_id = %existing,
                "Session already recorded, skipping append"
            );
            return Ok(AppendOutcome::AlreadyRecorded(existing));
        }

        for exercise in &record.exercises {
            let workout_exercise_id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO workout_exercises (
                    id, workout_id, exercise_id, exercise_name,
                    order_index, completed, rest_seconds
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&workout_exercise_id)
            .bind(workout_id.to_string())
            .bind(exercise.catalog_id.to_string())
            .bind(&exercise.exercise_name)
            .bind(i64::from(exercise.order))
            .bind(exercise.completed)
            .bind(i64::from(exercise.rest_seconds))
            .execute(&mut *tx)
            .await?;

            for (index, set) in exercise.sets.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO workout_sets (id, workout_exercise_id, set_index, reps, weight, completed)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&workout_exercise_id)
                .bind(index as i64)
                .bind(i64::from(set.reps))
                .bind(set.weight)
                .bind(set.completed)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        info!(
            workout_id = %workout_id,
            session_id = %record.session_id,
            exercises = record.exercises.len(),
            "Appended workout to history"
        );

        Ok(AppendOutcome::Inserted(workout_id))
    }
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Storage(format!("Invalid {} ID '{}': {}", what, value, e)))
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Database row for a catalog exercise
#[derive(sqlx::FromRow)]
struct CatalogRow {
    id: String,
    name: String,
    target_muscle: Option<String>,
    instructions: Option<String>,
    image_ref: Option<String>,
}

impl CatalogRow {
    fn into_exercise(self) -> Result<CatalogExercise> {
        Ok(CatalogExercise {
            id: parse_uuid(&self.id, "exercise")?,
            name: self.name,
            target_muscle: self.target_muscle,
            instructions: self.instructions,
            image_ref: self.image_ref,
        })
    }
}

/// Database row for a workout
#[derive(sqlx::FromRow)]
struct WorkoutRow {
    id: String,
    session_id: String,
    user_id: String,
    name: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration_seconds: i64,
}

impl WorkoutRow {
    fn into_detail(self, exercises: Vec<NewExerciseRecord>) -> Result<WorkoutDetail> {
        Ok(WorkoutDetail {
            id: parse_uuid(&self.id, "workout")?,
            session_id: parse_uuid(&self.session_id, "session")?,
            user_id: self.user_id,
            name: self.name,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_seconds: self.duration_seconds,
            exercises,
        })
    }
}

/// Database row for workout listings
#[derive(sqlx::FromRow)]
struct WorkoutSummaryRow {
    id: String,
    name: String,
    start_time: DateTime<Utc>,
    duration_seconds: i64,
    exercise_count: i64,
    set_count: i64,
    volume: f64,
}

impl WorkoutSummaryRow {
    fn into_summary(self) -> Result<WorkoutSummary> {
        Ok(WorkoutSummary {
            id: parse_uuid(&self.id, "workout")?,
            name: self.name,
            start_time: self.start_time,
            duration_seconds: self.duration_seconds,
            exercise_count: self.exercise_count,
            set_count: self.set_count,
            volume: self.volume,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WorkoutExerciseRow {
    id: String,
    exercise_id: String,
    exercise_name: String,
    order_index: i64,
    completed: bool,
    rest_seconds: i64,
}

impl WorkoutExerciseRow {
    fn into_record(self, sets: Vec<SetRow>) -> Result<NewExerciseRecord> {
        Ok(NewExerciseRecord {
            catalog_id: parse_uuid(&self.exercise_id, "exercise")?,
            exercise_name: self.exercise_name,
            order: to_u32(self.order_index),
            completed: self.completed,
            rest_seconds: to_u32(self.rest_seconds),
            sets: sets
                .into_iter()
                .map(|set| NewSetRecord {
                    reps: to_u32(set.reps),
                    weight: set.weight,
                    completed: set.completed,
                })
                .collect(),
        })
    }
}

#[derive(sqlx::FromRow)]
struct SetRow {
    reps: i64,
    weight: f64,
    completed: bool,
}

#[derive(sqlx::FromRow)]
struct PersonalRecordRow {
    exercise_name: String,
    weight: f64,
    reps: i64,
    start_time: DateTime<Utc>,
}

impl PersonalRecordRow {
    fn into_record(self) -> PersonalRecord {
        PersonalRecord {
            exercise_name: self.exercise_name,
            weight: self.weight,
            reps: to_u32(self.reps),
            achieved_at: self.start_time,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BodyWeightRow {
    id: String,
    weight: f64,
    recorded_at: DateTime<Utc>,
}

impl BodyWeightRow {
    fn into_entry(self) -> Result<BodyWeightEntry> {
        Ok(BodyWeightEntry {
            id: parse_uuid(&self.id, "body weight entry")?,
            weight: self.weight,
            recorded_at: self.recorded_at,
        })
    }
}
