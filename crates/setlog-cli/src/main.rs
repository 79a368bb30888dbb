//! Setlog CLI - live workout session tracker
//!
//! Every invocation behaves like an app launch: the persisted session is
//! resumed, one action is applied, and the session is backgrounded (its
//! snapshot written) before the process exits.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use setlog_core::config::Config;
use setlog_core::domain::session::{
    FinalizeReport, SessionCoordinator, SessionHost, SqliteSnapshotStore,
};
use setlog_core::domain::timer::{RestTimer, SystemClock, TokioTicker, format_rest_duration};
use setlog_core::domain::workout::{
    CatalogExercise, ExerciseEntry, SqliteWorkoutStore, WorkoutStore, WorkoutTemplate, MAX_SETS,
};
use setlog_core::storage::Database;
use setlog_core::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "setlog")]
#[command(author, version, about = "Local-first workout session tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a workout
    Start {
        /// Workout template (TOML)
        #[arg(short, long)]
        template: Option<PathBuf>,
    },

    /// Show the workout in progress
    Status,

    /// Add an exercise to the workout
    Add {
        /// Exercise name (matched against the catalog)
        name: String,
        /// Number of sets
        #[arg(short, long, default_value_t = 1)]
        sets: usize,
        /// Planned reps per set
        #[arg(short, long, default_value_t = 0)]
        reps: u32,
        /// Planned weight per set
        #[arg(short, long, default_value_t = 0.0)]
        weight: f64,
        /// Rest between sets in seconds (0 for a superset)
        #[arg(long)]
        rest: Option<u32>,
    },

    /// Remove an exercise
    Remove {
        /// Exercise position (1-based)
        exercise: usize,
    },

    /// Move an exercise to a new position
    Move {
        /// Current position (1-based)
        from: usize,
        /// New position (1-based)
        to: usize,
    },

    /// Add a set to an exercise
    AddSet {
        /// Exercise position (1-based)
        exercise: usize,
    },

    /// Remove a set from an exercise
    RemoveSet {
        /// Exercise position (1-based)
        exercise: usize,
        /// Set number (1-based)
        set: usize,
    },

    /// Record reps and weight for a set
    LogSet {
        /// Exercise position (1-based)
        exercise: usize,
        /// Set number (1-based)
        set: usize,
        reps: u32,
        weight: f64,
        /// Also mark the set as done
        #[arg(short, long)]
        done: bool,
    },

    /// Mark a set done or not done
    Toggle {
        /// Exercise position (1-based)
        exercise: usize,
        /// Set number (1-based)
        set: usize,
    },

    /// Focus the next exercise
    Next,

    /// Focus the previous exercise
    Prev,

    /// Focus an exercise
    Focus {
        /// Exercise position (1-based)
        exercise: usize,
    },

    /// Run a rest countdown (Ctrl-C skips)
    Rest {
        /// Seconds; defaults to the focused exercise's rest period
        seconds: Option<u32>,
    },

    /// Finish the workout and save it to history
    End,

    /// List finished workouts
    History {
        /// Maximum number of workouts
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },

    /// Show a finished workout
    Show {
        /// Workout ID
        id: Uuid,
    },

    /// Delete a finished workout
    Delete {
        /// Workout ID
        id: Uuid,
    },

    /// Show personal records
    Records,

    /// Body weight log
    Weight {
        #[command(subcommand)]
        action: WeightAction,
    },

    /// Exercise catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum WeightAction {
    /// Log a measurement
    Log { weight: f64 },
    /// List recent measurements
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Add an exercise to the catalog
    Add {
        name: String,
        /// Target muscle group
        #[arg(short, long)]
        muscle: Option<String>,
        /// How to perform it
        #[arg(short, long)]
        instructions: Option<String>,
    },
    /// List the catalog
    List,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show configuration file path
    Path,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so JSON output stays clean
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "setlog=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        if let Some(hint) = err.downcast_ref::<Error>().and_then(Error::suggestion) {
            eprintln!("Try: {}", hint);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output {
        format: cli.format,
        quiet: cli.quiet,
    };

    let command = match cli.command {
        Commands::Config { action } => return cmd_config(action, out),
        command => command,
    };

    let config = Config::load()?;
    let db = Database::open(config.database_path()).await?;
    let workouts = SqliteWorkoutStore::new(db.pool().clone());

    let result = match command {
        Commands::History { limit } => cmd_history(&workouts, limit, out).await,
        Commands::Show { id } => cmd_show(&workouts, id, out).await,
        Commands::Delete { id } => cmd_delete(&workouts, id, out).await,
        Commands::Records => cmd_records(&workouts, out).await,
        Commands::Weight { action } => cmd_weight(&workouts, action, out).await,
        Commands::Catalog { action } => cmd_catalog(&workouts, action, out).await,
        command => {
            let host = SessionHost::new();
            let mut session = launch(&config, &db, &host).await?;
            let result = cmd_session(&mut session, &workouts, &config, command, out).await;
            session.enter_background().await?;
            result
        }
    };

    db.close().await;
    result
}

/// Claim the session and resume whatever the last invocation left behind
async fn launch(config: &Config, db: &Database, host: &SessionHost) -> anyhow::Result<SessionCoordinator> {
    let store = Arc::new(SqliteSnapshotStore::new(db.pool().clone()));
    let ticker = Arc::new(TokioTicker::current()?);
    let mut session = host
        .coordinator(store, Arc::new(SystemClock), ticker)?
        .with_settings(config.session.settings())
        .with_owner(config.session.owner_id.clone());

    if session.resume_if_persisted().await? {
        debug!(session_id = ?session.session_id(), "Resumed session for command");
    }
    Ok(session)
}

// ============================================================================
// Output
// ============================================================================

#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Print a confirmation line unless quiet or in JSON mode
    fn say(&self, message: impl AsRef<str>) {
        if !self.quiet && !self.json() {
            println!("{}", message.as_ref());
        }
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, minutes, secs) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 {
        format!("{:.0}", weight)
    } else {
        format!("{}", weight)
    }
}

fn local_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn print_roster(session: &SessionCoordinator) {
    println!(
        "{}  ({} elapsed)",
        session.workout_name(),
        format_elapsed(session.current_duration_seconds())
    );

    if session.exercises().is_empty() {
        println!("  No exercises yet. Add one with `setlog add <name>`.");
        return;
    }

    for (index, entry) in session.exercises().iter().enumerate() {
        let marker = if index == session.current_exercise_index() { '>' } else { ' ' };
        println!(
            "{} {}. {}  [{}/{}]  rest {}",
            marker,
            index + 1,
            entry.name,
            entry.completed_sets(),
            entry.sets.len(),
            format_rest_duration(i64::from(entry.rest_seconds))
        );
        for (set_index, set) in entry.sets.iter().enumerate() {
            println!(
                "      {}. {} x {}{}",
                set_index + 1,
                set.reps,
                format_weight(set.weight),
                if set.completed { "  done" } else { "" }
            );
        }
    }
}

// ============================================================================
// Session Commands
// ============================================================================

fn require_active(session: &SessionCoordinator) -> Result<(), Error> {
    if session.is_active() {
        Ok(())
    } else {
        Err(Error::NoActiveSession)
    }
}

/// Resolve a 1-based roster position
fn exercise_at(session: &SessionCoordinator, position: usize) -> Result<&ExerciseEntry, Error> {
    require_active(session)?;
    position
        .checked_sub(1)
        .and_then(|index| session.exercises().get(index))
        .ok_or_else(|| Error::ExerciseNotFound(position.to_string()))
}

/// Resolve a 1-based set number within an exercise
fn set_at(entry: &ExerciseEntry, number: usize) -> Result<usize, Error> {
    number
        .checked_sub(1)
        .filter(|index| *index < entry.sets.len())
        .ok_or_else(|| Error::SetNotFound(entry.name.clone(), number))
}

async fn cmd_session(
    session: &mut SessionCoordinator,
    workouts: &SqliteWorkoutStore,
    config: &Config,
    command: Commands,
    out: Output,
) -> anyhow::Result<()> {
    match command {
        Commands::Start { template } => cmd_start(session, template.as_deref(), out).await,
        Commands::Status => cmd_status(session, out),
        Commands::Add {
            name,
            sets,
            reps,
            weight,
            rest,
        } => {
            require_active(session)?;
            if sets > MAX_SETS {
                return Err(Error::InvalidInput(format!("At most {} sets per exercise", MAX_SETS)).into());
            }
            let rest = rest.unwrap_or(config.session.default_rest_seconds);
            let mut entry = ExerciseEntry::with_sets(name.trim(), rest, sets, reps, weight);
            if let Some(catalog) = workouts.find_exercise_by_name(&entry.name).await? {
                entry.catalog_id = Some(catalog.id);
                entry.target_muscle = catalog.target_muscle;
                entry.instructions = catalog.instructions;
                entry.image_ref = catalog.image_ref;
            } else {
                out.say(format!(
                    "Note: '{}' is not in the catalog and will not be saved to history.",
                    entry.name
                ));
            }
            let name = entry.name.clone();
            session.add_exercise(entry);
            out.say(format!("Added {} as #{}", name, session.exercises().len()));
            Ok(())
        }
        Commands::Remove { exercise } => {
            let entry = exercise_at(session, exercise)?;
            let (id, name) = (entry.id, entry.name.clone());
            session.remove_exercise(id);
            out.say(format!("Removed {}", name));
            Ok(())
        }
        Commands::Move { from, to } => {
            let name = exercise_at(session, from)?.name.clone();
            exercise_at(session, to)?;
            session.move_exercise(from - 1, to - 1);
            out.say(format!("Moved {} to #{}", name, to));
            Ok(())
        }
        Commands::AddSet { exercise } => {
            let id = exercise_at(session, exercise)?.id;
            session.add_set(id);
            if let Some(entry) = session.exercise(id) {
                out.say(format!("{} now has {} sets", entry.name, entry.sets.len()));
            }
            Ok(())
        }
        Commands::RemoveSet { exercise, set } => {
            let entry = exercise_at(session, exercise)?;
            let (id, index) = (entry.id, set_at(entry, set)?);
            if session.remove_set(id, index) {
                out.say(format!("Removed set {}", set));
            } else {
                out.say("An exercise keeps at least one set.");
            }
            Ok(())
        }
        Commands::LogSet {
            exercise,
            set,
            reps,
            weight,
            done,
        } => {
            let entry = exercise_at(session, exercise)?;
            let (id, index) = (entry.id, set_at(entry, set)?);
            let already_done = entry.sets[index].completed;
            session.update_set(id, index, reps, weight);
            out.say(format!("Set {}: {} x {}", set, reps, format_weight(weight.max(0.0))));
            if done && !already_done {
                toggle(session, id, index, out);
            }
            Ok(())
        }
        Commands::Toggle { exercise, set } => {
            let entry = exercise_at(session, exercise)?;
            let (id, index) = (entry.id, set_at(entry, set)?);
            toggle(session, id, index, out);
            Ok(())
        }
        Commands::Next => {
            require_active(session)?;
            session.advance_to_next();
            announce_focus(session, out);
            Ok(())
        }
        Commands::Prev => {
            require_active(session)?;
            session.advance_to_previous();
            announce_focus(session, out);
            Ok(())
        }
        Commands::Focus { exercise } => {
            exercise_at(session, exercise)?;
            session.focus_exercise(exercise - 1);
            announce_focus(session, out);
            Ok(())
        }
        Commands::Rest { seconds } => {
            let seconds = match seconds {
                Some(seconds) => seconds,
                None => {
                    require_active(session)?;
                    session
                        .current_exercise()
                        .map(|entry| entry.rest_seconds)
                        .unwrap_or(config.session.default_rest_seconds)
                }
            };
            cmd_rest(seconds, config, out).await
        }
        Commands::End => cmd_end(session, workouts, out).await,
        _ => Ok(()),
    }
}

fn toggle(session: &mut SessionCoordinator, id: Uuid, index: usize, out: Output) {
    let Some(done) = session.toggle_set_completion(id, index) else {
        return;
    };
    let Some(entry) = session.exercise(id) else {
        return;
    };

    if !done {
        out.say(format!("{} set {} marked not done", entry.name, index + 1));
    } else if entry.rest_seconds == 0 {
        out.say(format!("{} set {} done. Superset, go straight on.", entry.name, index + 1));
    } else {
        out.say(format!(
            "{} set {} done. Rest {} (`setlog rest` to start the timer)",
            entry.name,
            index + 1,
            format_rest_duration(i64::from(entry.rest_seconds))
        ));
    }
}

fn announce_focus(session: &SessionCoordinator, out: Output) {
    if let Some(entry) = session.current_exercise() {
        out.say(format!(
            "Now on #{}: {}",
            session.current_exercise_index() + 1,
            entry.name
        ));
    }
}

async fn cmd_start(session: &mut SessionCoordinator, template: Option<&Path>, out: Output) -> anyhow::Result<()> {
    if session.is_active() {
        out.say(format!(
            "Workout '{}' is already in progress ({} elapsed).",
            session.workout_name(),
            format_elapsed(session.current_duration_seconds())
        ));
        return Ok(());
    }

    match template {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read template {}: {}", path.display(), e))?;
            let template = WorkoutTemplate::from_toml(&contents)?;
            session.start_from_template(&template).await?;
        }
        None => session.start_empty().await?,
    }

    if out.json() {
        return out.print_json(session.state());
    }
    out.say(format!(
        "Started '{}' with {} exercise(s).",
        session.workout_name(),
        session.exercises().len()
    ));
    Ok(())
}

fn cmd_status(session: &SessionCoordinator, out: Output) -> anyhow::Result<()> {
    if out.json() {
        return out.print_json(session.state());
    }
    if !session.is_active() {
        println!("No workout in progress.");
        return Ok(());
    }
    print_roster(session);
    Ok(())
}

async fn cmd_rest(seconds: u32, config: &Config, out: Output) -> anyhow::Result<()> {
    let ticker = Arc::new(TokioTicker::current()?);
    let mut timer =
        RestTimer::new(ticker).with_tick_period(Duration::from_millis(config.session.tick_millis));

    if seconds == 0 {
        out.say(format_rest_duration(0));
        return Ok(());
    }

    timer.start(seconds);
    out.say(format!("Resting {}", format_rest_duration(i64::from(seconds))));

    loop {
        tokio::select! {
            running = timer.wait_tick() => {
                if !running {
                    break;
                }
                if !out.quiet && !out.json() {
                    println!("  {}", timer.label());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                timer.skip();
                out.say("Rest skipped");
                break;
            }
        }
    }

    info!(total_seconds = timer.total_seconds(), "Rest finished");
    if out.json() {
        return out.print_json(&timer.state());
    }
    out.say("Rest over. Next set!");
    Ok(())
}

async fn cmd_end(session: &mut SessionCoordinator, workouts: &SqliteWorkoutStore, out: Output) -> anyhow::Result<()> {
    require_active(session)?;
    let name = session.workout_name().to_string();
    let elapsed = session.current_duration_seconds();

    let Some(report) = session.end(workouts).await? else {
        return Err(Error::NoActiveSession.into());
    };

    if out.json() {
        return out.print_json(&report);
    }
    print_report(&name, elapsed, &report, out);
    Ok(())
}

fn print_report(name: &str, elapsed: i64, report: &FinalizeReport, out: Output) {
    if report.already_recorded {
        out.say(format!("'{}' was already saved as {}.", name, report.workout_id));
    } else {
        out.say(format!(
            "Saved '{}' ({}) as {} with {} exercise(s).",
            name,
            format_elapsed(elapsed),
            report.workout_id,
            report.kept
        ));
    }
    for dropped in &report.dropped {
        out.say(format!("  Not saved (not in catalog): {}", dropped));
    }
}

// ============================================================================
// History Commands
// ============================================================================

async fn cmd_history(workouts: &SqliteWorkoutStore, limit: i64, out: Output) -> anyhow::Result<()> {
    let summaries = workouts.recent_workouts(Some(limit)).await?;
    if out.json() {
        return out.print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No workouts yet.");
        return Ok(());
    }
    for summary in summaries {
        println!(
            "{}  {}  {}  {}  {} exercise(s), {} set(s), volume {}",
            summary.id,
            local_time(summary.start_time),
            summary.name,
            format_elapsed(summary.duration_seconds),
            summary.exercise_count,
            summary.set_count,
            format_weight(summary.volume)
        );
    }
    Ok(())
}

async fn cmd_show(workouts: &SqliteWorkoutStore, id: Uuid, out: Output) -> anyhow::Result<()> {
    let detail = workouts
        .workout_detail(id)
        .await?
        .ok_or_else(|| Error::InvalidInput(format!("Workout {} not found", id)))?;

    if out.json() {
        return out.print_json(&detail);
    }

    println!(
        "{}  {}  ({})",
        detail.name,
        local_time(detail.start_time),
        format_elapsed(detail.duration_seconds)
    );
    for exercise in &detail.exercises {
        println!(
            "  {}. {}{}",
            exercise.order + 1,
            exercise.exercise_name,
            if exercise.completed { "  done" } else { "" }
        );
        for (index, set) in exercise.sets.iter().enumerate() {
            println!(
                "      {}. {} x {}{}",
                index + 1,
                set.reps,
                format_weight(set.weight),
                if set.completed { "  done" } else { "" }
            );
        }
    }
    Ok(())
}

async fn cmd_delete(workouts: &SqliteWorkoutStore, id: Uuid, out: Output) -> anyhow::Result<()> {
    if !workouts.delete_workout(id).await? {
        return Err(Error::InvalidInput(format!("Workout {} not found", id)).into());
    }
    out.say(format!("Deleted workout {}", id));
    Ok(())
}

async fn cmd_records(workouts: &SqliteWorkoutStore, out: Output) -> anyhow::Result<()> {
    let records = workouts.personal_records().await?;
    if out.json() {
        return out.print_json(&records);
    }
    if records.is_empty() {
        println!("No personal records yet.");
        return Ok(());
    }
    for record in records {
        println!(
            "{}: {} x {}  ({})",
            record.exercise_name,
            format_weight(record.weight),
            record.reps,
            local_time(record.achieved_at)
        );
    }
    Ok(())
}

async fn cmd_weight(workouts: &SqliteWorkoutStore, action: WeightAction, out: Output) -> anyhow::Result<()> {
    match action {
        WeightAction::Log { weight } => {
            let entry = workouts.log_body_weight(weight, Utc::now()).await?;
            if out.json() {
                return out.print_json(&entry);
            }
            out.say(format!("Logged body weight {}", format_weight(entry.weight)));
        }
        WeightAction::List { limit } => {
            let entries = workouts.body_weight_history(Some(limit)).await?;
            if out.json() {
                return out.print_json(&entries);
            }
            if entries.is_empty() {
                println!("No body weight entries yet.");
            }
            for entry in entries {
                println!("{}  {}", local_time(entry.recorded_at), format_weight(entry.weight));
            }
        }
    }
    Ok(())
}

async fn cmd_catalog(workouts: &SqliteWorkoutStore, action: CatalogAction, out: Output) -> anyhow::Result<()> {
    match action {
        CatalogAction::Add {
            name,
            muscle,
            instructions,
        } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidInput("Exercise name must not be empty".to_string()).into());
            }
            if workouts.find_exercise_by_name(name).await?.is_some() {
                return Err(Error::InvalidInput(format!("'{}' is already in the catalog", name)).into());
            }
            let mut exercise = CatalogExercise::new(name);
            exercise.target_muscle = muscle;
            exercise.instructions = instructions;
            workouts.add_catalog_exercise(&exercise).await?;
            if out.json() {
                return out.print_json(&exercise);
            }
            out.say(format!("Added {} to the catalog", exercise.name));
        }
        CatalogAction::List => {
            let catalog = workouts.list_catalog().await?;
            if out.json() {
                return out.print_json(&catalog);
            }
            if catalog.is_empty() {
                println!("Catalog is empty. Add exercises with `setlog catalog add <name>`.");
            }
            for exercise in catalog {
                match exercise.target_muscle {
                    Some(muscle) => println!("{}  ({})", exercise.name, muscle),
                    None => println!("{}", exercise.name),
                }
            }
        }
    }
    Ok(())
}

// ============================================================================
// Config Commands
// ============================================================================

fn cmd_config(action: ConfigAction, out: Output) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            out.say(format!("Set {} = {}", key, value));
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            if out.json() {
                let map: serde_json::Map<String, serde_json::Value> = items
                    .into_iter()
                    .map(|(key, value)| (key, serde_json::Value::String(value)))
                    .collect();
                return out.print_json(&map);
            }
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            out.say("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
