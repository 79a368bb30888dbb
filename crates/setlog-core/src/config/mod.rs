//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::session::SessionSettings;
use crate::storage::default_database_path;

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "SETLOG_CONFIG_DIR";

/// Environment variable overriding the database path
pub const DATABASE_ENV: &str = "SETLOG_DATABASE";

/// Setlog configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Identity finished workouts are recorded under
    pub owner_id: String,
    pub default_workout_name: String,
    /// Name for template exercises whose catalog link is missing
    pub placeholder_exercise_name: String,
    /// Rest period for exercises added without one
    pub default_rest_seconds: u32,
    /// Period of the session and rest clocks
    pub tick_millis: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file; the platform data directory when unset
    pub database_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            owner_id: "local".to_string(),
            default_workout_name: "Workout".to_string(),
            placeholder_exercise_name: "Unknown Exercise".to_string(),
            default_rest_seconds: 90,
            tick_millis: 1000,
        }
    }
}

impl SessionConfig {
    /// Coordinator settings derived from this section
    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            default_workout_name: self.default_workout_name.clone(),
            placeholder_exercise_name: self.placeholder_exercise_name.clone(),
            tick_period: Duration::from_millis(self.tick_millis),
        }
    }
}

impl Config {
    const KEYS: [&'static str; 6] = [
        "session.owner_id",
        "session.default_workout_name",
        "session.placeholder_exercise_name",
        "session.default_rest_seconds",
        "session.tick_millis",
        "storage.database_path",
    ];

    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("setlog")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.session.owner_id.trim().is_empty() {
            return Err(anyhow!("session.owner_id must not be empty"));
        }
        if self.session.default_workout_name.trim().is_empty() {
            return Err(anyhow!("session.default_workout_name must not be empty"));
        }
        if self.session.placeholder_exercise_name.trim().is_empty() {
            return Err(anyhow!("session.placeholder_exercise_name must not be empty"));
        }
        if !(10..=60_000).contains(&self.session.tick_millis) {
            return Err(anyhow!("session.tick_millis must be between 10 and 60000"));
        }
        Ok(())
    }

    /// Database file to open: `SETLOG_DATABASE`, then config, then the platform default
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = env::var_os(DATABASE_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(path);
        }
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "session.owner_id" => Ok(self.session.owner_id.clone()),
            "session.default_workout_name" => Ok(self.session.default_workout_name.clone()),
            "session.placeholder_exercise_name" => Ok(self.session.placeholder_exercise_name.clone()),
            "session.default_rest_seconds" => Ok(self.session.default_rest_seconds.to_string()),
            "session.tick_millis" => Ok(self.session.tick_millis.to_string()),

            "storage.database_path" => Ok(match &self.storage.database_path {
                Some(path) => path.display().to_string(),
                None => format!("(default: {})", default_database_path().display()),
            }),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `setlog config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "session.owner_id" => {
                self.session.owner_id = non_empty(key, value)?;
            }
            "session.default_workout_name" => {
                self.session.default_workout_name = non_empty(key, value)?;
            }
            "session.placeholder_exercise_name" => {
                self.session.placeholder_exercise_name = non_empty(key, value)?;
            }
            "session.default_rest_seconds" => {
                self.session.default_rest_seconds = value
                    .parse()
                    .with_context(|| format!("Invalid default_rest_seconds value: {}", value))?;
            }
            "session.tick_millis" => {
                let millis: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid tick_millis value: {}", value))?;
                if !(10..=60_000).contains(&millis) {
                    return Err(anyhow!("Tick period must be between 10 and 60000 milliseconds"));
                }
                self.session.tick_millis = millis;
            }

            "storage.database_path" => {
                let trimmed = value.trim();
                self.storage.database_path = if trimmed.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(trimmed))
                };
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `setlog config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        Self::KEYS
            .into_iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn non_empty(key: &str, value: &str) -> anyhow::Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("{} must not be empty", key));
    }
    Ok(trimmed.to_string())
}
